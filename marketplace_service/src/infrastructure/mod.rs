pub mod cache;
pub mod gateways;
pub mod persistence;
