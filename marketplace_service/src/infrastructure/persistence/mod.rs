pub mod db;
pub mod models;
pub mod order_store;
pub mod product_store;
pub mod token_store;
pub mod user_store;
pub mod wallet_store;
