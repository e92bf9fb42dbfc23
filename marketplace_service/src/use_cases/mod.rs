pub mod browse_products;
pub mod create_order;
pub mod create_topup_order;
pub mod credit_wallet;
pub mod debit_wallet;
pub mod get_orders;
pub mod get_wallet;
pub mod login;
pub mod manage_cart;
pub mod publish_product;
pub mod signup;
pub mod tokens;
pub mod transfer_funds;
pub mod verify_email;
pub mod verify_payment;
