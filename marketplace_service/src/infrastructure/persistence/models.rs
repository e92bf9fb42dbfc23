use crate::domain::entities::{TransactionStatus, TransactionType};

/// Parámetros de inserción para una fila del ledger.
#[derive(Debug, Clone)]
pub struct NewWalletTransaction {
    pub user_id: i64,
    pub related_user_id: Option<i64>,
    /// Con signo: positivo acredita, negativo debita.
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub gateway_order_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub seller_id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: i32,
    pub stock: i32,
    pub thumbnail_url: String,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub order_id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub quantity: i32,
    pub price_at_purchase: i32,
}

/// Fila de autenticación: la única consulta que expone el hash de password.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserAuthRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
}
