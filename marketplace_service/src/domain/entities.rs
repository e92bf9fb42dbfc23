use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Vista agregada del ledger para un usuario.
///
/// Los montos son enteros en unidades menores (paise). Los contadores
/// `lifetime_*` son monótonos: cada crédito/débito confirmado los aumenta
/// en la misma transacción de base de datos que modifica `balance`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Wallet {
    pub user_id: i64,
    pub balance: i64,
    pub lifetime_earned: i64,
    pub lifetime_spent: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "wallet_transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
    TransferIn,
    TransferOut,
    RazorpayTopup,
    CreditPending,
    CreditPayment,
    OrderPayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "wallet_transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Completed,
    Failed,
}

/// Fila inmutable del ledger: un cambio de saldo, un registro.
///
/// `amount` lleva signo desde el punto de vista del usuario sujeto:
/// positivo acredita, negativo debita. `gateway_order_id` es único y actúa
/// como llave de idempotencia para la conciliación por webhook.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: i64,
    pub related_user_id: Option<i64>,
    pub amount: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub seller_id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Precio en unidades de moneda (no paise); el ledger multiplica x100.
    pub price: i32,
    pub stock: i32,
    pub thumbnail_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductImage {
    pub id: i64,
    pub product_id: i64,
    pub image_url: String,
    pub display_order: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    /// Total en paise.
    pub total_amount: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub quantity: i32,
    pub price_at_purchase: i32,
}

/// Línea del carrito ya cruzada con la fila actual del producto.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub product_id: i64,
    pub quantity: i64,
    pub name: String,
    pub price: i32,
    pub image_url: String,
    pub stock: i32,
    pub seller_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "token_scope", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    Activation,
    Authentication,
    Refresh,
}

/// Registro persistido de un token opaco: solo se guarda el hash SHA-256.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenRecord {
    pub hash: Vec<u8>,
    pub user_id: i64,
    pub scope: TokenScope,
    pub expiry: DateTime<Utc>,
}
