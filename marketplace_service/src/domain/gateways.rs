use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::Error;

/// Payload serializado que viaja por la cola `queue:emails`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailJob {
    pub recipient: String,
    pub template_file: String,
    pub template_data: serde_json::Value,
}

/// Puerto hacia el cache (Valkey/Redis): carrito, llaves de verificación y
/// la cola durable de correos. Todas las operaciones son atómicas sobre una
/// sola llave; no se requieren transacciones multi-llave.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cache: Send + Sync {
    // --- Carrito: hash `cart:{user_id}` {product_id -> quantity} ---
    async fn add_to_cart(&self, user_id: i64, product_id: i64, quantity: i64)
        -> Result<(), Error>;
    /// `quantity <= 0` elimina el campo.
    async fn set_cart_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<(), Error>;
    async fn remove_cart_item(&self, user_id: i64, product_id: i64) -> Result<(), Error>;
    async fn clear_cart(&self, user_id: i64) -> Result<(), Error>;
    async fn get_cart(&self, user_id: i64) -> Result<HashMap<String, String>, Error>;
    async fn cart_count(&self, user_id: i64) -> Result<i64, Error>;

    // --- Llaves de verificación de correo ---
    /// Escribe el par `verification:hash:{hash}` (SET NX EX) y
    /// `user:{user_id}:verification` (SET EX). Si el NX falla devuelve
    /// `Collision` tras intentar limpiar la llave inversa.
    async fn set_verification_token(
        &self,
        token_hash_hex: &str,
        user_id: i64,
        ttl: Duration,
    ) -> Result<(), Error>;
    async fn get_user_id_by_token_hash(&self, token_hash_hex: &str)
        -> Result<Option<i64>, Error>;
    async fn get_token_hash_by_user_id(&self, user_id: i64) -> Result<Option<String>, Error>;
    async fn delete_verification_token(
        &self,
        token_hash_hex: &str,
        user_id: i64,
    ) -> Result<(), Error>;

    // --- Cola de correos: lista `queue:emails`, FIFO, sin deduplicación ---
    async fn enqueue_email(&self, payload: String) -> Result<(), Error>;
    /// BRPOP con timeout; `None` significa "no hay trabajo, reintenta".
    async fn blocking_pop_email(&self, timeout: Duration) -> Result<Option<String>, Error>;
    async fn email_queue_len(&self) -> Result<i64, Error>;
}

/// Puerto hacia el transporte de correo. La implementación reintenta
/// internamente; el error final es del último intento.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        template_file: &str,
        template_data: &serde_json::Value,
    ) -> Result<(), Error>;
}

/// Puerto hacia el almacenamiento de imágenes de producto.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudUploader: Send + Sync {
    /// Sube una imagen y devuelve su URL pública.
    async fn upload_image(&self, bytes: Vec<u8>, filename: &str) -> Result<String, Error>;
}

/// Puerto hacia la pasarela de pagos externa.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Crea una orden de cobro y devuelve su identificador en la pasarela.
    async fn create_order(&self, amount_minor: i64, receipt: &str) -> Result<String, Error>;
    /// Comparación en tiempo constante de la firma HMAC-SHA256 del webhook.
    fn verify_webhook_signature(&self, body: &[u8], signature_hex: &str) -> bool;
    /// Firma del checkout: HMAC-SHA256 del secreto de API sobre
    /// `"{order_id}|{payment_id}"`, también en tiempo constante.
    fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature_hex: &str,
    ) -> bool;
    /// Key pública que el frontend necesita para abrir el checkout.
    fn key_id(&self) -> &str;
}
