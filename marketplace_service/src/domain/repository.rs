use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::{TokenRecord, TokenScope};
use crate::domain::error::Error;

/// Puerto de persistencia para tokens opacos (refresh/activación).
///
/// Solo se guardan hashes SHA-256; la unicidad es sobre el hash.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(
        &self,
        hash: &[u8],
        user_id: i64,
        scope: TokenScope,
        expiry: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// `TokenNotFound` si el hash no existe.
    async fn get_by_hash(&self, hash: &[u8]) -> Result<TokenRecord, Error>;

    /// Borra todos los tokens de un usuario para un alcance dado.
    async fn delete_all_for_user_and_scope(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<(), Error>;
}
