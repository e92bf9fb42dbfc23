use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entities::{TokenRecord, TokenScope};
use crate::domain::error::{Error, ErrorKind};
use crate::domain::repository::TokenStore;
use crate::infrastructure::persistence::db::map_db_err;

/// Implementación PostgreSQL del `TokenStore`.
///
/// Son operaciones de un solo statement: no participan en las transacciones
/// multi-paso del ledger, así que el store posee su propio pool.
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(
        &self,
        hash: &[u8],
        user_id: i64,
        scope: TokenScope,
        expiry: DateTime<Utc>,
    ) -> Result<(), Error> {
        const OP: &str = "token_store.insert";

        sqlx::query(
            r#"
            INSERT INTO tokens (hash, user_id, scope, expiry)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(hash)
        .bind(user_id)
        .bind(scope)
        .bind(expiry)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err(OP, e))?;

        Ok(())
    }

    async fn get_by_hash(&self, hash: &[u8]) -> Result<TokenRecord, Error> {
        const OP: &str = "token_store.get_by_hash";

        sqlx::query_as::<_, TokenRecord>(
            r#"
            SELECT hash, user_id, scope, expiry
            FROM tokens
            WHERE hash = $1
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err(OP, e))?
        .ok_or_else(|| Error::new(ErrorKind::TokenNotFound, OP, "token not found"))
    }

    async fn delete_all_for_user_and_scope(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<(), Error> {
        const OP: &str = "token_store.delete_all_for_user_and_scope";

        sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE scope = $1 AND user_id = $2
            "#,
        )
        .bind(scope)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err(OP, e))?;

        Ok(())
    }
}
