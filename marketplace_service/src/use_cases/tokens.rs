use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::entities::TokenScope;
use crate::domain::error::{Error, ErrorKind};
use crate::domain::repository::TokenStore;
use crate::domain::tokens;

/// Emisión y rotación de tokens.
///
/// Los refresh tokens son de un solo uso: cada refresco borra todos los
/// refresh del usuario y emite un par nuevo. Presentar un token de otro
/// alcance revoca esa familia completa (detección de mal uso).
pub struct TokenUseCase {
    store: Arc<dyn TokenStore>,
    jwt_secret: Vec<u8>,
}

impl TokenUseCase {
    pub fn new(store: Arc<dyn TokenStore>, jwt_secret: Vec<u8>) -> Self {
        Self { store, jwt_secret }
    }

    /// Acuña un par (access, refresh) y persiste el hash del refresh.
    /// Los plaintexts son visibles para el cliente exactamente una vez.
    pub async fn create_new_tokens(&self, user_id: i64) -> Result<(String, String), Error> {
        let access = tokens::mint_access_token(user_id, &self.jwt_secret)?;
        let refresh = tokens::generate_refresh_token(user_id);

        self.store
            .insert(&refresh.hash, user_id, TokenScope::Refresh, refresh.expiry)
            .await?;

        Ok((access, refresh.plaintext))
    }

    /// Rotación con revocación: valida el token presentado, borra la familia
    /// y emite el par nuevo.
    #[tracing::instrument(name = "TokenUseCase::refresh_and_revoke", skip_all)]
    pub async fn refresh_and_revoke(
        &self,
        old_plaintext: &str,
    ) -> Result<(String, String), Error> {
        const OP: &str = "tokens.refresh_and_revoke";

        let hash = tokens::token_hash(old_plaintext);
        let record = self.store.get_by_hash(&hash).await?;

        if record.scope != TokenScope::Refresh {
            // Mal uso: un token de otro alcance llegó al endpoint de refresh.
            // Toda la familia de ese alcance muere antes de responder.
            warn!(user_id = record.user_id, scope = ?record.scope, "misused token presented for refresh");
            self.store
                .delete_all_for_user_and_scope(record.scope, record.user_id)
                .await
                .map_err(|e| {
                    Error::new(ErrorKind::Internal, OP, "failed to revoke misused token")
                        .with_source(e)
                })?;
            return Err(Error::new(ErrorKind::TokenNotFound, OP, "token not found"));
        }

        if record.expiry <= Utc::now() {
            self.store
                .delete_all_for_user_and_scope(TokenScope::Refresh, record.user_id)
                .await
                .map_err(|e| {
                    Error::new(ErrorKind::Internal, OP, "failed to revoke expired tokens")
                        .with_source(e)
                })?;
            return Err(Error::new(
                ErrorKind::TokenExpired,
                OP,
                "refresh token expired",
            ));
        }

        // Rotación: el token presentado (y cualquier hermano) queda inválido.
        self.store
            .delete_all_for_user_and_scope(TokenScope::Refresh, record.user_id)
            .await?;

        let pair = self.create_new_tokens(record.user_id).await?;
        info!(user_id = record.user_id, "refresh tokens rotated");
        Ok(pair)
    }

    /// Verifica firma, expiración y alcance del access token; devuelve el
    /// user_id autenticado.
    pub fn verify_access_token(&self, token: &str) -> Result<i64, Error> {
        tokens::verify_access_token(token, &self.jwt_secret).map(|claims| claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TokenRecord;
    use crate::domain::repository::MockTokenStore;
    use mockall::predicate::*;
    use std::time::Duration;

    const SECRET: &[u8] = b"unit-test-secret";

    fn record(plaintext: &str, user_id: i64, scope: TokenScope, expired: bool) -> TokenRecord {
        let expiry = if expired {
            Utc::now() - Duration::from_secs(60)
        } else {
            Utc::now() + Duration::from_secs(3600)
        };
        TokenRecord {
            hash: tokens::token_hash(plaintext),
            user_id,
            scope,
            expiry,
        }
    }

    #[tokio::test]
    async fn test_create_new_tokens_persists_refresh_hash() {
        // Arrange
        let mut store = MockTokenStore::new();
        store
            .expect_insert()
            .withf(|hash, user_id, scope, _expiry| {
                hash.len() == 32 && *user_id == 42 && *scope == TokenScope::Refresh
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let use_case = TokenUseCase::new(Arc::new(store), SECRET.to_vec());

        // Act
        let (access, refresh) = use_case.create_new_tokens(42).await.unwrap();

        // Assert
        assert_eq!(use_case.verify_access_token(&access).unwrap(), 42);
        assert_eq!(refresh.len(), 44);
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_mints_new_pair() {
        // Arrange
        let old = "old-refresh-token-plaintext";
        let rec = record(old, 7, TokenScope::Refresh, false);

        let expected_hash = tokens::token_hash(old);
        let mut store = MockTokenStore::new();
        store
            .expect_get_by_hash()
            .withf(move |hash| hash == expected_hash.as_slice())
            .times(1)
            .returning(move |_| Ok(rec.clone()));
        store
            .expect_delete_all_for_user_and_scope()
            .with(eq(TokenScope::Refresh), eq(7))
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_insert().times(1).returning(|_, _, _, _| Ok(()));

        let use_case = TokenUseCase::new(Arc::new(store), SECRET.to_vec());

        // Act
        let (access, refresh) = use_case.refresh_and_revoke(old).await.unwrap();

        // Assert
        assert_eq!(use_case.verify_access_token(&access).unwrap(), 7);
        assert_ne!(refresh, old);
    }

    #[tokio::test]
    async fn test_unknown_token_is_token_not_found() {
        let mut store = MockTokenStore::new();
        store.expect_get_by_hash().times(1).returning(|_| {
            Err(Error::new(
                ErrorKind::TokenNotFound,
                "token_store.get_by_hash",
                "token not found",
            ))
        });
        store.expect_delete_all_for_user_and_scope().times(0);

        let use_case = TokenUseCase::new(Arc::new(store), SECRET.to_vec());
        let err = use_case.refresh_and_revoke("missing").await.unwrap_err();

        assert!(err.is_kind(ErrorKind::TokenNotFound));
    }

    #[tokio::test]
    async fn test_misused_scope_revokes_family_and_reports_not_found() {
        // Un token de alcance authentication presentado al refresh: toda la
        // familia authentication del usuario debe morir.
        let old = "stolen-access-token";
        let rec = record(old, 9, TokenScope::Authentication, false);

        let mut store = MockTokenStore::new();
        store
            .expect_get_by_hash()
            .times(1)
            .returning(move |_| Ok(rec.clone()));
        store
            .expect_delete_all_for_user_and_scope()
            .with(eq(TokenScope::Authentication), eq(9))
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_insert().times(0);

        let use_case = TokenUseCase::new(Arc::new(store), SECRET.to_vec());
        let err = use_case.refresh_and_revoke(old).await.unwrap_err();

        assert!(err.is_kind(ErrorKind::TokenNotFound));
    }

    #[tokio::test]
    async fn test_failed_misuse_revoke_is_internal() {
        let old = "stolen-access-token";
        let rec = record(old, 9, TokenScope::Authentication, false);

        let mut store = MockTokenStore::new();
        store
            .expect_get_by_hash()
            .times(1)
            .returning(move |_| Ok(rec.clone()));
        store
            .expect_delete_all_for_user_and_scope()
            .times(1)
            .returning(|_, _| {
                Err(Error::new(
                    ErrorKind::Internal,
                    "token_store.delete_all_for_user_and_scope",
                    "db down",
                ))
            });

        let use_case = TokenUseCase::new(Arc::new(store), SECRET.to_vec());
        let err = use_case.refresh_and_revoke(old).await.unwrap_err();

        // El llamador debe responder 500: la revocación no pudo garantizarse.
        assert!(err.is_kind(ErrorKind::Internal));
    }

    #[tokio::test]
    async fn test_expired_refresh_revokes_and_reports_expired() {
        let old = "expired-refresh-token";
        let rec = record(old, 3, TokenScope::Refresh, true);

        let mut store = MockTokenStore::new();
        store
            .expect_get_by_hash()
            .times(1)
            .returning(move |_| Ok(rec.clone()));
        store
            .expect_delete_all_for_user_and_scope()
            .with(eq(TokenScope::Refresh), eq(3))
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_insert().times(0);

        let use_case = TokenUseCase::new(Arc::new(store), SECRET.to_vec());
        let err = use_case.refresh_and_revoke(old).await.unwrap_err();

        assert!(err.is_kind(ErrorKind::TokenExpired));
    }
}
