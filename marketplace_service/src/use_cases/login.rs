use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use crate::domain::error::{Error, ErrorKind};
use crate::domain::passwords;
use crate::infrastructure::persistence::user_store;
use crate::use_cases::tokens::TokenUseCase;

#[derive(Debug, Clone)]
pub struct LoginOutput {
    pub name: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Login con password: email desconocido y password incorrecto devuelven la
/// misma respuesta `Unauthorized`, sin filtrar cuál de los dos falló.
#[derive(Clone)]
pub struct LoginUseCase {
    pool: PgPool,
    tokens: Arc<TokenUseCase>,
}

impl LoginUseCase {
    pub fn new(pool: PgPool, tokens: Arc<TokenUseCase>) -> Self {
        Self { pool, tokens }
    }

    #[tracing::instrument(name = "LoginUseCase::execute", skip_all, fields(email = %email))]
    pub async fn execute(&self, email: &str, password: &str) -> Result<LoginOutput, Error> {
        const OP: &str = "users.login";

        let auth = {
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| Error::internal(OP, e))?;
            match user_store::get_user_auth_by_email(&mut conn, email).await {
                Ok(row) => row,
                Err(e) if e.is_kind(ErrorKind::NotFound) => {
                    warn!("login failed: unknown email");
                    return Err(Error::unauthorized(OP, "invalid email or password"));
                }
                Err(e) => return Err(e),
            }
        };

        if !passwords::verify_password(password, &auth.password_hash)? {
            warn!(user_id = auth.id, "login failed: password mismatch");
            return Err(Error::unauthorized(OP, "invalid email or password"));
        }

        let (access_token, refresh_token) = self.tokens.create_new_tokens(auth.id).await?;

        info!(user_id = auth.id, "user logged in");
        Ok(LoginOutput {
            name: auth.name,
            access_token,
            refresh_token,
        })
    }
}
