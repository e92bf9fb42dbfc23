use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::api::error::ApiError;
use crate::api::http_routes::AppState;
use crate::domain::error::Error;

/// Extractor del usuario autenticado: `Authorization: Bearer <access_token>`
/// con alcance `authentication`. Reemplaza al middleware de sesión externo
/// con el único contrato que el core necesita.
pub struct AuthUser(pub i64);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        const OP: &str = "api.auth";

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError(Error::unauthorized(OP, "authorization header required")))?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError(Error::unauthorized(OP, "invalid authorization header format"))
        })?;

        let user_id = state.tokens.verify_access_token(token)?;
        Ok(AuthUser(user_id))
    }
}
