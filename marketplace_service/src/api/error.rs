use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::domain::error::{Error, ErrorKind};

/// Adaptador del error de dominio a HTTP: el status sale únicamente del
/// `ErrorKind`; los cuerpos de error siempre son `{"error": "..."}`.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;

        let status = match err.kind {
            ErrorKind::Invalid
            | ErrorKind::CartEmpty
            | ErrorKind::InsufficientStock
            | ErrorKind::PaymentFailed => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            ErrorKind::Forbidden | ErrorKind::TokenNotFound | ErrorKind::TokenExpired => {
                StatusCode::FORBIDDEN
            }
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::GatewayError => StatusCode::BAD_GATEWAY,
            ErrorKind::Collision | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Los detalles internos no viajan al cliente.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(op = err.op, error = %err, "request failed");
            "internal server error".to_string()
        } else {
            warn!(op = err.op, kind = %err.kind, "request rejected");
            err.message
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_for(kind: ErrorKind) -> StatusCode {
        ApiError(Error::new(kind, "test.op", "boom"))
            .into_response()
            .status()
    }

    #[test]
    fn test_kind_to_status_mapping() {
        assert_eq!(status_for(ErrorKind::Invalid), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::CartEmpty), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::InsufficientStock), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::PaymentFailed), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::InsufficientFunds), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(status_for(ErrorKind::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::TokenNotFound), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::TokenExpired), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::GatewayError), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Collision), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(ErrorKind::Internal), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
