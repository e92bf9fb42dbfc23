use std::fmt;

use thiserror::Error;

/// Conjunto cerrado de categorías de error del dominio.
///
/// Cada capa superior decide su comportamiento únicamente a partir del
/// `ErrorKind`, nunca comparando mensajes de texto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Invalid,
    Unauthorized,
    Forbidden,
    Conflict,
    InsufficientFunds,
    InsufficientStock,
    CartEmpty,
    PaymentFailed,
    GatewayError,
    TokenNotFound,
    TokenExpired,
    Collision,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::CartEmpty => "cart_empty",
            ErrorKind::PaymentFailed => "payment_failed",
            ErrorKind::GatewayError => "gateway_error",
            ErrorKind::TokenNotFound => "token_not_found",
            ErrorKind::TokenExpired => "token_expired",
            ErrorKind::Collision => "collision",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Error etiquetado del dominio: `{kind, op, message, source}`.
///
/// `op` identifica la operación que falló (ej. `wallet.transfer`) para que
/// la traza sea legible sin necesidad de un stack trace completo.
#[derive(Debug, Error)]
#[error("{op}: {kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub op: &'static str,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind, op: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            op,
            message: message.into(),
            source: None,
        }
    }

    /// Adjunta la causa original sin perder la categoría del dominio.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn not_found(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, op, message)
    }

    pub fn invalid(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, op, message)
    }

    pub fn unauthorized(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, op, message)
    }

    pub fn forbidden(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, op, message)
    }

    pub fn conflict(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, op, message)
    }

    pub fn insufficient_funds(op: &'static str) -> Self {
        Self::new(ErrorKind::InsufficientFunds, op, "insufficient funds")
    }

    pub fn internal(
        op: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(ErrorKind::Internal, op, "internal error").with_source(source)
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_op_and_kind() {
        let err = Error::invalid("wallet.transfer", "amount must be greater than zero");
        assert_eq!(
            err.to_string(),
            "wallet.transfer: invalid: amount must be greater than zero"
        );
    }

    #[test]
    fn test_with_source_preserves_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::internal("cache.get_cart", io);
        assert!(err.is_kind(ErrorKind::Internal));
        assert!(err.source.is_some());
    }
}
