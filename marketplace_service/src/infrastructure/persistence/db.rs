use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::error::{Error, ErrorKind};

/// Crea el pool de conexiones y verifica conectividad con un ping.
pub async fn new_db_pool(dsn: &str) -> Result<PgPool, Error> {
    const OP: &str = "db.connect";

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(dsn)
        .await
        .map_err(|e| Error::internal(OP, e))?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| Error::internal(OP, e))?;

    Ok(pool)
}

/// Traducción central de errores de sqlx al error etiquetado del dominio.
///
/// 23505 (unique) -> Conflict; 23514 (check) -> InsufficientFunds o
/// InsufficientStock según la constraint violada; todo lo demás es Internal.
pub(crate) fn map_db_err(op: &'static str, err: sqlx::Error) -> Error {
    if matches!(err, sqlx::Error::RowNotFound) {
        return Error::not_found(op, "record not found");
    }

    let db_info = if let sqlx::Error::Database(db) = &err {
        Some((
            db.code().map(|c| c.to_string()),
            db.message().to_string(),
            db.constraint().map(str::to_string),
        ))
    } else {
        None
    };

    if let Some((code, message, constraint)) = db_info {
        match code.as_deref() {
            Some("23505") => return Error::conflict(op, message).with_source(err),
            Some("23514") => {
                let constraint = constraint.unwrap_or_default();
                if constraint.contains("stock") {
                    return Error::new(ErrorKind::InsufficientStock, op, "insufficient stock")
                        .with_source(err);
                }
                if constraint.contains("balance") {
                    return Error::insufficient_funds(op).with_source(err);
                }
            }
            _ => {}
        }
    }

    Error::internal(op, err)
}
