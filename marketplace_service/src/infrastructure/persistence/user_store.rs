use sqlx::PgConnection;

use crate::domain::entities::User;
use crate::domain::error::Error;
use crate::infrastructure::persistence::db::map_db_err;
use crate::infrastructure::persistence::models::UserAuthRow;

const USER_COLUMNS: &str = "id, name, email, email_verified, created_at, updated_at";

/// Inserta un usuario nuevo. Email duplicado -> `Conflict`.
pub async fn create_user(
    conn: &mut PgConnection,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, Error> {
    const OP: &str = "user_store.create_user";

    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (name, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING {USER_COLUMNS}
        "#,
    ))
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(conn)
    .await
    .map_err(|e| map_db_err(OP, e))
}

/// Fila de autenticación por email; la única consulta que lee el hash.
pub async fn get_user_auth_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<UserAuthRow, Error> {
    const OP: &str = "user_store.get_user_auth_by_email";

    sqlx::query_as::<_, UserAuthRow>(
        r#"
        SELECT id, name, email, password_hash, email_verified
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?
    .ok_or_else(|| Error::not_found(OP, "user not found"))
}

/// Marca el correo como verificado tras consumir un token de activación.
pub async fn verify_user_email(conn: &mut PgConnection, id: i64) -> Result<(), Error> {
    const OP: &str = "user_store.verify_user_email";

    let result = sqlx::query(
        r#"
        UPDATE users
        SET email_verified = TRUE,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found(OP, "user not found"));
    }
    Ok(())
}
