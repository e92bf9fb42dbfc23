//! Operaciones del ledger sobre un handle transaccional explícito.
//!
//! Cada función recibe `&mut PgConnection`: el servicio abre la transacción,
//! toma los locks en orden canónico (user_id ascendente) y confirma o
//! revierte. Ninguna función de este módulo abre transacciones propias.

use std::collections::BTreeMap;

use sqlx::PgConnection;

use crate::domain::entities::{TransactionStatus, TransactionType, Wallet, WalletTransaction};
use crate::domain::error::{Error, ErrorKind};
use crate::infrastructure::persistence::db::map_db_err;
use crate::infrastructure::persistence::models::NewWalletTransaction;

/// Crea la billetera de un usuario con saldo cero. `Conflict` si ya existe.
pub async fn create_wallet(conn: &mut PgConnection, user_id: i64) -> Result<Wallet, Error> {
    const OP: &str = "wallet_store.create_wallet";

    sqlx::query_as::<_, Wallet>(
        r#"
        INSERT INTO wallets (user_id)
        VALUES ($1)
        RETURNING user_id, balance, lifetime_earned, lifetime_spent, updated_at
        "#,
    )
    .bind(user_id)
    .fetch_one(conn)
    .await
    .map_err(|e| map_db_err(OP, e))
}

pub async fn get_wallet(conn: &mut PgConnection, user_id: i64) -> Result<Wallet, Error> {
    const OP: &str = "wallet_store.get_wallet";

    sqlx::query_as::<_, Wallet>(
        r#"
        SELECT user_id, balance, lifetime_earned, lifetime_spent, updated_at
        FROM wallets
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?
    .ok_or_else(|| Error::not_found(OP, "wallet not found"))
}

/// `SELECT ... FOR UPDATE`: bloquea la fila hasta el commit/rollback de la
/// transacción del llamador. Todo chequeo de saldo y todo cambio de balance
/// deben ocurrir bajo este lock.
pub async fn lock_wallet(conn: &mut PgConnection, user_id: i64) -> Result<Wallet, Error> {
    const OP: &str = "wallet_store.lock_wallet";

    sqlx::query_as::<_, Wallet>(
        r#"
        SELECT user_id, balance, lifetime_earned, lifetime_spent, updated_at
        FROM wallets
        WHERE user_id = $1
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?
    .ok_or_else(|| Error::not_found(OP, "wallet not found"))
}

/// Suma `amount` a `balance` y `lifetime_earned`. Requiere `lock_wallet`
/// previo dentro de la misma transacción.
pub async fn credit_wallet(
    conn: &mut PgConnection,
    user_id: i64,
    amount: i64,
) -> Result<Wallet, Error> {
    const OP: &str = "wallet_store.credit_wallet";

    if amount <= 0 {
        return Err(Error::invalid(OP, "credit amount must be greater than zero"));
    }

    sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets
        SET balance = balance + $1,
            lifetime_earned = lifetime_earned + $1,
            updated_at = now()
        WHERE user_id = $2
        RETURNING user_id, balance, lifetime_earned, lifetime_spent, updated_at
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?
    .ok_or_else(|| Error::not_found(OP, "wallet not found"))
}

/// Resta `amount` de `balance` y lo suma a `lifetime_spent`. La constraint
/// CHECK de la tabla convierte un saldo negativo en `InsufficientFunds`.
pub async fn debit_wallet(
    conn: &mut PgConnection,
    user_id: i64,
    amount: i64,
) -> Result<Wallet, Error> {
    const OP: &str = "wallet_store.debit_wallet";

    if amount <= 0 {
        return Err(Error::invalid(OP, "debit amount must be greater than zero"));
    }

    sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets
        SET balance = balance - $1,
            lifetime_spent = lifetime_spent + $1,
            updated_at = now()
        WHERE user_id = $2
        RETURNING user_id, balance, lifetime_earned, lifetime_spent, updated_at
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?
    .ok_or_else(|| Error::not_found(OP, "wallet not found"))
}

/// Inserta la fila del ledger pareada con un cambio de saldo.
pub async fn insert_transaction(
    conn: &mut PgConnection,
    new: NewWalletTransaction,
) -> Result<WalletTransaction, Error> {
    const OP: &str = "wallet_store.insert_transaction";

    if new.amount == 0 {
        return Err(Error::invalid(OP, "transaction amount cannot be zero"));
    }

    sqlx::query_as::<_, WalletTransaction>(
        r#"
        INSERT INTO wallet_transactions (
            user_id, related_user_id, amount, transaction_type, status, gateway_order_id
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, related_user_id, amount, transaction_type, status,
                  gateway_order_id, gateway_payment_id, created_at
        "#,
    )
    .bind(new.user_id)
    .bind(new.related_user_id)
    .bind(new.amount)
    .bind(new.transaction_type)
    .bind(new.status)
    .bind(new.gateway_order_id)
    .fetch_one(conn)
    .await
    .map_err(|e| map_db_err(OP, e))
}

/// Liquidación multi-vendedor de una orden: un débito del comprador y un
/// `order_payout` por vendedor, cada movimiento con su fila pareada.
///
/// Asume que el llamador ya tiene la transacción abierta, las billeteras
/// bloqueadas en orden canónico y el saldo del comprador verificado.
pub async fn settle_order(
    conn: &mut PgConnection,
    buyer_id: i64,
    seller_totals: &BTreeMap<i64, i64>,
    grand_total: i64,
) -> Result<(), Error> {
    insert_transaction(
        &mut *conn,
        NewWalletTransaction {
            user_id: buyer_id,
            related_user_id: None,
            amount: -grand_total,
            transaction_type: TransactionType::Debit,
            status: TransactionStatus::Completed,
            gateway_order_id: None,
        },
    )
    .await?;
    debit_wallet(&mut *conn, buyer_id, grand_total).await?;

    for (seller_id, amount) in seller_totals {
        insert_transaction(
            &mut *conn,
            NewWalletTransaction {
                user_id: *seller_id,
                related_user_id: Some(buyer_id),
                amount: *amount,
                transaction_type: TransactionType::OrderPayout,
                status: TransactionStatus::Completed,
                gateway_order_id: None,
            },
        )
        .await?;
        credit_wallet(&mut *conn, *seller_id, *amount).await?;
    }

    Ok(())
}

/// Busca la fila del ledger por orden de pasarela, con `FOR UPDATE`:
/// webhooks duplicados concurrentes se serializan sobre esta fila.
pub async fn get_transaction_by_gateway_order(
    conn: &mut PgConnection,
    gateway_order_id: &str,
) -> Result<WalletTransaction, Error> {
    const OP: &str = "wallet_store.get_transaction_by_gateway_order";

    sqlx::query_as::<_, WalletTransaction>(
        r#"
        SELECT id, user_id, related_user_id, amount, transaction_type, status,
               gateway_order_id, gateway_payment_id, created_at
        FROM wallet_transactions
        WHERE gateway_order_id = $1
        FOR UPDATE
        "#,
    )
    .bind(gateway_order_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?
    .ok_or_else(|| Error::not_found(OP, "transaction not found for gateway order"))
}

pub async fn update_transaction_gateway_order_id(
    conn: &mut PgConnection,
    id: i64,
    gateway_order_id: &str,
) -> Result<(), Error> {
    const OP: &str = "wallet_store.update_transaction_gateway_order_id";

    let result = sqlx::query(
        r#"
        UPDATE wallet_transactions
        SET gateway_order_id = $2
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(gateway_order_id)
    .execute(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found(OP, "transaction not found"));
    }
    Ok(())
}

/// Transiciones legales: `pending -> {success, completed, failed}`.
///
/// Reaplicar el mismo estado terminal es un no-op idempotente; cualquier
/// otra transición desde un estado terminal es `Conflict`.
pub async fn update_transaction_status(
    conn: &mut PgConnection,
    id: i64,
    status: TransactionStatus,
    gateway_payment_id: Option<&str>,
) -> Result<WalletTransaction, Error> {
    const OP: &str = "wallet_store.update_transaction_status";

    if status == TransactionStatus::Pending {
        return Err(Error::conflict(OP, "cannot transition back to pending"));
    }

    let updated = sqlx::query_as::<_, WalletTransaction>(
        r#"
        UPDATE wallet_transactions
        SET status = $2,
            gateway_payment_id = COALESCE($3, gateway_payment_id)
        WHERE id = $1 AND status = 'pending'
        RETURNING id, user_id, related_user_id, amount, transaction_type, status,
                  gateway_order_id, gateway_payment_id, created_at
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(gateway_payment_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_db_err(OP, e))?;

    if let Some(row) = updated {
        return Ok(row);
    }

    // La fila no estaba en pending: o no existe, o ya es terminal.
    let current = sqlx::query_as::<_, WalletTransaction>(
        r#"
        SELECT id, user_id, related_user_id, amount, transaction_type, status,
               gateway_order_id, gateway_payment_id, created_at
        FROM wallet_transactions
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_db_err(OP, e))?
    .ok_or_else(|| Error::not_found(OP, "transaction not found"))?;

    if current.status == status {
        return Ok(current);
    }
    Err(Error::new(
        ErrorKind::Conflict,
        OP,
        "illegal status transition for terminal transaction",
    ))
}
