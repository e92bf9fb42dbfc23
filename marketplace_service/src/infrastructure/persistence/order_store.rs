use sqlx::PgConnection;

use crate::domain::entities::{Order, OrderItem, OrderStatus};
use crate::domain::error::Error;
use crate::infrastructure::persistence::db::map_db_err;
use crate::infrastructure::persistence::models::NewOrderItem;

pub async fn create_order(
    conn: &mut PgConnection,
    user_id: i64,
    total_amount: i64,
    status: OrderStatus,
) -> Result<Order, Error> {
    const OP: &str = "order_store.create_order";

    sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (user_id, total_amount, status)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, total_amount, status, created_at
        "#,
    )
    .bind(user_id)
    .bind(total_amount)
    .bind(status)
    .fetch_one(conn)
    .await
    .map_err(|e| map_db_err(OP, e))
}

pub async fn create_order_item(conn: &mut PgConnection, new: NewOrderItem) -> Result<(), Error> {
    const OP: &str = "order_store.create_order_item";

    sqlx::query(
        r#"
        INSERT INTO order_items (order_id, product_id, seller_id, quantity, price_at_purchase)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(new.order_id)
    .bind(new.product_id)
    .bind(new.seller_id)
    .bind(new.quantity)
    .bind(new.price_at_purchase)
    .execute(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?;

    Ok(())
}

pub async fn get_order_by_id(conn: &mut PgConnection, id: i64) -> Result<Order, Error> {
    const OP: &str = "order_store.get_order_by_id";

    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, total_amount, status, created_at
        FROM orders
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?
    .ok_or_else(|| Error::not_found(OP, "order not found"))
}

pub async fn get_orders_by_user(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Vec<Order>, Error> {
    const OP: &str = "order_store.get_orders_by_user";

    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, total_amount, status, created_at
        FROM orders
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
    .map_err(|e| map_db_err(OP, e))
}

pub async fn get_order_items(
    conn: &mut PgConnection,
    order_id: i64,
) -> Result<Vec<OrderItem>, Error> {
    const OP: &str = "order_store.get_order_items";

    sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, seller_id, quantity, price_at_purchase
        FROM order_items
        WHERE order_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
    .map_err(|e| map_db_err(OP, e))
}
