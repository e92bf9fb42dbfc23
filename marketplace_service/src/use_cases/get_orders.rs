use serde::Serialize;
use sqlx::PgPool;

use crate::domain::entities::{Order, OrderItem};
use crate::domain::error::Error;
use crate::infrastructure::persistence::order_store;

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Historial de órdenes del comprador.
#[derive(Clone)]
pub struct GetOrdersUseCase {
    pool: PgPool,
}

impl GetOrdersUseCase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Order>, Error> {
        const OP: &str = "orders.list";

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::internal(OP, e))?;
        order_store::get_orders_by_user(&mut conn, user_id).await
    }

    /// Detalle con items; solo el dueño de la orden puede verla.
    #[tracing::instrument(name = "GetOrdersUseCase::details", skip(self))]
    pub async fn details(&self, user_id: i64, order_id: i64) -> Result<OrderDetails, Error> {
        const OP: &str = "orders.details";

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::internal(OP, e))?;

        let order = order_store::get_order_by_id(&mut conn, order_id).await?;
        if order.user_id != user_id {
            return Err(Error::forbidden(OP, "order belongs to another user"));
        }

        let items = order_store::get_order_items(&mut conn, order_id).await?;
        Ok(OrderDetails { order, items })
    }
}
