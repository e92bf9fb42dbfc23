use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::domain::entities::{Order, OrderStatus, Product};
use crate::domain::error::{Error, ErrorKind};
use crate::domain::gateways::Cache;
use crate::infrastructure::persistence::models::NewOrderItem;
use crate::infrastructure::persistence::{order_store, product_store, wallet_store};
use crate::use_cases::manage_cart::parse_cart_map;

/// Línea de la orden con el snapshot del producto al momento de ordenar.
#[derive(Debug, Clone)]
struct OrderLine {
    product_id: i64,
    seller_id: i64,
    name: String,
    /// Precio en unidades de moneda.
    price: i32,
    quantity: i64,
    stock: i32,
}

/// Liquidación atómica multi-vendedor a partir del carrito del comprador.
///
/// Orden de locks dentro de la transacción: comprador primero, luego
/// vendedores por user_id ascendente. El stock se rebaja condicionalmente
/// dentro de la misma transacción; cualquier fallo revierte todo.
#[derive(Clone)]
pub struct CreateOrderUseCase {
    pool: PgPool,
    cache: Arc<dyn Cache>,
}

impl CreateOrderUseCase {
    pub fn new(pool: PgPool, cache: Arc<dyn Cache>) -> Self {
        Self { pool, cache }
    }

    #[tracing::instrument(name = "CreateOrderUseCase::execute", skip(self))]
    pub async fn execute(&self, buyer_id: i64) -> Result<Order, Error> {
        const OP: &str = "orders.create_from_cart";

        // 1. Carrito + filas de producto en una sola consulta.
        let raw_cart = self.cache.get_cart(buyer_id).await?;
        let quantities = parse_cart_map(&raw_cart);
        if quantities.is_empty() {
            return Err(Error::new(ErrorKind::CartEmpty, OP, "cart is empty"));
        }

        let ids: Vec<i64> = quantities.keys().copied().collect();
        let products = {
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| Error::internal(OP, e))?;
            product_store::get_products_by_ids(&mut conn, &ids).await?
        };

        let lines = build_order_lines(&quantities, &products);
        if lines.is_empty() {
            return Err(Error::new(ErrorKind::CartEmpty, OP, "cart is empty"));
        }

        // 2. Precheck de stock (camino rápido; el chequeo autoritativo es el
        //    decremento condicional dentro de la transacción).
        validate_stock(&lines)?;

        // 3. Sumas por vendedor y total en paise.
        let (seller_totals, grand_total) = settlement_totals(&lines);
        info!(
            buyer_id,
            grand_total,
            seller_count = seller_totals.len(),
            "settlement totals calculated"
        );

        // 4. Liquidación bajo una sola transacción.
        let mut tx = self.pool.begin().await.map_err(|e| Error::internal(OP, e))?;

        let buyer_wallet = wallet_store::lock_wallet(&mut tx, buyer_id).await?;
        if buyer_wallet.balance < grand_total {
            warn!(buyer_id, balance = buyer_wallet.balance, grand_total, "buyer has insufficient funds");
            return Err(Error::insufficient_funds(OP));
        }

        // Vendedores en orden ascendente (BTreeMap itera ordenado).
        for seller_id in seller_totals.keys() {
            wallet_store::lock_wallet(&mut tx, *seller_id).await?;
        }

        for line in &lines {
            product_store::decrement_stock(&mut tx, line.product_id, line.quantity as i32)
                .await?;
        }

        wallet_store::settle_order(&mut tx, buyer_id, &seller_totals, grand_total).await?;

        let order =
            order_store::create_order(&mut tx, buyer_id, grand_total, OrderStatus::Completed)
                .await?;
        for line in &lines {
            order_store::create_order_item(
                &mut tx,
                NewOrderItem {
                    order_id: order.id,
                    product_id: line.product_id,
                    seller_id: line.seller_id,
                    quantity: line.quantity as i32,
                    price_at_purchase: line.price,
                },
            )
            .await?;
        }

        tx.commit().await.map_err(|e| Error::internal(OP, e))?;

        // 5. Limpieza best-effort del carrito: el fallo se loguea, la orden
        //    ya está confirmada.
        if let Err(e) = self.cache.clear_cart(buyer_id).await {
            error!(buyer_id, error = %e, "failed to clear cart after successful order");
        }

        info!(buyer_id, order_id = order.id, "order processing complete");
        Ok(order)
    }
}

/// Cruza el carrito con las filas de producto; productos inexistentes se
/// descartan (igual que en la lectura del carrito).
fn build_order_lines(quantities: &HashMap<i64, i64>, products: &[Product]) -> Vec<OrderLine> {
    products
        .iter()
        .filter_map(|p| {
            quantities.get(&p.id).map(|&quantity| OrderLine {
                product_id: p.id,
                seller_id: p.seller_id,
                name: p.name.clone(),
                price: p.price,
                quantity,
                stock: p.stock,
            })
        })
        .collect()
}

fn validate_stock(lines: &[OrderLine]) -> Result<(), Error> {
    const OP: &str = "orders.validate_stock";

    for line in lines {
        if i64::from(line.stock) < line.quantity {
            return Err(Error::new(
                ErrorKind::InsufficientStock,
                OP,
                format!("insufficient stock for {}", line.name),
            ));
        }
    }
    Ok(())
}

/// Sumas por vendedor y total del comprador, ambas en paise.
/// Invariante de conservación: la suma de los payouts es igual al total.
fn settlement_totals(lines: &[OrderLine]) -> (BTreeMap<i64, i64>, i64) {
    let mut seller_totals = BTreeMap::new();
    let mut grand_total: i64 = 0;

    for line in lines {
        let line_total_paise = i64::from(line.price) * line.quantity * 100;
        *seller_totals.entry(line.seller_id).or_insert(0) += line_total_paise;
        grand_total += line_total_paise;
    }

    (seller_totals, grand_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: i64, seller_id: i64, price: i32, stock: i32) -> Product {
        Product {
            id,
            seller_id,
            name: format!("product-{id}"),
            description: String::new(),
            category: "misc".to_string(),
            price,
            stock,
            thumbnail_url: String::new(),
            created_at: Utc::now(),
        }
    }

    fn quantities(pairs: &[(i64, i64)]) -> HashMap<i64, i64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_settlement_totals_two_sellers() {
        // Carrito: p1 (vendedor 10) 2 x 50, p2 (vendedor 20) 1 x 30.
        let products = vec![product(1, 10, 50, 5), product(2, 20, 30, 5)];
        let lines = build_order_lines(&quantities(&[(1, 2), (2, 1)]), &products);

        let (seller_totals, grand_total) = settlement_totals(&lines);

        assert_eq!(grand_total, 13_000);
        assert_eq!(seller_totals[&10], 10_000);
        assert_eq!(seller_totals[&20], 3_000);
        // Conservación: la suma de payouts es el total del comprador.
        assert_eq!(seller_totals.values().sum::<i64>(), grand_total);
    }

    #[test]
    fn test_settlement_totals_merges_lines_per_seller() {
        let products = vec![product(1, 10, 50, 5), product(2, 10, 25, 5)];
        let lines = build_order_lines(&quantities(&[(1, 1), (2, 2)]), &products);

        let (seller_totals, grand_total) = settlement_totals(&lines);

        assert_eq!(seller_totals.len(), 1);
        assert_eq!(seller_totals[&10], 10_000);
        assert_eq!(grand_total, 10_000);
    }

    #[test]
    fn test_validate_stock_flags_short_product() {
        let products = vec![product(1, 10, 50, 2)];
        let lines = build_order_lines(&quantities(&[(1, 5)]), &products);

        let err = validate_stock(&lines).unwrap_err();
        assert!(err.is_kind(ErrorKind::InsufficientStock));
        assert!(err.message.contains("product-1"));
    }

    #[test]
    fn test_build_order_lines_drops_missing_products() {
        let products = vec![product(1, 10, 50, 5)];
        let lines = build_order_lines(&quantities(&[(1, 1), (404, 3)]), &products);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, 1);
    }
}
