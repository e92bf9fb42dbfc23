use sqlx::PgConnection;

use crate::domain::entities::{Product, ProductImage};
use crate::domain::error::{Error, ErrorKind};
use crate::infrastructure::persistence::db::map_db_err;
use crate::infrastructure::persistence::models::NewProduct;

const PRODUCT_COLUMNS: &str =
    "id, seller_id, name, description, category, price, stock, thumbnail_url, created_at";

pub async fn create_product(conn: &mut PgConnection, new: NewProduct) -> Result<Product, Error> {
    const OP: &str = "product_store.create_product";

    sqlx::query_as::<_, Product>(&format!(
        r#"
        INSERT INTO products (seller_id, name, description, category, price, stock, thumbnail_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {PRODUCT_COLUMNS}
        "#,
    ))
    .bind(new.seller_id)
    .bind(&new.name)
    .bind(&new.description)
    .bind(&new.category)
    .bind(new.price)
    .bind(new.stock)
    .bind(&new.thumbnail_url)
    .fetch_one(conn)
    .await
    .map_err(|e| map_db_err(OP, e))
}

pub async fn create_product_image(
    conn: &mut PgConnection,
    product_id: i64,
    image_url: &str,
    display_order: i32,
) -> Result<(), Error> {
    const OP: &str = "product_store.create_product_image";

    sqlx::query(
        r#"
        INSERT INTO product_images (product_id, image_url, display_order)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(product_id)
    .bind(image_url)
    .bind(display_order)
    .execute(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?;

    Ok(())
}

pub async fn get_product_by_id(conn: &mut PgConnection, id: i64) -> Result<Product, Error> {
    const OP: &str = "product_store.get_product_by_id";

    sqlx::query_as::<_, Product>(&format!(
        r#"
        SELECT {PRODUCT_COLUMNS}
        FROM products
        WHERE id = $1
        "#,
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?
    .ok_or_else(|| Error::not_found(OP, "product not found"))
}

/// Trae en una sola consulta las filas actuales de los productos del carrito.
pub async fn get_products_by_ids(
    conn: &mut PgConnection,
    ids: &[i64],
) -> Result<Vec<Product>, Error> {
    const OP: &str = "product_store.get_products_by_ids";

    sqlx::query_as::<_, Product>(&format!(
        r#"
        SELECT {PRODUCT_COLUMNS}
        FROM products
        WHERE id = ANY($1)
        "#,
    ))
    .bind(ids)
    .fetch_all(conn)
    .await
    .map_err(|e| map_db_err(OP, e))
}

pub async fn get_all_products(conn: &mut PgConnection) -> Result<Vec<Product>, Error> {
    const OP: &str = "product_store.get_all_products";

    sqlx::query_as::<_, Product>(&format!(
        r#"
        SELECT {PRODUCT_COLUMNS}
        FROM products
        ORDER BY created_at DESC
        "#,
    ))
    .fetch_all(conn)
    .await
    .map_err(|e| map_db_err(OP, e))
}

/// Imágenes ordenadas por `display_order`; el índice 0 es el thumbnail.
pub async fn get_product_images(
    conn: &mut PgConnection,
    product_id: i64,
) -> Result<Vec<ProductImage>, Error> {
    const OP: &str = "product_store.get_product_images";

    sqlx::query_as::<_, ProductImage>(
        r#"
        SELECT id, product_id, image_url, display_order
        FROM product_images
        WHERE product_id = $1
        ORDER BY display_order ASC
        "#,
    )
    .bind(product_id)
    .fetch_all(conn)
    .await
    .map_err(|e| map_db_err(OP, e))
}

/// Rebaja stock de forma condicional dentro de la transacción de la orden.
/// Cero filas afectadas significa stock insuficiente (o producto borrado):
/// la orden completa se revierte.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    product_id: i64,
    quantity: i32,
) -> Result<(), Error> {
    const OP: &str = "product_store.decrement_stock";

    if quantity <= 0 {
        return Err(Error::invalid(OP, "quantity must be greater than zero"));
    }

    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock - $2
        WHERE id = $1 AND stock >= $2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await
    .map_err(|e| map_db_err(OP, e))?;

    if result.rows_affected() == 0 {
        return Err(Error::new(
            ErrorKind::InsufficientStock,
            OP,
            format!("insufficient stock for product {product_id}"),
        ));
    }
    Ok(())
}
