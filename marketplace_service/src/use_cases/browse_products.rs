use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;

use crate::domain::entities::{Product, ProductImage};
use crate::domain::error::Error;
use crate::infrastructure::persistence::product_store;

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: Product,
    pub images: Vec<ProductImage>,
}

/// Lectura del catálogo: listado completo y detalle con imágenes.
#[derive(Clone)]
pub struct BrowseProductsUseCase {
    pool: PgPool,
}

impl BrowseProductsUseCase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<Product>, Error> {
        const OP: &str = "products.list_all";

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::internal(OP, e))?;
        product_store::get_all_products(&mut conn).await
    }

    #[tracing::instrument(name = "BrowseProductsUseCase::details", skip(self))]
    pub async fn details(&self, product_id: i64) -> Result<ProductDetails, Error> {
        const OP: &str = "products.details";

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::internal(OP, e))?;

        let product = product_store::get_product_by_id(&mut conn, product_id).await?;

        // Un fallo al leer imágenes degrada a detalle sin galería.
        let images = match product_store::get_product_images(&mut conn, product_id).await {
            Ok(images) => images,
            Err(e) => {
                warn!(product_id, error = %e, "failed to load product images");
                Vec::new()
            }
        };

        Ok(ProductDetails { product, images })
    }
}
