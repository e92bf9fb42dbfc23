use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ExistenceCheck, SetExpiry, SetOptions};

use crate::domain::error::{Error, ErrorKind};
use crate::domain::gateways::Cache;

pub const EMAIL_QUEUE_KEY: &str = "queue:emails";

/// Cliente de cache sobre Valkey/Redis.
///
/// El `ConnectionManager` es clonable y thread-safe: se comparte entre
/// requests. Los BRPOP usan una conexión dedicada para no dejar la conexión
/// multiplexada bloqueada por un comando bloqueante.
pub struct ValkeyCache {
    client: redis::Client,
    conn: ConnectionManager,
}

impl ValkeyCache {
    pub async fn connect(dsn: &str) -> Result<Self, Error> {
        const OP: &str = "cache.connect";

        let client = redis::Client::open(dsn).map_err(|e| Error::internal(OP, e))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::internal(OP, e))?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| Error::internal(OP, e))?;

        Ok(Self { client, conn })
    }

    fn cart_key(user_id: i64) -> String {
        format!("cart:{user_id}")
    }

    fn verification_hash_key(token_hash_hex: &str) -> String {
        format!("verification:hash:{token_hash_hex}")
    }

    fn user_verification_key(user_id: i64) -> String {
        format!("user:{user_id}:verification")
    }
}

#[async_trait]
impl Cache for ValkeyCache {
    async fn add_to_cart(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<(), Error> {
        const OP: &str = "cache.add_to_cart";

        if quantity < 0 {
            return Err(Error::invalid(OP, "quantity cannot be negative"));
        }

        let mut conn = self.conn.clone();
        let _: i64 = conn
            .hincr(Self::cart_key(user_id), product_id.to_string(), quantity)
            .await
            .map_err(|e| Error::internal(OP, e))?;
        Ok(())
    }

    async fn set_cart_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<(), Error> {
        const OP: &str = "cache.set_cart_quantity";

        if quantity <= 0 {
            return self.remove_cart_item(user_id, product_id).await;
        }

        let mut conn = self.conn.clone();
        let _: () = conn
            .hset(
                Self::cart_key(user_id),
                product_id.to_string(),
                quantity.to_string(),
            )
            .await
            .map_err(|e| Error::internal(OP, e))?;
        Ok(())
    }

    async fn remove_cart_item(&self, user_id: i64, product_id: i64) -> Result<(), Error> {
        const OP: &str = "cache.remove_cart_item";

        let mut conn = self.conn.clone();
        let _: i64 = conn
            .hdel(Self::cart_key(user_id), product_id.to_string())
            .await
            .map_err(|e| Error::internal(OP, e))?;
        Ok(())
    }

    async fn clear_cart(&self, user_id: i64) -> Result<(), Error> {
        const OP: &str = "cache.clear_cart";

        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(Self::cart_key(user_id))
            .await
            .map_err(|e| Error::internal(OP, e))?;
        Ok(())
    }

    async fn get_cart(&self, user_id: i64) -> Result<HashMap<String, String>, Error> {
        const OP: &str = "cache.get_cart";

        let mut conn = self.conn.clone();
        conn.hgetall(Self::cart_key(user_id))
            .await
            .map_err(|e| Error::internal(OP, e))
    }

    async fn cart_count(&self, user_id: i64) -> Result<i64, Error> {
        const OP: &str = "cache.cart_count";

        let mut conn = self.conn.clone();
        conn.hlen(Self::cart_key(user_id))
            .await
            .map_err(|e| Error::internal(OP, e))
    }

    async fn set_verification_token(
        &self,
        token_hash_hex: &str,
        user_id: i64,
        ttl: Duration,
    ) -> Result<(), Error> {
        const OP: &str = "cache.set_verification_token";

        let token_key = Self::verification_hash_key(token_hash_hex);
        let user_key = Self::user_verification_key(user_id);
        let mut conn = self.conn.clone();

        // El guard NX vive solo en la llave del hash; la inversa se escribe
        // incondicional con el mismo TTL.
        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::NX)
            .with_expiration(SetExpiry::EX(ttl.as_secs()));
        let nx_result: Option<String> = conn
            .set_options(&token_key, user_id.to_string(), options)
            .await
            .map_err(|e| Error::internal(OP, e))?;

        let _: () = conn
            .set_ex(&user_key, token_hash_hex, ttl.as_secs())
            .await
            .map_err(|e| Error::internal(OP, e))?;

        if nx_result.is_none() {
            // Colisión del hash: limpieza best-effort de la inversa.
            let _: Result<i64, redis::RedisError> = conn.del(&user_key).await;
            return Err(Error::new(
                ErrorKind::Collision,
                OP,
                "verification token hash collision",
            ));
        }
        Ok(())
    }

    async fn get_user_id_by_token_hash(
        &self,
        token_hash_hex: &str,
    ) -> Result<Option<i64>, Error> {
        const OP: &str = "cache.get_user_id_by_token_hash";

        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(Self::verification_hash_key(token_hash_hex))
            .await
            .map_err(|e| Error::internal(OP, e))?;

        match value {
            None => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|e| Error::internal(OP, e)),
        }
    }

    async fn get_token_hash_by_user_id(&self, user_id: i64) -> Result<Option<String>, Error> {
        const OP: &str = "cache.get_token_hash_by_user_id";

        let mut conn = self.conn.clone();
        conn.get(Self::user_verification_key(user_id))
            .await
            .map_err(|e| Error::internal(OP, e))
    }

    async fn delete_verification_token(
        &self,
        token_hash_hex: &str,
        user_id: i64,
    ) -> Result<(), Error> {
        const OP: &str = "cache.delete_verification_token";

        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(Self::verification_hash_key(token_hash_hex))
            .await
            .map_err(|e| Error::internal(OP, e))?;
        let _: i64 = conn
            .del(Self::user_verification_key(user_id))
            .await
            .map_err(|e| Error::internal(OP, e))?;
        Ok(())
    }

    async fn enqueue_email(&self, payload: String) -> Result<(), Error> {
        const OP: &str = "cache.enqueue_email";

        let mut conn = self.conn.clone();
        let _: i64 = conn
            .lpush(EMAIL_QUEUE_KEY, payload)
            .await
            .map_err(|e| Error::internal(OP, e))?;
        Ok(())
    }

    async fn blocking_pop_email(&self, timeout: Duration) -> Result<Option<String>, Error> {
        const OP: &str = "cache.blocking_pop_email";

        // BRPOP dejaría pineada la conexión compartida; usamos una dedicada.
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::internal(OP, e))?;

        let popped: Option<(String, String)> = conn
            .brpop(EMAIL_QUEUE_KEY, timeout.as_secs_f64())
            .await
            .map_err(|e| Error::internal(OP, e))?;

        Ok(popped.map(|(_key, payload)| payload))
    }

    async fn email_queue_len(&self) -> Result<i64, Error> {
        const OP: &str = "cache.email_queue_len";

        let mut conn = self.conn.clone();
        conn.llen(EMAIL_QUEUE_KEY)
            .await
            .map_err(|e| Error::internal(OP, e))
    }
}
