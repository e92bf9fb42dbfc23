use sqlx::PgPool;

use crate::domain::entities::Wallet;
use crate::domain::error::Error;
use crate::infrastructure::persistence::wallet_store;

/// Lectura read-committed del saldo y los contadores de un usuario.
#[derive(Clone)]
pub struct GetWalletUseCase {
    pool: PgPool,
}

impl GetWalletUseCase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(name = "GetWalletUseCase::execute", skip(self))]
    pub async fn execute(&self, user_id: i64) -> Result<Wallet, Error> {
        const OP: &str = "wallet.get";

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::internal(OP, e))?;
        wallet_store::get_wallet(&mut conn, user_id).await
    }
}
