//! Worker de correos independiente: drena `queue:emails` sin servir HTTP.

use std::sync::Arc;

use dotenvy::dotenv;
use marketplace_service::config::Config;
use marketplace_service::domain::gateways::{Cache, Mailer};
use marketplace_service::infrastructure::cache::valkey_cache::ValkeyCache;
use marketplace_service::infrastructure::gateways::smtp_mailer::SmtpMailer;
use marketplace_service::jobs::email_worker::{WorkerPool, SCALE_DOWN_FLOOR};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Entorno y logging
    dotenv().ok();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting Email Worker...");

    let cfg = Config::from_env()?;

    // 2. Cache y mailer
    let cache: Arc<dyn Cache> = Arc::new(ValkeyCache::connect(&cfg.cache_dsn).await?);
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(
        &cfg.mailer.host,
        cfg.mailer.port,
        &cfg.mailer.username,
        &cfg.mailer.password,
        &cfg.mailer.sender,
    )?);

    // 3. Pool elástico: arranca en el piso y el monitor escala
    let pool = WorkerPool::new(cache, mailer);
    let monitor = pool.start_queue_monitor();
    pool.start_email_workers(SCALE_DOWN_FLOOR);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down worker pool");
    pool.stop();
    let _ = monitor.await;

    Ok(())
}
