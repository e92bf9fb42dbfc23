use std::sync::Arc;

use dotenvy::dotenv;
use marketplace_service::api::http_routes::{routes, AppState};
use marketplace_service::config::Config;
use marketplace_service::domain::gateways::{Cache, CloudUploader, Mailer, PaymentGateway};
use marketplace_service::infrastructure::cache::valkey_cache::ValkeyCache;
use marketplace_service::infrastructure::gateways::cloudinary_uploader::CloudinaryUploader;
use marketplace_service::infrastructure::gateways::razorpay_gateway::RazorpayGateway;
use marketplace_service::infrastructure::gateways::smtp_mailer::SmtpMailer;
use marketplace_service::infrastructure::persistence::db::new_db_pool;
use marketplace_service::infrastructure::persistence::token_store::PgTokenStore;
use marketplace_service::jobs::email_worker::WorkerPool;
use marketplace_service::use_cases::{
    browse_products::BrowseProductsUseCase, create_order::CreateOrderUseCase,
    create_topup_order::CreateTopupOrderUseCase, credit_wallet::CreditWalletUseCase,
    debit_wallet::DebitWalletUseCase, get_orders::GetOrdersUseCase, get_wallet::GetWalletUseCase,
    login::LoginUseCase, manage_cart::ManageCartUseCase, publish_product::PublishProductUseCase,
    signup::SignupUseCase, tokens::TokenUseCase, transfer_funds::TransferFundsUseCase,
    verify_email::VerifyEmailUseCase, verify_payment::VerifyPaymentUseCase,
};
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        marketplace_service::api::http_routes::register,
        marketplace_service::api::http_routes::login,
        marketplace_service::api::http_routes::refresh_tokens,
        marketplace_service::api::http_routes::wallet_balance,
        marketplace_service::api::http_routes::wallet_transfer,
        marketplace_service::api::http_routes::create_topup_order
    ),
    components(schemas(
        marketplace_service::api::http_routes::RegisterRequest,
        marketplace_service::api::http_routes::LoginRequest,
        marketplace_service::api::http_routes::RefreshTokenRequest,
        marketplace_service::api::http_routes::WalletTransferRequest,
        marketplace_service::api::http_routes::WalletAmountRequest
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar variables de entorno
    dotenv().ok();

    // 2. Configurar Logging/Tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting Marketplace Service...");

    let cfg = Config::from_env()?;

    // 3. Conexiones: PostgreSQL y cache
    let pool = new_db_pool(&cfg.db_dsn).await?;
    info!("Connected to Database");

    let cache: Arc<dyn Cache> = Arc::new(ValkeyCache::connect(&cfg.cache_dsn).await?);
    info!("Connected to Cache");

    // 4. Colaboradores externos: mailer, object store y pasarela de pagos
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(
        &cfg.mailer.host,
        cfg.mailer.port,
        &cfg.mailer.username,
        &cfg.mailer.password,
        &cfg.mailer.sender,
    )?);
    let uploader: Arc<dyn CloudUploader> =
        Arc::new(CloudinaryUploader::from_url(&cfg.cloudinary_url)?);
    let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(
        cfg.razorpay_id.clone(),
        cfg.razorpay_secret.clone(),
        cfg.razorpay_webhook_secret.clone(),
    )?);

    // 5. Pool de workers de correo (monitor + un worker semilla)
    let worker_pool = WorkerPool::new(cache.clone(), mailer.clone());
    let _monitor = worker_pool.start_queue_monitor();
    worker_pool.start_email_workers(1);

    // 6. Casos de uso y estado de la app
    let token_store = Arc::new(PgTokenStore::new(pool.clone()));
    let tokens = Arc::new(TokenUseCase::new(
        token_store,
        cfg.jwt_secret.clone().into_bytes(),
    ));

    let app_state = Arc::new(AppState {
        signup: SignupUseCase::new(pool.clone(), cache.clone()),
        login: LoginUseCase::new(pool.clone(), tokens.clone()),
        verify_email: VerifyEmailUseCase::new(pool.clone(), cache.clone()),
        tokens: tokens.clone(),
        get_wallet: GetWalletUseCase::new(pool.clone()),
        credit_wallet: CreditWalletUseCase::new(pool.clone()),
        debit_wallet: DebitWalletUseCase::new(pool.clone()),
        transfer_funds: TransferFundsUseCase::new(pool.clone()),
        create_topup_order: CreateTopupOrderUseCase::new(pool.clone(), gateway.clone()),
        verify_payment: VerifyPaymentUseCase::new(pool.clone(), gateway.clone()),
        create_order: CreateOrderUseCase::new(pool.clone(), cache.clone()),
        get_orders: GetOrdersUseCase::new(pool.clone()),
        cart: ManageCartUseCase::new(pool.clone(), cache.clone()),
        publish_product: PublishProductUseCase::new(pool.clone(), uploader.clone()),
        browse_products: BrowseProductsUseCase::new(pool.clone()),
        gateway_key_id: cfg.razorpay_id.clone(),
    });

    // 7. Rutas y servidor
    let app = routes(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    // 8. Servir; ctrl-c apaga el pool de workers cooperativamente
    let shutdown_pool = worker_pool.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            shutdown_pool.stop();
        })
        .await?;

    Ok(())
}
