use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::auth::AuthUser;
use crate::api::error::ApiError;
use crate::api::response::{LoginResponse, MessageResponse, TokenPairResponse, TopupOrderResponse};
use crate::domain::entities::{CartItem, Order, Product, User, Wallet};
use crate::domain::error::Error;
use crate::use_cases::browse_products::{BrowseProductsUseCase, ProductDetails};
use crate::use_cases::create_order::CreateOrderUseCase;
use crate::use_cases::create_topup_order::CreateTopupOrderUseCase;
use crate::use_cases::credit_wallet::CreditWalletUseCase;
use crate::use_cases::debit_wallet::DebitWalletUseCase;
use crate::use_cases::get_orders::{GetOrdersUseCase, OrderDetails};
use crate::use_cases::get_wallet::GetWalletUseCase;
use crate::use_cases::login::LoginUseCase;
use crate::use_cases::manage_cart::ManageCartUseCase;
use crate::use_cases::publish_product::{PublishProductInput, PublishProductUseCase};
use crate::use_cases::signup::{SignupInput, SignupUseCase};
use crate::use_cases::tokens::TokenUseCase;
use crate::use_cases::transfer_funds::TransferFundsUseCase;
use crate::use_cases::verify_email::VerifyEmailUseCase;
use crate::use_cases::verify_payment::VerifyPaymentUseCase;

// Estado compartido de la aplicación: un caso de uso por flujo.
pub struct AppState {
    pub signup: SignupUseCase,
    pub login: LoginUseCase,
    pub verify_email: VerifyEmailUseCase,
    pub tokens: Arc<TokenUseCase>,
    pub get_wallet: GetWalletUseCase,
    pub credit_wallet: CreditWalletUseCase,
    pub debit_wallet: DebitWalletUseCase,
    pub transfer_funds: TransferFundsUseCase,
    pub create_topup_order: CreateTopupOrderUseCase,
    pub verify_payment: VerifyPaymentUseCase,
    pub create_order: CreateOrderUseCase,
    pub get_orders: GetOrdersUseCase,
    pub cart: ManageCartUseCase,
    pub publish_product: PublishProductUseCase,
    pub browse_products: BrowseProductsUseCase,
    /// Key pública de la pasarela; el checkout del frontend la necesita.
    pub gateway_key_id: String,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh_tokens))
        .route("/verify", post(verify_email))
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", get(get_product_details))
        .route("/wallet/balance", get(wallet_balance))
        .route("/wallet/transfer", post(wallet_transfer))
        .route("/wallet/credit", post(wallet_credit))
        .route("/wallet/debit", post(wallet_debit))
        .route("/wallet/create-topup-order", post(create_topup_order))
        .route("/wallet/webhook", post(razorpay_webhook))
        .route("/cart", get(get_cart))
        .route("/cart/add", post(add_to_cart))
        .route("/cart/update", put(update_cart_item))
        .route("/cart/item/{product_id}", delete(delete_cart_item))
        .route("/cart/clear", delete(clear_cart))
        .route("/orders", post(create_order_from_cart).get(list_orders))
        .route("/orders/{id}", get(get_order_details))
        .with_state(state)
}

// --- DTOs de entrada ---

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub id: i64,
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WalletTransferRequest {
    pub recipient_user_id: i64,
    pub amount: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WalletAmountRequest {
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CartLineRequest {
    pub product_id: i64,
    pub quantity: i64,
}

// --- Auth y usuarios ---

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User and wallet created"),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .signup
        .execute(SignupInput {
            name: input.name,
            email: input.email,
            password: input.password,
            phone: input.phone,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let output = state.login.execute(&input.email, &input.password).await?;
    Ok(Json(LoginResponse {
        name: output.name,
        access_token: output.access_token,
        refresh_token: output.refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Tokens rotated"),
        (status = 403, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh_tokens(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    if input.refresh_token.is_empty() {
        return Err(Error::invalid("api.refresh", "refresh token must be provided").into());
    }

    let (access_token, refresh_token) =
        state.tokens.refresh_and_revoke(&input.refresh_token).await?;
    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
    }))
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(input): Json<VerifyEmailRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    state.verify_email.execute(input.id, &input.token).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "user verified",
        }),
    ))
}

// --- Catálogo ---

pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.browse_products.list_all().await?))
}

pub async fn get_product_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ProductDetails>, ApiError> {
    Ok(Json(state.browse_products.details(id).await?))
}

// Multipart: name, description, category, price, stock, images[1..10].
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    AuthUser(seller_id): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    const OP: &str = "api.create_product";

    let mut name = String::new();
    let mut description = String::new();
    let mut category = String::new();
    let mut price: i32 = 0;
    let mut stock: i32 = 0;
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid(OP, format!("invalid multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "name" => {
                name = field
                    .text()
                    .await
                    .map_err(|e| Error::invalid(OP, e.to_string()))?;
            }
            "description" => {
                description = field
                    .text()
                    .await
                    .map_err(|e| Error::invalid(OP, e.to_string()))?;
            }
            "category" => {
                category = field
                    .text()
                    .await
                    .map_err(|e| Error::invalid(OP, e.to_string()))?;
            }
            "price" => {
                price = field
                    .text()
                    .await
                    .map_err(|e| Error::invalid(OP, e.to_string()))?
                    .parse()
                    .map_err(|_| Error::invalid(OP, "price must be an integer"))?;
            }
            "stock" => {
                stock = field
                    .text()
                    .await
                    .map_err(|e| Error::invalid(OP, e.to_string()))?
                    .parse()
                    .map_err(|_| Error::invalid(OP, "stock must be an integer"))?;
            }
            "images" => {
                let filename = field.file_name().unwrap_or("image").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::invalid(OP, e.to_string()))?
                    .to_vec();
                images.push((filename, bytes));
            }
            _ => {}
        }
    }

    let product = state
        .publish_product
        .execute(
            seller_id,
            PublishProductInput {
                name,
                description,
                category,
                price,
                stock,
                images,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

// --- Billetera ---

#[utoipa::path(
    get,
    path = "/wallet/balance",
    responses(
        (status = 200, description = "Wallet with balance and lifetime counters"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn wallet_balance(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Wallet>, ApiError> {
    Ok(Json(state.get_wallet.execute(user_id).await?))
}

#[utoipa::path(
    post,
    path = "/wallet/transfer",
    request_body = WalletTransferRequest,
    responses(
        (status = 200, description = "Transfer committed"),
        (status = 400, description = "Invalid amount or same party"),
        (status = 402, description = "Insufficient funds")
    )
)]
pub async fn wallet_transfer(
    State(state): State<Arc<AppState>>,
    AuthUser(sender_id): AuthUser,
    Json(input): Json<WalletTransferRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .transfer_funds
        .execute(sender_id, input.recipient_user_id, input.amount)
        .await?;
    Ok(Json(MessageResponse {
        message: "transfer successful",
    }))
}

pub async fn wallet_credit(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<WalletAmountRequest>,
) -> Result<Json<Wallet>, ApiError> {
    Ok(Json(state.credit_wallet.execute(user_id, input.amount).await?))
}

pub async fn wallet_debit(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<WalletAmountRequest>,
) -> Result<Json<Wallet>, ApiError> {
    Ok(Json(state.debit_wallet.execute(user_id, input.amount).await?))
}

#[utoipa::path(
    post,
    path = "/wallet/create-topup-order",
    request_body = WalletAmountRequest,
    responses(
        (status = 200, description = "Gateway order created"),
        (status = 502, description = "Payment gateway error")
    )
)]
pub async fn create_topup_order(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<WalletAmountRequest>,
) -> Result<Json<TopupOrderResponse>, ApiError> {
    let order_id = state
        .create_topup_order
        .execute(user_id, input.amount)
        .await?;
    Ok(Json(TopupOrderResponse {
        order_id,
        key_id: state.gateway_key_id.clone(),
        amount: input.amount,
        currency: "INR",
    }))
}

// El webhook autentica por firma HMAC, no por bearer token.
pub async fn razorpay_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let signature = headers
        .get("X-Razorpay-Signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    state.verify_payment.handle_webhook(&body, signature).await?;
    Ok("ok")
}

// --- Carrito ---

pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<CartItem>>, ApiError> {
    Ok(Json(state.cart.get(user_id).await?))
}

pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<CartLineRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .cart
        .add(user_id, input.product_id, input.quantity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_cart_item(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<CartLineRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .cart
        .set_quantity(user_id, input.product_id, input.quantity)
        .await?;
    Ok(Json(MessageResponse {
        message: "cart item updated",
    }))
}

pub async fn delete_cart_item(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(product_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.cart.remove(user_id, product_id).await?;
    Ok(Json(MessageResponse {
        message: "item removed from cart",
    }))
}

pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    state.cart.clear(user_id).await?;
    Ok(Json(MessageResponse {
        message: "cart cleared",
    }))
}

// --- Órdenes ---

pub async fn create_order_from_cart(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.create_order.execute(user_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.get_orders.list(user_id).await?))
}

pub async fn get_order_details(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderDetails>, ApiError> {
    Ok(Json(state.get_orders.details(user_id, order_id).await?))
}
