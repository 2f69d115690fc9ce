//! Food-court payment hub: escrow/stored-value (FCID), settlement,
//! payment-rail routing, and POS<->signage coordination, behind one
//! axum service.

use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use foodcourt_hub::api::{self, admin, back_transactions, counter, payment_hub, settlement, signage, stores, webhook, AppState};
use foodcourt_hub::auth::{api as auth_api, auth_middleware, AuthState, JwtHandler, UserStore};
use foodcourt_hub::config::Config;
use foodcourt_hub::db::Db;
use foodcourt_hub::gateway::{
    kbank::KbankClient, omise::OmiseClient, scb::ScbClient, stripe::StripeClient, GatewayClient,
};
use foodcourt_hub::middleware::{rate_limit_middleware, RateLimitConfig, RateLimitLayer};
use foodcourt_hub::scheduler::{spawn_balance_sweep, spawn_crypto_poll, spawn_refund_notify, spawn_settlement_batch, CryptoPoller};
use foodcourt_hub::signage::SignageCoordinator;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Blockchain confirmation polling is an external collaborator's concern
/// (see `scheduler::CryptoPoller`); nothing in this service talks to a
/// chain node, so the bound implementation is a no-op.
struct NoopCryptoPoller;

#[async_trait::async_trait]
impl CryptoPoller for NoopCryptoPoller {
    async fn poll_pending(&self) -> anyhow::Result<usize> {
        Ok(0)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("foodcourt_hub=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_gateways() -> HashMap<&'static str, Arc<dyn GatewayClient>> {
    let mut gateways: HashMap<&'static str, Arc<dyn GatewayClient>> = HashMap::new();
    gateways.insert("scb", Arc::new(ScbClient::new()));
    gateways.insert("kbank", Arc::new(KbankClient::new()));
    gateways.insert("omise", Arc::new(OmiseClient::new()));
    gateways.insert("promptpay", Arc::new(StripeClient::promptpay()));
    gateways.insert("apple_pay", Arc::new(StripeClient::apple_pay()));
    gateways
}

fn public_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/counter/balance/:code", get(counter::balance))
        .route(
            "/payment-callback/webhook",
            post(webhook::generic).get(webhook::generic_health),
        )
        .route(
            "/payment-callback/webhook/kbank",
            post(webhook::kbank).get(webhook::kbank_health),
        )
        .route(
            "/payment-callback/webhook/omise",
            post(webhook::omise).get(webhook::omise_health),
        )
        .route(
            "/payment-callback/webhook/stripe",
            post(webhook::stripe).get(webhook::stripe_health),
        )
        .route("/payment-callback/webhook/links", get(webhook::links))
        .route(
            "/payment-callback/stores/:store_id/recent-paid",
            get(back_transactions::recent_paid),
        )
        .route("/signage/set-display", post(signage::set_display))
        .route("/signage/display", get(signage::display))
        .route("/signage/ack-paid", post(signage::ack_paid))
        .with_state(state)
}

fn protected_router(state: AppState, jwt_handler: Arc<JwtHandler>) -> Router {
    Router::new()
        .route("/counter/exchange", post(counter::exchange))
        .route("/counter/refund", post(counter::refund))
        .route("/counter/topup", post(counter::topup))
        .route("/payment-hub/use", post(payment_hub::use_fcid))
        .route(
            "/payment-hub/stores/:store_id/create-gateway-qr",
            post(payment_hub::create_gateway_qr),
        )
        .route(
            "/stores/:store_id/generate-promptpay-qr",
            post(stores::generate_promptpay_qr),
        )
        .route(
            "/payment-callback/settlements/create-daily",
            post(settlement::create_daily),
        )
        .route(
            "/payment-callback/settlements",
            get(settlement::list_settlements),
        )
        .route(
            "/payment-callback/settlements/custody-risk",
            get(settlement::custody_risk),
        )
        .route(
            "/payment-callback/settlements/:id/mark-transferred",
            post(settlement::mark_transferred),
        )
        .route(
            "/payment-callback/settlements/:id/notify-store",
            post(settlement::notify_store),
        )
        .route(
            "/payment-callback/stores/:store_id/settlements-for-receipt",
            get(settlement::settlements_for_receipt),
        )
        .route(
            "/payment-callback/stores/:store_id/back-transactions",
            get(back_transactions::report),
        )
        .route(
            "/admin/groups",
            post(admin::create_group),
        )
        .route("/admin/sites", post(admin::create_site))
        .route(
            "/admin/merchants",
            post(admin::create_merchant).get(admin::list_merchants),
        )
        .route(
            "/admin/banking-profiles",
            post(admin::upsert_banking_profile).get(admin::resolve_banking_profile),
        )
        .route(
            "/admin/banking-profiles/:id/active",
            post(admin::set_banking_profile_active),
        )
        .route_layer(axum_mw::from_fn_with_state(jwt_handler, auth_middleware))
        .with_state(state)
}

/// `/auth/me` and the user-admin endpoints read `Claims` out of request
/// extensions, so they need the auth middleware layer even though they
/// live on `AuthState` rather than `AppState`.
fn auth_protected_router(auth_state: AuthState, jwt_handler: Arc<JwtHandler>) -> Router {
    Router::new()
        .route("/auth/me", get(auth_api::get_current_user))
        .route("/admin/users", post(auth_api::create_user).get(auth_api::list_users))
        .route("/admin/users/:id", axum::routing::delete(auth_api::delete_user))
        .route_layer(axum_mw::from_fn_with_state(jwt_handler, auth_middleware))
        .with_state(auth_state)
}

fn auth_router(auth_state: AuthState) -> Router {
    Router::new()
        .route("/auth/login", post(auth_api::login))
        .with_state(auth_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(Config::from_env());

    let db = Arc::new(Db::open(&config.db_path)?);
    let signage = Arc::new(SignageCoordinator::new());
    let gateways = Arc::new(build_gateways());

    let auth_db_path = format!("{}.auth", config.db_path);
    let user_store = Arc::new(UserStore::new(&auth_db_path)?);
    let jwt_handler = Arc::new(JwtHandler::new(config.jwt_secret.clone()));
    let auth_state = AuthState::new(user_store, jwt_handler.clone());

    let app_state = AppState {
        db: db.clone(),
        signage: signage.clone(),
        config: config.clone(),
        gateways,
    };

    spawn_crypto_poll(Arc::new(NoopCryptoPoller), 5);
    spawn_settlement_batch(db.clone(), config.settlement_batch_hour);
    spawn_balance_sweep(db.clone(), config.balance_sweep_hour);
    spawn_refund_notify(db, signage, config.refund_notify_interval_minutes);

    let rate_limit_config = RateLimitConfig {
        max_requests: config.rate_limit_max_requests,
        window: std::time::Duration::from_secs(config.rate_limit_window_secs),
        burst: config.rate_limit_burst,
        skip_prefixes: vec![
            "/payment-callback/webhook".to_string(),
            "/payment-callback/stores/".to_string(),
            "/signage/".to_string(),
            "/admin".to_string(),
            "/health".to_string(),
        ],
    };
    let rate_limiter = RateLimitLayer::new(rate_limit_config);

    let app = Router::new()
        .merge(public_router(app_state.clone()))
        .merge(protected_router(app_state, jwt_handler.clone()))
        .merge(auth_protected_router(auth_state.clone(), jwt_handler))
        .merge(auth_router(auth_state))
        .layer(axum_mw::from_fn_with_state(rate_limiter, rate_limit_middleware))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(foodcourt_hub::middleware::request_logging));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(%addr, "foodcourt-hub listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
