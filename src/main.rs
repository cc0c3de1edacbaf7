use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use axum::Router;
use course_payments::config::AppConfig;
use course_payments::gateways::hosted::HostedCheckoutGateway;
use course_payments::gateways::mock::MockCheckoutGateway;
use course_payments::gateways::CheckoutGateway;
use course_payments::repo::postgres::PgStore;
use course_payments::signature::SignatureVerifier;
use course_payments::AppState;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = Arc::new(PgStore { pool });

    let gateway: Arc<dyn CheckoutGateway> = if cfg.gateway_adapter == "MOCK" {
        Arc::new(MockCheckoutGateway::succeeding())
    } else {
        Arc::new(HostedCheckoutGateway {
            base_url: cfg.gateway_base_url.clone(),
            api_key: cfg.gateway_api_key.clone(),
            api_secret: cfg.gateway_api_secret.clone(),
            timeout_ms: cfg.gateway_timeout_ms,
            client: reqwest::Client::new(),
        })
    };

    let redis_client = redis::Client::open(cfg.redis_url.clone())?;

    let state = AppState::new(
        store,
        gateway,
        SignatureVerifier::new(cfg.webhook_secret.clone()),
        redis_client.clone(),
        cfg.internal_api_key.clone(),
    );

    let admin_routes = Router::new()
        .route(
            "/admin/payments/:payment_id",
            patch(course_payments::http::handlers::admin::apply_action)
                .get(course_payments::http::handlers::admin::inspect),
        )
        .layer(from_fn_with_state(
            cfg.internal_api_key.clone(),
            course_payments::http::middleware::admin_auth::require_internal_api_key,
        ));

    // The limiter covers only the public payment surface; the admin console
    // is gated by the internal key and the health probes must stay cheap.
    let public_routes = Router::new()
        .route(
            "/payments/initiate",
            post(course_payments::http::handlers::payments::initiate),
        )
        .route(
            "/payments/webhook",
            post(course_payments::http::handlers::webhooks::receive),
        )
        .route(
            "/payments/:payment_id/status",
            get(course_payments::http::handlers::payments::status),
        )
        .layer(from_fn_with_state(
            course_payments::http::middleware::rate_limit::RateLimitState {
                redis_client,
                max_per_minute: 300,
            },
            course_payments::http::middleware::rate_limit::enforce,
        ));

    let app = Router::new()
        .merge(public_routes)
        .route("/ops/readiness", get(course_payments::http::handlers::ops::readiness))
        .route("/ops/liveness", get(course_payments::http::handlers::ops::liveness))
        .merge(admin_routes)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
