//! MIPS Gateway HTTP Server
//!
//! Axum-based server exposing the checkout redirect page, the public IMN
//! callback endpoint, and a small JSON API for programmatic payment
//! requests.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mips_gateway::{
    CallbackValidator, MemoryOrderStore, MemoryPaymentStore, MipsClient, MipsSettings, Reconciler,
    SessionContext,
};

use crate::handlers::{
    create_payment_request, health_check, imn_callback, list_payments, mips_checkout,
    register_order,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let mut settings = MipsSettings::from_env()?;
    tracing::info!(
        environment = ?settings.environment,
        base_url = settings.base_url(),
        transaction_limit = %settings.transaction_limit,
        "Loaded MIPS settings"
    );

    // Register the IMN callback URL once, on first start
    if !settings.callback_registered {
        let client = MipsClient::new(Arc::new(settings.clone()))?;
        match client.register_imn_callback().await {
            Ok(()) => settings.callback_registered = true,
            Err(e) => {
                tracing::warn!(error = %e, "IMN callback registration failed; callbacks will not be delivered until it succeeds");
            }
        }
    }

    let settings = Arc::new(settings);
    let client = Arc::new(MipsClient::new(Arc::clone(&settings))?);

    // Stores and reconciler
    let orders = Arc::new(MemoryOrderStore::new());
    let payments = Arc::new(MemoryPaymentStore::new());
    let session = Arc::new(SessionContext::guest());
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&client) as Arc<dyn CallbackValidator>,
        Arc::clone(&orders),
        Arc::clone(&payments),
        session,
    ));

    let state = AppState {
        settings,
        client,
        orders,
        payments,
        reconciler,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health & info
        .route("/health", get(health_check))
        // Checkout
        .route("/mips_checkout", get(mips_checkout))
        .route("/api/payment_request", post(create_payment_request))
        // Platform side
        .route("/api/orders", post(register_order))
        .route("/api/payments", get(list_payments))
        // Processor side (guest-allowed)
        .route("/imn_callback", post(imn_callback))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("MIPS gateway listening on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health              - Health check");
    tracing::info!("  GET  /mips_checkout       - Checkout redirect page");
    tracing::info!("  POST /api/payment_request - Create payment request(s)");
    tracing::info!("  POST /api/orders          - Register an order");
    tracing::info!("  GET  /api/payments        - Payment entries by transaction id");
    tracing::info!("  POST /imn_callback        - MIPS IMN callback (guest)");

    axum::serve(listener, app).await?;

    Ok(())
}
