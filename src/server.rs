use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::{HeaderName, HeaderValue};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, set_header::SetResponseHeaderLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    api::{
        handler::{cancel_watch, get_watch, health_check, pay_member_share, AppState},
        websocket::stream_events,
    },
    groups::handlers::{
        add_member, create_expense, create_group, get_stats, list_groups, list_payments,
    },
    middleware::{create_cors_layer, rate_limit_middleware},
    wallet::handlers::{connect_wallet, disconnect_wallet, get_wallet},
};

pub fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let api = Router::new()
        // Wallet session
        .route("/wallet", get(get_wallet))
        .route("/wallet/connect", post(connect_wallet))
        .route("/wallet/disconnect", post(disconnect_wallet))
        // Groups and expenses
        .route("/groups", post(create_group).get(list_groups))
        .route("/groups/:id/members", post(add_member))
        .route("/groups/:id/expenses", post(create_expense))
        .route("/payments", get(list_payments))
        .route("/stats", get(get_stats))
        // Payment watch
        .route(
            "/expenses/:id/members/:index/pay",
            post(pay_member_share).layer(middleware::from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit_middleware,
            )),
        )
        .route("/watch", get(get_watch).delete(cancel_watch))
        .route("/events", get(stream_events));

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(CompressionLayer::new())
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.request_timeout_secs,
        )))
        .layer(create_cors_layer(&state.config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
