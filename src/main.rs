mod api;
mod bootstrap;
mod config;
mod error;
mod execution;
mod groups;
mod ledger;
mod middleware;
mod payment;
mod server;
mod settlement;
mod wallet;
mod watch;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,splitsol_bridge=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("🚀 Starting SplitSol payment bridge");

    let config = AppConfig::from_env()?;
    let bind_address = config.bind_address.clone();

    let state = bootstrap::initialize_app_state(config).await?;

    let app = server::create_app(state);

    server::run_server(app, &bind_address).await?;

    Ok(())
}
