use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    api::{handler::AppState, notifications::BroadcastNotifier},
    config::AppConfig,
    error::AppResult,
    execution::SolanaClient,
    groups::GroupRepository,
    ledger::SolanaLedger,
    middleware::SessionRateLimiter,
    settlement::AnchorSettlement,
    wallet::{KeypairWallet, WalletProvider},
    watch::{LedgerPoller, WatchManager},
};

pub async fn initialize_app_state(config: AppConfig) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let poll_options = config.poll_options()?;
    let solana_config = config.solana_config()?;

    // One RPC client and program id shared by the ledger, wallet and settlement
    let solana = Arc::new(SolanaClient::new(solana_config));
    info!(
        "✅ Solana client ready: {} (program {})",
        solana.config().rpc_url,
        solana.program_id()
    );

    let keypair = match &config.wallet_secret_key {
        Some(secret) => Some(KeypairWallet::keypair_from_base58(secret)?),
        None => {
            warn!("⚠️  SPLITSOL_WALLET_SECRET_KEY not set - settlements will fail until a wallet is configured");
            None
        }
    };
    let wallet = Arc::new(KeypairWallet::new(keypair, solana.clone()));

    let notifier = Arc::new(BroadcastNotifier::new());
    let settlement = Arc::new(AnchorSettlement::new(
        wallet.clone() as Arc<dyn WalletProvider>,
        solana.program_id(),
    ));
    let poller = Arc::new(LedgerPoller::new(Arc::new(SolanaLedger::new(solana.clone()))));

    let watch_manager = Arc::new(WatchManager::new(
        poller,
        settlement,
        notifier.clone(),
        poll_options.clone(),
        config.session_policy,
        config.payment_label.clone(),
    ));
    info!(
        "✅ Watch manager initialized (every {:?}, timeout {:?}, policy {:?})",
        poll_options.interval, poll_options.timeout, config.session_policy
    );

    let groups = Arc::new(GroupRepository::new(solana.program_id()));
    if config.seed_demo_data {
        // Demo groups belong to the configured wallet when there is one
        let owner = wallet
            .configured_address()
            .unwrap_or_else(|| Keypair::new().pubkey());
        groups.seed_demo(owner)?;
    }

    let rate_limiter = Arc::new(SessionRateLimiter::per_minute(config.rate_limit_per_minute));
    info!(
        "✅ Watch sessions limited to {} per minute",
        config.rate_limit_per_minute
    );

    Ok(AppState {
        config: Arc::new(config),
        solana,
        wallet,
        groups,
        watch_manager,
        notifier,
        rate_limiter,
    })
}
