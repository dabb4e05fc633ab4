use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{AppError, AppResult, WatchError};
use crate::execution::solana::{SolanaConfig, DEFAULT_PROGRAM_ID, DEFAULT_RPC_URL};
use crate::watch::{PollOptions, SessionPolicy};

const ENV_PREFIX: &str = "SPLITSOL";

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub solana_rpc_url: String,
    pub commitment: String,
    pub program_id: String,
    /// Base58 64-byte secret for the wallet that signs settlements
    pub wallet_secret_key: Option<String>,
    pub poll_interval_ms: u64,
    /// Required; there is no unbounded watch
    pub watch_timeout_ms: Option<u64>,
    pub max_consecutive_failures: Option<u32>,
    pub session_policy: SessionPolicy,
    pub payment_label: String,
    pub seed_demo_data: bool,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    /// Empty allows any origin
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Defaults overlaid with `SPLITSOL_*` environment variables
    pub fn from_env() -> AppResult<Self> {
        Self::build(Environment::with_prefix(ENV_PREFIX))
    }

    fn build(environment: Environment) -> AppResult<Self> {
        let config = Config::builder()
            .set_default("bind_address", "0.0.0.0:8080")?
            .set_default("solana_rpc_url", DEFAULT_RPC_URL)?
            .set_default("commitment", "confirmed")?
            .set_default("program_id", DEFAULT_PROGRAM_ID)?
            .set_default("poll_interval_ms", 3000)?
            .set_default("session_policy", "cancel_existing")?
            .set_default("payment_label", "SplitSol")?
            .set_default("seed_demo_data", false)?
            .set_default("rate_limit_per_minute", 30)?
            .set_default("request_timeout_secs", 30)?
            .set_default("allowed_origins", Vec::<String>::new())?
            .add_source(
                environment
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_origins"),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        // Fail at startup rather than on the first watch
        app_config.poll_options()?;
        Ok(app_config)
    }

    pub fn poll_options(&self) -> Result<PollOptions, AppError> {
        let options = PollOptions::from_millis(self.poll_interval_ms, self.watch_timeout_ms)
            .map_err(|e| match e {
                WatchError::MissingTimeout => AppError::Config(format!(
                    "{} (set {}_WATCH_TIMEOUT_MS)",
                    e, ENV_PREFIX
                )),
                other => AppError::Config(other.to_string()),
            })?;

        Ok(options.with_max_consecutive_failures(self.max_consecutive_failures))
    }

    pub fn solana_config(&self) -> AppResult<SolanaConfig> {
        SolanaConfig::new(&self.solana_rpc_url, &self.commitment, &self.program_id)
    }
}
