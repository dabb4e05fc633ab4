use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::execution::solana::short_address;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Connected,
    Disconnected,
    /// No keypair configured, so the wallet can never connect
    Unavailable,
}

#[derive(Clone, Debug, Serialize)]
pub struct WalletStatusResponse {
    pub status: WalletStatus,
    pub address: Option<String>,
    /// `HU4w...1qbY` form for display
    pub short_address: Option<String>,
}

impl WalletStatusResponse {
    pub fn new(available: bool, connected: Option<Pubkey>) -> Self {
        let status = match (available, connected) {
            (_, Some(_)) => WalletStatus::Connected,
            (true, None) => WalletStatus::Disconnected,
            (false, None) => WalletStatus::Unavailable,
        };

        Self {
            status,
            address: connected.map(|key| key.to_string()),
            short_address: connected.as_ref().map(short_address),
        }
    }
}
