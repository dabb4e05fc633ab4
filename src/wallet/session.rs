use async_trait::async_trait;
use parking_lot::RwLock;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, SettlementError};
use crate::execution::SharedSolanaClient;

/// The currently connected signer, as the settlement trigger sees it
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Public key of the connected wallet, `None` when disconnected
    fn public_key(&self) -> Option<Pubkey>;

    /// Sign and submit one instruction with the connected wallet
    async fn submit(&self, instruction: Instruction) -> Result<Signature, SettlementError>;
}

/// Wallet backed by a keypair held in process memory.
///
/// The keypair is loaded from configuration at startup; `connect` and
/// `disconnect` toggle whether it may sign.
pub struct KeypairWallet {
    keypair: Option<Arc<Keypair>>,
    connected: RwLock<Option<Arc<Keypair>>>,
    client: SharedSolanaClient,
}

impl KeypairWallet {
    pub fn new(keypair: Option<Keypair>, client: SharedSolanaClient) -> Self {
        Self {
            keypair: keypair.map(Arc::new),
            connected: RwLock::new(None),
            client,
        }
    }

    /// Decode a base58 encoded 64-byte secret key
    pub fn keypair_from_base58(secret: &str) -> AppResult<Keypair> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| AppError::Config(format!("Invalid wallet secret encoding: {}", e)))?;

        Keypair::try_from(bytes.as_slice())
            .map_err(|e| AppError::Config(format!("Invalid wallet secret key: {}", e)))
    }

    pub fn is_available(&self) -> bool {
        self.keypair.is_some()
    }

    /// Address of the configured keypair, connected or not
    pub fn configured_address(&self) -> Option<Pubkey> {
        self.keypair.as_ref().map(|keypair| keypair.pubkey())
    }

    pub fn connect(&self) -> AppResult<Pubkey> {
        let keypair = self.keypair.clone().ok_or_else(|| {
            AppError::Config("No wallet keypair configured (SPLITSOL_WALLET_SECRET_KEY)".into())
        })?;

        let pubkey = keypair.pubkey();
        *self.connected.write() = Some(keypair);

        info!("👛 Wallet connected: {}", pubkey);
        Ok(pubkey)
    }

    pub fn disconnect(&self) {
        if self.connected.write().take().is_some() {
            info!("👛 Wallet disconnected");
        }
    }
}

#[async_trait]
impl WalletProvider for KeypairWallet {
    fn public_key(&self) -> Option<Pubkey> {
        self.connected.read().as_ref().map(|keypair| keypair.pubkey())
    }

    async fn submit(&self, instruction: Instruction) -> Result<Signature, SettlementError> {
        let signer = self
            .connected
            .read()
            .clone()
            .ok_or(SettlementError::WalletNotConnected)?;

        self.client
            .submit(&[instruction], &signer)
            .await
            .inspect_err(|e| warn!("Wallet submission failed: {}", e))
    }
}
