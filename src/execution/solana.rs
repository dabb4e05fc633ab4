use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    instruction::Instruction,
    message::Message,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, SettlementError};

/// Program id of the deployed split-bill program
pub const DEFAULT_PROGRAM_ID: &str = "HU4wkHJ97BBeabrchh94ZvMPViJrh8dCZfA3K5Cz1qbY";

pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";

#[derive(Debug, Clone)]
pub struct SolanaConfig {
    pub rpc_url: String,
    pub commitment: CommitmentConfig,
    pub program_id: Pubkey,
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            commitment: CommitmentConfig::confirmed(),
            program_id: Pubkey::from_str(DEFAULT_PROGRAM_ID)
                .unwrap_or_else(|_| Pubkey::new_from_array([0; 32])),
        }
    }
}

impl SolanaConfig {
    pub fn new(rpc_url: &str, commitment: &str, program_id: &str) -> AppResult<Self> {
        let program_id = Pubkey::from_str(program_id)
            .map_err(|_| AppError::Config(format!("Invalid program id: {}", program_id)))?;

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            commitment: parse_commitment(commitment)?,
            program_id,
        })
    }
}

pub fn parse_commitment(level: &str) -> AppResult<CommitmentConfig> {
    match level.to_ascii_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(AppError::Config(format!("Unknown commitment level: {}", other))),
    }
}

/// Shared RPC connection plus the one program this service talks to.
///
/// Built once at bootstrap; the ledger poller and the wallet both hold an
/// `Arc` to the same instance.
pub struct SolanaClient {
    config: SolanaConfig,
    rpc: RpcClient,
}

impl SolanaClient {
    pub fn new(config: SolanaConfig) -> Self {
        let rpc = RpcClient::new_with_commitment(config.rpc_url.clone(), config.commitment);
        Self { config, rpc }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn program_id(&self) -> Pubkey {
        self.config.program_id
    }

    pub fn config(&self) -> &SolanaConfig {
        &self.config
    }

    /// Sign, simulate, and send one transaction paid for by `signer`
    pub async fn submit(
        &self,
        instructions: &[Instruction],
        signer: &Keypair,
    ) -> Result<Signature, SettlementError> {
        let recent_blockhash = self.rpc.get_latest_blockhash().await.map_err(|e| {
            SettlementError::RemoteCallFailed(format!("Failed to get blockhash: {}", e))
        })?;

        let message = Message::new(instructions, Some(&signer.pubkey()));
        let mut transaction = Transaction::new_unsigned(message);
        transaction
            .try_sign(&[signer], recent_blockhash)
            .map_err(|e| SettlementError::TransactionRejected(format!("Signing failed: {}", e)))?;

        let simulation = self.rpc.simulate_transaction(&transaction).await.map_err(|e| {
            SettlementError::RemoteCallFailed(format!("Simulation error: {}", e))
        })?;

        if let Some(err) = simulation.value.err {
            warn!("Settlement simulation rejected: {:?}", err);
            return Err(SettlementError::TransactionRejected(format!(
                "Transaction would fail: {:?}",
                err
            )));
        }

        debug!("Simulation successful, sending transaction");

        let signature = self
            .rpc
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| SettlementError::RemoteCallFailed(format!("Send failed: {}", e)))?;

        info!("✅ Transaction confirmed: {}", signature);
        Ok(signature)
    }
}

/// Group account address: seeds `["group", authority, name]`
pub fn group_address(authority: &Pubkey, name: &str, program_id: &Pubkey) -> Pubkey {
    let (address, _bump) = Pubkey::find_program_address(
        &[b"group", authority.as_ref(), name.as_bytes()],
        program_id,
    );
    address
}

/// Expense account address: seeds `["expense", group, payer, created_at]`
pub fn expense_address(
    group: &Pubkey,
    payer: &Pubkey,
    created_at: i64,
    program_id: &Pubkey,
) -> Pubkey {
    let (address, _bump) = Pubkey::find_program_address(
        &[
            b"expense",
            group.as_ref(),
            payer.as_ref(),
            &created_at.to_le_bytes(),
        ],
        program_id,
    );
    address
}

/// Shorthand used in logs and the UI, e.g. `HU4w...1qbY`
pub fn short_address(address: &Pubkey) -> String {
    let full = address.to_string();
    if full.len() <= 8 {
        return full;
    }
    format!("{}...{}", &full[..4], &full[full.len() - 4..])
}

pub type SharedSolanaClient = Arc<SolanaClient>;
