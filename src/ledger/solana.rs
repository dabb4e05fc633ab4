use async_trait::async_trait;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use tracing::debug;

use crate::error::PaymentError;
use crate::execution::SharedSolanaClient;
use crate::ledger::{LedgerClient, LedgerMatch};
use crate::payment::PaymentReference;

/// Finds referenced transactions through `getSignaturesForAddress`
pub struct SolanaLedger {
    client: SharedSolanaClient,
}

impl SolanaLedger {
    pub fn new(client: SharedSolanaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LedgerClient for SolanaLedger {
    async fn find_by_reference(
        &self,
        reference: &PaymentReference,
        limit: usize,
    ) -> Result<Vec<LedgerMatch>, PaymentError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before: None,
            until: None,
            limit: Some(limit),
            commitment: Some(self.client.config().commitment),
        };

        let statuses = self
            .client
            .rpc()
            .get_signatures_for_address_with_config(reference.as_pubkey(), config)
            .await
            .map_err(|e| PaymentError::LedgerQueryFailed(e.to_string()))?;

        debug!("🔎 {} signature(s) for reference {}", statuses.len(), reference);

        Ok(statuses.into_iter().map(LedgerMatch::from).collect())
    }
}

impl From<RpcConfirmedTransactionStatusWithSignature> for LedgerMatch {
    fn from(status: RpcConfirmedTransactionStatusWithSignature) -> Self {
        Self {
            signature: status.signature,
            slot: status.slot,
            block_time: status.block_time,
            failed: status.err.is_some(),
        }
    }
}
