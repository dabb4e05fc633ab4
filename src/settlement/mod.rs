// Settlement: marks a member's share as paid on-chain once the transfer is seen
pub mod anchor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{SettlementError, SettlementErrorKind};

pub use anchor::AnchorSettlement;

/// Accounts and arguments for one `pay_expense` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRequest {
    pub member_index: u8,
    pub expense: Pubkey,
    pub group: Pubkey,
    /// The member who fronted the expense and receives the share
    pub payer: Pubkey,
}

/// Outcome of a settlement attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub error_kind: Option<SettlementErrorKind>,
    pub error_message: Option<String>,
}

impl SettlementResult {
    pub fn succeeded(transaction_id: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            error_kind: None,
            error_message: None,
        }
    }

    pub fn failed(error: &SettlementError) -> Self {
        Self {
            success: false,
            transaction_id: None,
            error_kind: Some(error.kind()),
            error_message: Some(error.to_string()),
        }
    }
}

impl From<Result<String, SettlementError>> for SettlementResult {
    fn from(result: Result<String, SettlementError>) -> Self {
        match result {
            Ok(signature) => Self::succeeded(signature),
            Err(e) => Self::failed(&e),
        }
    }
}

/// Submits the one state-changing settlement call.
///
/// Implementations never panic or propagate; failures come back inside the
/// result so the watch session can report them.
#[async_trait]
pub trait SettlementTrigger: Send + Sync {
    async fn settle(&self, request: &SettlementRequest) -> SettlementResult;
}
