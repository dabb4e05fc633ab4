use serde::{Deserialize, Serialize};

/// A transaction on the ledger that carries a payment reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMatch {
    /// Base58 transaction signature
    pub signature: String,
    pub slot: u64,
    /// Unix timestamp of the block, when the node reports one
    pub block_time: Option<i64>,
    /// The transaction landed but its instructions errored
    pub failed: bool,
}

impl LedgerMatch {
    pub fn new(signature: impl Into<String>, slot: u64) -> Self {
        Self {
            signature: signature.into(),
            slot,
            block_time: None,
            failed: false,
        }
    }
}
