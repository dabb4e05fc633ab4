// Ledger lookups for payment confirmation
pub mod models;
pub mod solana;

use async_trait::async_trait;

use crate::error::PaymentError;
use crate::payment::PaymentReference;

pub use models::LedgerMatch;
pub use solana::SolanaLedger;

/// Read access to the ledger, as the poller needs it
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Transactions referencing `reference`, most recent first, at most `limit`
    async fn find_by_reference(
        &self,
        reference: &PaymentReference,
        limit: usize,
    ) -> Result<Vec<LedgerMatch>, PaymentError>;
}
