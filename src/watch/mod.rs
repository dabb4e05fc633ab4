// Payment watching: ledger polling plus the single active watch session
pub mod poller;
pub mod session;

pub use poller::{LedgerPoller, PollOptions, PollOutcome};
pub use session::{SessionPolicy, WatchHandle, WatchManager, WatchRequest, WatchSnapshot, WatchStatus};
