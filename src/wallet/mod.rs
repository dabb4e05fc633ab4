pub mod handlers;
pub mod models;
pub mod session;
pub mod verifier;

pub use session::{KeypairWallet, WalletProvider};
pub use verifier::WalletVerifier;
