pub mod solana;

pub use solana::{SharedSolanaClient, SolanaClient, SolanaConfig};
