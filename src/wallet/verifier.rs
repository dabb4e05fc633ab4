use solana_sdk::pubkey::Pubkey;

use crate::error::{AppError, AppResult};

pub struct WalletVerifier;

impl WalletVerifier {
    /// Parse a base58 account address
    pub fn parse_address(address: &str) -> AppResult<Pubkey> {
        let address = address.trim();

        // Basic Solana address validation (base58, 32-44 chars)
        if address.len() < 32 || address.len() > 44 {
            return Err(AppError::InvalidAddress(format!(
                "Invalid Solana address length: {}",
                address
            )));
        }

        let bytes = bs58::decode(address).into_vec().map_err(|e| {
            AppError::InvalidAddress(format!("Invalid Solana address {}: {}", address, e))
        })?;

        let bytes: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            AppError::InvalidAddress(format!(
                "Invalid Solana address {}: decodes to {} bytes",
                address,
                bytes.len()
            ))
        })?;

        Ok(Pubkey::new_from_array(bytes))
    }

    pub fn parse_addresses(addresses: &[String]) -> AppResult<Vec<Pubkey>> {
        addresses
            .iter()
            .map(|address| Self::parse_address(address))
            .collect()
    }
}
