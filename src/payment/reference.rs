use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

use crate::error::PaymentError;

/// Single-use tag attached to a payment transaction so it can be found later.
///
/// A reference is an unowned 32-byte public key drawn from the OS entropy
/// source. Wallets include it as a read-only account in the transfer, which
/// makes the transaction discoverable through a signatures-for-address query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaymentReference(Pubkey);

impl PaymentReference {
    /// Mint a fresh reference (256 bits of entropy)
    pub fn generate() -> Result<Self, PaymentError> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| PaymentError::EntropyUnavailable(e.to_string()))?;

        Ok(Self(Pubkey::new_from_array(bytes)))
    }

    pub fn as_pubkey(&self) -> &Pubkey {
        &self.0
    }
}

impl From<Pubkey> for PaymentReference {
    fn from(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PaymentReference {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pubkey::from_str(s)
            .map(Self)
            .map_err(|_| PaymentError::InvalidRequest(format!("invalid reference: {}", s)))
    }
}

impl Serialize for PaymentReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PaymentReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
