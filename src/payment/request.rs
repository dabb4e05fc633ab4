use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::error::PaymentError;
use crate::payment::reference::PaymentReference;

/// URI scheme understood by Solana Pay compatible wallets
pub const TRANSFER_SCHEME: &str = "solana";

/// Decimal places between lamports and SOL
pub const LAMPORTS_DECIMALS: u32 = 9;

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Characters left untouched by `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Everything a wallet needs to build the transfer for one member's share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub recipient: Pubkey,
    pub amount_minor_units: u64,
    pub note: String,
    pub reference: PaymentReference,
}

impl PaymentRequest {
    pub fn new(
        recipient: Pubkey,
        amount_minor_units: u64,
        note: impl Into<String>,
        reference: PaymentReference,
    ) -> Self {
        Self {
            recipient,
            amount_minor_units,
            note: note.into(),
            reference,
        }
    }

    /// Major-unit amount with trailing zeros trimmed
    pub fn amount(&self) -> Decimal {
        lamports_to_decimal(self.amount_minor_units)
    }

    /// Serialize into a transfer-request URI for QR rendering
    pub fn encode(&self, label: &str) -> String {
        format!(
            "{}:{}?amount={}&reference={}&label={}&message={}",
            TRANSFER_SCHEME,
            self.recipient,
            self.amount(),
            self.reference,
            utf8_percent_encode(label, URI_COMPONENT),
            utf8_percent_encode(&self.note, URI_COMPONENT),
        )
    }
}

/// Convert lamports into SOL, e.g. 2_500_000_000 -> 2.5
pub fn lamports_to_decimal(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(lamports as i128, LAMPORTS_DECIMALS).normalize()
}

/// Convert a SOL amount back to lamports without rounding
pub fn decimal_to_lamports(amount: Decimal) -> Result<u64, PaymentError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PaymentError::InvalidRequest(format!(
            "amount must not be negative: {}",
            amount
        )));
    }

    if amount.normalize().scale() > LAMPORTS_DECIMALS {
        return Err(PaymentError::InvalidRequest(format!(
            "amount has more than {} decimal places: {}",
            LAMPORTS_DECIMALS, amount
        )));
    }

    amount
        .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .and_then(|lamports| lamports.to_u64())
        .ok_or_else(|| PaymentError::InvalidRequest(format!("amount out of range: {}", amount)))
}

/// A transfer-request URI decoded back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub recipient: Pubkey,
    pub amount_minor_units: Option<u64>,
    pub references: Vec<PaymentReference>,
    pub label: Option<String>,
    pub message: Option<String>,
}

impl TransferRequest {
    pub fn parse(uri: &str) -> Result<Self, PaymentError> {
        let rest = uri
            .strip_prefix(TRANSFER_SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| PaymentError::InvalidRequest(format!("unsupported scheme: {}", uri)))?;

        let (recipient, query) = rest.split_once('?').unwrap_or((rest, ""));
        let recipient = Pubkey::from_str(recipient).map_err(|_| {
            PaymentError::InvalidRequest(format!("invalid recipient: {}", recipient))
        })?;

        let mut request = TransferRequest {
            recipient,
            amount_minor_units: None,
            references: Vec::new(),
            label: None,
            message: None,
        };

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value)?;

            match key {
                "amount" => {
                    let amount = Decimal::from_str(&value).map_err(|_| {
                        PaymentError::InvalidRequest(format!("invalid amount: {}", value))
                    })?;
                    request.amount_minor_units = Some(decimal_to_lamports(amount)?);
                }
                "reference" => request.references.push(value.parse()?),
                "label" => request.label = Some(value),
                "message" => request.message = Some(value),
                // memo, spl-token and unknown keys are ignored
                _ => {}
            }
        }

        Ok(request)
    }
}

fn decode_component(value: &str) -> Result<String, PaymentError> {
    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| PaymentError::InvalidRequest(format!("invalid percent-encoding: {}", e)))
}
