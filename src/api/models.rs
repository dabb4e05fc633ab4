use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::payment::PaymentReference;
use crate::watch::{WatchSnapshot, WatchStatus};

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub cluster: String,
    pub watch: WatchStatus,
    pub event_subscribers: usize,
    pub timestamp: DateTime<Utc>,
}

/// A member's share, ready to be rendered as a QR code
#[derive(Debug, Serialize)]
pub struct PaymentSessionResponse {
    pub session_id: Uuid,
    pub reference: PaymentReference,
    /// `solana:` transfer request URI
    pub uri: String,
    pub recipient: String,
    pub amount: Decimal,
    pub message: String,
    pub expense_id: Uuid,
    pub member_index: u8,
    pub timeout_secs: u64,
    pub status: WatchStatus,
}

#[derive(Debug, Serialize)]
pub struct WatchStateResponse {
    pub status: WatchStatus,
    pub session: Option<WatchSnapshot>,
}

impl WatchStateResponse {
    pub fn from_snapshot(session: Option<WatchSnapshot>) -> Self {
        Self {
            status: session
                .as_ref()
                .map(|s| s.status.clone())
                .unwrap_or(WatchStatus::Idle),
            session,
        }
    }
}
