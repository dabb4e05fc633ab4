use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Group error: {0}")]
    Group(#[from] GroupError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Payment watch errors
///
/// Transient ledger failures are counted by the poller and only surface here
/// when a caller queries the ledger directly.
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("Ledger query failed: {0}")]
    LedgerQueryFailed(String),

    #[error("A watch session is already active")]
    SessionAlreadyActive,

    #[error("Invalid transfer request: {0}")]
    InvalidRequest(String),
}

/// Settlement submission errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("Remote call failed: {0}")]
    RemoteCallFailed(String),
}

/// Serializable tag for a settlement failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementErrorKind {
    WalletNotConnected,
    TransactionRejected,
    RemoteCallFailed,
}

impl SettlementError {
    pub fn kind(&self) -> SettlementErrorKind {
        match self {
            SettlementError::WalletNotConnected => SettlementErrorKind::WalletNotConnected,
            SettlementError::TransactionRejected(_) => SettlementErrorKind::TransactionRejected,
            SettlementError::RemoteCallFailed(_) => SettlementErrorKind::RemoteCallFailed,
        }
    }
}

/// Poll option validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("a watch timeout is required")]
    MissingTimeout,

    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    #[error("watch timeout must be greater than zero")]
    ZeroTimeout,
}

/// Group and expense bookkeeping errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("Group name must be between 1 and 50 characters")]
    InvalidGroupName,

    #[error("Group must have between 1 and 20 members")]
    InvalidMemberCount,

    #[error("Description must be between 1 and 200 characters")]
    InvalidDescription,

    #[error("Amount must be greater than 0")]
    InvalidAmount,

    #[error("Number of split amounts must match number of group members")]
    MismatchedSplitCount,

    #[error("Split amounts must add up to total amount")]
    InvalidSplitSum,

    #[error("Invalid member index")]
    InvalidMemberIndex,

    #[error("This member has already paid their share")]
    AlreadyPaid,

    #[error("Only the group creator can perform this action")]
    Unauthorized,

    #[error("Only the member at this index can pay their share")]
    UnauthorizedMember,

    #[error("Group is at maximum capacity (20 members)")]
    GroupFull,

    #[error("Member already exists in this group")]
    MemberAlreadyExists,

    #[error("Group not found: {0}")]
    GroupNotFound(Uuid),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(Uuid),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_code, details) = match &self {
            AppError::Payment(PaymentError::SessionAlreadyActive) => {
                (StatusCode::CONFLICT, "SESSION_ALREADY_ACTIVE", None)
            }
            AppError::Payment(PaymentError::EntropyUnavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "ENTROPY_UNAVAILABLE",
                None,
            ),
            AppError::Payment(PaymentError::LedgerQueryFailed(_)) => {
                (StatusCode::BAD_GATEWAY, "LEDGER_QUERY_FAILED", None)
            }
            AppError::Payment(PaymentError::InvalidRequest(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_TRANSFER_REQUEST", None)
            }
            AppError::Group(GroupError::GroupNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "GROUP_NOT_FOUND",
                Some(serde_json::json!({ "group_id": id })),
            ),
            AppError::Group(GroupError::ExpenseNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "EXPENSE_NOT_FOUND",
                Some(serde_json::json!({ "expense_id": id })),
            ),
            AppError::Group(GroupError::Unauthorized) => {
                (StatusCode::FORBIDDEN, "UNAUTHORIZED", None)
            }
            AppError::Group(GroupError::UnauthorizedMember) => {
                (StatusCode::FORBIDDEN, "UNAUTHORIZED_MEMBER", None)
            }
            AppError::Group(GroupError::AlreadyPaid)
            | AppError::Group(GroupError::MemberAlreadyExists) => {
                (StatusCode::CONFLICT, "CONFLICT", None)
            }
            AppError::Group(_) => (StatusCode::BAD_REQUEST, "INVALID_GROUP_OPERATION", None),
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", None),
            AppError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "INVALID_ADDRESS", None),
            AppError::WalletNotConnected => {
                (StatusCode::PRECONDITION_FAILED, "WALLET_NOT_CONNECTED", None)
            }
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", None),
            AppError::Config(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None)
            }
        };

        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "An internal error occurred".to_string(),
            _ => message,
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_error_kind() {
        assert_eq!(
            SettlementError::TransactionRejected("declined".into()).kind(),
            SettlementErrorKind::TransactionRejected
        );
        assert_eq!(
            serde_json::to_string(&SettlementErrorKind::WalletNotConnected).unwrap(),
            "\"wallet_not_connected\""
        );
    }

    #[test]
    fn test_error_status_codes() {
        let response = AppError::Payment(PaymentError::SessionAlreadyActive).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::Group(GroupError::ExpenseNotFound(Uuid::new_v4())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::Group(GroupError::UnauthorizedMember).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = AppError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
