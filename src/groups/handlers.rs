use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::handler::AppState;
use crate::error::{AppError, AppResult};
use crate::groups::models::{ExpenseView, GroupStats, GroupView, PaymentFilter, SplitMode};
use crate::middleware::ValidatedJson;
use crate::payment::request::decimal_to_lamports;
use crate::wallet::{WalletProvider, WalletVerifier};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub name: String,
    /// Friends' addresses; the connected wallet is always the first member
    #[validate(length(min = 1, max = 19, message = "must list 1-19 friends"))]
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(length(min = 32, max = 44, message = "must be a base58 address"))]
    pub member: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SplitRequest {
    #[default]
    Equal,
    /// Per-member amounts in SOL, in member order
    Custom { amounts: Vec<Decimal> },
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub description: String,
    /// Total in SOL
    pub amount: Decimal,
    #[serde(default)]
    pub split: SplitRequest,
}

#[derive(Debug, Deserialize)]
pub struct PaymentsQuery {
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub status: PaymentFilter,
}

impl SplitRequest {
    fn into_mode(self) -> AppResult<SplitMode> {
        match self {
            SplitRequest::Equal => Ok(SplitMode::Equal),
            SplitRequest::Custom { amounts } => {
                let lamports = amounts
                    .into_iter()
                    .map(decimal_to_lamports)
                    .collect::<Result<Vec<u64>, _>>()?;
                Ok(SplitMode::Custom(lamports))
            }
        }
    }
}

fn connected_wallet(state: &AppState) -> AppResult<solana_sdk::pubkey::Pubkey> {
    state.wallet.public_key().ok_or(AppError::WalletNotConnected)
}

/// POST /groups
pub async fn create_group(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateGroupRequest>,
) -> AppResult<(StatusCode, Json<GroupView>)> {
    let authority = connected_wallet(&state)?;

    let mut members = vec![authority];
    members.extend(WalletVerifier::parse_addresses(&req.members)?);

    let group = state.groups.create_group(&req.name, authority, members)?;
    Ok((StatusCode::CREATED, Json(GroupView::from(&group))))
}

/// GET /groups
pub async fn list_groups(State(state): State<AppState>) -> Json<Vec<GroupView>> {
    Json(state.groups.list_groups().iter().map(GroupView::from).collect())
}

/// POST /groups/:id/members
pub async fn add_member(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AddMemberRequest>,
) -> AppResult<Json<GroupView>> {
    let caller = connected_wallet(&state)?;
    let member = WalletVerifier::parse_address(&req.member)?;

    let group = state.groups.add_member(group_id, &caller, member)?;
    Ok(Json(GroupView::from(&group)))
}

/// POST /groups/:id/expenses
///
/// The connected wallet fronts the expense and receives every share.
pub async fn create_expense(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateExpenseRequest>,
) -> AppResult<(StatusCode, Json<ExpenseView>)> {
    let payer = connected_wallet(&state)?;
    let total = decimal_to_lamports(req.amount)?;
    let mode = req.split.into_mode()?;

    let expense = state
        .groups
        .create_expense(group_id, payer, &req.description, total, &mode)?;
    Ok((StatusCode::CREATED, Json(ExpenseView::from(&expense))))
}

/// GET /payments?group_id=&status=
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentsQuery>,
) -> Json<Vec<ExpenseView>> {
    let payments = state.groups.list_payments(query.group_id, query.status);
    Json(payments.iter().map(ExpenseView::from).collect())
}

/// GET /stats
pub async fn get_stats(State(state): State<AppState>) -> Json<GroupStats> {
    Json(state.groups.stats())
}
