use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::models::*;
use crate::{
    api::notifications::BroadcastNotifier,
    config::AppConfig,
    error::{AppError, AppResult},
    execution::SharedSolanaClient,
    groups::GroupRepository,
    middleware::SessionRateLimiter,
    payment::lamports_to_decimal,
    settlement::SettlementRequest,
    wallet::{KeypairWallet, WalletProvider},
    watch::{WatchHandle, WatchManager, WatchRequest, WatchStatus},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub solana: SharedSolanaClient,
    pub wallet: Arc<KeypairWallet>,
    pub groups: Arc<GroupRepository>,
    pub watch_manager: Arc<WatchManager>,
    pub notifier: Arc<BroadcastNotifier>,
    pub rate_limiter: Arc<SessionRateLimiter>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        cluster: state.solana.config().rpc_url.clone(),
        watch: state.watch_manager.status().await,
        event_subscribers: state.notifier.subscriber_count(),
        timestamp: Utc::now(),
    })
}

/// Start watching for one member's share of an expense
/// POST /expenses/:id/members/:index/pay
///
/// The transfer goes to the expense payer; once it is seen on-chain the
/// connected wallet submits `pay_expense` and the share is marked paid.
/// The connected wallet must be the group member at `index`.
pub async fn pay_member_share(
    State(state): State<AppState>,
    Path((expense_id, member_index)): Path<(Uuid, u8)>,
) -> AppResult<(StatusCode, Json<PaymentSessionResponse>)> {
    let expense = state.groups.get_expense(expense_id)?;
    let share = expense.ensure_payable(member_index)?;
    let group = state.groups.get_group(expense.group_id)?;

    // Settlement is signed by the connected wallet, which must own the share
    let signer = state.wallet.public_key().ok_or(AppError::WalletNotConnected)?;
    group.ensure_member(member_index, &signer)?;

    info!(
        "💳 Payment requested: member {} of '{}' owes {} lamports",
        member_index, expense.description, share
    );

    let handle = state
        .watch_manager
        .start(WatchRequest {
            recipient: expense.payer,
            amount_minor_units: share,
            note: expense.description.clone(),
            settlement: SettlementRequest {
                member_index,
                expense: expense.address,
                group: group.address,
                payer: expense.payer,
            },
        })
        .await?;

    tokio::spawn(record_settlement(
        state.groups.clone(),
        handle.clone(),
        expense_id,
        member_index,
    ));

    let response = PaymentSessionResponse {
        session_id: handle.id(),
        reference: *handle.reference(),
        uri: handle.uri().to_string(),
        recipient: expense.payer.to_string(),
        amount: lamports_to_decimal(share),
        message: expense.description,
        expense_id,
        member_index,
        timeout_secs: state.watch_manager.options().timeout.as_secs(),
        status: handle.status(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Mark the share paid once its session settles successfully
async fn record_settlement(
    groups: Arc<GroupRepository>,
    handle: WatchHandle,
    expense_id: Uuid,
    member_index: u8,
) {
    match handle.wait().await {
        WatchStatus::Settled { settlement, .. } if settlement.success => {
            if let Err(e) = groups.mark_paid(expense_id, member_index) {
                warn!("Settled share could not be recorded for {}: {}", expense_id, e);
            }
        }
        status => info!("Payment session {} ended without settlement: {:?}", handle.id(), status),
    }
}

/// GET /watch
pub async fn get_watch(State(state): State<AppState>) -> Json<WatchStateResponse> {
    Json(WatchStateResponse::from_snapshot(
        state.watch_manager.current().await,
    ))
}

/// Cancel the active session; repeated calls are harmless
/// DELETE /watch
pub async fn cancel_watch(State(state): State<AppState>) -> Json<WatchStateResponse> {
    state.watch_manager.cancel().await;
    Json(WatchStateResponse::from_snapshot(
        state.watch_manager.current().await,
    ))
}
