use axum::{extract::State, http::StatusCode, Json};

use crate::api::handler::AppState;
use crate::api::notifications::{Notification, Notifier, Severity};
use crate::error::AppResult;
use crate::execution::solana::short_address;
use crate::wallet::models::WalletStatusResponse;
use crate::wallet::WalletProvider;

/// GET /wallet
pub async fn get_wallet(State(state): State<AppState>) -> Json<WalletStatusResponse> {
    Json(WalletStatusResponse::new(
        state.wallet.is_available(),
        state.wallet.public_key(),
    ))
}

/// POST /wallet/connect
pub async fn connect_wallet(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<WalletStatusResponse>)> {
    let pubkey = state.wallet.connect()?;

    state.notifier.notify(Notification::new(
        None,
        format!("Wallet connected: {}", short_address(&pubkey)),
        Severity::Success,
    ));

    Ok((
        StatusCode::OK,
        Json(WalletStatusResponse::new(true, Some(pubkey))),
    ))
}

/// POST /wallet/disconnect
pub async fn disconnect_wallet(State(state): State<AppState>) -> Json<WalletStatusResponse> {
    state.wallet.disconnect();
    state
        .notifier
        .notify(Notification::new(None, "Wallet disconnected", Severity::Info));

    Json(WalletStatusResponse::new(state.wallet.is_available(), None))
}
