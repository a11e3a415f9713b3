use super::AppState;
use crate::{
    error::AppError,
    models::{ApiResponse, PublicWalletInfo},
};
use axum::{extract::State, Json};

/// Generates a fresh HD wallet. Only the address and public key are returned.
pub async fn create_wallet(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PublicWalletInfo>>, AppError> {
    let wallet = state.wallets.generate_wallet()?;
    Ok(Json(ApiResponse::ok(wallet.public_info())))
}
