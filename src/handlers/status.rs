use super::AppState;
use crate::{
    error::AppError,
    models::{ApiResponse, PaymentReceipt, StatusQuery},
    validation::{parse_amount, parse_created_at, validate_address},
};
use axum::{
    extract::{Query, State},
    Json,
};

/// Runs the matcher against live provider data for the query's request.
///
/// `data` is `null` while no matching payment exists.
pub async fn payment_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ApiResponse<Option<PaymentReceipt>>>, AppError> {
    let amount = parse_amount(query.amount.as_deref().unwrap_or_default())?;
    let address = validate_address(query.address.as_deref().unwrap_or_default(), state.network)?;
    let created_at = parse_created_at(query.created_at.as_deref().unwrap_or_default())?;

    let request = state
        .payments
        .create_payment_request(address, amount, None, None, created_at);
    let receipt = state.payments.check_payment_status(&request).await?;

    Ok(Json(ApiResponse::ok(receipt)))
}
