use super::AppState;
use crate::{
    error::AppError,
    models::{ApiResponse, CreatePaymentBody, PaymentRequest},
    validation::{validate_address, validate_amount_input},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;

pub async fn create_payment(
    State(state): State<AppState>,
    body: Result<Json<CreatePaymentBody>, JsonRejection>,
) -> Result<Json<ApiResponse<PaymentRequest>>, AppError> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let amount = validate_amount_input(body.amount.as_ref())?;
    let address = validate_address(body.address.as_deref().unwrap_or_default(), state.network)?;

    let request = state.payments.create_payment_request(
        address,
        amount,
        body.label,
        body.message,
        Utc::now(),
    );

    tracing::info!(
        address = %request.address,
        amount = request.amount,
        "Created payment request"
    );

    Ok(Json(ApiResponse::ok(request)))
}
