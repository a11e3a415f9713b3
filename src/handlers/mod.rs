pub mod health;
pub mod payment;
pub mod status;
pub mod wallet;

pub use health::*;
pub use payment::*;
pub use status::*;
pub use wallet::*;

use crate::services::{BlockchainProvider, PaymentService, WalletService};
use axum::{
    routing::{get, post},
    Router,
};
use bitcoin::Network;
use std::{sync::Arc, time::Instant};

#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentService>,
    pub wallets: Arc<WalletService>,
    pub provider: Arc<dyn BlockchainProvider>,
    pub network: Network,
    pub started_at: Instant,
}

/// Routes of the payment API, without transport layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/wallet", post(create_wallet).get(create_wallet))
        .route("/payment", post(create_payment))
        .route("/status", get(payment_status))
        .with_state(state)
}
