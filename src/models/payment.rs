use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A BIP21 payment request. Built once by `PaymentService` and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub address: String,
    /// BTC.
    pub amount: f64,
    pub payment_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentRequest {
    /// Lower bound (inclusive, unix seconds) for block times of matching payments.
    pub fn since_timestamp(&self) -> i64 {
        self.created_at.timestamp()
    }
}

/// Snapshot of a payment found on chain for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    /// BTC actually received by the matching output.
    pub amount: f64,
    pub transaction_id: String,
    pub confirmations: u64,
    /// Block time, unix seconds.
    pub timestamp: i64,
    pub confirmed: bool,
}

/// `amount` as sent by clients: a JSON number or a decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentBody {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub amount: Option<AmountInput>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Query string of `GET /status`, validated by the handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}
