use super::poller::{PollError, StatusSource};
use crate::{
    models::{ApiEnvelope, PaymentReceipt, PaymentRequest, PublicWalletInfo},
    units::format_btc,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// HTTP client for the payment server's `/wallet`, `/payment` and `/status` routes.
pub struct StatusClient {
    client: Client,
    base_url: String,
}

impl StatusClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn create_wallet(&self) -> Result<PublicWalletInfo> {
        let response = self
            .client
            .post(format!("{}/wallet", self.base_url))
            .send()
            .await
            .context("Wallet request failed")?;
        read_envelope(response).await
    }

    pub async fn create_payment(
        &self,
        address: &str,
        amount: f64,
        label: Option<&str>,
        message: Option<&str>,
    ) -> Result<PaymentRequest> {
        let response = self
            .client
            .post(format!("{}/payment", self.base_url))
            .json(&json!({
                "address": address,
                "amount": amount,
                "label": label,
                "message": message,
            }))
            .send()
            .await
            .context("Payment request failed")?;
        read_envelope(response).await
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let envelope: ApiEnvelope<T> = response
        .json()
        .await
        .with_context(|| format!("Unreadable response (HTTP {})", status))?;

    match envelope.data {
        Some(data) if envelope.success => Ok(data),
        _ => bail!(
            "{}",
            envelope
                .error
                .unwrap_or_else(|| format!("Request failed with HTTP {}", status))
        ),
    }
}

#[async_trait]
impl StatusSource for StatusClient {
    async fn check_status(
        &self,
        request: &PaymentRequest,
    ) -> Result<Option<PaymentReceipt>, PollError> {
        let response = self
            .client
            .get(format!("{}/status", self.base_url))
            .query(&[
                ("address", request.address.clone()),
                ("amount", format_btc(request.amount)),
                ("createdAt", request.created_at.to_rfc3339()),
            ])
            .send()
            .await
            .map_err(|e| PollError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| PollError::Request(e.to_string()))?;
        let envelope = serde_json::from_slice::<ApiEnvelope<PaymentReceipt>>(&body).ok();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PollError::RateLimited {
                retry_after: envelope.and_then(|e| e.retry_after),
            });
        }

        match envelope {
            Some(envelope) if envelope.success && status.is_success() => Ok(envelope.data),
            Some(envelope) => Err(PollError::Request(
                envelope
                    .error
                    .unwrap_or_else(|| "Failed to check payment status".to_string()),
            )),
            None => Err(PollError::Request(format!(
                "Failed to check payment status (HTTP {})",
                status
            ))),
        }
    }
}
