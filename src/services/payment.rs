use crate::{
    error::ProviderError,
    models::{PaymentReceipt, PaymentRequest},
    services::{blockchain::BlockchainProvider, cache::CacheService, matcher},
    uri::build_payment_uri,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const TIP_HEIGHT_KEY: &str = "chain:tip_height";

/// Builds payment requests and checks them against live chain data.
pub struct PaymentService {
    provider: Arc<dyn BlockchainProvider>,
    cache: Arc<CacheService>,
    min_confirmations: u64,
}

impl PaymentService {
    pub fn new(
        provider: Arc<dyn BlockchainProvider>,
        cache: Arc<CacheService>,
        min_confirmations: u64,
    ) -> Self {
        Self {
            provider,
            cache,
            min_confirmations,
        }
    }

    /// Inputs must already be validated.
    pub fn create_payment_request(
        &self,
        address: String,
        amount: f64,
        label: Option<String>,
        message: Option<String>,
        created_at: DateTime<Utc>,
    ) -> PaymentRequest {
        let label = label.filter(|l| !l.trim().is_empty());
        let message = message.filter(|m| !m.trim().is_empty());
        let payment_uri =
            build_payment_uri(&address, amount, label.as_deref(), message.as_deref());

        PaymentRequest {
            address,
            amount,
            payment_uri,
            label,
            message,
            created_at,
        }
    }

    /// Looks up the request's address history and matches it.
    ///
    /// `Ok(None)` means no matching payment yet. Provider failures propagate.
    pub async fn check_payment_status(
        &self,
        request: &PaymentRequest,
    ) -> Result<Option<PaymentReceipt>, ProviderError> {
        let transactions = self
            .provider
            .get_address_transactions(&request.address)
            .await?;

        let Some(matched) = matcher::find_matching_output(request, &transactions) else {
            tracing::debug!(
                address = %request.address,
                scanned = transactions.len(),
                "No matching payment yet"
            );
            return Ok(None);
        };

        let tip = self.current_block_height().await?;
        let receipt = matched.into_receipt(tip, self.min_confirmations);

        tracing::info!(
            address = %request.address,
            txid = %receipt.transaction_id,
            confirmations = receipt.confirmations,
            confirmed = receipt.confirmed,
            "Matching payment found"
        );

        Ok(Some(receipt))
    }

    /// Tip height, served from cache within its TTL.
    pub async fn current_block_height(&self) -> Result<u64, ProviderError> {
        if let Some(height) = self.cache.get::<u64>(TIP_HEIGHT_KEY).await {
            return Ok(height);
        }

        let height = self.provider.get_current_block_height().await?;
        if let Err(e) = self.cache.set(TIP_HEIGHT_KEY, &height).await {
            tracing::warn!("Failed to cache tip height: {}", e);
        }
        Ok(height)
    }
}
