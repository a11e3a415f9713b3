use super::{BlockchainProvider, ClientSettings, ExplorerHttp, RateLimitStatus};
use crate::{
    error::ProviderError,
    models::{AddressInfo, Transaction, Utxo},
};
use async_trait::async_trait;

pub const MEMPOOL_TESTNET4_URL: &str = "https://mempool.space/testnet4/api";

/// mempool.space / Esplora REST API. Payloads already match the normalized models.
pub struct MempoolProvider {
    http: ExplorerHttp,
}

impl MempoolProvider {
    pub fn new(base_url: &str, settings: &ClientSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            http: ExplorerHttp::new(base_url, settings)?,
        })
    }
}

#[async_trait]
impl BlockchainProvider for MempoolProvider {
    fn name(&self) -> &'static str {
        "mempool"
    }

    async fn get_address_info(&self, address: &str) -> Result<AddressInfo, ProviderError> {
        self.http.get_json(&format!("/address/{address}")).await
    }

    async fn get_address_utxos(&self, address: &str) -> Result<Vec<Utxo>, ProviderError> {
        self.http.get_json(&format!("/address/{address}/utxo")).await
    }

    async fn get_address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<Transaction>, ProviderError> {
        self.http.get_json(&format!("/address/{address}/txs")).await
    }

    async fn get_transaction(&self, txid: &str) -> Result<Transaction, ProviderError> {
        self.http.get_json(&format!("/tx/{txid}")).await
    }

    async fn get_current_block_height(&self) -> Result<u64, ProviderError> {
        let body = self.http.get_text("/blocks/tip/height").await?;
        body.trim()
            .parse()
            .map_err(|_| ProviderError::Decode(format!("invalid tip height: {body:?}")))
    }

    fn rate_limit_status(&self) -> RateLimitStatus {
        self.http.rate_limit_status()
    }
}
