//! Blockchain data client: one capability, one adapter per explorer API.

pub mod blockcypher;
pub mod breaker;
pub mod http;
pub mod mempool;
pub mod retry;

pub use blockcypher::BlockCypherProvider;
pub use breaker::{CircuitBreaker, RateLimitStatus};
pub use http::{ClientSettings, ExplorerHttp};
pub use mempool::MempoolProvider;
pub use retry::{execute_with_retry, parse_retry_after, RetryPolicy};

use crate::{
    error::ProviderError,
    models::{AddressInfo, Transaction, Utxo},
};
use async_trait::async_trait;

/// Read access to an external block explorer, in provider-neutral types.
///
/// Implementations classify failures into [`ProviderError`] and apply their own
/// retry policy before returning.
#[async_trait]
pub trait BlockchainProvider: Send + Sync {
    /// Short identifier used in logs and health output.
    fn name(&self) -> &'static str;

    async fn get_address_info(&self, address: &str) -> Result<AddressInfo, ProviderError>;

    async fn get_address_utxos(&self, address: &str) -> Result<Vec<Utxo>, ProviderError>;

    /// Transactions touching `address`, in the provider's order (newest first for
    /// both supported explorers).
    async fn get_address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<Transaction>, ProviderError>;

    async fn get_transaction(&self, txid: &str) -> Result<Transaction, ProviderError>;

    async fn get_current_block_height(&self) -> Result<u64, ProviderError>;

    fn rate_limit_status(&self) -> RateLimitStatus {
        RateLimitStatus::default()
    }
}
