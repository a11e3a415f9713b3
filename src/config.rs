use crate::services::blockchain::{
    blockcypher::BLOCKCYPHER_TESTNET_URL, mempool::MEMPOOL_TESTNET4_URL, BlockCypherProvider,
    BlockchainProvider, ClientSettings, MempoolProvider, RetryPolicy,
};
use anyhow::{bail, Context, Result};
use bitcoin::Network;
use std::{str::FromStr, sync::Arc, time::Duration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testnet,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Mempool,
    BlockCypher,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Mempool => "mempool",
            ProviderKind::BlockCypher => "blockcypher",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mempool" | "esplora" => Ok(ProviderKind::Mempool),
            "blockcypher" => Ok(ProviderKind::BlockCypher),
            _ => bail!("Unknown blockchain provider: {}", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,

    // Bitcoin
    pub network: Network,
    pub min_confirmations: u64,

    // Blockchain data provider
    pub provider: ProviderKind,
    pub mempool_api_url: String,
    pub blockcypher_api_url: String,
    pub blockcypher_token: Option<String>,
    pub provider_timeout: Duration,
    pub provider_max_retries: u32,
    pub provider_base_delay: Duration,
    pub provider_max_retry_wait: Duration,

    // Circuit breaker
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout: Duration,

    pub height_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            environment: Self::parse_environment()?,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8080)?,

            network: parse_network(
                &std::env::var("BITCOIN_NETWORK").unwrap_or_else(|_| "testnet".to_string()),
            )?,
            min_confirmations: env_or("MIN_CONFIRMATIONS", 1)?,

            provider: std::env::var("BLOCKCHAIN_PROVIDER")
                .unwrap_or_else(|_| "mempool".to_string())
                .parse()?,
            mempool_api_url: std::env::var("MEMPOOL_API_URL")
                .unwrap_or_else(|_| MEMPOOL_TESTNET4_URL.to_string()),
            blockcypher_api_url: std::env::var("BLOCKCYPHER_API_URL")
                .unwrap_or_else(|_| BLOCKCYPHER_TESTNET_URL.to_string()),
            blockcypher_token: std::env::var("BLOCKCYPHER_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            provider_timeout: Duration::from_secs(env_or("PROVIDER_TIMEOUT_SECS", 30)?),
            provider_max_retries: env_or("PROVIDER_MAX_RETRIES", 3)?,
            provider_base_delay: Duration::from_millis(env_or("PROVIDER_BASE_DELAY_MS", 1000)?),
            provider_max_retry_wait: Duration::from_secs(env_or(
                "PROVIDER_MAX_RETRY_WAIT_SECS",
                30,
            )?),

            circuit_breaker_threshold: env_or("CIRCUIT_BREAKER_THRESHOLD", 3)?,
            circuit_breaker_timeout: Duration::from_secs(env_or(
                "CIRCUIT_BREAKER_TIMEOUT_SECS",
                60,
            )?),

            height_cache_ttl: Duration::from_secs(env_or("HEIGHT_CACHE_TTL_SECS", 10)?),
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_environment() -> Result<Environment> {
        let env = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        match env.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testnet" | "test" => Ok(Environment::Testnet),
            "production" | "prod" => Ok(Environment::Production),
            _ => bail!("Unknown environment: {}", env),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.mempool_api_url) {
            bail!("MEMPOOL_API_URL must be HTTP(S) URL");
        }
        if !is_http_url(&self.blockcypher_api_url) {
            bail!("BLOCKCYPHER_API_URL must be HTTP(S) URL");
        }
        if self.provider_base_delay.is_zero() {
            bail!("PROVIDER_BASE_DELAY_MS must be greater than 0");
        }
        if self.min_confirmations == 0 {
            bail!("MIN_CONFIRMATIONS must be at least 1");
        }

        tracing::info!(
            "Configuration validated for {:?} environment ({} via {})",
            self.environment,
            self.network,
            self.provider.as_str()
        );

        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            timeout: self.provider_timeout,
            retry: RetryPolicy {
                max_retries: self.provider_max_retries,
                base_delay: self.provider_base_delay,
                max_wait: self.provider_max_retry_wait,
            },
            breaker_threshold: self.circuit_breaker_threshold,
            breaker_cooldown: self.circuit_breaker_timeout,
        }
    }

    /// Builds the configured provider adapter. One instance per process.
    pub fn build_provider(&self) -> Result<Arc<dyn BlockchainProvider>> {
        let settings = self.client_settings();
        let provider: Arc<dyn BlockchainProvider> = match self.provider {
            ProviderKind::Mempool => Arc::new(
                MempoolProvider::new(&self.mempool_api_url, &settings)
                    .context("Failed to build mempool client")?,
            ),
            ProviderKind::BlockCypher => Arc::new(
                BlockCypherProvider::new(
                    &self.blockcypher_api_url,
                    self.blockcypher_token.clone(),
                    &settings,
                )
                .context("Failed to build BlockCypher client")?,
            ),
        };
        Ok(provider)
    }
}

/// Client-side polling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(60),
            max_interval: Duration::from_secs(300),
            max_attempts: 180,
        }
    }
}

impl PollingConfig {
    pub const MIN_BASE_INTERVAL: Duration = Duration::from_secs(10);
    pub const MAX_BASE_INTERVAL: Duration = Duration::from_secs(60);

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            base_interval: Duration::from_secs(env_or("POLL_BASE_INTERVAL_SECS", 60)?),
            max_interval: Duration::from_secs(env_or("POLL_MAX_INTERVAL_SECS", 300)?),
            max_attempts: env_or("POLL_MAX_ATTEMPTS", 180)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_interval < Self::MIN_BASE_INTERVAL
            || self.base_interval > Self::MAX_BASE_INTERVAL
        {
            bail!("POLL_BASE_INTERVAL_SECS must be between 10 and 60");
        }
        if self.max_interval < self.base_interval {
            bail!("POLL_MAX_INTERVAL_SECS must not be below the base interval");
        }
        if self.max_attempts == 0 {
            bail!("POLL_MAX_ATTEMPTS must be greater than 0");
        }
        Ok(())
    }
}

pub fn parse_network(value: &str) -> Result<Network> {
    match value.to_lowercase().as_str() {
        "bitcoin" | "mainnet" => Ok(Network::Bitcoin),
        "testnet" | "testnet3" => Ok(Network::Testnet),
        "signet" => Ok(Network::Signet),
        "regtest" => Ok(Network::Regtest),
        _ => bail!("Unknown bitcoin network: {}", value),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn env_or<T>(var: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", var)),
        Err(_) => Ok(default),
    }
}
