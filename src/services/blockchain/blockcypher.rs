use super::{BlockchainProvider, ClientSettings, ExplorerHttp, RateLimitStatus};
use crate::{
    error::ProviderError,
    models::{AddressInfo, AddressStats, Transaction, TxInput, TxOutput, TxStatus, Utxo},
};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;

pub const BLOCKCYPHER_TESTNET_URL: &str = "https://api.blockcypher.com/v1/btc/test3";

/// BlockCypher REST API, mapped into the normalized models.
pub struct BlockCypherProvider {
    http: ExplorerHttp,
}

impl BlockCypherProvider {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        settings: &ClientSettings,
    ) -> Result<Self, ProviderError> {
        let mut http = ExplorerHttp::new(base_url, settings)?;
        match token {
            Some(token) => http = http.with_query("token", token),
            None => tracing::warn!("No BlockCypher token configured, using free tier limits"),
        }
        Ok(Self { http })
    }
}

#[derive(Debug, Deserialize)]
struct BcChain {
    height: u64,
}

#[derive(Debug, Deserialize)]
struct BcAddress {
    address: String,
    #[serde(default)]
    total_received: u64,
    #[serde(default)]
    total_sent: u64,
    #[serde(default)]
    unconfirmed_balance: i64,
    #[serde(default)]
    n_tx: u64,
    #[serde(default)]
    unconfirmed_n_tx: u64,
    #[serde(default)]
    txrefs: Vec<BcTxRef>,
    #[serde(default)]
    unconfirmed_txrefs: Vec<BcTxRef>,
}

#[derive(Debug, Deserialize)]
struct BcTxRef {
    tx_hash: String,
    #[serde(default)]
    block_height: i64,
    #[serde(default)]
    tx_output_n: i64,
    value: u64,
    #[serde(default)]
    confirmations: u64,
    #[serde(default)]
    confirmed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BcTransactions {
    #[serde(default)]
    txs: Vec<BcTransaction>,
}

#[derive(Debug, Deserialize)]
struct BcTransaction {
    hash: String,
    #[serde(default)]
    block_height: i64,
    #[serde(default)]
    block_hash: Option<String>,
    #[serde(default)]
    confirmations: u64,
    #[serde(default)]
    confirmed: Option<String>,
    #[serde(default)]
    inputs: Vec<BcInput>,
    #[serde(default)]
    outputs: Vec<BcOutput>,
}

#[derive(Debug, Deserialize)]
struct BcInput {
    #[serde(default)]
    prev_hash: Option<String>,
    #[serde(default)]
    output_index: i64,
    #[serde(default)]
    output_value: Option<u64>,
    #[serde(default)]
    script_type: Option<String>,
    #[serde(default)]
    script: Option<String>,
    #[serde(default)]
    addresses: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct BcOutput {
    #[serde(default)]
    value: u64,
    #[serde(default)]
    script: Option<String>,
    #[serde(default)]
    script_type: Option<String>,
    #[serde(default)]
    addresses: Option<Vec<String>>,
}

fn block_time(confirmed: Option<&str>) -> Option<i64> {
    confirmed
        .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
        .map(|t| t.timestamp())
}

fn positive_height(height: i64) -> Option<u64> {
    u64::try_from(height).ok().filter(|h| *h > 0)
}

fn first_address(addresses: Option<Vec<String>>) -> Option<String> {
    addresses.and_then(|a| a.into_iter().next())
}

impl From<BcTransaction> for Transaction {
    fn from(tx: BcTransaction) -> Self {
        let vin = tx
            .inputs
            .into_iter()
            .map(|input| TxInput {
                txid: input.prev_hash.unwrap_or_default(),
                vout: u32::try_from(input.output_index).unwrap_or_default(),
                prevout: Some(TxOutput {
                    scriptpubkey: input.script.unwrap_or_default(),
                    scriptpubkey_type: input.script_type.unwrap_or_default(),
                    scriptpubkey_address: first_address(input.addresses),
                    value: input.output_value.unwrap_or_default(),
                }),
            })
            .collect();

        let vout = tx
            .outputs
            .into_iter()
            .map(|output| TxOutput {
                scriptpubkey: output.script.unwrap_or_default(),
                scriptpubkey_type: output.script_type.unwrap_or_default(),
                scriptpubkey_address: first_address(output.addresses),
                value: output.value,
            })
            .collect();

        Transaction {
            txid: tx.hash,
            vin,
            vout,
            status: TxStatus {
                confirmed: tx.confirmations > 0,
                block_height: positive_height(tx.block_height),
                block_hash: tx.block_hash,
                block_time: block_time(tx.confirmed.as_deref()),
            },
        }
    }
}

impl From<BcTxRef> for Utxo {
    fn from(txref: BcTxRef) -> Self {
        Utxo {
            txid: txref.tx_hash,
            vout: u32::try_from(txref.tx_output_n).unwrap_or_default(),
            value: txref.value,
            status: TxStatus {
                confirmed: txref.confirmations > 0,
                block_height: positive_height(txref.block_height),
                block_hash: None,
                block_time: block_time(txref.confirmed.as_deref()),
            },
        }
    }
}

impl From<BcAddress> for AddressInfo {
    fn from(addr: BcAddress) -> Self {
        AddressInfo {
            address: addr.address,
            chain_stats: AddressStats {
                funded_txo_count: 0,
                funded_txo_sum: addr.total_received,
                spent_txo_count: 0,
                spent_txo_sum: addr.total_sent,
                tx_count: addr.n_tx.saturating_sub(addr.unconfirmed_n_tx),
            },
            mempool_stats: AddressStats {
                funded_txo_count: addr.unconfirmed_n_tx,
                funded_txo_sum: u64::try_from(addr.unconfirmed_balance).unwrap_or_default(),
                spent_txo_count: 0,
                spent_txo_sum: 0,
                tx_count: addr.unconfirmed_n_tx,
            },
        }
    }
}

#[async_trait]
impl BlockchainProvider for BlockCypherProvider {
    fn name(&self) -> &'static str {
        "blockcypher"
    }

    async fn get_address_info(&self, address: &str) -> Result<AddressInfo, ProviderError> {
        let addr: BcAddress = self.http.get_json(&format!("/addrs/{address}")).await?;
        Ok(addr.into())
    }

    async fn get_address_utxos(&self, address: &str) -> Result<Vec<Utxo>, ProviderError> {
        let addr: BcAddress = self
            .http
            .get_json(&format!("/addrs/{address}?unspentOnly=true"))
            .await?;
        Ok(addr
            .unconfirmed_txrefs
            .into_iter()
            .chain(addr.txrefs)
            .map(Utxo::from)
            .collect())
    }

    async fn get_address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<Transaction>, ProviderError> {
        let page: BcTransactions = self
            .http
            .get_json(&format!("/addrs/{address}/full"))
            .await?;
        Ok(page.txs.into_iter().map(Transaction::from).collect())
    }

    async fn get_transaction(&self, txid: &str) -> Result<Transaction, ProviderError> {
        let tx: BcTransaction = self.http.get_json(&format!("/txs/{txid}")).await?;
        Ok(tx.into())
    }

    async fn get_current_block_height(&self) -> Result<u64, ProviderError> {
        let chain: BcChain = self.http.get_json("").await?;
        Ok(chain.height)
    }

    fn rate_limit_status(&self) -> RateLimitStatus {
        self.http.rate_limit_status()
    }
}
