#![allow(dead_code)]

use async_trait::async_trait;
use btcpay_monitor::{
    error::ProviderError,
    handlers::{router, AppState},
    models::{AddressInfo, Transaction, TxOutput, TxStatus, Utxo},
    services::{BlockchainProvider, CacheService, PaymentService, WalletService},
};
use axum::Router;
use bitcoin::Network;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const PAYEE: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
pub const MAINNET_PAYEE: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Healthy,
    RateLimited(Option<u64>),
    Unavailable,
}

/// In-memory provider with scripted history and failure mode.
pub struct FakeProvider {
    pub transactions: Mutex<Vec<Transaction>>,
    pub tip_height: u64,
    pub behaviour: Mutex<Behaviour>,
}

impl FakeProvider {
    pub fn new(tip_height: u64) -> Arc<Self> {
        Arc::new(Self {
            transactions: Mutex::new(Vec::new()),
            tip_height,
            behaviour: Mutex::new(Behaviour::Healthy),
        })
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn push(&self, tx: Transaction) {
        self.transactions.lock().unwrap().push(tx);
    }

    fn gate(&self) -> Result<(), ProviderError> {
        match *self.behaviour.lock().unwrap() {
            Behaviour::Healthy => Ok(()),
            Behaviour::RateLimited(retry_after) => Err(ProviderError::RateLimited { retry_after }),
            Behaviour::Unavailable => Err(ProviderError::Service { status: 503 }),
        }
    }
}

#[async_trait]
impl BlockchainProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn get_address_info(&self, address: &str) -> Result<AddressInfo, ProviderError> {
        self.gate()?;
        Ok(AddressInfo {
            address: address.to_string(),
            ..Default::default()
        })
    }

    async fn get_address_utxos(&self, _address: &str) -> Result<Vec<Utxo>, ProviderError> {
        self.gate()?;
        Ok(Vec::new())
    }

    async fn get_address_transactions(
        &self,
        _address: &str,
    ) -> Result<Vec<Transaction>, ProviderError> {
        self.gate()?;
        Ok(self.transactions.lock().unwrap().clone())
    }

    async fn get_transaction(&self, txid: &str) -> Result<Transaction, ProviderError> {
        self.gate()?;
        self.transactions
            .lock()
            .unwrap()
            .iter()
            .find(|tx| tx.txid == txid)
            .cloned()
            .ok_or(ProviderError::Request {
                status: Some(404),
                message: "Transaction not found".into(),
            })
    }

    async fn get_current_block_height(&self) -> Result<u64, ProviderError> {
        self.gate()?;
        Ok(self.tip_height)
    }
}

pub fn mined_payment(txid: &str, address: &str, sats: u64, height: u64, time: i64) -> Transaction {
    Transaction {
        txid: txid.to_string(),
        vin: Vec::new(),
        vout: vec![TxOutput {
            scriptpubkey_address: Some(address.to_string()),
            value: sats,
            ..Default::default()
        }],
        status: TxStatus {
            confirmed: true,
            block_height: Some(height),
            block_hash: None,
            block_time: Some(time),
        },
    }
}

pub fn app(provider: Arc<FakeProvider>) -> Router {
    let payments = Arc::new(PaymentService::new(
        provider.clone(),
        Arc::new(CacheService::new(Duration::from_secs(10))),
        1,
    ));

    router(AppState {
        payments,
        wallets: Arc::new(WalletService::new(Network::Testnet)),
        provider,
        network: Network::Testnet,
        started_at: Instant::now(),
    })
}
