use crate::models::PublicWalletInfo;
use bip39::{Language, Mnemonic};
use bitcoin::{
    bip32::{ChildNumber, DerivationPath, Xpriv},
    secp256k1::{All, Secp256k1},
    Address, CompressedPublicKey, Network, PrivateKey,
};
use std::str::FromStr;
use thiserror::Error;

/// BIP44 account path with the testnet coin type; the address index is appended.
pub const ACCOUNT_PATH: &str = "m/44'/1'/0'/0";

const MNEMONIC_WORDS: usize = 12;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Failed to generate mnemonic: {0}")]
    Mnemonic(String),

    #[error("Invalid mnemonic phrase: {0}")]
    InvalidMnemonic(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),
}

/// An in-memory HD wallet at a single derivation index.
///
/// Secret material never leaves the process; only [`HdWallet::public_info`] is
/// meant for the HTTP surface.
#[derive(Debug, Clone)]
pub struct HdWallet {
    pub mnemonic: String,
    pub derivation_path: String,
    pub address: String,
    pub private_key_wif: String,
    /// Compressed public key, hex.
    pub public_key: String,
}

impl HdWallet {
    pub fn public_info(&self) -> PublicWalletInfo {
        PublicWalletInfo {
            address: self.address.clone(),
            public_key: self.public_key.clone(),
        }
    }
}

/// BIP39 / BIP32 key derivation producing P2WPKH addresses.
pub struct WalletService {
    network: Network,
    secp: Secp256k1<All>,
}

impl WalletService {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            secp: Secp256k1::new(),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Fresh 12-word mnemonic, first receive address.
    pub fn generate_wallet(&self) -> Result<HdWallet, WalletError> {
        let mnemonic = Mnemonic::generate(MNEMONIC_WORDS)
            .map_err(|e| WalletError::Mnemonic(e.to_string()))?;
        let wallet = self.derive(&mnemonic, 0)?;

        tracing::info!(address = %wallet.address, "Generated wallet");
        Ok(wallet)
    }

    pub fn restore_from_mnemonic(&self, phrase: &str) -> Result<HdWallet, WalletError> {
        let mnemonic = parse_mnemonic(phrase)?;
        self.derive(&mnemonic, 0)
    }

    /// `count` consecutive receive wallets starting at index `start`.
    pub fn derive_addresses(
        &self,
        phrase: &str,
        count: u32,
        start: u32,
    ) -> Result<Vec<HdWallet>, WalletError> {
        let mnemonic = parse_mnemonic(phrase)?;
        (start..start.saturating_add(count))
            .map(|index| self.derive(&mnemonic, index))
            .collect()
    }

    fn derive(&self, mnemonic: &Mnemonic, index: u32) -> Result<HdWallet, WalletError> {
        let seed = mnemonic.to_seed("");
        let master = Xpriv::new_master(self.network, &seed)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;

        let child = ChildNumber::from_normal_idx(index)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;
        let path = DerivationPath::from_str(ACCOUNT_PATH)
            .map_err(|e| WalletError::Derivation(e.to_string()))?
            .child(child);

        let derived = master
            .derive_priv(&self.secp, &path)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;

        let private_key = PrivateKey::new(derived.private_key, self.network);
        let public_key = CompressedPublicKey::from_private_key(&self.secp, &private_key)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;
        let address = Address::p2wpkh(&public_key, self.network);

        Ok(HdWallet {
            mnemonic: mnemonic.to_string(),
            derivation_path: path.to_string(),
            address: address.to_string(),
            private_key_wif: private_key.to_wif(),
            public_key: hex::encode(public_key.to_bytes()),
        })
    }
}

fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, WalletError> {
    Mnemonic::parse_in_normalized(Language::English, phrase.trim())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}
