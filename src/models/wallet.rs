use serde::{Deserialize, Serialize};

/// The only wallet data that ever leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicWalletInfo {
    pub address: String,
    /// Compressed public key, hex.
    pub public_key: String,
}
