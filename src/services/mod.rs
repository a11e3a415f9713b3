pub mod blockchain;
pub mod cache;
pub mod matcher;
pub mod payment;
pub mod wallet;

pub use blockchain::{BlockCypherProvider, BlockchainProvider, MempoolProvider};
pub use cache::CacheService;
pub use payment::PaymentService;
pub use wallet::{HdWallet, WalletError, WalletService};
