pub mod chain;
pub mod payment;
pub mod response;
pub mod wallet;

pub use chain::*;
pub use payment::*;
pub use response::*;
pub use wallet::*;
