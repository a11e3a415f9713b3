//! Client side of the payment flow: an HTTP client for the server API and the
//! polling scheduler that watches one payment request until it settles.

pub mod poller;
pub mod status;

pub use poller::{
    PaymentPoller, PollError, PollingListener, PollingSnapshot, PollingState, StatusSource,
};
pub use status::StatusClient;
