pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod telemetry;
pub mod units;
pub mod uri;
pub mod validation;
