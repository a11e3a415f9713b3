//! Boundary validation for amounts, addresses and timestamps.
//!
//! Everything here runs before a request reaches the payment service; a value that
//! passes is never re-checked downstream.

use crate::models::AmountInput;
use crate::units::{BTC_DECIMALS, MAX_BTC};
use bitcoin::{Address, Network};
use chrono::{DateTime, TimeZone, Utc};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount is required")]
    AmountRequired,

    #[error("Amount must be a number")]
    AmountNotNumber,

    #[error("Amount must be greater than 0")]
    AmountNotPositive,

    #[error("Amount cannot exceed 21,000,000 BTC")]
    AmountTooLarge,

    #[error("Bitcoin supports maximum 8 decimal places")]
    TooManyDecimals,

    #[error("Address is required")]
    AddressRequired,

    #[error("Invalid Bitcoin address format")]
    InvalidAddress,

    #[error("Address is not valid for {0} network")]
    WrongNetwork(Network),

    #[error("Date is required")]
    DateRequired,

    #[error("Invalid date format")]
    InvalidDate,
}

pub fn validate_amount(amount: f64) -> Result<f64, ValidationError> {
    if !amount.is_finite() {
        return Err(ValidationError::AmountNotNumber);
    }
    if amount <= 0.0 {
        return Err(ValidationError::AmountNotPositive);
    }
    if amount > MAX_BTC {
        return Err(ValidationError::AmountTooLarge);
    }
    // Display for f64 is the shortest round-tripping form and never uses an exponent.
    let rendered = amount.to_string();
    let decimals = rendered.split_once('.').map_or(0, |(_, frac)| frac.len());
    if decimals > BTC_DECIMALS {
        return Err(ValidationError::TooManyDecimals);
    }
    Ok(amount)
}

pub fn parse_amount(input: &str) -> Result<f64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::AmountRequired);
    }
    let amount: f64 = trimmed
        .parse()
        .map_err(|_| ValidationError::AmountNotNumber)?;
    validate_amount(amount)
}

pub fn validate_amount_input(input: Option<&AmountInput>) -> Result<f64, ValidationError> {
    match input {
        None => Err(ValidationError::AmountRequired),
        Some(AmountInput::Number(n)) => validate_amount(*n),
        Some(AmountInput::Text(s)) => parse_amount(s),
    }
}

/// Checks the address parses and belongs to `network`, returning it trimmed.
pub fn validate_address(address: &str, network: Network) -> Result<String, ValidationError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::AddressRequired);
    }
    let unchecked = Address::from_str(trimmed).map_err(|_| ValidationError::InvalidAddress)?;
    unchecked
        .require_network(network)
        .map_err(|_| ValidationError::WrongNetwork(network))?;
    Ok(trimmed.to_string())
}

/// Accepts RFC 3339 or integer unix seconds.
pub fn parse_created_at(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::DateRequired);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let seconds: i64 = trimmed.parse().map_err(|_| ValidationError::InvalidDate)?;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or(ValidationError::InvalidDate)
}
