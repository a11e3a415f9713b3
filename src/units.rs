//! BTC / satoshi conversions and display formatting.

pub const SATS_PER_BTC: u64 = 100_000_000;

/// Hard cap on the number of bitcoin that will ever exist.
pub const MAX_BTC: f64 = 21_000_000.0;

/// Maximum number of fractional digits a BTC amount can carry.
pub const BTC_DECIMALS: usize = 8;

/// Rounds to the nearest satoshi. Negative and non-finite input yields 0.
pub fn btc_to_sats(btc: f64) -> u64 {
    if !btc.is_finite() || btc <= 0.0 {
        return 0;
    }
    (btc * SATS_PER_BTC as f64).round() as u64
}

pub fn sats_to_btc(sats: u64) -> f64 {
    sats as f64 / SATS_PER_BTC as f64
}

/// Formats with at most 8 decimals, dropping trailing zeros and a dangling point.
pub fn format_btc(amount: f64) -> String {
    let fixed = format!("{:.*}", BTC_DECIMALS, amount);
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        fixed
    }
}
