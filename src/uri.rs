//! BIP21 `bitcoin:` URIs.

use crate::units::format_btc;
use url::form_urlencoded;

pub const BIP21_SCHEME: &str = "bitcoin";

/// `bitcoin:<address>?amount=<btc>[&label=..][&message=..]`
///
/// Empty labels and messages are treated as absent.
pub fn build_payment_uri(
    address: &str,
    amount: f64,
    label: Option<&str>,
    message: Option<&str>,
) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("amount", &format_btc(amount));
    if let Some(label) = label.filter(|l| !l.is_empty()) {
        query.append_pair("label", label);
    }
    if let Some(message) = message.filter(|m| !m.is_empty()) {
        query.append_pair("message", message);
    }
    format!("{}:{}?{}", BIP21_SCHEME, address, query.finish())
}
