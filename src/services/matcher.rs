//! Matching a payment request against an address's transaction history.

use crate::{
    models::{PaymentReceipt, PaymentRequest, Transaction},
    units::{btc_to_sats, sats_to_btc},
};

/// Largest accepted difference between expected and received value (0.00001 BTC).
pub const AMOUNT_TOLERANCE_SATS: u64 = 1_000;

/// The first output that satisfies a request, before confirmations are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedOutput {
    pub txid: String,
    pub value_sats: u64,
    pub block_height: Option<u64>,
    pub block_time: i64,
    pub mined: bool,
}

impl MatchedOutput {
    /// `tip - block_height + 1`, floored at 0; 0 when the block is unknown.
    pub fn confirmations(&self, tip_height: u64) -> u64 {
        self.block_height
            .map(|height| (tip_height + 1).saturating_sub(height))
            .unwrap_or(0)
    }

    pub fn into_receipt(self, tip_height: u64, min_confirmations: u64) -> PaymentReceipt {
        let confirmations = self.confirmations(tip_height);
        PaymentReceipt {
            amount: sats_to_btc(self.value_sats),
            transaction_id: self.txid,
            confirmations,
            timestamp: self.block_time,
            confirmed: self.mined && confirmations >= min_confirmations,
        }
    }
}

/// Scans `transactions` in the order given and returns the first output paying
/// `request.address` within tolerance of `request.amount`.
///
/// Transactions without a block time (unmined) or mined before the request was
/// created are skipped.
pub fn find_matching_output(
    request: &PaymentRequest,
    transactions: &[Transaction],
) -> Option<MatchedOutput> {
    let since = request.since_timestamp();
    let expected = btc_to_sats(request.amount);

    transactions.iter().find_map(|tx| {
        let block_time = tx.status.block_time?;
        if block_time < since {
            return None;
        }

        tx.vout
            .iter()
            .filter(|out| out.scriptpubkey_address.as_deref() == Some(request.address.as_str()))
            .find(|out| out.value.abs_diff(expected) <= AMOUNT_TOLERANCE_SATS)
            .map(|out| MatchedOutput {
                txid: tx.txid.clone(),
                value_sats: out.value,
                block_height: tx.status.block_height,
                block_time,
                mined: tx.status.confirmed,
            })
    })
}

/// Full match: the receipt for the first qualifying output, or `None`.
pub fn find_payment(
    request: &PaymentRequest,
    transactions: &[Transaction],
    tip_height: u64,
    min_confirmations: u64,
) -> Option<PaymentReceipt> {
    find_matching_output(request, transactions)
        .map(|matched| matched.into_receipt(tip_height, min_confirmations))
}
