use anyhow::{Context, Result};
use btcpay_monitor::{
    client::{PaymentPoller, PollingListener, PollingState, StatusClient},
    config::PollingConfig,
    models::PaymentReceipt,
    telemetry,
    validation::parse_amount,
};
use std::{sync::Arc, time::Duration};

struct ConsoleListener;

impl PollingListener for ConsoleListener {
    fn on_payment_received(&self, receipt: &PaymentReceipt) {
        println!();
        println!("[SUCCESS] Payment received!");
        println!("   Transaction: {}", receipt.transaction_id);
        println!("   Amount: {} BTC", receipt.amount);
        println!("   Confirmations: {}", receipt.confirmations);
    }

    fn on_error(&self, message: &str) {
        println!("[ERROR] Payment monitoring error: {}", message);
    }

    fn on_rate_limited(&self, delay: Duration) {
        println!(
            "[WAIT] Rate limited. Waiting {}s before next attempt.",
            delay.as_secs()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let polling = PollingConfig::from_env()?;
    let base_url = std::env::var("WATCHER_SERVER_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());
    let amount_arg = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WATCHER_AMOUNT").ok())
        .context("Usage: payment-watcher <amount-btc> (or set WATCHER_AMOUNT)")?;
    let amount = parse_amount(&amount_arg)?;

    println!("Bitcoin Payment Watcher");
    println!("=======================");
    println!("Server: {}", base_url);
    println!();

    let client = Arc::new(StatusClient::new(&base_url)?);

    let wallet = client.create_wallet().await?;
    println!("Receiving address: {}", wallet.address);
    println!("Public key: {}", wallet.public_key);

    let request = client
        .create_payment(&wallet.address, amount, Some("Payment watcher"), None)
        .await?;
    println!();
    println!("Send {} BTC using:", request.amount);
    println!("   {}", request.payment_uri);
    println!();

    let mut poller = PaymentPoller::new(polling, client, Some(request))
        .with_listener(Arc::new(ConsoleListener));
    let mut updates = poller.subscribe();
    poller.start();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                match snapshot.state {
                    PollingState::Polling => {
                        if let Some(secs) = snapshot.next_attempt_in_secs {
                            tracing::debug!(secs, "Next attempt countdown");
                        } else {
                            println!(
                                "Checking... attempt {}/{} (every {}s)",
                                snapshot.attempts,
                                snapshot.max_attempts,
                                snapshot.current_interval.as_secs()
                            );
                        }
                    }
                    PollingState::Confirmed => break,
                    PollingState::Failed => {
                        println!("Payment monitoring timed out. Run again to retry.");
                        break;
                    }
                    PollingState::Idle | PollingState::Stopped => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                poller.stop();
                println!("Stopped.");
                break;
            }
        }
    }

    Ok(())
}
