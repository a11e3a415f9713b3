//! Payment polling scheduler.
//!
//! One [`PaymentPoller`] watches one payment request. Each session runs as a single
//! task that performs a status check, applies the outcome and only then schedules
//! the next check, so two checks are never in flight at once. A session ends when
//! the payment confirms, the attempt budget runs out, or it is cancelled.

use crate::{
    config::PollingConfig,
    models::{PaymentReceipt, PaymentRequest},
};
use async_trait::async_trait;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::watch,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

pub const MAX_ATTEMPTS_REACHED: &str = "Maximum polling attempts reached";

/// Failure of one status check as seen by the scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Rate limited")]
    RateLimited { retry_after: Option<u64> },

    #[error("{0}")]
    Request(String),
}

/// Where the scheduler gets payment status from.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    /// `Ok(None)` while no matching payment exists.
    async fn check_status(
        &self,
        request: &PaymentRequest,
    ) -> Result<Option<PaymentReceipt>, PollError>;
}

/// Notifications for whoever drives the poller. All methods default to no-ops.
pub trait PollingListener: Send + Sync + 'static {
    /// Called once per session, when a confirmed receipt arrives.
    fn on_payment_received(&self, _receipt: &PaymentReceipt) {}

    fn on_error(&self, _message: &str) {}

    fn on_rate_limited(&self, _delay: Duration) {}
}

struct NoopListener;

impl PollingListener for NoopListener {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PollingState {
    Idle,
    Polling,
    Confirmed,
    Failed,
    Stopped,
}

/// Observable state of a poller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingSnapshot {
    pub state: PollingState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub current_interval: Duration,
    /// Sub-state of `Polling`: the last check was rate limited.
    pub is_rate_limited: bool,
    /// Countdown to the next check while backing off, one-second resolution.
    pub next_attempt_in_secs: Option<u64>,
    pub last_error: Option<String>,
    pub receipt: Option<PaymentReceipt>,
}

impl PollingSnapshot {
    pub fn initial(config: &PollingConfig) -> Self {
        Self {
            state: PollingState::Idle,
            attempts: 0,
            max_attempts: config.max_attempts,
            current_interval: config.base_interval,
            is_rate_limited: false,
            next_attempt_in_secs: None,
            last_error: None,
            receipt: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.state == PollingState::Polling
    }
}

pub struct PaymentPoller {
    config: PollingConfig,
    source: Arc<dyn StatusSource>,
    listener: Arc<dyn PollingListener>,
    request: Option<PaymentRequest>,
    snapshot: watch::Sender<PollingSnapshot>,
    session: Option<CancellationToken>,
}

impl PaymentPoller {
    pub fn new(
        config: PollingConfig,
        source: Arc<dyn StatusSource>,
        request: Option<PaymentRequest>,
    ) -> Self {
        let (snapshot, _) = watch::channel(PollingSnapshot::initial(&config));
        Self {
            config,
            source,
            listener: Arc::new(NoopListener),
            request,
            snapshot,
            session: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn PollingListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<PollingSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> PollingSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Begins a session: one check right away, then one per interval.
    ///
    /// Returns `false` without doing anything when already polling or when there
    /// is no payment request to watch.
    pub fn start(&mut self) -> bool {
        let Some(request) = self.request.clone() else {
            return false;
        };
        if self.snapshot.borrow().is_polling() {
            return false;
        }

        if let Some(previous) = self.session.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.session = Some(token.clone());

        self.snapshot.send_modify(|s| {
            s.state = PollingState::Polling;
            s.attempts = 0;
            s.current_interval = self.config.base_interval;
            s.is_rate_limited = false;
            s.next_attempt_in_secs = None;
            s.last_error = None;
        });

        tracing::info!(
            address = %request.address,
            amount = request.amount,
            interval_secs = self.config.base_interval.as_secs(),
            "Payment polling started"
        );

        let session = Session {
            config: self.config.clone(),
            source: self.source.clone(),
            listener: self.listener.clone(),
            request,
            snapshot: self.snapshot.clone(),
            token,
        };
        tokio::spawn(session.run());
        true
    }

    /// Cancels the running session. Terminal states are left as they are.
    pub fn stop(&mut self) {
        if let Some(token) = self.session.take() {
            token.cancel();
        }
        self.snapshot.send_if_modified(|s| {
            let was_polling = s.is_polling();
            if was_polling {
                s.state = PollingState::Stopped;
            }
            let had_countdown = s.next_attempt_in_secs.take().is_some();
            was_polling || had_countdown
        });
    }

    /// Stops and clears every accumulated value back to the initial snapshot.
    pub fn reset(&mut self) {
        self.stop();
        self.snapshot
            .send_replace(PollingSnapshot::initial(&self.config));
    }
}

impl Drop for PaymentPoller {
    fn drop(&mut self) {
        if let Some(token) = self.session.take() {
            token.cancel();
        }
    }
}

/// Result of applying one check to the snapshot.
enum Tick {
    Pending,
    Confirmed(PaymentReceipt),
    RateLimited(Duration),
    Failed(String),
    Exhausted(Option<String>),
}

struct Session {
    config: PollingConfig,
    source: Arc<dyn StatusSource>,
    listener: Arc<dyn PollingListener>,
    request: PaymentRequest,
    snapshot: watch::Sender<PollingSnapshot>,
    token: CancellationToken,
}

impl Session {
    async fn run(self) {
        let mut interval = self.config.base_interval;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                outcome = self.source.check_status(&self.request) => outcome,
            };

            let Some(tick) = self.apply(outcome, &mut interval) else {
                tracing::debug!("Discarding status result of a cancelled session");
                return;
            };

            match tick {
                Tick::Pending => {
                    tracing::debug!(address = %self.request.address, "Payment still pending");
                }
                Tick::Confirmed(receipt) => {
                    tracing::info!(
                        txid = %receipt.transaction_id,
                        confirmations = receipt.confirmations,
                        "Payment confirmed"
                    );
                    self.listener.on_payment_received(&receipt);
                    return;
                }
                Tick::RateLimited(delay) => {
                    tracing::warn!(
                        delay_secs = delay.as_secs(),
                        "Status check rate limited, backing off"
                    );
                    self.listener.on_rate_limited(delay);
                    if !self.countdown(delay).await {
                        return;
                    }
                    continue;
                }
                Tick::Failed(message) => {
                    tracing::debug!(error = %message, "Status check failed");
                    self.listener.on_error(&message);
                }
                Tick::Exhausted(last) => {
                    if let Some(message) = last {
                        self.listener.on_error(&message);
                    }
                    tracing::warn!(
                        attempts = self.config.max_attempts,
                        "Payment polling timed out"
                    );
                    self.listener.on_error(MAX_ATTEMPTS_REACHED);
                    return;
                }
            }

            tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                _ = time::sleep(interval) => {}
            }
        }
    }

    /// Folds one outcome into the snapshot. `None` when the session was cancelled
    /// while the check was in flight; the result is then dropped.
    fn apply(
        &self,
        outcome: Result<Option<PaymentReceipt>, PollError>,
        interval: &mut Duration,
    ) -> Option<Tick> {
        let config = &self.config;
        let mut tick = None;

        self.snapshot.send_if_modified(|s| {
            if self.token.is_cancelled() || !s.is_polling() {
                return false;
            }

            let applied = match outcome {
                Ok(receipt) => {
                    s.is_rate_limited = false;
                    s.last_error = None;
                    s.attempts += 1;
                    *interval = config.base_interval;
                    s.current_interval = config.base_interval;

                    match receipt {
                        Some(receipt) if receipt.confirmed => {
                            s.state = PollingState::Confirmed;
                            s.receipt = Some(receipt.clone());
                            Tick::Confirmed(receipt)
                        }
                        receipt => {
                            s.receipt = receipt;
                            Tick::Pending
                        }
                    }
                }
                Err(PollError::RateLimited { retry_after }) => {
                    let delay = match retry_after {
                        Some(secs) => Duration::from_secs(secs),
                        None => (*interval * 2).min(config.max_interval),
                    };
                    *interval = delay;
                    s.is_rate_limited = true;
                    s.current_interval = delay;
                    s.next_attempt_in_secs = whole_secs(delay);
                    Tick::RateLimited(delay)
                }
                Err(PollError::Request(message)) => {
                    s.attempts += 1;
                    s.last_error = Some(message.clone());
                    Tick::Failed(message)
                }
            };

            let applied = if s.is_polling() && s.attempts >= s.max_attempts {
                s.state = PollingState::Failed;
                s.next_attempt_in_secs = None;
                let last = match applied {
                    Tick::Failed(message) => Some(message),
                    _ => None,
                };
                s.last_error = Some(MAX_ATTEMPTS_REACHED.to_string());
                Tick::Exhausted(last)
            } else {
                applied
            };

            tick = Some(applied);
            true
        });

        tick
    }

    /// Waits out a backoff delay, publishing the seconds left once per second.
    /// Returns `false` if the session was cancelled meanwhile.
    async fn countdown(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        let sleep = time::sleep_until(deadline);
        tokio::pin!(sleep);
        let second = Duration::from_secs(1);
        let mut ticker = time::interval_at(Instant::now() + second, second);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return false,
                _ = &mut sleep => break,
                _ = ticker.tick() => {
                    let left = whole_secs(deadline.saturating_duration_since(Instant::now()));
                    self.publish_countdown(left);
                }
            }
        }

        self.publish_countdown(None);
        true
    }

    fn publish_countdown(&self, left: Option<u64>) {
        self.snapshot.send_if_modified(|s| {
            if self.token.is_cancelled() || s.next_attempt_in_secs == left {
                return false;
            }
            s.next_attempt_in_secs = left;
            true
        });
    }
}

/// Rounds up to whole seconds; `None` for zero.
fn whole_secs(duration: Duration) -> Option<u64> {
    let secs = duration.as_millis().div_ceil(1000) as u64;
    (secs > 0).then_some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    type Outcome = Result<Option<PaymentReceipt>, PollError>;

    #[derive(Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<Outcome>>,
        calls: Mutex<Vec<Instant>>,
        latency: Duration,
    }

    impl ScriptedSource {
        fn new(script: Vec<Outcome>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            })
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }

        fn gaps(&self) -> Vec<Duration> {
            self.calls().windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn check_status(&self, _: &PaymentRequest) -> Outcome {
            self.calls.lock().unwrap().push(Instant::now());
            if !self.latency.is_zero() {
                time::sleep(self.latency).await;
            }
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        received: AtomicU32,
        errors: Mutex<Vec<String>>,
        rate_limits: Mutex<Vec<Duration>>,
    }

    impl PollingListener for RecordingListener {
        fn on_payment_received(&self, _: &PaymentReceipt) {
            self.received.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }

        fn on_rate_limited(&self, delay: Duration) {
            self.rate_limits.lock().unwrap().push(delay);
        }
    }

    fn config(base: u64, max: u64, attempts: u32) -> PollingConfig {
        PollingConfig {
            base_interval: Duration::from_secs(base),
            max_interval: Duration::from_secs(max),
            max_attempts: attempts,
        }
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            address: "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx".into(),
            amount: 0.001,
            payment_uri: "bitcoin:tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx?amount=0.001".into(),
            label: None,
            message: None,
            created_at: Utc::now(),
        }
    }

    fn receipt(confirmed: bool) -> PaymentReceipt {
        PaymentReceipt {
            amount: 0.001,
            transaction_id: "abc".into(),
            confirmations: u64::from(confirmed),
            timestamp: 1_700_000_000,
            confirmed,
        }
    }

    fn rate_limited(retry_after: Option<u64>) -> Outcome {
        Err(PollError::RateLimited { retry_after })
    }

    fn poller(config: PollingConfig, source: Arc<ScriptedSource>) -> PaymentPoller {
        PaymentPoller::new(config, source, Some(request()))
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_ticks_do_not_spend_attempts() {
        let source = ScriptedSource::new(vec![
            rate_limited(None),
            Ok(None),
            rate_limited(Some(15)),
            rate_limited(None),
            Ok(None),
            rate_limited(None),
            Ok(None),
        ]);
        let listener = Arc::new(RecordingListener::default());
        let mut poller = poller(config(10, 60, 3), source.clone()).with_listener(listener.clone());
        let mut rx = poller.subscribe();

        assert!(poller.start());
        let done = rx
            .wait_for(|s| s.state == PollingState::Failed)
            .await
            .unwrap()
            .clone();

        assert_eq!(done.attempts, 3);
        assert_eq!(done.last_error.as_deref(), Some(MAX_ATTEMPTS_REACHED));
        assert_eq!(source.calls().len(), 7);
        assert_eq!(
            listener.errors.lock().unwrap().as_slice(),
            [MAX_ATTEMPTS_REACHED.to_string()]
        );
        assert_eq!(listener.rate_limits.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_delays_next_check() {
        let source = ScriptedSource::new(vec![rate_limited(Some(30)), Ok(None)]);
        let mut poller = poller(config(10, 300, 10), source.clone());
        let mut rx = poller.subscribe();

        poller.start();
        let limited = rx.wait_for(|s| s.is_rate_limited).await.unwrap().clone();
        assert_eq!(limited.state, PollingState::Polling);
        assert_eq!(limited.attempts, 0);
        assert_eq!(limited.current_interval, Duration::from_secs(30));
        assert_eq!(limited.next_attempt_in_secs, Some(30));

        time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(poller.snapshot().next_attempt_in_secs, Some(20));

        rx.wait_for(|s| s.attempts == 1).await.unwrap();
        let snapshot = poller.snapshot();
        assert!(!snapshot.is_rate_limited);
        assert_eq!(snapshot.next_attempt_in_secs, None);
        assert_eq!(snapshot.current_interval, Duration::from_secs(10));
        assert!(source.gaps()[0] >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_up_to_max_interval() {
        let source = ScriptedSource::new(vec![
            rate_limited(None),
            rate_limited(None),
            rate_limited(None),
            Ok(None),
            Ok(None),
        ]);
        let mut poller = poller(config(10, 35, 10), source.clone());
        let mut rx = poller.subscribe();

        poller.start();
        rx.wait_for(|s| s.attempts == 2).await.unwrap();

        let gaps: Vec<u64> = source.gaps().iter().map(Duration::as_secs).collect();
        assert_eq!(gaps, [20, 35, 35, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_polls_keep_base_interval() {
        let source = ScriptedSource::new(vec![Ok(None), Ok(None)]);
        let mut poller = poller(config(10, 300, 10), source.clone());
        let mut rx = poller.subscribe();

        poller.start();
        let first = rx.wait_for(|s| s.attempts == 1).await.unwrap().clone();
        let second = rx.wait_for(|s| s.attempts == 2).await.unwrap().clone();

        for snapshot in [&first, &second] {
            assert_eq!(snapshot.state, PollingState::Polling);
            assert_eq!(snapshot.current_interval, Duration::from_secs(10));
            assert_eq!(snapshot.receipt, None);
        }
        let gaps: Vec<u64> = source.gaps().iter().map(Duration::as_secs).collect();
        assert_eq!(gaps, [10]);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_notifies_once_and_ends_session() {
        let source = ScriptedSource::new(vec![
            Ok(None),
            Ok(Some(receipt(false))),
            Ok(Some(receipt(true))),
        ]);
        let listener = Arc::new(RecordingListener::default());
        let mut poller = poller(config(10, 300, 10), source.clone()).with_listener(listener.clone());
        let mut rx = poller.subscribe();

        poller.start();
        let unconfirmed = rx.wait_for(|s| s.receipt.is_some()).await.unwrap().clone();
        assert_eq!(unconfirmed.state, PollingState::Polling);

        let done = rx
            .wait_for(|s| s.state == PollingState::Confirmed)
            .await
            .unwrap()
            .clone();
        assert_eq!(done.receipt, Some(receipt(true)));
        assert_eq!(done.attempts, 3);

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.calls().len(), 3);
        assert_eq!(listener.received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ordinary_errors_are_not_fatal() {
        let source = ScriptedSource::new(vec![Err(PollError::Request("boom".into())), Ok(None)]);
        let listener = Arc::new(RecordingListener::default());
        let mut poller = poller(config(10, 300, 10), source.clone()).with_listener(listener.clone());
        let mut rx = poller.subscribe();

        poller.start();
        let failed = rx.wait_for(|s| s.attempts == 1).await.unwrap().clone();
        assert_eq!(failed.state, PollingState::Polling);
        assert_eq!(failed.last_error.as_deref(), Some("boom"));

        let recovered = rx.wait_for(|s| s.attempts == 2).await.unwrap().clone();
        assert_eq!(recovered.last_error, None);
        assert_eq!(listener.errors.lock().unwrap().as_slice(), ["boom".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_checks() {
        let source = ScriptedSource::new(vec![]);
        let mut poller = poller(config(10, 300, 10), source.clone());
        let mut rx = poller.subscribe();

        poller.start();
        rx.wait_for(|s| s.attempts == 1).await.unwrap();
        poller.stop();
        poller.stop();

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(poller.snapshot().state, PollingState::Stopped);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_keeps_terminal_state() {
        let source = ScriptedSource::new(vec![Ok(Some(receipt(true)))]);
        let mut poller = poller(config(10, 300, 10), source);
        let mut rx = poller.subscribe();

        poller.start();
        rx.wait_for(|s| s.state == PollingState::Confirmed)
            .await
            .unwrap();
        poller.stop();

        assert_eq!(poller.snapshot().state, PollingState::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn result_arriving_after_stop_is_discarded() {
        let source = Arc::new(ScriptedSource {
            script: Mutex::new(VecDeque::from([Ok(Some(receipt(true)))])),
            latency: Duration::from_secs(5),
            ..Default::default()
        });
        let listener = Arc::new(RecordingListener::default());
        let mut poller = poller(config(10, 300, 10), source).with_listener(listener.clone());

        poller.start();
        time::sleep(Duration::from_secs(1)).await;
        poller.stop();
        time::sleep(Duration::from_secs(30)).await;

        let snapshot = poller.snapshot();
        assert_eq!(snapshot.state, PollingState::Stopped);
        assert_eq!(snapshot.receipt, None);
        assert_eq!(listener.received.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_backoff_clears_countdown() {
        let source = ScriptedSource::new(vec![rate_limited(Some(60))]);
        let mut poller = poller(config(10, 300, 10), source.clone());
        let mut rx = poller.subscribe();

        poller.start();
        rx.wait_for(|s| s.is_rate_limited).await.unwrap();
        poller.stop();

        time::sleep(Duration::from_secs(120)).await;
        let snapshot = poller.snapshot();
        assert_eq!(snapshot.state, PollingState::Stopped);
        assert_eq!(snapshot.next_attempt_in_secs, None);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_initial_snapshot() {
        let config = config(10, 300, 10);
        let source = ScriptedSource::new(vec![rate_limited(None), Err(PollError::Request("x".into()))]);
        let mut poller = poller(config.clone(), source);
        let mut rx = poller.subscribe();

        poller.start();
        rx.wait_for(|s| s.attempts == 1).await.unwrap();
        poller.reset();

        assert_eq!(poller.snapshot(), PollingSnapshot::initial(&config));
    }

    #[tokio::test(start_paused = true)]
    async fn start_requires_request_and_idle_poller() {
        let source = ScriptedSource::new(vec![]);
        let mut idle = PaymentPoller::new(config(10, 300, 10), source.clone(), None);
        assert!(!idle.start());
        assert_eq!(idle.snapshot().state, PollingState::Idle);

        let mut poller = poller(config(10, 300, 10), source.clone());
        assert!(poller.start());
        assert!(!poller.start());

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_begins_fresh_session() {
        let source = ScriptedSource::new(vec![]);
        let mut poller = poller(config(10, 300, 10), source.clone());
        let mut rx = poller.subscribe();

        poller.start();
        rx.wait_for(|s| s.attempts == 2).await.unwrap();
        poller.stop();

        assert!(poller.start());
        assert_eq!(poller.snapshot().attempts, 0);
        rx.wait_for(|s| s.attempts == 1 && s.is_polling())
            .await
            .unwrap();
        assert_eq!(source.calls().len(), 3);
    }

    #[test]
    fn whole_secs_rounds_up() {
        assert_eq!(whole_secs(Duration::from_millis(1)), Some(1));
        assert_eq!(whole_secs(Duration::from_secs(30)), Some(30));
        assert_eq!(whole_secs(Duration::ZERO), None);
    }
}
