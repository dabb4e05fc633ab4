use std::sync::Arc;
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::WatchError;
use crate::ledger::{LedgerClient, LedgerMatch};
use crate::payment::PaymentReference;

/// Presence check only needs the newest transaction
const QUERY_LIMIT: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
    /// Give up after this many failed queries in a row; `None` retries until timeout
    pub max_consecutive_failures: Option<u32>,
}

impl PollOptions {
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self, WatchError> {
        if interval.is_zero() {
            return Err(WatchError::ZeroInterval);
        }
        if timeout.is_zero() {
            return Err(WatchError::ZeroTimeout);
        }

        Ok(Self {
            interval,
            timeout,
            max_consecutive_failures: None,
        })
    }

    /// A missing timeout is a configuration error, never an unbounded poll
    pub fn from_millis(interval_ms: u64, timeout_ms: Option<u64>) -> Result<Self, WatchError> {
        let timeout_ms = timeout_ms.ok_or(WatchError::MissingTimeout)?;
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    pub fn with_max_consecutive_failures(mut self, max: Option<u32>) -> Self {
        self.max_consecutive_failures = max.filter(|max| *max > 0);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Found(LedgerMatch),
    Cancelled,
    TimedOut { attempts: u32 },
    Failed { consecutive_failures: u32, last_error: String },
}

/// Polls the ledger for a referenced transaction.
///
/// Each query is awaited before the next tick is taken, so at most one query
/// is ever in flight; ticks that fire during a slow query are skipped. The
/// deadline and cancellation both interrupt a query that is still running.
pub struct LedgerPoller {
    ledger: Arc<dyn LedgerClient>,
}

impl LedgerPoller {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    pub async fn watch(
        &self,
        reference: &PaymentReference,
        options: &PollOptions,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let deadline = Instant::now() + options.timeout;
        let mut ticker = interval(options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut attempts = 0u32;
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                _ = sleep_until(deadline) => return PollOutcome::TimedOut { attempts },
                _ = ticker.tick() => {}
            }

            attempts += 1;
            // An in-flight query never outlives the session
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Discarding poll result for cancelled reference {}", reference);
                    return PollOutcome::Cancelled;
                }
                _ = sleep_until(deadline) => return PollOutcome::TimedOut { attempts },
                result = self.ledger.find_by_reference(reference, QUERY_LIMIT) => result,
            };

            match result {
                Ok(matches) => {
                    if let Some(found) = matches.into_iter().next() {
                        debug!("🔎 Reference {} found in {}", reference, found.signature);
                        return PollOutcome::Found(found);
                    }
                    consecutive_failures = 0;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        "Ledger query failed for {} ({} in a row): {}",
                        reference, consecutive_failures, e
                    );

                    if let Some(max) = options.max_consecutive_failures {
                        if consecutive_failures >= max {
                            return PollOutcome::Failed {
                                consecutive_failures,
                                last_error: e.to_string(),
                            };
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::PaymentError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Ledger fake answering from a script, then with the fallback
    pub(crate) struct ScriptedLedger {
        script: Mutex<VecDeque<Result<Vec<LedgerMatch>, PaymentError>>>,
        fallback: Vec<LedgerMatch>,
        latency: Duration,
        pub calls: AtomicUsize,
        in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl ScriptedLedger {
        pub(crate) fn new(script: Vec<Result<Vec<LedgerMatch>, PaymentError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback: Vec::new(),
                latency: Duration::ZERO,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub(crate) fn with_fallback(mut self, fallback: Vec<LedgerMatch>) -> Self {
            self.fallback = fallback;
            self
        }

        pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LedgerClient for ScriptedLedger {
        async fn find_by_reference(
            &self,
            _reference: &PaymentReference,
            limit: usize,
        ) -> Result<Vec<LedgerMatch>, PaymentError> {
            assert_eq!(limit, QUERY_LIMIT);
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }

    fn options(interval_ms: u64, timeout_ms: u64) -> PollOptions {
        PollOptions::from_millis(interval_ms, Some(timeout_ms)).unwrap()
    }

    fn reference() -> PaymentReference {
        PaymentReference::generate().unwrap()
    }

    #[test]
    fn test_options_require_timeout() {
        assert_eq!(
            PollOptions::from_millis(3000, None),
            Err(WatchError::MissingTimeout)
        );
        assert_eq!(
            PollOptions::from_millis(0, Some(1000)),
            Err(WatchError::ZeroInterval)
        );
        assert_eq!(
            PollOptions::from_millis(3000, Some(0)),
            Err(WatchError::ZeroTimeout)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_found_on_second_tick() {
        let ledger = Arc::new(ScriptedLedger::new(vec![
            Ok(vec![]),
            Ok(vec![LedgerMatch::new("abc", 42)]),
        ]));
        let poller = LedgerPoller::new(ledger.clone());
        let started = Instant::now();

        let outcome = poller
            .watch(&reference(), &options(3000, 60_000), &CancellationToken::new())
            .await;

        assert_eq!(outcome, PollOutcome::Found(LedgerMatch::new("abc", 42)));
        assert_eq!(ledger.calls(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_fourth_tick() {
        let ledger = Arc::new(ScriptedLedger::new(vec![]));
        let poller = LedgerPoller::new(ledger.clone());
        let started = Instant::now();

        let outcome = poller
            .watch(&reference(), &options(3000, 10_000), &CancellationToken::new())
            .await;

        // ticks at 0s, 3s, 6s, 9s; deadline at 10s
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 4 });
        assert_eq!(ledger.calls(), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_cannot_outlive_timeout() {
        let ledger = Arc::new(
            ScriptedLedger::new(vec![Ok(vec![LedgerMatch::new("too-late", 1)])])
                .with_latency(Duration::from_millis(60_000)),
        );
        let poller = LedgerPoller::new(ledger.clone());
        let started = Instant::now();

        let outcome = poller
            .watch(&reference(), &options(3000, 10_000), &CancellationToken::new())
            .await;

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 1 });
        assert_eq!(ledger.calls(), 1);
        assert_eq!(started.elapsed(), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_queries_never_overlap() {
        let ledger = Arc::new(ScriptedLedger::new(vec![]).with_latency(Duration::from_millis(5000)));
        let poller = LedgerPoller::new(ledger.clone());

        let outcome = poller
            .watch(&reference(), &options(1000, 20_000), &CancellationToken::new())
            .await;

        assert!(matches!(outcome, PollOutcome::TimedOut { .. }));
        assert_eq!(ledger.max_in_flight.load(Ordering::SeqCst), 1);
        // 0s, 5s, 10s, 15s; the query started at 15s is cut off at 20s
        assert_eq!(ledger.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let ledger = Arc::new(ScriptedLedger::new(vec![
            Err(PaymentError::LedgerQueryFailed("503".into())),
            Err(PaymentError::LedgerQueryFailed("503".into())),
            Ok(vec![]),
            Err(PaymentError::LedgerQueryFailed("503".into())),
            Ok(vec![LedgerMatch::new("late", 7)]),
        ]));
        let poller = LedgerPoller::new(ledger.clone());
        let opts = options(1000, 60_000).with_max_consecutive_failures(Some(3));

        let outcome = poller
            .watch(&reference(), &opts, &CancellationToken::new())
            .await;

        assert_eq!(outcome, PollOutcome::Found(LedgerMatch::new("late", 7)));
        assert_eq!(ledger.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failures_exhaust() {
        let failures = (0..3)
            .map(|_| Err(PaymentError::LedgerQueryFailed("connection refused".into())))
            .collect();
        let ledger = Arc::new(ScriptedLedger::new(failures));
        let poller = LedgerPoller::new(ledger.clone());
        let opts = options(1000, 60_000).with_max_consecutive_failures(Some(3));

        let outcome = poller
            .watch(&reference(), &opts, &CancellationToken::new())
            .await;

        match outcome {
            PollOutcome::Failed {
                consecutive_failures,
                last_error,
            } => {
                assert_eq!(consecutive_failures, 3);
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticking() {
        let ledger = Arc::new(ScriptedLedger::new(vec![]));
        let poller = LedgerPoller::new(ledger.clone());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(4500)).await;
            canceller.cancel();
        });

        let outcome = poller.watch(&reference(), &options(3000, 60_000), &cancel).await;

        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(ledger.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_result_discarded_after_cancel() {
        let ledger = Arc::new(
            ScriptedLedger::new(vec![Ok(vec![LedgerMatch::new("too-late", 1)])])
                .with_latency(Duration::from_millis(2000)),
        );
        let poller = LedgerPoller::new(ledger.clone());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let outcome = poller.watch(&reference(), &options(3000, 60_000), &cancel).await;

        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(ledger.calls(), 1);
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }
}
