use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::notifications::{Notification, Notifier, Severity};
use crate::error::PaymentError;
use crate::payment::{PaymentReference, PaymentRequest};
use crate::settlement::{SettlementRequest, SettlementResult, SettlementTrigger};
use crate::watch::poller::{LedgerPoller, PollOptions, PollOutcome};

/// Lifecycle of a watch session: `Idle -> Pending -> terminal`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WatchStatus {
    Idle,
    Pending,
    /// The payment was seen and settlement was attempted, whatever its result
    Settled {
        detected_signature: String,
        settlement: SettlementResult,
    },
    Cancelled,
    TimedOut {
        attempts: u32,
    },
    Failed {
        reason: String,
    },
}

impl WatchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WatchStatus::Idle | WatchStatus::Pending)
    }
}

/// What to do when a session starts while another is still pending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    #[default]
    CancelExisting,
    Reject,
}

/// Payment to wait for plus the settlement to run once it lands
#[derive(Debug, Clone)]
pub struct WatchRequest {
    pub recipient: Pubkey,
    pub amount_minor_units: u64,
    pub note: String,
    pub settlement: SettlementRequest,
}

/// Caller's view of one session; cheap to clone
#[derive(Debug, Clone)]
pub struct WatchHandle {
    id: Uuid,
    reference: PaymentReference,
    uri: String,
    cancel: CancellationToken,
    status: watch::Receiver<WatchStatus>,
}

impl WatchHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn reference(&self) -> &PaymentReference {
        &self.reference
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn status(&self) -> WatchStatus {
        self.status.borrow().clone()
    }

    /// Stop future ticks; no-op once the session has finished
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolve with the terminal status
    pub async fn wait(&self) -> WatchStatus {
        let mut status = self.status.clone();
        if let Ok(terminal) = status.wait_for(WatchStatus::is_terminal).await {
            return terminal.clone();
        }
        // Sender dropped without reaching a terminal state
        self.status()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchSnapshot {
    pub id: Uuid,
    pub reference: PaymentReference,
    pub uri: String,
    pub status: WatchStatus,
    pub started_at: DateTime<Utc>,
}

struct ActiveWatch {
    handle: WatchHandle,
    task: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

impl ActiveWatch {
    /// A task that died before reporting a terminal status counts as finished
    fn is_running(&self) -> bool {
        !self.handle.status().is_terminal() && !self.task.is_finished()
    }
}

/// Owns the one watch session allowed at a time
pub struct WatchManager {
    poller: Arc<LedgerPoller>,
    settlement: Arc<dyn SettlementTrigger>,
    notifier: Arc<dyn Notifier>,
    options: PollOptions,
    policy: SessionPolicy,
    label: String,
    active: Mutex<Option<ActiveWatch>>,
}

impl WatchManager {
    pub fn new(
        poller: Arc<LedgerPoller>,
        settlement: Arc<dyn SettlementTrigger>,
        notifier: Arc<dyn Notifier>,
        options: PollOptions,
        policy: SessionPolicy,
        label: impl Into<String>,
    ) -> Self {
        Self {
            poller,
            settlement,
            notifier,
            options,
            policy,
            label: label.into(),
            active: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Mint a reference, publish the transfer URI, and start polling
    ///
    /// A session being replaced is awaited without holding the lock, so
    /// readers still see it while it finishes a slow settlement.
    pub async fn start(&self, request: WatchRequest) -> Result<WatchHandle, PaymentError> {
        loop {
            let previous = {
                let mut active = self.active.lock().await;
                let running = active
                    .as_ref()
                    .filter(|watch| watch.is_running())
                    .map(|watch| watch.handle.clone());

                match running {
                    Some(_) if self.policy == SessionPolicy::Reject => {
                        return Err(PaymentError::SessionAlreadyActive);
                    }
                    Some(previous) => previous,
                    None => {
                        let watch = self.launch(request)?;
                        let handle = watch.handle.clone();
                        *active = Some(watch);
                        return Ok(handle);
                    }
                }
            };

            info!("Replacing active watch session {}", previous.id);
            previous.cancel();
            previous.wait().await;
        }
    }

    fn launch(&self, request: WatchRequest) -> Result<ActiveWatch, PaymentError> {
        let reference = PaymentReference::generate()?;
        let payment = PaymentRequest::new(
            request.recipient,
            request.amount_minor_units,
            request.note,
            reference,
        );
        let uri = payment.encode(&self.label);

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(WatchStatus::Pending);

        let handle = WatchHandle {
            id,
            reference,
            uri,
            cancel: cancel.clone(),
            status: status_rx,
        };

        self.notifier.notify(Notification::new(
            Some(id),
            format!(
                "Waiting for payment of {} SOL to {}",
                payment.amount(),
                payment.recipient
            ),
            Severity::Info,
        ));

        let session = Session {
            id,
            reference,
            poller: self.poller.clone(),
            settlement: self.settlement.clone(),
            notifier: self.notifier.clone(),
            options: self.options.clone(),
            settlement_request: request.settlement,
            cancel,
            status: status_tx,
        };
        let task = tokio::spawn(session.run());

        Ok(ActiveWatch {
            handle,
            task,
            started_at: Utc::now(),
        })
    }

    /// Cancel the active session, returning its final status
    pub async fn cancel(&self) -> Option<WatchStatus> {
        let handle = {
            let active = self.active.lock().await;
            active.as_ref().map(|watch| watch.handle.clone())
        }?;

        handle.cancel();
        Some(handle.wait().await)
    }

    pub async fn current(&self) -> Option<WatchSnapshot> {
        let active = self.active.lock().await;
        active.as_ref().map(|watch| WatchSnapshot {
            id: watch.handle.id,
            reference: watch.handle.reference,
            uri: watch.handle.uri.clone(),
            status: watch.handle.status(),
            started_at: watch.started_at,
        })
    }

    pub async fn status(&self) -> WatchStatus {
        self.current()
            .await
            .map(|snapshot| snapshot.status)
            .unwrap_or(WatchStatus::Idle)
    }
}

/// State moved into the spawned session task
struct Session {
    id: Uuid,
    reference: PaymentReference,
    poller: Arc<LedgerPoller>,
    settlement: Arc<dyn SettlementTrigger>,
    notifier: Arc<dyn Notifier>,
    options: PollOptions,
    settlement_request: SettlementRequest,
    cancel: CancellationToken,
    status: watch::Sender<WatchStatus>,
}

impl Session {
    #[instrument(skip_all, fields(session = %self.id, reference = %self.reference))]
    async fn run(self) {
        let outcome = self
            .poller
            .watch(&self.reference, &self.options, &self.cancel)
            .await;

        let (status, message, severity) = match outcome {
            PollOutcome::Found(found) => {
                info!("💰 Payment detected in {}", found.signature);

                // The poller has stopped; settlement runs exactly once
                let settlement = self.settlement.settle(&self.settlement_request).await;

                let (message, severity) = match (&settlement.transaction_id, settlement.success) {
                    (Some(tx), true) => (
                        format!("Payment settled on-chain: {}", tx),
                        Severity::Success,
                    ),
                    _ => (
                        format!(
                            "Payment {} received but settlement failed: {}",
                            found.signature,
                            settlement
                                .error_message
                                .as_deref()
                                .unwrap_or("unknown error")
                        ),
                        Severity::Error,
                    ),
                };

                (
                    WatchStatus::Settled {
                        detected_signature: found.signature,
                        settlement,
                    },
                    message,
                    severity,
                )
            }
            PollOutcome::Cancelled => (
                WatchStatus::Cancelled,
                "Payment watch cancelled".to_string(),
                Severity::Info,
            ),
            PollOutcome::TimedOut { attempts } => (
                WatchStatus::TimedOut { attempts },
                format!(
                    "No payment detected within {}s",
                    self.options.timeout.as_secs()
                ),
                Severity::Warning,
            ),
            PollOutcome::Failed {
                consecutive_failures,
                last_error,
            } => (
                WatchStatus::Failed {
                    reason: last_error.clone(),
                },
                format!(
                    "Stopped watching after {} failed ledger queries: {}",
                    consecutive_failures, last_error
                ),
                Severity::Error,
            ),
        };

        self.notifier
            .notify(Notification::new(Some(self.id), message, severity));
        self.status.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SettlementError, SettlementErrorKind};
    use crate::ledger::LedgerMatch;
    use crate::watch::poller::tests::ScriptedLedger;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use solana_sdk::signature::{Keypair, Signer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Duration;

    struct CountingSettlement {
        calls: AtomicUsize,
        outcome: Result<String, SettlementError>,
        latency: Duration,
    }

    impl CountingSettlement {
        fn new(outcome: Result<String, SettlementError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome,
                latency: Duration::ZERO,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SettlementTrigger for CountingSettlement {
        async fn settle(&self, _request: &SettlementRequest) -> SettlementResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.outcome.clone().into()
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: SyncMutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        fn for_session(&self, id: Uuid) -> Vec<(Severity, String)> {
            self.seen
                .lock()
                .iter()
                .filter(|n| n.session_id == Some(id))
                .map(|n| (n.severity, n.message.clone()))
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) {
            self.seen.lock().push(notification);
        }
    }

    struct Harness {
        manager: WatchManager,
        ledger: Arc<ScriptedLedger>,
        settlement: Arc<CountingSettlement>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(
        ledger: ScriptedLedger,
        settlement: Result<String, SettlementError>,
        timeout_ms: u64,
        policy: SessionPolicy,
    ) -> Harness {
        harness_with_settlement(
            ledger,
            CountingSettlement::new(settlement),
            timeout_ms,
            policy,
        )
    }

    fn harness_with_settlement(
        ledger: ScriptedLedger,
        settlement: CountingSettlement,
        timeout_ms: u64,
        policy: SessionPolicy,
    ) -> Harness {
        let ledger = Arc::new(ledger);
        let settlement = Arc::new(settlement);
        let notifier = Arc::new(RecordingNotifier::default());
        let options = PollOptions::from_millis(3000, Some(timeout_ms))
            .unwrap()
            .with_max_consecutive_failures(Some(3));

        let manager = WatchManager::new(
            Arc::new(LedgerPoller::new(ledger.clone())),
            settlement.clone(),
            notifier.clone(),
            options,
            policy,
            "SplitSol",
        );

        Harness {
            manager,
            ledger,
            settlement,
            notifier,
        }
    }

    fn request() -> WatchRequest {
        WatchRequest {
            recipient: Keypair::new().pubkey(),
            amount_minor_units: 2_500_000_000,
            note: "Hotel Booking".to_string(),
            settlement: SettlementRequest {
                member_index: 1,
                expense: Keypair::new().pubkey(),
                group: Keypair::new().pubkey(),
                payer: Keypair::new().pubkey(),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_on_second_tick_settles_once() {
        let h = harness(
            ScriptedLedger::new(vec![Ok(vec![]), Ok(vec![LedgerMatch::new("abc", 9)])]),
            Ok("settle-sig".to_string()),
            120_000,
            SessionPolicy::CancelExisting,
        );

        let handle = h.manager.start(request()).await.unwrap();
        assert_eq!(handle.status(), WatchStatus::Pending);
        assert!(handle.uri().contains("amount=2.5"));
        assert!(handle.uri().contains(&handle.reference().to_string()));

        let status = handle.wait().await;

        assert_eq!(
            status,
            WatchStatus::Settled {
                detected_signature: "abc".to_string(),
                settlement: SettlementResult::succeeded("settle-sig"),
            }
        );
        assert_eq!(h.settlement.calls(), 1);
        assert_eq!(h.ledger.calls(), 2);

        let notes = h.notifier.for_session(handle.id());
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].0, Severity::Info);
        assert_eq!(notes[1].0, Severity::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_match() {
        let h = harness(
            ScriptedLedger::new(vec![]),
            Ok("unused".to_string()),
            10_000,
            SessionPolicy::CancelExisting,
        );

        let handle = h.manager.start(request()).await.unwrap();
        let status = handle.wait().await;

        assert_eq!(status, WatchStatus::TimedOut { attempts: 4 });
        assert_eq!(h.settlement.calls(), 0);

        let notes = h.notifier.for_session(handle.id());
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].0, Severity::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_matches_settle_once() {
        let h = harness(
            ScriptedLedger::new(vec![]).with_fallback(vec![LedgerMatch::new("dup", 3)]),
            Ok("settle-sig".to_string()),
            120_000,
            SessionPolicy::CancelExisting,
        );

        let handle = h.manager.start(request()).await.unwrap();
        handle.wait().await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(h.settlement.calls(), 1);
        assert_eq!(h.ledger.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_match() {
        let h = harness(
            ScriptedLedger::new(vec![]),
            Ok("unused".to_string()),
            120_000,
            SessionPolicy::CancelExisting,
        );

        let handle = h.manager.start(request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(4000)).await;

        assert_eq!(h.manager.cancel().await, Some(WatchStatus::Cancelled));
        // second cancel is a no-op
        handle.cancel();
        assert_eq!(h.manager.cancel().await, Some(WatchStatus::Cancelled));

        assert_eq!(h.settlement.calls(), 0);
        let notes = h.notifier.for_session(handle.id());
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1], (Severity::Info, "Payment watch cancelled".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settlement_failure_still_settles_session() {
        let h = harness(
            ScriptedLedger::new(vec![Ok(vec![LedgerMatch::new("abc", 1)])]),
            Err(SettlementError::TransactionRejected("user declined".into())),
            120_000,
            SessionPolicy::CancelExisting,
        );

        let handle = h.manager.start(request()).await.unwrap();

        match handle.wait().await {
            WatchStatus::Settled { settlement, .. } => {
                assert!(!settlement.success);
                assert_eq!(
                    settlement.error_kind,
                    Some(SettlementErrorKind::TransactionRejected)
                );
            }
            other => panic!("unexpected status: {:?}", other),
        }

        let notes = h.notifier.for_session(handle.id());
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].0, Severity::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ledger_failures_end_in_failed() {
        let failures = (0..3)
            .map(|_| Err(PaymentError::LedgerQueryFailed("rpc down".into())))
            .collect();
        let h = harness(
            ScriptedLedger::new(failures),
            Ok("unused".to_string()),
            120_000,
            SessionPolicy::CancelExisting,
        );

        let handle = h.manager.start(request()).await.unwrap();

        assert!(matches!(handle.wait().await, WatchStatus::Failed { .. }));
        assert_eq!(h.settlement.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_cancels_previous() {
        let h = harness(
            ScriptedLedger::new(vec![]),
            Ok("unused".to_string()),
            120_000,
            SessionPolicy::CancelExisting,
        );

        let first = h.manager.start(request()).await.unwrap();
        let second = h.manager.start(request()).await.unwrap();

        assert_eq!(first.status(), WatchStatus::Cancelled);
        assert_eq!(second.status(), WatchStatus::Pending);
        assert_ne!(first.reference(), second.reference());

        let current = h.manager.current().await.unwrap();
        assert_eq!(current.id, second.id());
        assert_eq!(h.notifier.for_session(first.id()).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_readable_while_replacing_settling_session() {
        let slow = CountingSettlement {
            latency: Duration::from_secs(30),
            ..CountingSettlement::new(Ok("settle-sig".to_string()))
        };
        let h = harness_with_settlement(
            ScriptedLedger::new(vec![Ok(vec![LedgerMatch::new("abc", 1)])]),
            slow,
            120_000,
            SessionPolicy::CancelExisting,
        );

        let first = h.manager.start(request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.settlement.calls(), 1);

        let replacing = h.manager.start(request());
        tokio::pin!(replacing);
        // the replacement is parked until the first settlement completes
        assert!(tokio::time::timeout(Duration::from_millis(10), &mut replacing)
            .await
            .is_err());

        let status = tokio::time::timeout(Duration::from_millis(10), h.manager.status())
            .await
            .expect("status blocked behind the replacement");
        assert_eq!(status, WatchStatus::Pending);
        assert_eq!(h.manager.current().await.unwrap().id, first.id());

        let second = replacing.await.unwrap();
        assert!(matches!(first.status(), WatchStatus::Settled { .. }));
        assert_eq!(second.status(), WatchStatus::Pending);
        assert_eq!(h.manager.current().await.unwrap().id, second.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_policy() {
        let h = harness(
            ScriptedLedger::new(vec![]),
            Ok("unused".to_string()),
            120_000,
            SessionPolicy::Reject,
        );

        let first = h.manager.start(request()).await.unwrap();
        let result = h.manager.start(request()).await;

        assert!(matches!(result, Err(PaymentError::SessionAlreadyActive)));
        assert_eq!(first.status(), WatchStatus::Pending);

        // once the first session finished, a new one is accepted
        first.cancel();
        first.wait().await;
        assert!(h.manager.start(request()).await.is_ok());
    }

    #[tokio::test]
    async fn test_idle_without_session() {
        let h = harness(
            ScriptedLedger::new(vec![]),
            Ok("unused".to_string()),
            120_000,
            SessionPolicy::CancelExisting,
        );

        assert_eq!(h.manager.status().await, WatchStatus::Idle);
        assert!(h.manager.cancel().await.is_none());
    }
}
