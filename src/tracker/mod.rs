//! Lifecycle tracking for cross-chain transactions and contract locks
//!
//! The tracker drives the pure watches in [`state`] against a
//! [`RemoteStatusSource`]:
//! - `await_terminal` polls the coordination contract until the transaction
//!   commits, is ignored, or fails the not-started budget
//! - `await_unlocked` polls a contract's lock until the cross-chain call that
//!   holds it has completed
//!
//! Every sleep and every remote call races against the cancellation token.

pub mod policy;
pub mod source;
pub mod state;

pub use policy::{LockWaitMode, PollingPolicy};
pub use source::{Height, RemoteStatusSource, StatusCode, TrackedLock, TrackedTransaction};
pub use state::{
    LockAction, LockWatch, TerminalOutcome, TransactionAction, TransactionFailure,
    TransactionStatus, TransactionWatch, Unlocked,
};

use crate::error::{TrackerError, TrackerResult};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Polls a remote status source until a lifecycle reaches a terminal state
#[derive(Clone)]
pub struct LifecycleTracker {
    source: Arc<dyn RemoteStatusSource>,
    policy: PollingPolicy,
    cancel: CancellationToken,
}

impl LifecycleTracker {
    pub fn new(
        source: Arc<dyn RemoteStatusSource>,
        policy: PollingPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            policy,
            cancel,
        }
    }

    /// Wait for a cross-chain transaction to commit or be ignored
    pub async fn await_terminal(&self, tx: &TrackedTransaction) -> TrackerResult<TerminalOutcome> {
        let target = tx.to_string();

        let timeout_height = self
            .guard(&target, 0, self.source.transaction_timeout_height(tx))
            .await?;
        info!(
            "Waiting for crosschain transaction {} to complete. Timeout block number: {}",
            tx, timeout_height
        );

        let mut watch = TransactionWatch::new(timeout_height);
        loop {
            let current_height = self
                .guard(&target, watch.polls, self.source.current_height())
                .await?;
            let code = self
                .guard(&target, watch.polls, self.source.transaction_status(tx))
                .await?;

            let (next, action) = watch.observe(code, current_height, &self.policy);
            watch = next;
            crate::metrics::record_status_poll(tx.originating_chain_id);

            info!(
                "Crosschain transaction {} state: {}, coordination block number: {}",
                tx,
                TransactionStatus::from_code(code),
                current_height
            );

            match action {
                TransactionAction::Finish(outcome) => {
                    info!(
                        "Crosschain transaction {} finished as {} after {} polls",
                        tx, outcome, watch.polls
                    );
                    crate::metrics::record_outcome(tx.originating_chain_id, &outcome.to_string());
                    return Ok(outcome);
                }
                TransactionAction::Fail(failure) => {
                    let err = transaction_error(tx, failure, &watch);
                    error!("{}", err);
                    crate::metrics::record_outcome(tx.originating_chain_id, failure_label(failure));
                    return Err(err);
                }
                TransactionAction::Poll => {}
            }

            self.sleep(&target, watch.polls, self.policy.poll_interval)
                .await?;
        }
    }

    /// Wait for a contract's cross-chain lock to be released
    pub async fn await_unlocked(&self, lock: &TrackedLock) -> TrackerResult<Unlocked> {
        let target = lock.to_string();
        let mut watch = LockWatch::default();

        loop {
            self.sleep(&target, watch.polls, self.policy.lock_poll_interval)
                .await?;
            let locked = self
                .guard(&target, watch.polls, self.source.is_locked(lock))
                .await?;

            let (next, action) = watch.observe(locked, &self.policy);
            watch = next;
            crate::metrics::record_lock_poll(lock.chain_id);

            match action {
                LockAction::Finish(unlocked) => {
                    info!("Contract {} unlocked after {} polls", lock, unlocked.polls);
                    return Ok(unlocked);
                }
                LockAction::GiveUp => {
                    let err = TrackerError::StillLockedTooLong {
                        lock: target,
                        polls: watch.polls,
                    };
                    error!("{}", err);
                    return Err(err);
                }
                LockAction::Diagnose => {
                    error!("Contract {} did not unlock after {} polls", lock, watch.polls);
                    crate::metrics::record_lock_diagnostic(lock.chain_id);
                }
                LockAction::Poll => {
                    info!(
                        "Waiting for the contract to unlock{}",
                        ".".repeat(watch.locked_polls as usize)
                    );
                }
            }
        }
    }

    async fn guard<T, F>(&self, target: &str, polls: u32, call: F) -> TrackerResult<T>
    where
        F: Future<Output = TrackerResult<T>>,
    {
        interruptible(&self.cancel, target, polls, call).await
    }

    async fn sleep(&self, target: &str, polls: u32, delay: Duration) -> TrackerResult<()> {
        self.guard(target, polls, async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }
}

/// Run `call` unless `cancel` fires first.
///
/// A cancelled token always wins over a ready result, so a wait cancelled
/// before it starts never reaches the node.
pub async fn interruptible<T, F>(
    cancel: &CancellationToken,
    target: &str,
    polls: u32,
    call: F,
) -> TrackerResult<T>
where
    F: Future<Output = TrackerResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Wait for {} cancelled", target);
            Err(TrackerError::Interrupted {
                target: target.to_string(),
                polls,
            })
        }
        result = call => result,
    }
}

/// Sleep for `delay` unless `cancel` fires first
pub async fn pause(cancel: &CancellationToken, target: &str, delay: Duration) -> TrackerResult<()> {
    interruptible(cancel, target, 0, async {
        tokio::time::sleep(delay).await;
        Ok(())
    })
    .await
}

fn transaction_error(
    tx: &TrackedTransaction,
    failure: TransactionFailure,
    watch: &TransactionWatch,
) -> TrackerError {
    let tx = tx.to_string();
    match failure {
        TransactionFailure::NeverStarted => TrackerError::NeverStarted {
            tx,
            polls: watch.polls,
        },
        TransactionFailure::UnknownState(code) => TrackerError::UnknownState {
            tx,
            code,
            polls: watch.polls,
        },
        TransactionFailure::TimedOut {
            timeout_height,
            current_height,
        } => TrackerError::TimedOut {
            tx,
            timeout_height,
            current_height,
        },
    }
}

fn failure_label(failure: TransactionFailure) -> &'static str {
    match failure {
        TransactionFailure::NeverStarted => "NEVER_STARTED",
        TransactionFailure::UnknownState(_) => "UNKNOWN_STATE",
        TransactionFailure::TimedOut { .. } => "TIMED_OUT",
    }
}

#[cfg(test)]
mod tests {
    use super::source::MockRemoteStatusSource;
    use super::*;

    use async_trait::async_trait;
    use ethers::types::{Address, U256};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Source that replays scripted observations and counts queries
    struct ScriptedSource {
        statuses: Mutex<VecDeque<u64>>,
        locks: Mutex<VecDeque<bool>>,
        height: AtomicU64,
        timeout_height: u64,
        status_calls: AtomicU32,
        lock_calls: AtomicU32,
    }

    impl ScriptedSource {
        fn statuses(codes: &[u64]) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(codes.iter().copied().collect()),
                locks: Mutex::new(VecDeque::new()),
                height: AtomicU64::new(100),
                timeout_height: 110,
                status_calls: AtomicU32::new(0),
                lock_calls: AtomicU32::new(0),
            })
        }

        fn locks(observations: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(VecDeque::new()),
                locks: Mutex::new(observations.iter().copied().collect()),
                height: AtomicU64::new(100),
                timeout_height: 110,
                status_calls: AtomicU32::new(0),
                lock_calls: AtomicU32::new(0),
            })
        }

        fn status_calls(&self) -> u32 {
            self.status_calls.load(Ordering::SeqCst)
        }

        fn lock_calls(&self) -> u32 {
            self.lock_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteStatusSource for ScriptedSource {
        async fn transaction_status(&self, _tx: &TrackedTransaction) -> TrackerResult<StatusCode> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TrackerError::Rpc("status script exhausted".to_string()))
        }

        async fn transaction_timeout_height(&self, _tx: &TrackedTransaction) -> TrackerResult<Height> {
            Ok(self.timeout_height)
        }

        async fn current_height(&self) -> TrackerResult<Height> {
            Ok(self.height.fetch_add(1, Ordering::SeqCst))
        }

        async fn is_locked(&self, _lock: &TrackedLock) -> TrackerResult<bool> {
            self.lock_calls.fetch_add(1, Ordering::SeqCst);
            self.locks
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TrackerError::Rpc("lock script exhausted".to_string()))
        }
    }

    fn tx() -> TrackedTransaction {
        TrackedTransaction::new(22, U256::from(7))
    }

    fn lock() -> TrackedLock {
        TrackedLock::new(22, Address::repeat_byte(0x11))
    }

    fn tracker(source: Arc<dyn RemoteStatusSource>, policy: PollingPolicy) -> LifecycleTracker {
        LifecycleTracker::new(source, policy, CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn committed_after_progress() {
        let source = ScriptedSource::statuses(&[0, 1, 1, 2]);
        let outcome = tracker(source.clone(), PollingPolicy::default())
            .await_terminal(&tx())
            .await
            .unwrap();

        assert_eq!(outcome, TerminalOutcome::Committed);
        assert_eq!(source.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn ignored_is_an_outcome_not_an_error() {
        let source = ScriptedSource::statuses(&[1, 3]);
        let outcome = tracker(source, PollingPolicy::default())
            .await_terminal(&tx())
            .await
            .unwrap();

        assert_eq!(outcome, TerminalOutcome::Ignored);
        assert!(!outcome.is_committed());
    }

    #[tokio::test(start_paused = true)]
    async fn never_started_stops_polling_at_budget() {
        // One spare code proves no poll happens after the verdict
        let source = ScriptedSource::statuses(&[0, 0, 0, 0, 0, 2]);
        let err = tracker(source.clone(), PollingPolicy::default())
            .await_terminal(&tx())
            .await
            .unwrap_err();

        assert!(matches!(err, TrackerError::NeverStarted { polls: 5, .. }));
        assert_eq!(source.status_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn started_resets_the_not_started_budget() {
        let source = ScriptedSource::statuses(&[0, 0, 1, 0, 0, 0, 0, 2]);
        let outcome = tracker(source.clone(), PollingPolicy::default())
            .await_terminal(&tx())
            .await
            .unwrap();

        assert_eq!(outcome, TerminalOutcome::Committed);
        assert_eq!(source.status_calls(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_state_fails_on_first_poll() {
        let source = ScriptedSource::statuses(&[7, 2]);
        let err = tracker(source.clone(), PollingPolicy::default())
            .await_terminal(&tx())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TrackerError::UnknownState { code: 7, polls: 1, .. }
        ));
        assert_eq!(source.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_are_spaced_by_the_interval() {
        let source = ScriptedSource::statuses(&[1, 1, 2]);
        let start = Instant::now();
        tracker(source, PollingPolicy::default())
            .await_terminal(&tx())
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_height_enforced_only_when_configured() {
        // Heights start at 100 and the timeout is 110
        let codes = vec![1; 15];
        let source = ScriptedSource::statuses(&codes);
        let policy = PollingPolicy {
            enforce_timeout_height: true,
            ..PollingPolicy::default()
        };
        let err = tracker(source.clone(), policy)
            .await_terminal(&tx())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TrackerError::TimedOut {
                timeout_height: 110,
                current_height: 111,
                ..
            }
        ));
        assert_eq!(source.status_calls(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_propagated_unchanged() {
        let mut source = MockRemoteStatusSource::new();
        source
            .expect_transaction_timeout_height()
            .returning(|_| Ok(50));
        source.expect_current_height().times(1).returning(|| {
            Err(TrackerError::ChainConnection {
                chain_id: 11,
                message: "connection refused".to_string(),
            })
        });
        source.expect_transaction_status().never();

        let err = tracker(Arc::new(source), PollingPolicy::default())
            .await_terminal(&tx())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TrackerError::ChainConnection { chain_id: 11, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_transaction_wait_mid_sleep() {
        let codes = vec![1; 100];
        let source = ScriptedSource::statuses(&codes);
        let cancel = CancellationToken::new();
        let tracker = LifecycleTracker::new(source.clone(), PollingPolicy::default(), cancel.clone());

        let start = Instant::now();
        let handle = tokio::spawn(async move { tracker.await_terminal(&tx()).await });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        cancel.cancel();
        let err = handle.await.unwrap().unwrap_err();

        assert!(matches!(err, TrackerError::Interrupted { polls: 2, .. }));
        assert!(start.elapsed() < Duration::from_millis(4000));
        assert_eq!(source.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unlocked_on_first_released_observation() {
        let source = ScriptedSource::locks(&[true, true, false, true]);
        let unlocked = tracker(source.clone(), PollingPolicy::default())
            .await_unlocked(&lock())
            .await
            .unwrap();

        assert_eq!(unlocked, Unlocked { polls: 3 });
        assert_eq!(source.lock_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn long_lock_is_diagnosed_not_fatal() {
        let mut observations = vec![true; 25];
        observations.push(false);
        let source = ScriptedSource::locks(&observations);
        let unlocked = tracker(source.clone(), PollingPolicy::default())
            .await_unlocked(&lock())
            .await
            .unwrap();

        assert_eq!(unlocked.polls, 26);
        assert_eq!(source.lock_calls(), 26);
    }

    #[tokio::test(start_paused = true)]
    async fn strict_lock_mode_gives_up() {
        let source = ScriptedSource::locks(&[true; 20]);
        let policy = PollingPolicy {
            lock_wait_mode: LockWaitMode::Strict,
            max_wait_polls: 3,
            ..PollingPolicy::default()
        };
        let err = tracker(source.clone(), policy)
            .await_unlocked(&lock())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TrackerError::StillLockedTooLong { polls: 4, .. }
        ));
        assert_eq!(source.lock_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_lock_wait() {
        let source = ScriptedSource::locks(&[true; 1000]);
        let cancel = CancellationToken::new();
        let tracker = LifecycleTracker::new(source, PollingPolicy::default(), cancel.clone());

        let start = Instant::now();
        let handle = tokio::spawn(async move { tracker.await_unlocked(&lock()).await });

        tokio::time::sleep(Duration::from_millis(550)).await;
        cancel.cancel();
        let err = handle.await.unwrap().unwrap_err();

        assert!(matches!(err, TrackerError::Interrupted { polls: 5, .. }));
        assert!(start.elapsed() < Duration::from_millis(650));
    }

    #[tokio::test]
    async fn already_cancelled_token_interrupts_before_polling() {
        let source = ScriptedSource::statuses(&[2]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let tracker = LifecycleTracker::new(source.clone(), PollingPolicy::default(), cancel);

        let err = tracker.await_terminal(&tx()).await.unwrap_err();
        assert!(matches!(err, TrackerError::Interrupted { polls: 0, .. }));
        assert_eq!(source.status_calls(), 0);
    }
}
