//! Watching several crosschain transactions at once

use crate::error::TrackerResult;
use crate::tracker::{LifecycleTracker, TerminalOutcome, TrackedTransaction};

use futures::future::join_all;

/// Await every transaction concurrently; results keep the input order
pub async fn watch_transactions(
    tracker: &LifecycleTracker,
    transactions: &[TrackedTransaction],
) -> Vec<(TrackedTransaction, TrackerResult<TerminalOutcome>)> {
    let waits = transactions.iter().map(|tx| async move {
        let result = tracker.await_terminal(tx).await;
        (*tx, result)
    });
    join_all(waits).await
}
