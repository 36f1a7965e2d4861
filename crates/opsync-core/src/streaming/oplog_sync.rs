use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::client::{OperationEvent, OrchestratorClient};
use crate::config::SyncConfig;
use crate::error::ClientError;
use crate::models::{OperationStatus, OpPayload, OpSelector};
use crate::store::SharedOplogStore;

/// Keeps one [`OplogStore`](crate::store::OplogStore) consistent with the
/// server's operation log for a given selector.
///
/// Protocol per connection attempt: open the global event stream, issue the
/// one-shot fetch, then apply pushed batches filtered to the selector. A
/// fetch failure is reported and leaves the store untouched (stale but
/// consistent data stays visible); a stream failure resets the store and the
/// loop refetches from scratch, which is always correctness-preserving
/// because `add`/`reset` are idempotent with respect to final state.
///
/// Dropping the reconciler cancels the loop; no store mutation happens after
/// cancellation.
pub struct StreamReconciler {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl StreamReconciler {
    /// Spawn the sync loop. Errors from the fetch/stream boundary are
    /// delivered on the returned channel for display purposes; no caller
    /// action is needed for recovery.
    pub fn spawn(
        client: Arc<dyn OrchestratorClient>,
        selector: OpSelector,
        store: SharedOplogStore,
        config: SyncConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ClientError>) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_sync_loop(
            client, selector, store, config, cancel_rx, error_tx,
        ));
        (Self { cancel_tx, task }, error_rx)
    }

    /// Stop the loop without waiting for the task to wind down.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Stop the loop and wait for the task to finish. Guarantees no further
    /// store mutation once this returns.
    pub async fn shutdown(mut self) {
        let _ = self.cancel_tx.send(true);
        let _ = (&mut self.task).await;
    }
}

impl Drop for StreamReconciler {
    fn drop(&mut self) {
        let _ = self.cancel_tx.send(true);
    }
}

async fn run_sync_loop(
    client: Arc<dyn OrchestratorClient>,
    selector: OpSelector,
    store: SharedOplogStore,
    config: SyncConfig,
    mut cancel_rx: watch::Receiver<bool>,
    error_tx: mpsc::UnboundedSender<ClientError>,
) {
    loop {
        let attempt_started = Instant::now();

        // Open the stream before fetching so events arriving during the
        // fetch are buffered rather than lost; they are applied after the
        // snapshot and overwrite it, which resolves the race.
        let stream = tokio::select! {
            result = client.stream_operation_events() => result,
            _ = cancel_rx.changed() => return,
        };

        match stream {
            Ok(mut rx) => {
                let fetched = tokio::select! {
                    result = client.get_operations(&selector) => result,
                    _ = cancel_rx.changed() => return,
                };
                match fetched {
                    Ok(ops) => store.lock().add(ops),
                    Err(err) => {
                        warn!("operation fetch failed: {err}");
                        let _ = error_tx.send(err);
                    }
                }

                loop {
                    let message = tokio::select! {
                        message = rx.recv() => message,
                        _ = cancel_rx.changed() => return,
                    };
                    match message {
                        Some(Ok(event)) => apply_event(&store, &selector, event),
                        Some(Err(err)) => {
                            warn!("operation event stream failed: {err}");
                            store.lock().reset();
                            let _ = error_tx.send(err);
                            break;
                        }
                        None => {
                            debug!("operation event stream ended, resyncing");
                            store.lock().reset();
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!("could not open operation event stream: {err}");
                let _ = error_tx.send(err);
            }
        }

        tokio::select! {
            _ = sleep_until(attempt_started + config.stream_retry_interval) => {}
            _ = cancel_rx.changed() => return,
        }
    }
}

fn apply_event(store: &SharedOplogStore, selector: &OpSelector, event: OperationEvent) {
    match event {
        OperationEvent::Created(ops) | OperationEvent::Updated(ops) => {
            let ops: Vec<_> = ops.into_iter().filter(|op| selector.matches(op)).collect();
            if !ops.is_empty() {
                store.lock().add(ops);
            }
        }
        // Deletion is unconditional: removing an id the store never held is
        // a no-op, so no selector filtering is needed.
        OperationEvent::Deleted(ids) => store.lock().remove_ids(&ids),
    }
}

/// One-shot roll-up of the most recent flow's status for a selector.
///
/// Fetches the matching operations, walks them newest-first, and skips
/// pending, system-cancelled, and run-hook records; the first non-success
/// status within the most recent qualifying flow wins.
pub async fn latest_status_for_selector(
    client: &dyn OrchestratorClient,
    selector: &OpSelector,
) -> Result<OperationStatus, ClientError> {
    let mut ops = client.get_operations(selector).await?;
    ops.sort_by(|a, b| b.unix_time_start_ms.cmp(&a.unix_time_start_ms));

    let mut flow_id: Option<i64> = None;
    for op in &ops {
        if op.status == OperationStatus::Pending
            || op.status == OperationStatus::SystemCancelled
            || matches!(op.op, OpPayload::RunHook { .. })
        {
            continue;
        }
        match flow_id {
            None => flow_id = Some(op.flow_id),
            Some(id) if id != op.flow_id => break,
            Some(_) => {}
        }
        if op.status != OperationStatus::Success {
            return Ok(op.status);
        }
    }
    Ok(OperationStatus::Success)
}
