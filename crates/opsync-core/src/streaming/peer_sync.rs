use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::client::OrchestratorClient;
use crate::config::SyncConfig;
use crate::models::PeerState;
use crate::store::DebouncedBroadcast;

/// Mirrors the orchestrator's peer-connectivity stream into a debounced,
/// multi-subscriber local view.
///
/// The reconciler decides nothing itself: every received snapshot is a
/// last-write-wins upsert keyed by the peer's key id, and the debounced
/// materialized list fans out to subscribers. On stream termination it waits
/// out the retry floor (measured from when the stream was opened) and
/// reopens; the loop runs until cancelled and never gives up.
pub struct PeerStateReconciler {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    states: DebouncedBroadcast<String, PeerState>,
}

impl PeerStateReconciler {
    pub fn spawn(client: Arc<dyn OrchestratorClient>, config: SyncConfig) -> Self {
        let states = DebouncedBroadcast::new(config.debounce_window);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_peer_loop(client, states.clone(), config, cancel_rx));
        Self {
            cancel_tx,
            task,
            states,
        }
    }

    /// Subscribe to debounced peer-state snapshots. A new subscriber
    /// immediately receives the current snapshot if any peers are known.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Vec<PeerState>> {
        self.states.subscribe()
    }

    /// The current peer states, bypassing the debounce.
    pub fn peer_states(&self) -> Vec<PeerState> {
        self.states.values()
    }

    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub async fn shutdown(mut self) {
        let _ = self.cancel_tx.send(true);
        let _ = (&mut self.task).await;
    }
}

impl Drop for PeerStateReconciler {
    fn drop(&mut self) {
        let _ = self.cancel_tx.send(true);
    }
}

async fn run_peer_loop(
    client: Arc<dyn OrchestratorClient>,
    states: DebouncedBroadcast<String, PeerState>,
    config: SyncConfig,
    mut cancel_rx: watch::Receiver<bool>,
) {
    loop {
        let attempt_started = Instant::now();

        let stream = tokio::select! {
            result = client.stream_peer_states() => result,
            _ = cancel_rx.changed() => return,
        };

        match stream {
            Ok(mut rx) => loop {
                let message = tokio::select! {
                    message = rx.recv() => message,
                    _ = cancel_rx.changed() => return,
                };
                match message {
                    Some(Ok(state)) => {
                        states.upsert(state.peer_keyid.clone(), state);
                    }
                    Some(Err(err)) => {
                        warn!("peer state stream failed: {err}");
                        break;
                    }
                    None => {
                        debug!("peer state stream ended");
                        break;
                    }
                }
            },
            Err(err) => {
                warn!("could not open peer state stream: {err}");
            }
        }

        tokio::select! {
            _ = sleep_until(attempt_started + config.stream_retry_interval) => {}
            _ = cancel_rx.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PeerConnectionState;
    use crate::streaming::testutil::{wait_for, ScriptedClient};
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> SyncConfig {
        SyncConfig {
            debounce_window: Duration::from_millis(10),
            stream_retry_interval: Duration::from_millis(20),
        }
    }

    fn peer(keyid: &str, state: PeerConnectionState) -> PeerState {
        PeerState {
            peer_keyid: keyid.to_string(),
            peer_instance_id: format!("peer-{keyid}"),
            state,
            status_message: String::new(),
            last_heartbeat_millis: 0,
            known_repos: Vec::new(),
        }
    }

    #[tokio::test]
    async fn snapshots_are_deduplicated_by_key_last_write_wins() {
        let client = Arc::new(ScriptedClient::new());
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        client.push_peer_stream(rx);

        let reconciler = PeerStateReconciler::spawn(client, test_config());
        let mut updates = reconciler.subscribe();

        tx.send(Ok(peer("a", PeerConnectionState::Pending)))
            .await
            .unwrap();
        tx.send(Ok(peer("a", PeerConnectionState::Connected)))
            .await
            .unwrap();

        let snapshot = timeout(Duration::from_secs(1), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].state, PeerConnectionState::Connected);
        reconciler.shutdown().await;
    }

    #[tokio::test]
    async fn stream_end_triggers_reconnect() {
        let client = Arc::new(ScriptedClient::new());
        let (tx1, rx1) = tokio::sync::mpsc::channel(16);
        client.push_peer_stream(rx1);
        let (tx2, rx2) = tokio::sync::mpsc::channel(16);
        client.push_peer_stream(rx2);

        let reconciler = PeerStateReconciler::spawn(client, test_config());

        tx1.send(Ok(peer("a", PeerConnectionState::Connected)))
            .await
            .unwrap();
        wait_for(|| reconciler.peer_states().len() == 1).await;
        drop(tx1); // end of stream

        // After the retry floor the second stream is live; peers from the
        // first connection remain (they are only ever marked disconnected).
        tx2.send(Ok(peer("b", PeerConnectionState::Pending)))
            .await
            .unwrap();
        wait_for(|| reconciler.peer_states().len() == 2).await;
        reconciler.shutdown().await;
    }

    #[tokio::test]
    async fn cancelled_reconciler_stops_consuming() {
        let client = Arc::new(ScriptedClient::new());
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        client.push_peer_stream(rx);

        let reconciler = PeerStateReconciler::spawn(client, test_config());
        tx.send(Ok(peer("a", PeerConnectionState::Connected)))
            .await
            .unwrap();
        wait_for(|| reconciler.peer_states().len() == 1).await;

        let states = reconciler.states.clone();
        reconciler.shutdown().await;

        let _ = tx.send(Ok(peer("b", PeerConnectionState::Connected))).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(states.values().len(), 1);
    }
}
