//! Scripted fake of the orchestrator boundary for reconciler tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{OperationEvent, OrchestratorClient, StreamReceiver};
use crate::error::ClientError;
use crate::models::{Operation, OperationStatus, OpPayload, OpSelector, PeerState};

/// An [`OrchestratorClient`] whose responses are queued up front by the
/// test. Fetches and stream handles are consumed in order; running out of
/// scripted responses yields a transport error, which surfaces loudly in
/// assertions instead of hanging the test.
pub struct ScriptedClient {
    fetches: Mutex<VecDeque<Result<Vec<Operation>, ClientError>>>,
    operation_streams: Mutex<VecDeque<StreamReceiver<OperationEvent>>>,
    peer_streams: Mutex<VecDeque<StreamReceiver<PeerState>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            fetches: Mutex::new(VecDeque::new()),
            operation_streams: Mutex::new(VecDeque::new()),
            peer_streams: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_fetch(&self, response: Result<Vec<Operation>, ClientError>) {
        self.fetches.lock().push_back(response);
    }

    pub fn push_operation_stream(&self, rx: StreamReceiver<OperationEvent>) {
        self.operation_streams.lock().push_back(rx);
    }

    pub fn push_peer_stream(&self, rx: StreamReceiver<PeerState>) {
        self.peer_streams.lock().push_back(rx);
    }
}

#[async_trait]
impl OrchestratorClient for ScriptedClient {
    async fn get_operations(
        &self,
        _selector: &OpSelector,
    ) -> Result<Vec<Operation>, ClientError> {
        self.fetches
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted fetch".to_string())))
    }

    async fn stream_operation_events(
        &self,
    ) -> Result<StreamReceiver<OperationEvent>, ClientError> {
        self.operation_streams
            .lock()
            .pop_front()
            .ok_or_else(|| ClientError::Transport("no scripted operation stream".to_string()))
    }

    async fn stream_peer_states(&self) -> Result<StreamReceiver<PeerState>, ClientError> {
        self.peer_streams
            .lock()
            .pop_front()
            .ok_or_else(|| ClientError::Transport("no scripted peer stream".to_string()))
    }
}

/// A minimal backup operation for reconciler tests.
pub fn op_with(id: i64, flow_id: i64, plan_id: &str) -> Operation {
    Operation {
        id,
        flow_id,
        instance_id: "local".to_string(),
        original_instance_keyid: String::new(),
        plan_id: plan_id.to_string(),
        repo_id: "repo1".to_string(),
        repo_guid: "guid1".to_string(),
        snapshot_id: String::new(),
        unix_time_start_ms: id * 1000,
        unix_time_end_ms: id * 1000 + 500,
        status: OperationStatus::Success,
        op: OpPayload::Backup { last_status: None },
    }
}

/// Poll `condition` until it holds, panicking after a generous timeout.
/// Reconciler effects land on a separate task, so assertions wait.
pub async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within timeout");
}
