use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::models::{Operation, OpSelector, PeerState};

/// One message on the global operation event stream.
///
/// Created and updated batches carry full operation records; deletions carry
/// ids only. The stream is global, so consumers filter created/updated
/// batches against their own selector before applying them.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationEvent {
    Created(Vec<Operation>),
    Updated(Vec<Operation>),
    Deleted(Vec<i64>),
}

/// Items yielded by a push stream: payloads until the server reports an
/// error. A closed channel signals a clean end-of-stream.
pub type StreamReceiver<T> = mpsc::Receiver<Result<T, ClientError>>;

/// The orchestrator backend, from the client's point of view.
///
/// Implementations wrap whatever transport talks to the real service; tests
/// substitute scripted fakes. `get_operations` must be idempotent and safe to
/// call repeatedly - the reconcilers lean on that for resync.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// One-shot snapshot of all operations matching `selector`.
    async fn get_operations(&self, selector: &OpSelector)
        -> Result<Vec<Operation>, ClientError>;

    /// Open the global push stream of operation events.
    async fn stream_operation_events(&self)
        -> Result<StreamReceiver<OperationEvent>, ClientError>;

    /// Open the push stream of peer-connectivity snapshots. Each item is a
    /// full state for one peer; peers are never deleted, only marked
    /// disconnected.
    async fn stream_peer_states(&self) -> Result<StreamReceiver<PeerState>, ClientError>;
}
