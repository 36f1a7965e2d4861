pub mod operation;
pub mod peer_state;
pub mod selector;

pub use operation::{
    BackupProgress, Operation, OperationStatus, OpPayload, RestoreProgress, SnapshotInfo,
    SnapshotSummary,
};
pub use peer_state::{PeerConnectionState, PeerState};
pub use selector::OpSelector;
