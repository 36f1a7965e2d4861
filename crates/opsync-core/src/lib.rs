pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod flow_display;
pub mod format;
pub mod models;
pub mod store;
pub mod streaming;

// Re-export the main surface at the crate root for convenience
pub use client::{OperationEvent, OrchestratorClient, StreamReceiver};
pub use config::SyncConfig;
pub use error::ClientError;
pub use flow_display::{display_info_for_flow, DisplayType, FlowDisplayInfo};
pub use models::{Operation, OperationStatus, OpPayload, OpSelector, PeerConnectionState, PeerState};
pub use store::{DebouncedBroadcast, OplogStore, SharedOplogStore, StoreUpdate, UpdateKind};
pub use streaming::{PeerStateReconciler, StreamReconciler};
