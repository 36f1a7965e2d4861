pub mod oplog_sync;
pub mod peer_sync;

#[cfg(test)]
pub(crate) mod testutil;

pub use oplog_sync::{latest_status_for_selector, StreamReconciler};
pub use peer_sync::PeerStateReconciler;
