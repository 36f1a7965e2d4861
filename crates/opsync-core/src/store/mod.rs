pub mod debounce;
pub mod oplog_store;

pub use debounce::DebouncedBroadcast;
pub use oplog_store::{OplogStore, OperationFilter, SharedOplogStore, StoreUpdate, UpdateKind};
