use serde::{Deserialize, Serialize};

/// Lifecycle status of an operation, as reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Unknown,
    Pending,
    InProgress,
    Success,
    Error,
    Warning,
    UserCancelled,
    SystemCancelled,
}

impl Default for OperationStatus {
    fn default() -> Self {
        OperationStatus::Unknown
    }
}

/// Progress reporting for a backup operation. The orchestrator sends
/// intermediate `Status` entries while the backup runs and a terminal
/// `Summary` entry once it completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum BackupProgress {
    Status {
        percent_done: f64,
        bytes_done: u64,
        total_bytes: u64,
    },
    Summary {
        total_bytes_processed: u64,
        total_duration_secs: f64,
        snapshot_id: String,
    },
}

/// Progress reporting for a restore operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum RestoreProgress {
    Status {
        percent_done: f64,
        bytes_restored: u64,
        total_bytes: u64,
    },
    Summary {
        total_bytes: u64,
    },
}

/// Aggregate statistics attached to an indexed snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub total_bytes_processed: u64,
    pub total_duration_secs: f64,
}

/// Metadata for a restic snapshot known to the repository index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub unix_time_ms: i64,
    #[serde(default)]
    pub summary: Option<SnapshotSummary>,
}

/// The discriminated payload of an operation. The variant determines the
/// operation's kind; each variant carries its kind-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpPayload {
    Backup {
        #[serde(default)]
        last_status: Option<BackupProgress>,
    },
    IndexSnapshot {
        #[serde(default)]
        snapshot: Option<SnapshotInfo>,
        /// Set once the underlying restic snapshot has been forgotten.
        /// Flows containing such an operation are hidden from display.
        #[serde(default)]
        forgot: bool,
    },
    Forget {
        /// Ids of the snapshots removed by this forget run.
        #[serde(default)]
        forgot: Vec<String>,
    },
    Prune {
        #[serde(default)]
        output: String,
    },
    Check {
        #[serde(default)]
        output: String,
    },
    Restore {
        path: String,
        target: String,
        #[serde(default)]
        last_status: Option<RestoreProgress>,
    },
    Stats {},
    RunHook {
        name: String,
    },
    RunCommand {
        command: String,
    },
}

/// A single record in the server-authoritative operation log.
///
/// Immutable from the client's perspective: the server may replace the whole
/// record via an updated-batch event, but the client never mutates one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Globally unique, monotonically non-decreasing in practice.
    pub id: i64,
    /// Correlation key shared by all operations that form one logical run.
    pub flow_id: i64,
    pub instance_id: String,
    /// Key id of the instance that originally produced this operation
    /// (differs from `instance_id` for operations replicated from peers).
    #[serde(default)]
    pub original_instance_keyid: String,
    pub plan_id: String,
    pub repo_id: String,
    #[serde(default)]
    pub repo_guid: String,
    /// Snapshot this operation relates to, empty if none is known yet.
    #[serde(default)]
    pub snapshot_id: String,
    pub unix_time_start_ms: i64,
    /// Zero while the operation is still running.
    #[serde(default)]
    pub unix_time_end_ms: i64,
    pub status: OperationStatus,
    pub op: OpPayload,
}

impl Operation {
    /// Wall time of the operation in milliseconds, zero while running.
    pub fn duration_ms(&self) -> i64 {
        if self.unix_time_end_ms == 0 {
            0
        } else {
            self.unix_time_end_ms - self.unix_time_start_ms
        }
    }
}
