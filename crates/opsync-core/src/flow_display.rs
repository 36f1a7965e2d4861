//! Flow aggregation: reduces the raw operations sharing one flow id into a
//! single display-level summary.
//!
//! Pure functions only. Summaries are rebuilt from scratch whenever a flow's
//! operation set changes; they are never mutated in place, and the same input
//! always yields an identical summary so upstream diffing stays cheap.

use crate::constants::DURATION_SUBTITLE_FLOOR_MS;
use crate::format::{format_bytes, format_duration, normalize_snapshot_id};
use crate::models::{BackupProgress, Operation, OperationStatus, OpPayload, RestoreProgress};

/// The kind a flow is displayed as, mapped 1:1 from the payload variant of
/// the flow's primary (lowest-id) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayType {
    Backup,
    Snapshot,
    Forget,
    Prune,
    Check,
    Restore,
    Stats,
    RunHook,
    RunCommand,
}

/// Display summary for one flow. Derived, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDisplayInfo {
    pub display_time_ms: i64,
    pub flow_id: i64,
    pub plan_id: String,
    pub repo_id: String,
    pub instance_id: String,
    pub snapshot_id: String,
    pub status: OperationStatus,
    pub display_type: DisplayType,
    pub subtitle_components: Vec<String>,
    /// True when the flow's snapshot was forgotten; such flows stay in the
    /// log for audit but should not be surfaced.
    pub hidden: bool,
    /// The contributing operations, ordered by id ascending.
    pub operations: Vec<Operation>,
}

pub fn display_type_for(op: &Operation) -> DisplayType {
    match &op.op {
        OpPayload::Backup { .. } => DisplayType::Backup,
        OpPayload::IndexSnapshot { .. } => DisplayType::Snapshot,
        OpPayload::Forget { .. } => DisplayType::Forget,
        OpPayload::Prune { .. } => DisplayType::Prune,
        OpPayload::Check { .. } => DisplayType::Check,
        OpPayload::Restore { .. } => DisplayType::Restore,
        OpPayload::Stats {} => DisplayType::Stats,
        OpPayload::RunHook { .. } => DisplayType::RunHook,
        OpPayload::RunCommand { .. } => DisplayType::RunCommand,
    }
}

pub fn display_type_label(display_type: DisplayType) -> &'static str {
    match display_type {
        DisplayType::Backup => "Backup",
        DisplayType::Snapshot => "Snapshot",
        DisplayType::Forget => "Forget",
        DisplayType::Prune => "Prune",
        DisplayType::Check => "Check",
        DisplayType::Restore => "Restore",
        DisplayType::Stats => "Stats",
        DisplayType::RunHook => "Run Hook",
        DisplayType::RunCommand => "Run Command",
    }
}

pub fn status_label(status: OperationStatus) -> &'static str {
    match status {
        OperationStatus::Pending => "pending",
        OperationStatus::InProgress => "in progress",
        OperationStatus::Error => "error",
        OperationStatus::Warning => "warning",
        OperationStatus::Success => "success",
        OperationStatus::UserCancelled | OperationStatus::SystemCancelled => "cancelled",
        OperationStatus::Unknown => "unknown",
    }
}

/// System-cancelled records are bookkeeping noise and are hidden by default.
pub fn should_hide_status(status: OperationStatus) -> bool {
    status == OperationStatus::SystemCancelled
}

/// Stats operations never surface as their own flow entries.
pub fn should_hide_operation(op: &Operation) -> bool {
    matches!(op.op, OpPayload::Stats {}) || should_hide_status(op.status)
}

/// Reduce all operations sharing one flow id into a display summary.
///
/// The lowest-id operation is the primary: it seeds the display time, the
/// plan/repo/instance ids, the display type, and the subtitle. Status is then
/// rolled up across the whole flow: in-progress, error, and warning dominate,
/// except that an errored run-hook only demotes a successful flow to warning
/// (a failed side-effect hook does not fail the run). Cancelled statuses are
/// taken from the primary alone.
///
/// Returns `None` for an empty slice.
pub fn display_info_for_flow(ops: &[Operation]) -> Option<FlowDisplayInfo> {
    let mut ops: Vec<Operation> = ops.to_vec();
    ops.sort_by_key(|op| op.id);
    let first = ops.first()?.clone();

    let mut info = FlowDisplayInfo {
        display_time_ms: first.unix_time_start_ms,
        flow_id: first.flow_id,
        plan_id: first.plan_id.clone(),
        repo_id: first.repo_id.clone(),
        instance_id: first.instance_id.clone(),
        snapshot_id: first.snapshot_id.clone(),
        status: first.status,
        display_type: display_type_for(&first),
        subtitle_components: Vec::new(),
        hidden: false,
        operations: ops,
    };

    let duration = first.duration_ms();

    if first.status == OperationStatus::Pending {
        info.subtitle_components.push("scheduled, waiting".to_string());
    }

    match &first.op {
        OpPayload::Backup { last_status } => match last_status {
            Some(BackupProgress::Status {
                percent_done,
                bytes_done,
                total_bytes,
            }) => {
                info.subtitle_components
                    .push(format!("{:.2}% processed", percent_done * 100.0));
                info.subtitle_components.push(format!(
                    "{}/{}",
                    format_bytes(*bytes_done),
                    format_bytes(*total_bytes)
                ));
            }
            Some(BackupProgress::Summary {
                total_bytes_processed,
                snapshot_id,
                ..
            }) => {
                info.subtitle_components.push(format!(
                    "{} in {}",
                    format_bytes(*total_bytes_processed),
                    format_duration(duration)
                ));
                info.subtitle_components
                    .push(format!("ID: {}", normalize_snapshot_id(snapshot_id)));
            }
            None => {}
        },
        OpPayload::Restore { last_status, .. } => {
            match last_status {
                Some(RestoreProgress::Status {
                    percent_done,
                    bytes_restored,
                    total_bytes,
                }) => {
                    info.subtitle_components
                        .push(format!("{:.2}% processed", percent_done * 100.0));
                    info.subtitle_components.push(format!(
                        "{}/{}",
                        format_bytes(*bytes_restored),
                        format_bytes(*total_bytes)
                    ));
                }
                Some(RestoreProgress::Summary { total_bytes }) => {
                    info.subtitle_components.push(format!(
                        "{} in {}",
                        format_bytes(*total_bytes),
                        format_duration(duration)
                    ));
                }
                None => {}
            }
            info.subtitle_components.push(format!(
                "ID: {}",
                normalize_snapshot_id(&first.snapshot_id)
            ));
        }
        OpPayload::IndexSnapshot { snapshot, .. } => {
            if let Some(snapshot) = snapshot {
                if let Some(summary) = &snapshot.summary {
                    if summary.total_bytes_processed > 0 {
                        info.subtitle_components.push(format!(
                            "{} in {}",
                            format_bytes(summary.total_bytes_processed),
                            format_duration((summary.total_duration_secs * 1000.0) as i64)
                        ));
                    }
                }
                info.subtitle_components
                    .push(format!("ID: {}", normalize_snapshot_id(&snapshot.id)));
            }
        }
        _ => match first.status {
            OperationStatus::InProgress => {
                info.subtitle_components.push("running".to_string());
            }
            OperationStatus::UserCancelled => {
                info.subtitle_components.push("cancelled by user".to_string());
            }
            OperationStatus::SystemCancelled => {
                info.subtitle_components
                    .push("cancelled by system".to_string());
            }
            _ => {
                if duration > DURATION_SUBTITLE_FLOOR_MS {
                    info.subtitle_components
                        .push(format!("took {}", format_duration(duration)));
                }
            }
        },
    }

    for op in &info.operations {
        if let OpPayload::IndexSnapshot { forgot: true, .. } = op.op {
            info.hidden = true;
        }

        // A failed hook demotes a successful flow to warning but never fails
        // the flow outright.
        if matches!(op.op, OpPayload::RunHook { .. }) && op.status == OperationStatus::Error {
            if info.status == OperationStatus::Success {
                info.status = OperationStatus::Warning;
            }
            continue;
        }

        if matches!(
            op.status,
            OperationStatus::InProgress | OperationStatus::Error | OperationStatus::Warning
        ) {
            info.status = op.status;
        }
    }

    Some(info)
}
