use serde::{Deserialize, Serialize};

use crate::models::Operation;

/// Server-interpreted filter describing which operations a caller wants.
///
/// The same selector is also applied client-side via [`OpSelector::matches`]
/// to filter pushed event batches, since the global event stream is not
/// scoped to any one subscription. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpSelector {
    /// Explicit operation ids; empty matches all.
    #[serde(default)]
    pub ids: Vec<i64>,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub repo_guid: Option<String>,
    #[serde(default)]
    pub flow_id: Option<i64>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub snapshot_id: Option<String>,
    #[serde(default)]
    pub original_instance_keyid: Option<String>,
}

impl OpSelector {
    pub fn for_plan(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: Some(plan_id.into()),
            ..Default::default()
        }
    }

    pub fn for_repo(repo_guid: impl Into<String>) -> Self {
        Self {
            repo_guid: Some(repo_guid.into()),
            ..Default::default()
        }
    }

    pub fn for_flow(flow_id: i64) -> Self {
        Self {
            flow_id: Some(flow_id),
            ..Default::default()
        }
    }

    /// Whether `op` matches every populated field of this selector.
    pub fn matches(&self, op: &Operation) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&op.id) {
            return false;
        }
        if let Some(plan_id) = &self.plan_id {
            if op.plan_id != *plan_id {
                return false;
            }
        }
        if let Some(repo_guid) = &self.repo_guid {
            if op.repo_guid != *repo_guid {
                return false;
            }
        }
        if let Some(flow_id) = self.flow_id {
            if op.flow_id != flow_id {
                return false;
            }
        }
        if let Some(instance_id) = &self.instance_id {
            if op.instance_id != *instance_id {
                return false;
            }
        }
        if let Some(snapshot_id) = &self.snapshot_id {
            if op.snapshot_id != *snapshot_id {
                return false;
            }
        }
        if let Some(keyid) = &self.original_instance_keyid {
            if op.original_instance_keyid != *keyid {
                return false;
            }
        }
        true
    }
}
