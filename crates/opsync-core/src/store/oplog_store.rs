use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::models::{Operation, OpPayload};

/// Kind of change a store notification describes. Updates of existing
/// records and true creations share `Created`; subscribers that care
/// re-read the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Created,
    Deleted,
}

/// One batched change notification. Covers every id touched by a single
/// `add`/`remove`/`reset` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreUpdate {
    pub kind: UpdateKind,
    pub ids: Vec<i64>,
    pub flow_ids: Vec<i64>,
}

/// Client-local inclusion predicate, layered on top of (and independent of)
/// the server-side selector.
pub type OperationFilter = Box<dyn Fn(&Operation) -> bool + Send>;

/// Store handle shared between a reconciler task and passive readers.
/// All mutation goes through the store's own API under the lock.
pub type SharedOplogStore = Arc<Mutex<OplogStore>>;

/// In-memory store of operation records, indexed by id and grouped by flow.
///
/// The record itself lives once in the id index; the flow index holds
/// ordered id lists, so replacing a record by id preserves its slot in the
/// flow. Change notifications fan out to any number of subscribers over
/// unbounded channels; dropping a receiver unsubscribes it.
pub struct OplogStore {
    by_id: BTreeMap<i64, Operation>,
    by_flow: HashMap<i64, Vec<i64>>,
    filter: OperationFilter,
    subscribers: Vec<mpsc::UnboundedSender<StoreUpdate>>,
}

impl OplogStore {
    pub fn new() -> Self {
        Self::with_filter(Box::new(|_| true))
    }

    pub fn with_filter(filter: OperationFilter) -> Self {
        Self {
            by_id: BTreeMap::new(),
            by_flow: HashMap::new(),
            filter,
            subscribers: Vec::new(),
        }
    }

    pub fn new_shared() -> SharedOplogStore {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn shared_with_filter(filter: OperationFilter) -> SharedOplogStore {
        Arc::new(Mutex::new(Self::with_filter(filter)))
    }

    /// Subscribe to change notifications. Dropping the receiver
    /// unsubscribes; closed channels are pruned on the next notification.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StoreUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    // ===== Mutation =====

    /// Insert or overwrite a batch of operations.
    ///
    /// Each record is evaluated against the inclusion predicate: passing
    /// records are upserted, failing records that were previously present
    /// are removed. Emits at most one Deleted and one Created notification
    /// for the whole batch.
    pub fn add(&mut self, ops: Vec<Operation>) {
        let mut removed_ids: Vec<i64> = Vec::new();
        let mut removed_flows: BTreeSet<i64> = BTreeSet::new();
        let mut added_ids: Vec<i64> = Vec::new();
        let mut added_flows: BTreeSet<i64> = BTreeSet::new();

        for op in ops {
            if !(self.filter)(&op) {
                if self.remove_one(op.id).is_some() {
                    removed_ids.push(op.id);
                    removed_flows.insert(op.flow_id);
                }
                continue;
            }

            // In multihost mode two instances can both index the same
            // snapshot; keep only the first index operation per flow.
            if self.is_duplicate_index_snapshot(&op) {
                continue;
            }

            added_ids.push(op.id);
            added_flows.insert(op.flow_id);
            self.insert_one(op);
        }

        if !removed_ids.is_empty() {
            self.notify(StoreUpdate {
                kind: UpdateKind::Deleted,
                ids: removed_ids,
                flow_ids: removed_flows.into_iter().collect(),
            });
        }
        if !added_ids.is_empty() {
            self.notify(StoreUpdate {
                kind: UpdateKind::Created,
                ids: added_ids,
                flow_ids: added_flows.into_iter().collect(),
            });
        }
    }

    /// Remove operations by id. Ids the store never held are no-ops.
    /// Emits a single Deleted notification for the whole batch.
    pub fn remove_ids(&mut self, ids: &[i64]) {
        let mut removed_ids: Vec<i64> = Vec::new();
        let mut removed_flows: BTreeSet<i64> = BTreeSet::new();

        for &id in ids {
            if let Some(flow_id) = self.remove_one(id) {
                removed_ids.push(id);
                removed_flows.insert(flow_id);
            }
        }

        if !removed_ids.is_empty() {
            self.notify(StoreUpdate {
                kind: UpdateKind::Deleted,
                ids: removed_ids,
                flow_ids: removed_flows.into_iter().collect(),
            });
        }
    }

    /// Remove operations by identity.
    pub fn remove(&mut self, ops: &[Operation]) {
        let ids: Vec<i64> = ops.iter().map(|op| op.id).collect();
        self.remove_ids(&ids);
    }

    /// Clear both indexes, emitting one Deleted notification listing
    /// everything that was present. Used as part of stream resync.
    pub fn reset(&mut self) {
        if self.by_id.is_empty() {
            return;
        }
        let ids: Vec<i64> = self.by_id.keys().copied().collect();
        let mut flow_ids: Vec<i64> = self.by_flow.keys().copied().collect();
        flow_ids.sort_unstable();
        self.by_id.clear();
        self.by_flow.clear();
        self.notify(StoreUpdate {
            kind: UpdateKind::Deleted,
            ids,
            flow_ids,
        });
    }

    // ===== Reads =====

    /// All stored operations, ordered by id ascending.
    pub fn get_all(&self) -> Vec<Operation> {
        self.by_id.values().cloned().collect()
    }

    pub fn get_by_id(&self, id: i64) -> Option<Operation> {
        self.by_id.get(&id).cloned()
    }

    /// Operations for one flow in insertion order; empty for unknown flows.
    pub fn get_by_flow_id(&self, flow_id: i64) -> Vec<Operation> {
        let Some(ids) = self.by_flow.get(&flow_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    // ===== Internals =====

    fn is_duplicate_index_snapshot(&self, op: &Operation) -> bool {
        let OpPayload::IndexSnapshot { .. } = op.op else {
            return false;
        };
        let Some(ids) = self.by_flow.get(&op.flow_id) else {
            return false;
        };
        ids.iter().filter_map(|id| self.by_id.get(id)).any(|other| {
            other.id != op.id
                && matches!(other.op, OpPayload::IndexSnapshot { .. })
                && other.snapshot_id == op.snapshot_id
        })
    }

    fn insert_one(&mut self, op: Operation) {
        let flow_ids = self.by_flow.entry(op.flow_id).or_default();
        if !flow_ids.contains(&op.id) {
            flow_ids.push(op.id);
        }
        self.by_id.insert(op.id, op);
    }

    /// Returns the flow id of the removed operation, or None if absent.
    fn remove_one(&mut self, id: i64) -> Option<i64> {
        let op = self.by_id.remove(&id)?;
        if let Some(flow_ids) = self.by_flow.get_mut(&op.flow_id) {
            flow_ids.retain(|&other| other != id);
            if flow_ids.is_empty() {
                self.by_flow.remove(&op.flow_id);
            }
        }
        Some(op.flow_id)
    }

    fn notify(&mut self, update: StoreUpdate) {
        self.subscribers
            .retain(|tx| tx.send(update.clone()).is_ok());
    }
}

impl Default for OplogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OperationStatus, OpPayload};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn op(id: i64, flow_id: i64) -> Operation {
        Operation {
            id,
            flow_id,
            instance_id: "local".to_string(),
            original_instance_keyid: String::new(),
            plan_id: "plan1".to_string(),
            repo_id: "repo1".to_string(),
            repo_guid: "guid1".to_string(),
            snapshot_id: String::new(),
            unix_time_start_ms: id * 1000,
            unix_time_end_ms: id * 1000 + 500,
            status: OperationStatus::Success,
            op: OpPayload::Backup { last_status: None },
        }
    }

    fn index_snapshot_op(id: i64, flow_id: i64, snapshot_id: &str) -> Operation {
        let mut o = op(id, flow_id);
        o.snapshot_id = snapshot_id.to_string();
        o.op = OpPayload::IndexSnapshot {
            snapshot: None,
            forgot: false,
        };
        o
    }

    #[test]
    fn add_is_idempotent() {
        let mut store = OplogStore::new();
        let mut rx = store.subscribe();

        store.add(vec![op(1, 10)]);
        store.add(vec![op(1, 10)]);

        assert_eq!(store.get_all().len(), 1);
        assert_eq!(store.get_by_flow_id(10).len(), 1);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.kind, UpdateKind::Created);
        assert_eq!(first.ids, vec![1]);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.kind, UpdateKind::Created);
        assert_eq!(second.ids, vec![1]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn batch_emits_single_created_notification() {
        let mut store = OplogStore::new();
        let mut rx = store.subscribe();

        store.add(vec![op(1, 10), op(2, 10), op(3, 11)]);

        let update = rx.try_recv().unwrap();
        assert_eq!(update.kind, UpdateKind::Created);
        assert_eq!(update.ids, vec![1, 2, 3]);
        assert_eq!(update.flow_ids, vec![10, 11]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn filter_controls_presence() {
        let allow = Arc::new(AtomicBool::new(true));
        let allow_clone = allow.clone();
        let mut store =
            OplogStore::with_filter(Box::new(move |_| allow_clone.load(Ordering::SeqCst)));
        let mut rx = store.subscribe();

        store.add(vec![op(1, 10)]);
        assert!(store.get_by_id(1).is_some());
        assert_eq!(rx.try_recv().unwrap().kind, UpdateKind::Created);

        // Flipping the predicate and re-adding the same record moves it out.
        allow.store(false, Ordering::SeqCst);
        store.add(vec![op(1, 10)]);
        assert!(store.get_by_id(1).is_none());
        assert!(store.get_by_flow_id(10).is_empty());
        let update = rx.try_recv().unwrap();
        assert_eq!(update.kind, UpdateKind::Deleted);
        assert_eq!(update.ids, vec![1]);
    }

    #[test]
    fn rejected_absent_operation_emits_nothing() {
        let mut store = OplogStore::with_filter(Box::new(|_| false));
        let mut rx = store.subscribe();
        store.add(vec![op(1, 10)]);
        assert!(store.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn every_operation_appears_exactly_once_in_its_flow() {
        let mut store = OplogStore::new();
        store.add(vec![op(1, 10), op(2, 10), op(3, 11)]);
        store.add(vec![op(2, 10)]); // re-add

        for o in store.get_all() {
            let flow = store.get_by_flow_id(o.flow_id);
            assert_eq!(flow.iter().filter(|f| f.id == o.id).count(), 1);
        }
    }

    #[test]
    fn update_preserves_flow_slot_order() {
        let mut store = OplogStore::new();
        store.add(vec![op(1, 10), op(2, 10), op(3, 10)]);

        let mut updated = op(2, 10);
        updated.status = OperationStatus::Error;
        store.add(vec![updated]);

        let flow = store.get_by_flow_id(10);
        assert_eq!(flow.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(flow[1].status, OperationStatus::Error);
    }

    #[test]
    fn remove_ids_batches_into_one_notification() {
        let mut store = OplogStore::new();
        store.add(vec![op(1, 10), op(2, 10), op(3, 11)]);
        let mut rx = store.subscribe();

        store.remove_ids(&[1, 3, 99]);

        let update = rx.try_recv().unwrap();
        assert_eq!(update.kind, UpdateKind::Deleted);
        assert_eq!(update.ids, vec![1, 3]);
        assert_eq!(update.flow_ids, vec![10, 11]);
        assert!(rx.try_recv().is_err());

        assert_eq!(store.get_all().len(), 1);
        assert_eq!(store.get_by_flow_id(10).len(), 1);
        assert!(store.get_by_flow_id(11).is_empty());
    }

    #[test]
    fn removing_unknown_id_is_a_silent_noop() {
        let mut store = OplogStore::new();
        let mut rx = store.subscribe();
        store.remove_ids(&[42]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reset_reports_everything_removed() {
        let mut store = OplogStore::new();
        store.add(vec![op(1, 10), op(2, 11)]);
        let mut rx = store.subscribe();

        store.reset();

        let update = rx.try_recv().unwrap();
        assert_eq!(update.kind, UpdateKind::Deleted);
        assert_eq!(update.ids, vec![1, 2]);
        assert_eq!(update.flow_ids, vec![10, 11]);
        assert!(store.is_empty());
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn duplicate_index_snapshot_for_flow_is_skipped() {
        let mut store = OplogStore::new();
        store.add(vec![index_snapshot_op(1, 10, "snap-a")]);
        store.add(vec![index_snapshot_op(2, 10, "snap-a")]);

        assert!(store.get_by_id(1).is_some());
        assert!(store.get_by_id(2).is_none());

        // A different snapshot id in the same flow is fine.
        store.add(vec![index_snapshot_op(3, 10, "snap-b")]);
        assert!(store.get_by_id(3).is_some());
    }

    #[test]
    fn all_subscribers_receive_every_notification() {
        let mut store = OplogStore::new();
        let mut rx1 = store.subscribe();
        let mut rx2 = store.subscribe();

        store.add(vec![op(1, 10)]);

        assert_eq!(rx1.try_recv().unwrap().ids, vec![1]);
        assert_eq!(rx2.try_recv().unwrap().ids, vec![1]);

        // Dropping one receiver does not disturb the other.
        drop(rx1);
        store.add(vec![op(2, 10)]);
        assert_eq!(rx2.try_recv().unwrap().ids, vec![2]);
    }
}
