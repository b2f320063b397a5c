//! Per-flow execution locks.

use dashmap::DashMap;
use phaseflow_core::FlowId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<FlowId, Arc<Mutex<()>>>;

/// In-process table guaranteeing at most one in-flight execution per flow.
///
/// Acquisition never waits: a busy flow is reported immediately so the
/// caller can surface a conflict. Entries are removed when the last lease on
/// a flow is released, so the table only holds flows being executed.
#[derive(Debug, Default, Clone)]
pub struct FlowLocks {
    locks: Arc<LockTable>,
}

impl FlowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock of `flow_id`, or returns `None` if it is held.
    pub fn try_acquire(&self, flow_id: FlowId) -> Option<FlowLease> {
        let mutex = Arc::clone(&self.locks.entry(flow_id).or_default());
        match mutex.try_lock_owned() {
            Ok(guard) => Some(FlowLease {
                flow_id,
                guard: Some(guard),
                locks: Arc::clone(&self.locks),
            }),
            Err(_) => {
                self.prune(flow_id);
                None
            }
        }
    }

    pub fn is_locked(&self, flow_id: FlowId) -> bool {
        self.locks
            .get(&flow_id)
            .is_some_and(|mutex| mutex.try_lock().is_err())
    }

    /// Number of flows with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn prune(&self, flow_id: FlowId) {
        prune(&self.locks, flow_id);
    }
}

// Only the table itself holds the mutex once every lease and probe is gone.
fn prune(locks: &LockTable, flow_id: FlowId) {
    locks.remove_if(&flow_id, |_, mutex| Arc::strong_count(mutex) == 1);
}

/// Exclusive right to execute one flow. Released on drop.
#[derive(Debug)]
pub struct FlowLease {
    flow_id: FlowId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
}

impl FlowLease {
    pub fn flow_id(&self) -> FlowId {
        self.flow_id
    }
}

impl Drop for FlowLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune(&self.locks, self.flow_id);
    }
}
