use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;

use signalhub_core::error::{HubError, Result};

use crate::config::OverflowPolicy;
use crate::realtime::core::lifecycle::{Lifecycle, SessionState};
use crate::realtime::core::outbound::{OutboundQueue, PushOutcome};
use crate::realtime::types::PreparedMsg;

/// Groups a connection has joined. `sealed` is set once the connection has
/// been cleaned up so late joins cannot resurrect membership.
#[derive(Debug, Default)]
pub(crate) struct Membership {
    pub(crate) groups: HashSet<String>,
    pub(crate) sealed: bool,
}

/// One live transport session.
pub struct Connection {
    id: Arc<str>,
    queue: OutboundQueue,
    lifecycle: Lifecycle,
    membership: Mutex<Membership>,
}

impl Connection {
    /// New connection in `Connecting` with a fresh random id.
    pub fn new(queue_capacity: usize, overflow: OverflowPolicy) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), queue_capacity, overflow)
    }

    pub fn with_id(id: impl Into<Arc<str>>, queue_capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            id: id.into(),
            queue: OutboundQueue::new(queue_capacity, overflow),
            lifecycle: Lifecycle::new(),
            membership: Mutex::new(Membership::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn push(&self, msg: PreparedMsg) -> PushOutcome {
        self.queue.push(msg)
    }

    /// Snapshot of joined groups.
    pub fn joined_groups(&self) -> Vec<String> {
        self.membership().groups.iter().cloned().collect()
    }

    pub(crate) fn membership(&self) -> MutexGuard<'_, Membership> {
        self.membership.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Connection registry: `connection_id -> Connection`.
///
/// The registry owns every connection; everyone else holds short-lived `Arc`
/// clones obtained through `lookup`.
#[derive(Default)]
pub struct ConnectionRegistry {
    conns: DashMap<Arc<str>, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
        }
    }

    /// Take ownership of `conn`, returning its id. Only the `Hub` registers,
    /// so every entry is paired with its group and lifecycle bookkeeping.
    pub(crate) fn register(&self, conn: Arc<Connection>) -> Arc<str> {
        let id = Arc::clone(&conn.id);
        self.conns.insert(Arc::clone(&id), conn);
        id
    }

    /// Remove the entry only. Public removal goes through `Hub::unregister`,
    /// which also closes the queue and drops group memberships.
    pub(crate) fn unregister(&self, id: &str) -> Option<Arc<Connection>> {
        self.conns.remove(id).map(|(_, conn)| conn)
    }

    /// Unknown ids yield `NotFound`, which callers treat as a no-op.
    pub fn lookup(&self, id: &str) -> Result<Arc<Connection>> {
        self.conns
            .get(id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| HubError::NotFound(format!("connection {id}")))
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.conns.iter().map(|e| Arc::clone(e.value())).collect()
    }
}
