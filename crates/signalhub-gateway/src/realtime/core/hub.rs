use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use signalhub_core::error::{HubError, Result};
use signalhub_core::protocol::validate_group_name;

use crate::config::{LimitsSection, OverflowPolicy};
use crate::obs::HubMetrics;
use crate::realtime::core::groups::GroupIndex;
use crate::realtime::core::lifecycle::{CloseReason, SessionState};
use crate::realtime::core::outbound::PushOutcome;
use crate::realtime::core::registry::{Connection, ConnectionRegistry};
use crate::realtime::types::{Delivery, PreparedMsg};

/// Hub: connection registry + group index + fan-out.
///
/// Process-wide shared state, created at startup and torn down by `shutdown`.
/// No lock is held across a fan-out: recipients are snapshotted first and each
/// push only touches that recipient's queue.
pub struct Hub {
    registry: ConnectionRegistry,
    groups: GroupIndex,
    queue_capacity: usize,
    overflow: OverflowPolicy,
    metrics: Arc<HubMetrics>,
    /// Set by `shutdown`; no connection registers afterwards.
    closed: AtomicBool,
}

impl Hub {
    pub fn new(limits: &LimitsSection) -> Self {
        Self::with_metrics(limits, Arc::new(HubMetrics::new()))
    }

    pub fn with_metrics(limits: &LimitsSection, metrics: Arc<HubMetrics>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            groups: GroupIndex::new(),
            queue_capacity: limits.outbound_queue_capacity,
            overflow: limits.overflow_policy,
            metrics,
            closed: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn groups(&self) -> &GroupIndex {
        &self.groups
    }

    // ---- lifecycle ----

    /// Register a new connection in `Connecting`. Fails once `shutdown` ran.
    pub fn connect(&self) -> Result<Arc<Connection>> {
        if self.is_closed() {
            return Err(HubError::InvalidState {
                from: "shut_down",
                to: "connecting",
            });
        }
        let conn = Arc::new(Connection::new(self.queue_capacity, self.overflow));
        self.registry.register(Arc::clone(&conn));
        self.metrics.connections_opened.inc(&[]);
        self.metrics.connections_active.inc();

        // Shutdown may have snapshotted the registry before the insert above.
        if self.is_closed() {
            self.disconnect(conn.id(), CloseReason::Shutdown);
            return Err(HubError::InvalidState {
                from: "shut_down",
                to: "connecting",
            });
        }
        tracing::debug!(conn_id = %conn.id(), "connection registered");
        Ok(conn)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Handshake succeeded: `Connecting -> Connected`.
    pub fn handshake_ok(&self, id: &str) -> Result<()> {
        let conn = self.registry.lookup(id)?;
        conn.lifecycle().transition(SessionState::Connected)?;
        tracing::debug!(conn_id = %id, "connection established");
        Ok(())
    }

    /// Begin closing: move to `Disconnecting` and release the outbound queue.
    /// Returns `false` if the connection was already closing or gone.
    pub fn begin_close(&self, id: &str, reason: CloseReason) -> bool {
        let Ok(conn) = self.registry.lookup(id) else {
            return false;
        };
        Self::begin_close_conn(&conn, reason)
    }

    fn begin_close_conn(conn: &Connection, reason: CloseReason) -> bool {
        match conn.lifecycle().transition(SessionState::Disconnecting) {
            Ok(_) => {
                let discarded = conn.queue().close();
                tracing::debug!(conn_id = %conn.id(), reason = reason.as_str(), discarded, "connection closing");
                true
            }
            Err(_) => {
                // Overflow may have closed the queue without winning the transition.
                conn.queue().close();
                false
            }
        }
    }

    /// Finish closing: `Disconnecting -> Closed`, then evict registry and index.
    pub fn finish_close(&self, id: &str, reason: CloseReason) -> Result<()> {
        let conn = self.registry.lookup(id)?;
        conn.lifecycle().transition(SessionState::Closed)?;
        self.unregister(id, reason);
        Ok(())
    }

    /// `begin_close` + `finish_close`; safe to call from any state.
    pub fn disconnect(&self, id: &str, reason: CloseReason) {
        self.begin_close(id, reason);
        if let Err(e) = self.finish_close(id, reason) {
            tracing::debug!(conn_id = %id, error = %e, "disconnect: nothing to finish");
        }
    }

    /// Remove from the registry, close the queue, and drop all group
    /// memberships. The connection ends up `Closed` whatever state it was in.
    pub fn unregister(&self, id: &str, reason: CloseReason) -> Option<Arc<Connection>> {
        let conn = self.registry.unregister(id)?;
        // either step may already have happened
        let _ = conn.lifecycle().transition(SessionState::Disconnecting);
        let _ = conn.lifecycle().transition(SessionState::Closed);
        conn.queue().close();
        let left = self.groups.cleanup(&conn);
        self.metrics.connections_active.dec();
        self.metrics
            .connections_closed
            .inc(&[("reason", reason.as_str())]);
        tracing::debug!(conn_id = %id, groups_left = left.len(), reason = reason.as_str(), "connection unregistered");
        Some(conn)
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<Connection>> {
        self.registry.lookup(id)
    }

    /// Close every connection. Used on graceful shutdown.
    pub fn shutdown(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let conns = self.registry.snapshot();
        let n = conns.len();
        for conn in conns {
            self.disconnect(conn.id(), CloseReason::Shutdown);
        }
        tracing::info!(closed = n, "hub shut down");
        n
    }

    // ---- membership ----

    /// Join is idempotent; returns `true` when membership changed.
    pub fn join(&self, id: &str, group: &str) -> Result<bool> {
        validate_group_name(group)?;
        let conn = self.registry.lookup(id)?;
        self.groups.join(&conn, group)
    }

    /// Leaving a group the connection is not in is a no-op.
    pub fn leave(&self, id: &str, group: &str) -> Result<bool> {
        let conn = self.registry.lookup(id)?;
        Ok(self.groups.leave(&conn, group))
    }

    pub fn members_of(&self, group: &str) -> Vec<String> {
        self.groups.members_of(group)
    }

    pub fn groups_of(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.registry.lookup(id)?.joined_groups())
    }

    // ---- delivery ----

    /// Send to a single connection. Unknown ids yield `NotFound`.
    pub fn send(&self, to: &str, msg: PreparedMsg) -> Result<PushOutcome> {
        let conn = self.registry.lookup(to)?;
        if conn.state() != SessionState::Connected {
            return Err(HubError::NotFound(format!("connection {to} not connected")));
        }
        Ok(self.deliver(&conn, msg))
    }

    /// Fan out to every current member of `group`, optionally skipping the sender.
    /// Unknown or empty groups deliver to nobody.
    pub fn broadcast(&self, group: &str, msg: &PreparedMsg, exclude: Option<&str>) -> Delivery {
        let started = Instant::now();
        let members = self.groups.members_of(group);
        let mut report = Delivery::default();
        for id in members {
            if exclude == Some(id.as_str()) {
                report.skipped += 1;
                continue;
            }
            match self.registry.lookup(&id) {
                Ok(conn) => report.merge(self.deliver_counted(&conn, msg)),
                // Disconnected between snapshot and push.
                Err(_) => report.skipped += 1,
            }
        }
        self.metrics
            .fanout_duration
            .observe(&[("target", "group")], started.elapsed());
        tracing::trace!(group, ?report, "group broadcast");
        report
    }

    /// Fan out to every connected client.
    pub fn broadcast_all(&self, msg: &PreparedMsg, exclude: Option<&str>) -> Delivery {
        let started = Instant::now();
        let mut report = Delivery::default();
        for conn in self.registry.snapshot() {
            if exclude == Some(conn.id()) {
                report.skipped += 1;
                continue;
            }
            report.merge(self.deliver_counted(&conn, msg));
        }
        self.metrics
            .fanout_duration
            .observe(&[("target", "all")], started.elapsed());
        report
    }

    fn deliver_counted(&self, conn: &Connection, msg: &PreparedMsg) -> Delivery {
        let mut d = Delivery::default();
        if conn.state() != SessionState::Connected {
            d.skipped = 1;
            return d;
        }
        if self.deliver(conn, msg.clone()).accepted() {
            d.delivered = 1;
        } else {
            d.dropped = 1;
        }
        d
    }

    fn deliver(&self, conn: &Connection, msg: PreparedMsg) -> PushOutcome {
        let outcome = conn.push(msg);
        self.metrics
            .deliveries
            .inc(&[("outcome", outcome.as_str())]);
        match outcome {
            PushOutcome::DroppedOldest => {
                tracing::debug!(conn_id = %conn.id(), "outbound queue full, dropped oldest frame");
            }
            PushOutcome::Overflow => {
                tracing::warn!(conn_id = %conn.id(), capacity = conn.queue().capacity(), "outbound queue overflow, disconnecting");
                Self::begin_close_conn(conn, CloseReason::Overflow);
            }
            PushOutcome::Queued | PushOutcome::Closed => {}
        }
        outcome
    }
}

/// Per-message context passed to handlers.
#[derive(Clone)]
pub struct HubCtx {
    conn_id: Arc<str>,
    hub: Arc<Hub>,
}

impl HubCtx {
    pub fn new(conn_id: impl Into<Arc<str>>, hub: Arc<Hub>) -> Self {
        Self {
            conn_id: conn_id.into(),
            hub,
        }
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    /// Push a frame to the connection that sent the current message.
    pub fn reply(&self, msg: PreparedMsg) -> Result<PushOutcome> {
        let conn = self.hub.lookup(&self.conn_id)?;
        Ok(self.hub.deliver(&conn, msg))
    }

    pub fn join(&self, group: &str) -> Result<bool> {
        self.hub.join(&self.conn_id, group)
    }

    pub fn leave(&self, group: &str) -> Result<bool> {
        self.hub.leave(&self.conn_id, group)
    }

    pub fn send(&self, to: &str, msg: PreparedMsg) -> Result<PushOutcome> {
        self.hub.send(to, msg)
    }

    pub fn broadcast(&self, group: &str, msg: &PreparedMsg, exclude_self: bool) -> Delivery {
        let exclude = exclude_self.then_some(self.conn_id());
        self.hub.broadcast(group, msg, exclude)
    }

    pub fn broadcast_all(&self, msg: &PreparedMsg, exclude_self: bool) -> Delivery {
        let exclude = exclude_self.then_some(self.conn_id());
        self.hub.broadcast_all(msg, exclude)
    }
}
