use std::collections::HashSet;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use signalhub_core::error::{HubError, Result};

use crate::realtime::core::registry::Connection;

/// Group index: `group -> {connection_id...}`.
///
/// The reverse view (`connection -> groups`) lives on the `Connection`. Both
/// sides are updated while holding that connection's membership lock, so the
/// two views always agree for anyone taking the same lock. Lock order is
/// connection membership first, then the group shard.
#[derive(Default)]
pub struct GroupIndex {
    members: DashMap<String, HashSet<String>>,
}

impl GroupIndex {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
        }
    }

    /// Join `group`. Returns `false` if already a member.
    pub fn join(&self, conn: &Connection, group: &str) -> Result<bool> {
        let mut m = conn.membership();
        if m.sealed {
            return Err(HubError::NotFound(format!("connection {}", conn.id())));
        }
        if m.groups.contains(group) {
            return Ok(false);
        }
        self.members
            .entry(group.to_string())
            .or_default()
            .insert(conn.id().to_string());
        m.groups.insert(group.to_string());
        Ok(true)
    }

    /// Leave `group`. Returns `false` if not a member.
    pub fn leave(&self, conn: &Connection, group: &str) -> bool {
        let mut m = conn.membership();
        if !m.groups.remove(group) {
            return false;
        }
        self.remove_member(group, conn.id());
        true
    }

    /// Drop every membership of `conn` and seal it. Returns the groups left.
    pub fn cleanup(&self, conn: &Connection) -> Vec<String> {
        let mut m = conn.membership();
        m.sealed = true;
        let groups: Vec<String> = m.groups.drain().collect();
        for g in &groups {
            self.remove_member(g, conn.id());
        }
        groups
    }

    fn remove_member(&self, group: &str, conn_id: &str) {
        if let Entry::Occupied(mut e) = self.members.entry(group.to_string()) {
            e.get_mut().remove(conn_id);
            if e.get().is_empty() {
                e.remove();
            }
        }
    }

    /// Snapshot of a group's members; unknown groups are empty.
    pub fn members_of(&self, group: &str) -> Vec<String> {
        self.members
            .get(group)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn group_count(&self) -> usize {
        self.members.len()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.members.iter().map(|e| e.key().clone()).collect()
    }
}
