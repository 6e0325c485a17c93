//! Hierarchical next-hop selection over nibble-structured SIDs.
//!
//! Each nibble of a SID is one tree level, so a SID's prefix names its
//! ancestors. Routing needs no tables: a destination inside our subtree is
//! reached by stepping one level down toward it, anything else by stepping
//! one level up toward our parent.

use umesh_core::constants::SID_NIBBLES;
use umesh_core::types::Sid;

use super::types::{EventKind, MeshEvent, Neighbor, RouterId, SidType};
use super::Router;
use crate::error::RouterError;

const SUBSCRIBED_EVENTS: [EventKind; 1] = [EventKind::SidUpdated];

/// Longest shared nibble prefix of `a` and `b`, with the remaining nibbles zero.
#[must_use]
pub fn common_parent(a: Sid, b: Sid) -> Sid {
    let mut parent = Sid::new(0);
    for level in 0..SID_NIBBLES {
        if a.nibble(level) != b.nibble(level) {
            break;
        }
        parent = parent.with_nibble(level, a.nibble(level));
    }
    parent
}

/// Next hop from `local` toward `dest`.
///
/// Returns [`Sid::INVALID`] when `local` is not a unique address.
pub fn compute_next_hop(local: Sid, dest: Sid) -> Sid {
    if !local.is_unique() {
        return Sid::INVALID;
    }
    if dest == local {
        return dest;
    }

    if common_parent(local, dest) == local {
        // dest is below us: take its nibble at the first level we differ
        return (0..SID_NIBBLES)
            .find(|&level| local.nibble(level) != dest.nibble(level))
            .map_or(Sid::INVALID, |level| {
                local.with_nibble(level, dest.nibble(level))
            });
    }

    // dest is elsewhere in the tree: go to our parent
    (0..SID_NIBBLES)
        .rev()
        .find(|&level| local.nibble(level) != 0)
        .map_or(Sid::INVALID, |level| local.with_nibble(level, 0))
}

/// Router for structured, hierarchical short addresses.
#[derive(Debug)]
pub struct SidRouter {
    local_sid: Sid,
    running: bool,
}

impl SidRouter {
    pub fn new() -> Self {
        Self {
            local_sid: Sid::INVALID,
            running: false,
        }
    }

    pub fn local_sid(&self) -> Sid {
        self.local_sid
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for SidRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Router for SidRouter {
    fn id(&self) -> RouterId {
        RouterId::SID_ROUTER
    }

    fn sid_type(&self) -> SidType {
        SidType::Structured
    }

    fn events(&self) -> &[EventKind] {
        &SUBSCRIBED_EVENTS
    }

    fn start(&mut self) {
        self.running = true;
        tracing::debug!("sid router started");
    }

    fn stop(&mut self) {
        self.running = false;
        self.local_sid = Sid::INVALID;
        tracing::debug!("sid router stopped");
    }

    fn on_neighbor_updated(&mut self, neighbor: &Neighbor) {
        tracing::trace!(sid = %neighbor.sid, "sid router: neighbor updated");
    }

    fn on_message_received(&mut self, payload: &[u8]) -> Result<(), RouterError> {
        // structured addresses carry their routes, nothing to learn
        tracing::trace!(len = payload.len(), "sid router: ignoring routing message");
        Ok(())
    }

    fn on_event(&mut self, event: &MeshEvent) {
        match event {
            MeshEvent::SidUpdated { sid } => {
                self.local_sid = *sid;
                tracing::debug!(sid = %sid, "sid router: local sid updated");
            }
        }
    }

    fn next_hop(&self, dest: Sid) -> Sid {
        compute_next_hop(self.local_sid, dest)
    }
}
