//! Router tags, events and neighbor records.

use core::fmt;

use umesh_core::types::{MacAddress, Sid, Uuid};

/// Router identity tag. Also the first byte of a routing-info message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouterId(pub u8);

impl RouterId {
    pub const SID_ROUTER: RouterId = RouterId(0);
    pub const VECTOR_ROUTER: RouterId = RouterId(1);
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a router's short addresses are structured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SidType {
    /// Hierarchical nibble-structured addresses.
    Structured = 0,
    /// Flat addresses from a small random pool.
    ShortRandom = 1,
    /// Flat addresses from the full random space.
    Random = 2,
}

/// Event codes a router can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SidUpdated,
}

/// An event dispatched to subscribed routers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshEvent {
    /// This node's short address was (re)assigned.
    SidUpdated { sid: Sid },
}

impl MeshEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            MeshEvent::SidUpdated { .. } => EventKind::SidUpdated,
        }
    }
}

/// A directly reachable peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub mac: MacAddress,
    pub uuid: Uuid,
    pub sid: Sid,
    pub rssi: i8,
}
