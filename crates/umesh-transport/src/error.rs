//! Transport layer error types.

use umesh_core::types::{Sid, Uuid};

use crate::router::{RouterId, SidType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocatorError {
    #[error("SID address space exhausted: all {capacity} addresses in use")]
    CapacityExceeded { capacity: u16 },

    #[error("node not found: {0}")]
    NotFound(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WhitelistError {
    #[error("no constant RSSI set")]
    NotSet,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("invalid address: {0}")]
    InvalidAddress(Sid),

    #[error("router {0} already registered")]
    DuplicateRouter(RouterId),

    #[error("a router for SID type {0:?} is already registered")]
    DuplicateSidType(SidType),

    #[error("router registry full: {0} routers")]
    RegistryFull(usize),

    #[error("unknown router: {0}")]
    UnknownRouter(RouterId),

    #[error("no default router")]
    NoDefaultRouter,

    #[error("empty routing message")]
    EmptyMessage,
}
