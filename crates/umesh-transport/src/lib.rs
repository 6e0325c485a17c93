//! Addressing and forwarding core for the umesh mesh network.
//!
//! This crate handles short-address allocation, link-layer admission,
//! duplicate-frame suppression, and next-hop selection through pluggable
//! routers held in a registry.

pub mod allocator;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod router;
pub mod whitelist;

pub use allocator::{AllocatorMode, SidAllocator};
pub use dedup::{DedupEntry, DuplicateFilter};
pub use error::{AllocatorError, RouterError, WhitelistError};
pub use filter::{FilterVerdict, FrameFilter, RejectReason};
pub use router::{MeshEvent, Neighbor, Router, RouterId, RouterRegistry, SidRouter, SidType};
pub use whitelist::{Whitelist, WhitelistEntry};
