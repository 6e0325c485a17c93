//! Pluggable next-hop routing.
//!
//! A [`Router`] is one addressing strategy. Routers are registered in a
//! [`RouterRegistry`] owned by the mesh instance, which forwards lifecycle,
//! neighbor and event notifications and asks the default router for next hops.

pub mod registry;
pub mod sid_router;
pub mod types;

pub use registry::{MAX_ROUTERS, RouterRegistry};
pub use sid_router::{SidRouter, compute_next_hop};
pub use types::{EventKind, MeshEvent, Neighbor, RouterId, SidType};

use umesh_core::types::Sid;

use crate::error::RouterError;

/// An addressing and forwarding strategy.
pub trait Router: Send {
    /// Identity tag, unique within a registry.
    fn id(&self) -> RouterId;

    /// The kind of short address this router routes on.
    fn sid_type(&self) -> SidType;

    /// Events this router wants delivered through [`Router::on_event`].
    fn events(&self) -> &[EventKind];

    fn start(&mut self);

    fn stop(&mut self);

    /// A neighbor was discovered or its link state changed.
    fn on_neighbor_updated(&mut self, neighbor: &Neighbor);

    /// A routing-info message addressed to this router arrived.
    fn on_message_received(&mut self, payload: &[u8]) -> Result<(), RouterError>;

    fn on_event(&mut self, event: &MeshEvent);

    /// Next hop toward `dest`, or [`Sid::INVALID`] when no route exists.
    fn next_hop(&self, dest: Sid) -> Sid;
}
