//! Registry of routing strategies owned by one mesh instance.

use umesh_core::types::Sid;

use super::types::{MeshEvent, Neighbor, RouterId};
use super::Router;
use crate::error::RouterError;

/// Maximum number of routers one registry holds.
pub const MAX_ROUTERS: usize = 3;

/// Registered routers plus the default one used for forwarding.
///
/// Routers are never removed once registered. The first router registered
/// becomes the default.
pub struct RouterRegistry {
    routers: Vec<Box<dyn Router>>,
    default: Option<usize>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        Self {
            routers: Vec::with_capacity(MAX_ROUTERS),
            default: None,
        }
    }

    /// Add a router. Ids and SID types must be unique within the registry.
    pub fn register(&mut self, router: Box<dyn Router>) -> Result<(), RouterError> {
        if self.routers.len() >= MAX_ROUTERS {
            return Err(RouterError::RegistryFull(MAX_ROUTERS));
        }
        if self.routers.iter().any(|r| r.id() == router.id()) {
            return Err(RouterError::DuplicateRouter(router.id()));
        }
        if self.routers.iter().any(|r| r.sid_type() == router.sid_type()) {
            return Err(RouterError::DuplicateSidType(router.sid_type()));
        }

        tracing::debug!(id = %router.id(), sid_type = ?router.sid_type(), "router registered");
        self.routers.push(router);
        if self.default.is_none() {
            self.default = Some(self.routers.len() - 1);
        }
        Ok(())
    }

    fn index_of(&self, id: RouterId) -> Option<usize> {
        self.routers.iter().position(|r| r.id() == id)
    }

    #[must_use]
    pub fn get(&self, id: RouterId) -> Option<&dyn Router> {
        self.index_of(id).map(|i| &*self.routers[i])
    }

    #[must_use]
    pub fn default_router_id(&self) -> Option<RouterId> {
        self.default.map(|i| self.routers[i].id())
    }

    /// Switch forwarding to another registered router.
    ///
    /// The previous default is stopped and the new one started.
    pub fn set_default(&mut self, id: RouterId) -> Result<(), RouterError> {
        let idx = self.index_of(id).ok_or(RouterError::UnknownRouter(id))?;
        if self.default == Some(idx) {
            return Ok(());
        }
        if let Some(old) = self.default {
            self.routers[old].stop();
        }
        self.default = Some(idx);
        self.routers[idx].start();
        tracing::info!(id = %id, "default router changed");
        Ok(())
    }

    /// Next hop toward `dest` from the default router.
    ///
    /// [`Sid::INVALID`] when there is no default router or no route.
    #[must_use]
    pub fn next_hop(&self, dest: Sid) -> Sid {
        self.default
            .map_or(Sid::INVALID, |i| self.routers[i].next_hop(dest))
    }

    /// Like [`RouterRegistry::next_hop`], with the failure as an error.
    pub fn route(&self, dest: Sid) -> Result<Sid, RouterError> {
        let idx = self.default.ok_or(RouterError::NoDefaultRouter)?;
        let hop = self.routers[idx].next_hop(dest);
        if hop == Sid::INVALID {
            return Err(RouterError::InvalidAddress(dest));
        }
        Ok(hop)
    }

    pub fn neighbor_updated(&mut self, neighbor: &Neighbor) {
        if let Some(idx) = self.default {
            self.routers[idx].on_neighbor_updated(neighbor);
        }
    }

    /// Hand a routing-info message to the router named by its first byte.
    pub fn message_received(&mut self, message: &[u8]) -> Result<(), RouterError> {
        let (&id, payload) = message.split_first().ok_or(RouterError::EmptyMessage)?;
        let id = RouterId(id);
        let idx = self.index_of(id).ok_or(RouterError::UnknownRouter(id))?;
        tracing::trace!(id = %id, len = payload.len(), "routing message received");
        self.routers[idx].on_message_received(payload)
    }

    /// Deliver `event` to every router subscribed to its kind.
    pub fn dispatch_event(&mut self, event: &MeshEvent) {
        let kind = event.kind();
        for router in self
            .routers
            .iter_mut()
            .filter(|r| r.events().contains(&kind))
        {
            router.on_event(event);
        }
    }

    /// The mesh interface came up with `local_sid`.
    pub fn interface_up(&mut self, local_sid: Sid) {
        tracing::debug!(sid = %local_sid, "router registry: interface up");
        if let Some(idx) = self.default {
            self.routers[idx].start();
        }
        self.dispatch_event(&MeshEvent::SidUpdated { sid: local_sid });
    }

    pub fn interface_down(&mut self) {
        tracing::debug!("router registry: interface down");
        for router in &mut self.routers {
            router.stop();
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = RouterId> + '_ {
        self.routers.iter().map(|r| r.id())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}

impl Default for RouterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for RouterRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RouterRegistry")
            .field("routers", &self.ids().collect::<Vec<_>>())
            .field("default", &self.default_router_id())
            .finish()
    }
}
