//! The mesh-instance context.
//!
//! [`MeshContext`] owns every table of one mesh instance (allocator,
//! whitelist, duplicate filter, neighbors, router registry) and drives the
//! control flow between them:
//!
//! - inbound frame: filter, whitelist admission, then by message kind
//! - discovery from an unattached peer: allocate a child SID and hand it out
//! - SID assignment for us: adopt it, checkpoint the config record, notify routers
//! - outbound data: next hop, neighbor MAC, link frame
//!
//! SIDs form a tree. A node owns the nibble level just below its own SID and
//! gives its children the values `1..=max_children` at that level. The leader
//! keeps the top four root prefixes in reserve, and no slot ever maps onto a
//! reserved SID.

use umesh_core::constants::SID_NIBBLES;
use umesh_core::frame::{self, FrameEncoder};
use umesh_core::types::{Eui48, MacAddress, NetworkId, NodeIdentity, Sid, Uuid};
use umesh_transport::{
    AllocatorMode, FilterVerdict, FrameFilter, MeshEvent, Neighbor, RouterError, RouterRegistry,
    SidAllocator, SidRouter, Whitelist,
};

use crate::clock::Clock;
use crate::error::NodeError;
use crate::link::RawLink;
use crate::message::MeshMessage;
use crate::storage::{ConfigRecord, KvStore};

/// Child slots one nibble level can address.
pub const MAX_CHILDREN: u16 = 15;

/// Top-level slots the leader hands out. Prefixes 0xc000..=0xf000 stay reserved.
pub const LEADER_MAX_CHILDREN: u16 = 11;

/// RSSI recorded for peers on links that cannot measure it.
pub const DEFAULT_RSSI: i8 = 0;

/// A whitelist entry to install at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhitelistSeed {
    pub address: MacAddress,
    pub rssi: Option<i8>,
}

/// Settings for one mesh instance.
#[derive(Debug, Clone)]
pub struct MeshConfig {
    pub uuid: Uuid,
    pub mac: Eui48,
    pub network_id: NetworkId,
    pub leader: bool,
    pub allocator_mode: AllocatorMode,
    pub max_children: u16,
    pub whitelist_enabled: bool,
    pub whitelist: Vec<WhitelistSeed>,
}

impl MeshConfig {
    pub fn new(uuid: Uuid, mac: Eui48, network_id: NetworkId) -> Self {
        Self {
            uuid,
            mac,
            network_id,
            leader: false,
            allocator_mode: AllocatorMode::Sequential,
            max_children: MAX_CHILDREN,
            whitelist_enabled: false,
            whitelist: Vec::new(),
        }
    }
}

/// Application data that reached its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub src: Sid,
    pub payload: Vec<u8>,
}

/// Nibble level at which children of `sid` differ from it.
///
/// `None` when `sid` already uses every level.
#[must_use]
pub fn child_level(sid: Sid) -> Option<usize> {
    let depth = (0..SID_NIBBLES)
        .rev()
        .find(|&level| sid.nibble(level) != 0)
        .map_or(0, |level| level + 1);
    (depth < SID_NIBBLES).then_some(depth)
}

/// Parent of `sid` in the SID tree, or `None` for the leader.
#[must_use]
pub fn parent_of(sid: Sid) -> Option<Sid> {
    (0..SID_NIBBLES)
        .rev()
        .find(|&level| sid.nibble(level) != 0)
        .map(|level| sid.with_nibble(level, 0))
}

/// Number of child slots `sid` can hand out, at most `max_children`.
///
/// Zero at the deepest level. Slots whose child SID would be a reserved
/// address are left out.
#[must_use]
pub fn child_slots(sid: Sid, max_children: u16) -> u16 {
    let Some(level) = child_level(sid) else {
        return 0;
    };
    let cap = if sid == Sid::LEADER {
        max_children.min(LEADER_MAX_CHILDREN)
    } else {
        max_children.min(MAX_CHILDREN)
    };
    // reserved SIDs sit at the top of the last level, so valid slots are a prefix
    (1..=cap)
        .take_while(|&slot| sid.with_nibble(level, slot as u8).is_unique())
        .count() as u16
}

/// Allocator slot for a requested child SID, or [`Sid::INVALID`] if the
/// request is not a direct child of `parent` at `level`.
fn requested_slot(parent: Sid, level: usize, requested: Sid) -> Sid {
    let slot = requested.nibble(level);
    if requested.is_unique() && slot != 0 && parent.with_nibble(level, slot) == requested {
        Sid::new(u16::from(slot))
    } else {
        Sid::INVALID
    }
}

/// One mesh instance bound to a link, a config store and a clock.
pub struct MeshContext<L, K, C> {
    identity: NodeIdentity,
    mac: Eui48,
    leader: bool,
    /// SID asked for in discovery beacons while unattached.
    requested_sid: Sid,
    allocator_mode: AllocatorMode,
    max_children: u16,
    encoder: FrameEncoder,
    filter: FrameFilter,
    whitelist: Whitelist,
    allocator: SidAllocator,
    routers: RouterRegistry,
    neighbors: Vec<Neighbor>,
    link: L,
    store: K,
    clock: C,
}

impl<L: RawLink, K: KvStore, C: Clock> MeshContext<L, K, C> {
    pub fn new(config: MeshConfig, link: L, store: K, clock: C) -> Result<Self, NodeError> {
        if !(1..=MAX_CHILDREN).contains(&config.max_children) {
            return Err(NodeError::Config(format!(
                "max_children must be 1..={MAX_CHILDREN}, got {}",
                config.max_children
            )));
        }

        let mut whitelist = Whitelist::new();
        for seed in &config.whitelist {
            let Some(entry) = whitelist.add(&seed.address) else {
                tracing::warn!(mac = %seed.address, "whitelist full, entry skipped");
                continue;
            };
            if let Some(rssi) = seed.rssi {
                entry.set_constant_rssi(rssi);
            }
        }
        if config.whitelist_enabled {
            whitelist.enable();
        }

        let mut routers = RouterRegistry::new();
        routers.register(Box::new(SidRouter::new()))?;

        Ok(Self {
            identity: NodeIdentity::new(config.uuid),
            mac: config.mac,
            leader: config.leader,
            requested_sid: Sid::INVALID,
            allocator_mode: config.allocator_mode,
            max_children: config.max_children,
            encoder: FrameEncoder::new(config.mac, config.network_id),
            filter: FrameFilter::new(config.mac, config.network_id),
            whitelist,
            // nothing to hand out until we hold a SID
            allocator: SidAllocator::with_capacity(config.allocator_mode, 0),
            routers,
            neighbors: Vec::new(),
            link,
            store,
            clock,
        })
    }

    /// Load the persisted record and take or request a SID.
    pub fn start(&mut self) -> Result<(), NodeError> {
        let record = ConfigRecord::load(&mut self.store)?;

        if self.leader {
            self.set_local_sid(Sid::LEADER, Sid::INVALID);
        } else if record.is_valid()
            && record.network_id() == self.network_id()
            && record.local_sid().is_unique()
        {
            self.requested_sid = record.local_sid();
            tracing::info!(sid = %self.requested_sid, "restored SID from configuration record");
        }

        tracing::info!(uuid = %self.identity.uuid, mac = %self.mac, "mesh started");
        Ok(())
    }

    /// Detach from the mesh. The current SID is kept as the next request.
    pub fn stop(&mut self) {
        self.routers.interface_down();
        if self.identity.sid.is_unique() {
            self.requested_sid = self.identity.sid;
        }
        self.identity.sid = Sid::INVALID;
        self.identity.attach_sid = Sid::INVALID;
        self.neighbors.clear();
        self.reset_allocator();
        tracing::info!("mesh stopped");
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn local_sid(&self) -> Sid {
        self.identity.sid
    }

    pub fn mac(&self) -> Eui48 {
        self.mac
    }

    pub fn network_id(&self) -> NetworkId {
        self.filter.network_id()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.identity.sid.is_unique()
    }

    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn neighbor_by_sid(&self, sid: Sid) -> Option<&Neighbor> {
        self.neighbors.iter().find(|n| n.sid == sid)
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn whitelist_mut(&mut self) -> &mut Whitelist {
        &mut self.whitelist
    }

    pub fn allocator(&self) -> &SidAllocator {
        &self.allocator
    }

    pub fn routers(&self) -> &RouterRegistry {
        &self.routers
    }

    pub fn routers_mut(&mut self) -> &mut RouterRegistry {
        &mut self.routers
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    fn reset_allocator(&mut self) {
        let slots = child_slots(self.identity.sid, self.max_children);
        self.allocator = SidAllocator::with_capacity(self.allocator_mode, slots);
    }

    /// Adopt `sid` as this node's address under `parent`.
    pub fn set_local_sid(&mut self, sid: Sid, parent: Sid) {
        let previous = self.identity.sid;
        self.identity.sid = sid;
        self.identity.attach_sid = parent;
        self.requested_sid = sid;

        if previous != sid {
            // children were numbered under the old prefix
            self.reset_allocator();
        }
        self.persist();

        if previous.is_unique() {
            self.routers.dispatch_event(&MeshEvent::SidUpdated { sid });
        } else {
            self.routers.interface_up(sid);
        }
        tracing::info!(%sid, %parent, "local SID assigned");
    }

    fn persist(&mut self) {
        let record = ConfigRecord::new(self.identity.sid, self.network_id());
        if let Err(e) = record.save(&mut self.store) {
            tracing::warn!("failed to persist mesh configuration: {e}");
        }
    }

    /// Broadcast a discovery beacon.
    pub fn beacon(&mut self) -> Result<(), NodeError> {
        let attached = self.is_attached();
        let message = MeshMessage::Discovery {
            uuid: self.identity.uuid,
            sid: if attached {
                self.identity.sid
            } else {
                self.requested_sid
            },
            attached,
        };
        let frame = self.encoder.make_broadcast_frame(&message.encode())?;
        self.link.send_raw_frame(&frame)?;
        tracing::trace!(attached, "discovery beacon sent");
        Ok(())
    }

    /// Process one inbound link frame measured at `rssi`.
    ///
    /// Returns application data addressed to this node. Frames rejected by
    /// the filter or the whitelist yield `Ok(None)`.
    pub fn handle_frame(&mut self, raw: &[u8], rssi: i8) -> Result<Option<Delivery>, NodeError> {
        let header = match self.filter.filter_frame(raw, self.clock.now_ms()) {
            FilterVerdict::Accept(header) => header,
            FilterVerdict::Reject(reason) => {
                tracing::trace!(?reason, "frame dropped");
                return Ok(None);
            }
        };

        if self.whitelist.is_enabled() && self.whitelist.find(&MacAddress::from(header.src)).is_none() {
            tracing::debug!(src = %header.src, "peer not whitelisted, frame dropped");
            return Ok(None);
        }

        let payload = frame::payload(raw)?;
        match MeshMessage::decode(payload)? {
            MeshMessage::Discovery {
                uuid,
                sid,
                attached,
            } => {
                self.on_discovery(header.src, uuid, sid, attached, rssi)?;
                Ok(None)
            }
            MeshMessage::SidAssignment { uuid, sid } => {
                self.on_sid_assignment(header.src, uuid, sid);
                Ok(None)
            }
            MeshMessage::RoutingInfo { .. } => {
                self.routers.message_received(&payload[1..])?;
                Ok(None)
            }
            MeshMessage::Data { src, dest, payload: data } => {
                if self.is_attached() && dest == self.identity.sid {
                    tracing::debug!(%src, len = data.len(), "data delivered");
                    return Ok(Some(Delivery { src, payload: data }));
                }
                tracing::trace!(%src, %dest, "forwarding data");
                self.forward(dest, payload)?;
                Ok(None)
            }
        }
    }

    fn on_discovery(
        &mut self,
        src: Eui48,
        uuid: Uuid,
        sid: Sid,
        attached: bool,
        measured_rssi: i8,
    ) -> Result<(), NodeError> {
        let mac = MacAddress::from(src);
        let rssi = self
            .whitelist
            .find(&mac)
            .and_then(|entry| entry.constant_rssi().ok())
            .unwrap_or(measured_rssi);

        if attached {
            self.update_neighbor(Neighbor {
                mac,
                uuid,
                sid,
                rssi,
            });
            return Ok(());
        }

        let local = self.identity.sid;
        if !local.is_unique() {
            tracing::trace!(%uuid, "unattached peer heard, cannot assign yet");
            return Ok(());
        }
        let Some(level) = child_level(local) else {
            tracing::debug!(%uuid, "no child level below {local}");
            return Ok(());
        };

        let mut node = NodeIdentity::with_sid(uuid, requested_slot(local, level, sid));
        node.attach_sid = local;
        self.allocator.allocate_sid(&mut node)?;
        // capacity comes from child_slots, so the slot fits a nibble
        let child = local.with_nibble(level, node.sid.get() as u8);

        let message = MeshMessage::SidAssignment { uuid, sid: child };
        let frame = self.encoder.make_frame(&src, &message.encode())?;
        self.link.send_raw_frame(&frame)?;
        tracing::info!(%uuid, sid = %child, "SID assigned to child");

        self.update_neighbor(Neighbor {
            mac,
            uuid,
            sid: child,
            rssi,
        });
        Ok(())
    }

    fn on_sid_assignment(&mut self, src: Eui48, uuid: Uuid, sid: Sid) {
        if uuid != self.identity.uuid {
            tracing::trace!(%uuid, "assignment for another node ignored");
            return;
        }
        if !sid.is_unique() {
            tracing::warn!(%src, %sid, "ignoring assignment of a reserved SID");
            return;
        }
        if sid == self.identity.sid {
            return;
        }
        let parent = parent_of(sid).unwrap_or(Sid::INVALID);
        self.set_local_sid(sid, parent);
    }

    fn update_neighbor(&mut self, neighbor: Neighbor) {
        let existing = self
            .neighbors
            .iter()
            .position(|n| n.uuid == neighbor.uuid || n.mac == neighbor.mac);
        match existing {
            Some(idx) if self.neighbors[idx] == neighbor => return,
            Some(idx) => self.neighbors[idx] = neighbor,
            None => self.neighbors.push(neighbor),
        }
        tracing::debug!(uuid = %neighbor.uuid, sid = %neighbor.sid, mac = %neighbor.mac, "neighbor updated");
        self.routers.neighbor_updated(&neighbor);
    }

    /// Next hop toward `dest`: the destination itself when it is a direct
    /// neighbor, otherwise whatever the default router picks.
    pub fn next_hop(&self, dest: Sid) -> Result<Sid, NodeError> {
        if !self.is_attached() {
            return Err(RouterError::InvalidAddress(dest).into());
        }
        if self.neighbor_by_sid(dest).is_some() {
            return Ok(dest);
        }
        Ok(self.routers.route(dest)?)
    }

    /// Send application data to `dest`.
    pub fn send(&mut self, dest: Sid, payload: &[u8]) -> Result<(), NodeError> {
        let message = MeshMessage::Data {
            src: self.identity.sid,
            dest,
            payload: payload.to_vec(),
        };
        self.forward(dest, &message.encode())
    }

    fn forward(&mut self, dest: Sid, mesh_payload: &[u8]) -> Result<(), NodeError> {
        let hop = self.next_hop(dest)?;
        if hop == self.identity.sid {
            return Err(NodeError::NoRoute(dest));
        }
        let mac = self
            .neighbor_by_sid(hop)
            .map(|n| n.mac.eui48())
            .ok_or(NodeError::UnknownNeighbor(hop))?;
        let frame = self.encoder.make_frame(&mac, mesh_payload)?;
        self.link.send_raw_frame(&frame)?;
        tracing::trace!(%dest, %hop, "frame sent");
        Ok(())
    }
}

impl<L, K, C> std::fmt::Debug for MeshContext<L, K, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshContext")
            .field("identity", &self.identity)
            .field("mac", &self.mac)
            .field("neighbors", &self.neighbors.len())
            .field("routers", &self.routers)
            .finish_non_exhaustive()
    }
}
