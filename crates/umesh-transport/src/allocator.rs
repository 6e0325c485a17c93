//! Short address allocation keyed by node identity.
//!
//! Each allocator owns a bounded SID range `1..=capacity` and a mapping from
//! node UUID to the SID it holds. Re-registering a known UUID is idempotent, and
//! explicit SID requests are honored when the address is free, otherwise the
//! node quietly falls back to automatic assignment.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use umesh_core::types::{NodeIdentity, Sid, Uuid};

use crate::error::AllocatorError;

/// Default number of assignable short addresses per allocator.
pub const DEFAULT_CAPACITY: u16 = 256;

/// Lowest SID handed out automatically. `0` is reserved for the leader.
pub const FIRST_AUTO_SID: u16 = 1;

/// How free SIDs are chosen for nodes without a usable explicit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocatorMode {
    /// Lowest unused SID first.
    #[default]
    Sequential,
    /// Uniformly random start point, probing upward (wrapping) to the next free SID.
    Random,
}

/// SID allocator state for one mesh instance.
pub struct SidAllocator {
    mode: AllocatorMode,
    capacity: u16,
    nodes: HashMap<Uuid, NodeIdentity>,
    owners: BTreeMap<Sid, Uuid>,
}

impl SidAllocator {
    pub fn new(mode: AllocatorMode) -> Self {
        Self::with_capacity(mode, DEFAULT_CAPACITY)
    }

    /// Create an allocator handing out SIDs in `1..=capacity`.
    ///
    /// `capacity` is clamped so the range never reaches the reserved
    /// invalid and broadcast addresses.
    pub fn with_capacity(mode: AllocatorMode, capacity: u16) -> Self {
        let capacity = capacity.min(Sid::INVALID.get() - 1);
        tracing::debug!(?mode, capacity, "sid allocator initialized");
        Self {
            mode,
            capacity,
            nodes: HashMap::new(),
            owners: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> AllocatorMode {
        self.mode
    }

    #[must_use]
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    fn in_range(&self, sid: Sid) -> bool {
        (FIRST_AUTO_SID..=self.capacity).contains(&sid.get())
    }

    /// Assign (or confirm) a SID for `node`.
    ///
    /// On success `node.sid` holds the node's address. A UUID that already has
    /// an address always gets that address back, whatever `node.sid` asked for.
    pub fn allocate_sid(&mut self, node: &mut NodeIdentity) -> Result<(), AllocatorError> {
        if let Some(existing) = self.nodes.get(&node.uuid) {
            node.sid = existing.sid;
            tracing::trace!(uuid = %node.uuid, sid = %node.sid, "sid already allocated");
            return Ok(());
        }

        let requested = node.sid;
        let sid = if requested.is_unique()
            && self.in_range(requested)
            && !self.owners.contains_key(&requested)
        {
            requested
        } else {
            if requested.is_unique() {
                tracing::debug!(
                    uuid = %node.uuid,
                    requested = %requested,
                    "requested sid unavailable, falling back to automatic assignment"
                );
            }
            self.find_free_sid()?
        };

        node.sid = sid;
        self.owners.insert(sid, node.uuid);
        self.nodes.insert(node.uuid, *node);
        tracing::debug!(uuid = %node.uuid, sid = %sid, "allocate sid");
        Ok(())
    }

    fn find_free_sid(&self) -> Result<Sid, AllocatorError> {
        if self.owners.len() >= usize::from(self.capacity) {
            return Err(AllocatorError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let start = match self.mode {
            AllocatorMode::Sequential => FIRST_AUTO_SID,
            AllocatorMode::Random => rand::thread_rng().gen_range(FIRST_AUTO_SID..=self.capacity),
        };

        (start..=self.capacity)
            .chain(FIRST_AUTO_SID..start)
            .map(Sid::new)
            .find(|sid| !self.owners.contains_key(sid))
            .ok_or(AllocatorError::CapacityExceeded {
                capacity: self.capacity,
            })
    }

    /// Release the SID held by `uuid`, returning it.
    pub fn free_sid(&mut self, uuid: &Uuid) -> Result<Sid, AllocatorError> {
        let node = self
            .nodes
            .remove(uuid)
            .ok_or(AllocatorError::NotFound(*uuid))?;
        self.owners.remove(&node.sid);
        tracing::debug!(uuid = %uuid, sid = %node.sid, "free sid");
        Ok(node.sid)
    }

    /// SID currently held by `uuid`, if any.
    #[must_use]
    pub fn sid_of(&self, uuid: &Uuid) -> Option<Sid> {
        self.nodes.get(uuid).map(|n| n.sid)
    }

    /// UUID currently holding `sid`, if any.
    #[must_use]
    pub fn owner_of(&self, sid: Sid) -> Option<&Uuid> {
        self.owners.get(&sid)
    }

    /// Number of nodes holding an allocated SID.
    #[must_use]
    pub fn allocated_number(&self) -> u16 {
        self.owners.len() as u16
    }

    /// Number of SIDs still available.
    #[must_use]
    pub fn free_number(&self) -> u16 {
        self.capacity - self.allocated_number()
    }

    /// Live mappings in SID order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeIdentity> {
        self.owners.values().filter_map(|uuid| self.nodes.get(uuid))
    }

    /// Release every mapping and consume the allocator.
    pub fn deinit(mut self) {
        let released = self.owners.len();
        self.nodes.clear();
        self.owners.clear();
        tracing::debug!(released, "sid allocator deinitialized");
    }
}
