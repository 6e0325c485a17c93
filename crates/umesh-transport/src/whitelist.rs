//! Link-layer admission whitelist.
//!
//! A fixed table of authorized peer addresses. The table only tracks the
//! global enable flag and its entries: callers decide what an unknown or
//! rejected peer means for them.

use umesh_core::types::MacAddress;

use crate::error::WhitelistError;

/// Number of whitelist slots.
pub const WHITELIST_ENTRY_NUM: usize = 16;

/// One whitelist slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhitelistEntry {
    address: MacAddress,
    valid: bool,
    constant_rssi: bool,
    rssi: i8,
}

impl WhitelistEntry {
    pub fn address(&self) -> &MacAddress {
        &self.address
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Pin this peer's link quality to `rssi`, ignoring measured values.
    pub fn set_constant_rssi(&mut self, rssi: i8) {
        self.constant_rssi = true;
        self.rssi = rssi;
    }

    pub fn clear_constant_rssi(&mut self) {
        self.constant_rssi = false;
        self.rssi = 0;
    }

    /// The pinned RSSI, or [`WhitelistError::NotSet`] when measured values apply.
    pub fn constant_rssi(&self) -> Result<i8, WhitelistError> {
        if self.constant_rssi {
            Ok(self.rssi)
        } else {
            Err(WhitelistError::NotSet)
        }
    }
}

/// Fixed-capacity admission table.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: [WhitelistEntry; WHITELIST_ENTRY_NUM],
    enabled: bool,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&mut self) {
        self.enabled = true;
        tracing::debug!("whitelist enabled");
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        tracing::debug!("whitelist disabled");
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn position(&self, address: &MacAddress) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.valid && e.address == *address)
    }

    /// Add `address`, returning its entry.
    ///
    /// Adding an address that is already present returns the existing entry
    /// untouched. Returns `None` when the table is full.
    pub fn add(&mut self, address: &MacAddress) -> Option<&mut WhitelistEntry> {
        if let Some(idx) = self.position(address) {
            return Some(&mut self.entries[idx]);
        }

        let Some(idx) = self.entries.iter().position(|e| !e.valid) else {
            tracing::warn!(%address, "whitelist full");
            return None;
        };
        self.entries[idx] = WhitelistEntry {
            address: *address,
            valid: true,
            constant_rssi: false,
            rssi: 0,
        };
        tracing::debug!(%address, "whitelist add");
        Some(&mut self.entries[idx])
    }

    /// Remove `address`. Returns `true` if an entry was cleared.
    pub fn remove(&mut self, address: &MacAddress) -> bool {
        match self.position(address) {
            Some(idx) => {
                self.entries[idx] = WhitelistEntry::default();
                tracing::debug!(%address, "whitelist remove");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn find(&self, address: &MacAddress) -> Option<&WhitelistEntry> {
        self.position(address).map(|idx| &self.entries[idx])
    }

    pub fn find_mut(&mut self, address: &MacAddress) -> Option<&mut WhitelistEntry> {
        self.position(address).map(|idx| &mut self.entries[idx])
    }

    /// Invalidate every entry. The enable flag is left as is.
    pub fn clear(&mut self) {
        self.entries = [WhitelistEntry::default(); WHITELIST_ENTRY_NUM];
    }

    /// Valid entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = &WhitelistEntry> {
        self.entries.iter().filter(|e| e.valid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
