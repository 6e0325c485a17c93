//! Newtype wrappers for addresses and identities.
//!
//! These types keep short addresses, node identities, link-layer addresses
//! and network ids from being mixed up even though several of them share the
//! same underlying byte representation.

use core::fmt;
use core::ops::Deref;

use crate::constants::{
    BCAST_SID, EUI48_LEN, INVALID_SID, LEADER_SID, MAC_ADDR_MAX_LEN, NETWORK_ID_LEN, SID_LEN,
    SID_MASK, SID_MASK_LEN, SID_NIBBLES, UUID_LEN,
};
use crate::error::AddressError;

/// Helper to write lowercase hex without the `hex` crate.
fn fmt_hex(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

/// Error returned when a byte slice has the wrong length for a fixed-size type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidLength {
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid length: expected {}, got {}",
            self.expected, self.actual
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidLength {}

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[must_use]
        pub struct $name(pub(crate) [u8; $len]);

        impl $name {
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub const fn to_bytes(self) -> [u8; $len] {
                self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = [u8; $len];

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = InvalidLength;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| InvalidLength {
                    expected: $len,
                    actual: bytes.len(),
                })?;
                Ok(Self(arr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt_hex(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                fmt_hex(&self.0, f)?;
                write!(f, ")")
            }
        }
    };
}

fixed_bytes!(
    /// Stable long-form identity of a node (hardware EUI), independent of its SID.
    Uuid,
    UUID_LEN
);

fixed_bytes!(
    /// A 6-byte link-layer address as carried in the link frame header.
    Eui48,
    EUI48_LEN
);

fixed_bytes!(
    /// A 6-byte network id (BSSID) separating one mesh from another on the same channel.
    NetworkId,
    NETWORK_ID_LEN
);

impl Eui48 {
    pub const BROADCAST: Eui48 = Eui48([0xff; EUI48_LEN]);

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; EUI48_LEN]
    }
}

/// A 16-bit hierarchical short address.
///
/// The address is split into four 4-bit levels. Level 0 is the most
/// significant nibble (the root level); each further level is one hop deeper
/// in the tree. A node's parent is obtained by clearing its least significant
/// non-zero nibble.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct Sid(u16);

impl Sid {
    pub const LEADER: Sid = Sid(LEADER_SID);
    pub const INVALID: Sid = Sid(INVALID_SID);
    pub const BROADCAST: Sid = Sid(BCAST_SID);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Whether this SID names exactly one node (neither invalid nor broadcast).
    #[must_use]
    pub const fn is_unique(self) -> bool {
        !(self.0 == INVALID_SID || self.0 == BCAST_SID)
    }

    const fn shift(level: usize) -> u32 {
        SID_LEN - SID_MASK_LEN * (level as u32 + 1)
    }

    /// Nibble at `level`, where level 0 is the most significant nibble.
    ///
    /// # Panics
    /// Panics if `level >= SID_NIBBLES`.
    #[must_use]
    pub const fn nibble(self, level: usize) -> u8 {
        assert!(level < SID_NIBBLES);
        ((self.0 >> Self::shift(level)) & SID_MASK) as u8
    }

    /// Copy of this SID with the nibble at `level` replaced by `value`.
    ///
    /// # Panics
    /// Panics if `level >= SID_NIBBLES`.
    pub const fn with_nibble(self, level: usize, value: u8) -> Sid {
        assert!(level < SID_NIBBLES);
        let shift = Self::shift(level);
        let cleared = self.0 & !(SID_MASK << shift);
        Sid(cleared | (((value as u16) & SID_MASK) << shift))
    }
}

impl From<u16> for Sid {
    fn from(raw: u16) -> Self {
        Sid(raw)
    }
}

impl From<Sid> for u16 {
    fn from(sid: Sid) -> Self {
        sid.0
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sid(0x{:04x})", self.0)
    }
}

/// A variable-length link-layer address of up to 8 bytes.
///
/// Bytes past `len` are always zero, so derived equality compares
/// `(len, bytes)` exactly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[must_use]
pub struct MacAddress {
    addr: [u8; MAC_ADDR_MAX_LEN],
    len: u8,
}

impl MacAddress {
    pub fn new(bytes: &[u8]) -> Result<Self, AddressError> {
        if bytes.len() > MAC_ADDR_MAX_LEN {
            return Err(AddressError::InvalidLength {
                max: MAC_ADDR_MAX_LEN,
                actual: bytes.len(),
            });
        }
        let mut addr = [0u8; MAC_ADDR_MAX_LEN];
        addr[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            addr,
            len: bytes.len() as u8,
        })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.addr[..self.len as usize]
    }

    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// The leading 6 bytes as carried in link frames, zero-padded when shorter.
    pub fn eui48(&self) -> Eui48 {
        let mut out = [0u8; EUI48_LEN];
        out.copy_from_slice(&self.addr[..EUI48_LEN]);
        Eui48(out)
    }
}

impl From<Eui48> for MacAddress {
    fn from(eui: Eui48) -> Self {
        let mut addr = [0u8; MAC_ADDR_MAX_LEN];
        addr[..EUI48_LEN].copy_from_slice(&eui.0);
        Self {
            addr,
            len: EUI48_LEN as u8,
        }
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

/// A node as seen by the address allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIdentity {
    pub uuid: Uuid,
    pub sid: Sid,
    /// SID of the node this one is attached to (its parent).
    pub attach_sid: Sid,
}

impl NodeIdentity {
    /// A freshly heard node with no address assigned yet.
    pub const fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            sid: Sid::INVALID,
            attach_sid: Sid::INVALID,
        }
    }

    /// A node requesting a specific SID (for example one restored from flash).
    pub const fn with_sid(uuid: Uuid, sid: Sid) -> Self {
        Self {
            uuid,
            sid,
            attach_sid: Sid::INVALID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::ToString;

    #[test]
    fn test_sid_nibbles() {
        let sid = Sid::new(0x1234);
        assert_eq!(sid.nibble(0), 0x1);
        assert_eq!(sid.nibble(1), 0x2);
        assert_eq!(sid.nibble(2), 0x3);
        assert_eq!(sid.nibble(3), 0x4);
    }

    #[test]
    fn test_sid_with_nibble() {
        let sid = Sid::new(0x1200);
        assert_eq!(sid.with_nibble(2, 0x3), Sid::new(0x1230));
        assert_eq!(sid.with_nibble(0, 0x0), Sid::new(0x0200));
        assert_eq!(sid.with_nibble(3, 0x1f), Sid::new(0x120f));
    }

    #[test]
    fn test_sid_uniqueness() {
        assert!(Sid::LEADER.is_unique());
        assert!(Sid::new(0x1000).is_unique());
        assert!(!Sid::INVALID.is_unique());
        assert!(!Sid::BROADCAST.is_unique());
    }

    #[test]
    fn test_sid_display() {
        assert_eq!(Sid::new(0x1a).to_string(), "0x001a");
        assert_eq!(format!("{:?}", Sid::INVALID), "Sid(0xfffe)");
    }

    #[test]
    fn test_uuid_try_from() {
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let uuid = Uuid::try_from(&bytes[..]).unwrap();
        assert_eq!(uuid.as_ref(), &bytes);
        assert_eq!(uuid.to_string(), "0102030405060708");

        let err = Uuid::try_from(&bytes[..4]).unwrap_err();
        assert_eq!(
            err,
            InvalidLength {
                expected: 8,
                actual: 4
            }
        );
    }

    #[test]
    fn test_eui48_broadcast() {
        assert!(Eui48::BROADCAST.is_broadcast());
        assert!(!Eui48::new([0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]).is_broadcast());
    }

    #[test]
    fn test_mac_address_length_and_equality() {
        let a = MacAddress::new(&[1, 2, 3, 4, 5, 6]).unwrap();
        let b = MacAddress::new(&[1, 2, 3, 4, 5, 6, 0, 0]).unwrap();
        assert_eq!(a.len(), 6);
        assert_eq!(b.len(), 8);
        assert_ne!(a, b);
        assert_eq!(a.eui48(), b.eui48());
        assert_eq!(a.to_string(), "01:02:03:04:05:06");
    }

    #[test]
    fn test_mac_address_too_long() {
        let err = MacAddress::new(&[0u8; 9]).unwrap_err();
        assert_eq!(err, AddressError::InvalidLength { max: 8, actual: 9 });
    }

    #[test]
    fn test_mac_from_eui48() {
        let eui = Eui48::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        let mac = MacAddress::from(eui);
        assert_eq!(mac.as_bytes(), eui.as_ref());
        assert_eq!(mac.eui48(), eui);
    }

    #[test]
    fn test_node_identity_defaults() {
        let node = NodeIdentity::new(Uuid::new([7; 8]));
        assert_eq!(node.sid, Sid::INVALID);
        assert_eq!(node.attach_sid, Sid::INVALID);

        let node = NodeIdentity::with_sid(Uuid::new([7; 8]), Sid::new(10));
        assert_eq!(node.sid, Sid::new(10));
    }
}
