//! Protocol constants for the umesh address space and link frame.

// Short address layout: four 4-bit levels, most significant nibble = root level.
pub const SID_LEN: u32 = 16;
pub const SID_MASK_LEN: u32 = 4;
pub const SID_MASK: u16 = 0x000f;
pub const SID_NIBBLES: usize = (SID_LEN / SID_MASK_LEN) as usize;

// Reserved short addresses
pub const LEADER_SID: u16 = 0x0000;
pub const INVALID_SID: u16 = 0xfffe;
pub const BCAST_SID: u16 = 0xffff;

// Identity and address sizes
pub const UUID_LEN: usize = 8;
pub const MAC_ADDR_MAX_LEN: usize = 8;
pub const EUI48_LEN: usize = 6;
pub const NETWORK_ID_LEN: usize = 6;

// Link frame layout (802.11 data frame carrying the mesh payload)
pub const FRAME_TYPE_DATA: u8 = 0x08;
pub const FRAME_FLAG_RETRY: u8 = 0x08;
pub const FRAME_DST_OFFSET: usize = 4;
pub const FRAME_SRC_OFFSET: usize = 10;
pub const FRAME_NETID_OFFSET: usize = 16;
pub const FRAME_SEQ_OFFSET: usize = 22;
pub const FRAME_MESH_OFFSET: usize = 32;
pub const FRAME_HEADER_SIZE: usize = FRAME_MESH_OFFSET;
pub const FRAME_SEQ_MASK: u16 = 0x0fff;

/// Largest mesh payload carried in a single link frame.
pub const MTU: usize = 512;
