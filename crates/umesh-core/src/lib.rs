//! Core types, constants, and wire formats for the umesh mesh core.
//!
//! This crate defines the short-address (SID) and identity newtypes, the
//! protocol constants shared by every layer, and the raw link frame header
//! used to carry mesh payloads between neighbors.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod constants;
pub mod error;
pub mod frame;
pub mod types;

pub use error::{AddressError, FrameError};
pub use frame::{FrameEncoder, FrameHeader};
pub use types::{Eui48, InvalidLength, MacAddress, NetworkId, NodeIdentity, Sid, Uuid};
