//! Error types for the mesh node.

use umesh_core::types::Sid;
use umesh_core::{AddressError, FrameError};
use umesh_transport::{AllocatorError, RouterError};

use crate::message::MessageError;
use crate::storage::StorageError;

/// Errors that can occur while running a mesh node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("address error: {0}")]
    Address(#[from] AddressError),
    #[error("message error: {0}")]
    Message(#[from] MessageError),
    #[error("allocator error: {0}")]
    Allocator(#[from] AllocatorError),
    #[error("router error: {0}")]
    Router(#[from] RouterError),
    #[error("no neighbor holds next hop {0}")]
    UnknownNeighbor(Sid),
    #[error("no route to {0}")]
    NoRoute(Sid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_wraps_inner_errors() {
        let err = NodeError::from(RouterError::InvalidAddress(Sid::new(0x1234)));
        assert_eq!(err.to_string(), "router error: invalid address: 0x1234");

        let err = NodeError::UnknownNeighbor(Sid::new(0x1000));
        assert_eq!(err.to_string(), "no neighbor holds next hop 0x1000");

        let err = NodeError::Config("bad mac".into());
        assert_eq!(err.to_string(), "configuration error: bad mac");
    }
}
