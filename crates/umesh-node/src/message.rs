//! Mesh payload messages carried after the link frame header.
//!
//! ```text
//! Discovery      0x01 | uuid (8) | sid (2) | attached (1)
//! SidAssignment  0x02 | uuid (8) | sid (2)
//! RoutingInfo    0x03 | router id (1) | router data ..
//! Data           0x04 | src sid (2) | dest sid (2) | payload ..
//! ```
//!
//! SIDs are big-endian.

use umesh_core::constants::UUID_LEN;
use umesh_core::types::{Sid, Uuid};
use umesh_transport::RouterId;

const KIND_DISCOVERY: u8 = 0x01;
const KIND_SID_ASSIGNMENT: u8 = 0x02;
const KIND_ROUTING_INFO: u8 = 0x03;
const KIND_DATA: u8 = 0x04;

const DISCOVERY_LEN: usize = 1 + UUID_LEN + 2 + 1;
const SID_ASSIGNMENT_LEN: usize = 1 + UUID_LEN + 2;
const ROUTING_INFO_MIN_LEN: usize = 2;
const DATA_MIN_LEN: usize = 1 + 2 + 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("empty mesh payload")]
    Empty,
    #[error("unknown message kind 0x{0:02x}")]
    UnknownKind(u8),
    #[error("message kind 0x{kind:02x} truncated: need {min} bytes, got {actual}")]
    Truncated { kind: u8, min: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshMessage {
    /// Periodic presence beacon. `sid` is the sender's SID when `attached`,
    /// otherwise the SID it would like to be given.
    Discovery { uuid: Uuid, sid: Sid, attached: bool },
    /// A parent hands `sid` to the node with `uuid`.
    SidAssignment { uuid: Uuid, sid: Sid },
    /// Opaque routing state for the router with `router_id`.
    RoutingInfo { router_id: RouterId, data: Vec<u8> },
    /// Application payload routed hop by hop.
    Data { src: Sid, dest: Sid, payload: Vec<u8> },
}

fn read_sid(bytes: &[u8]) -> Sid {
    Sid::new(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_uuid(bytes: &[u8]) -> Uuid {
    let mut uuid = [0u8; UUID_LEN];
    uuid.copy_from_slice(&bytes[..UUID_LEN]);
    Uuid::new(uuid)
}

impl MeshMessage {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            MeshMessage::Discovery {
                uuid,
                sid,
                attached,
            } => {
                let mut out = Vec::with_capacity(DISCOVERY_LEN);
                out.push(KIND_DISCOVERY);
                out.extend_from_slice(uuid.as_ref());
                out.extend_from_slice(&sid.get().to_be_bytes());
                out.push(u8::from(*attached));
                out
            }
            MeshMessage::SidAssignment { uuid, sid } => {
                let mut out = Vec::with_capacity(SID_ASSIGNMENT_LEN);
                out.push(KIND_SID_ASSIGNMENT);
                out.extend_from_slice(uuid.as_ref());
                out.extend_from_slice(&sid.get().to_be_bytes());
                out
            }
            MeshMessage::RoutingInfo { router_id, data } => {
                let mut out = Vec::with_capacity(2 + data.len());
                out.push(KIND_ROUTING_INFO);
                out.push(router_id.0);
                out.extend_from_slice(data);
                out
            }
            MeshMessage::Data { src, dest, payload } => {
                let mut out = Vec::with_capacity(DATA_MIN_LEN + payload.len());
                out.push(KIND_DATA);
                out.extend_from_slice(&src.get().to_be_bytes());
                out.extend_from_slice(&dest.get().to_be_bytes());
                out.extend_from_slice(payload);
                out
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let &kind = bytes.first().ok_or(MessageError::Empty)?;
        let need = |min: usize| {
            if bytes.len() < min {
                Err(MessageError::Truncated {
                    kind,
                    min,
                    actual: bytes.len(),
                })
            } else {
                Ok(())
            }
        };

        match kind {
            KIND_DISCOVERY => {
                need(DISCOVERY_LEN)?;
                Ok(MeshMessage::Discovery {
                    uuid: read_uuid(&bytes[1..]),
                    sid: read_sid(&bytes[1 + UUID_LEN..]),
                    attached: bytes[1 + UUID_LEN + 2] != 0,
                })
            }
            KIND_SID_ASSIGNMENT => {
                need(SID_ASSIGNMENT_LEN)?;
                Ok(MeshMessage::SidAssignment {
                    uuid: read_uuid(&bytes[1..]),
                    sid: read_sid(&bytes[1 + UUID_LEN..]),
                })
            }
            KIND_ROUTING_INFO => {
                need(ROUTING_INFO_MIN_LEN)?;
                Ok(MeshMessage::RoutingInfo {
                    router_id: RouterId(bytes[1]),
                    data: bytes[2..].to_vec(),
                })
            }
            KIND_DATA => {
                need(DATA_MIN_LEN)?;
                Ok(MeshMessage::Data {
                    src: read_sid(&bytes[1..]),
                    dest: read_sid(&bytes[3..]),
                    payload: bytes[5..].to_vec(),
                })
            }
            other => Err(MessageError::UnknownKind(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: Uuid = Uuid::new([1, 2, 3, 4, 5, 6, 7, 8]);

    #[test]
    fn test_discovery_layout() {
        let msg = MeshMessage::Discovery {
            uuid: UUID,
            sid: Sid::new(0x1200),
            attached: true,
        };
        let bytes = msg.encode();
        assert_eq!(bytes, [0x01, 1, 2, 3, 4, 5, 6, 7, 8, 0x12, 0x00, 1]);
        assert_eq!(MeshMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_sid_assignment_layout() {
        let msg = MeshMessage::SidAssignment {
            uuid: UUID,
            sid: Sid::new(0x1230),
        };
        assert_eq!(msg.encode(), [0x02, 1, 2, 3, 4, 5, 6, 7, 8, 0x12, 0x30]);
    }

    #[test]
    fn test_routing_info_body_is_registry_message() {
        let msg = MeshMessage::RoutingInfo {
            router_id: RouterId::SID_ROUTER,
            data: vec![0xaa, 0xbb],
        };
        let bytes = msg.encode();
        // everything after the kind byte is what the router registry consumes
        assert_eq!(&bytes[1..], &[0x00, 0xaa, 0xbb]);
        assert_eq!(MeshMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_data_with_empty_payload() {
        let msg = MeshMessage::Data {
            src: Sid::new(0x1000),
            dest: Sid::new(0x2000),
            payload: Vec::new(),
        };
        let bytes = msg.encode();
        assert_eq!(bytes, [0x04, 0x10, 0x00, 0x20, 0x00]);
        assert_eq!(MeshMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(MeshMessage::decode(&[]), Err(MessageError::Empty));
        assert_eq!(
            MeshMessage::decode(&[0x7f]),
            Err(MessageError::UnknownKind(0x7f))
        );
        assert_eq!(
            MeshMessage::decode(&[0x01, 1, 2, 3]),
            Err(MessageError::Truncated {
                kind: 0x01,
                min: DISCOVERY_LEN,
                actual: 4
            })
        );
        assert!(MeshMessage::decode(&[0x03]).is_err());
        assert!(MeshMessage::decode(&[0x04, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = MessageError::Truncated {
            kind: 2,
            min: 11,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "message kind 0x02 truncated: need 11 bytes, got 3"
        );
    }
}
