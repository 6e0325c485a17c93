//! Raw link frame header encoding and decoding.
//!
//! Mesh payloads travel in 802.11-style data frames. The header layout is
//! load-bearing for interoperability with unmodified peers:
//!
//! ```text
//! Offset  Size  Field
//! 0       1     frame type (0x08 = data)
//! 1       1     frame flags (bit 3 = retry)
//! 2       2     duration (zero)
//! 4       6     destination address
//! 10      6     source address
//! 16      6     network id
//! 22      2     sequence control: byte 22 = (seq & 0xf) << 4, byte 23 = seq >> 4
//! 24      8     reserved (zero)
//! 32      ..    mesh payload
//! ```

use alloc::vec::Vec;

use crate::constants::{
    EUI48_LEN, FRAME_DST_OFFSET, FRAME_FLAG_RETRY, FRAME_HEADER_SIZE, FRAME_MESH_OFFSET,
    FRAME_NETID_OFFSET, FRAME_SEQ_MASK, FRAME_SEQ_OFFSET, FRAME_SRC_OFFSET, FRAME_TYPE_DATA, MTU,
    NETWORK_ID_LEN,
};
use crate::error::FrameError;
use crate::types::{Eui48, NetworkId};

/// Pack a 12-bit sequence number into the two sequence-control bytes.
#[must_use]
pub const fn encode_sequence(seq: u16) -> [u8; 2] {
    let seq = seq & FRAME_SEQ_MASK;
    [((seq & 0x0f) << 4) as u8, (seq >> 4) as u8]
}

/// Unpack the 12-bit sequence number from the two sequence-control bytes.
#[must_use]
pub const fn decode_sequence(bytes: [u8; 2]) -> u16 {
    ((bytes[0] >> 4) as u16) | ((bytes[1] as u16) << 4)
}

/// A decoded link frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: u8,
    pub retry: bool,
    pub dest: Eui48,
    pub src: Eui48,
    pub network_id: NetworkId,
    pub sequence: u16,
}

impl FrameHeader {
    /// Parse the fixed header from the front of a raw frame.
    pub fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < FRAME_HEADER_SIZE {
            return Err(FrameError::TooShort {
                min: FRAME_HEADER_SIZE,
                actual: raw.len(),
            });
        }

        let mut dest = [0u8; EUI48_LEN];
        dest.copy_from_slice(&raw[FRAME_DST_OFFSET..FRAME_DST_OFFSET + EUI48_LEN]);
        let mut src = [0u8; EUI48_LEN];
        src.copy_from_slice(&raw[FRAME_SRC_OFFSET..FRAME_SRC_OFFSET + EUI48_LEN]);
        let mut network_id = [0u8; NETWORK_ID_LEN];
        network_id.copy_from_slice(&raw[FRAME_NETID_OFFSET..FRAME_NETID_OFFSET + NETWORK_ID_LEN]);

        Ok(FrameHeader {
            frame_type: raw[0],
            retry: raw[1] & FRAME_FLAG_RETRY != 0,
            dest: Eui48(dest),
            src: Eui48(src),
            network_id: NetworkId(network_id),
            sequence: decode_sequence([raw[FRAME_SEQ_OFFSET], raw[FRAME_SEQ_OFFSET + 1]]),
        })
    }

    /// Write the header into the first [`FRAME_HEADER_SIZE`] bytes of `out`.
    ///
    /// # Panics
    /// Panics if `out` is shorter than [`FRAME_HEADER_SIZE`].
    pub fn write_to(&self, out: &mut [u8]) {
        let header = &mut out[..FRAME_HEADER_SIZE];
        header.fill(0);
        header[0] = self.frame_type;
        if self.retry {
            header[1] |= FRAME_FLAG_RETRY;
        }
        header[FRAME_DST_OFFSET..FRAME_DST_OFFSET + EUI48_LEN].copy_from_slice(&self.dest.0);
        header[FRAME_SRC_OFFSET..FRAME_SRC_OFFSET + EUI48_LEN].copy_from_slice(&self.src.0);
        header[FRAME_NETID_OFFSET..FRAME_NETID_OFFSET + NETWORK_ID_LEN]
            .copy_from_slice(&self.network_id.0);
        header[FRAME_SEQ_OFFSET..FRAME_SEQ_OFFSET + 2]
            .copy_from_slice(&encode_sequence(self.sequence));
    }
}

/// Slice the mesh payload out of a raw frame.
pub fn payload(raw: &[u8]) -> Result<&[u8], FrameError> {
    if raw.len() < FRAME_HEADER_SIZE {
        return Err(FrameError::TooShort {
            min: FRAME_HEADER_SIZE,
            actual: raw.len(),
        });
    }
    Ok(&raw[FRAME_MESH_OFFSET..])
}

/// Builds outgoing link frames for one node.
///
/// Owns the node's transmit sequence counter, which advances on every frame
/// built regardless of destination and wraps at 16 bits. Only the low 12 bits
/// travel on the wire.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    src: Eui48,
    network_id: NetworkId,
    sequence: u16,
}

impl FrameEncoder {
    pub fn new(src: Eui48, network_id: NetworkId) -> Self {
        Self {
            src,
            network_id,
            sequence: 0,
        }
    }

    pub fn src(&self) -> Eui48 {
        self.src
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    pub fn set_network_id(&mut self, network_id: NetworkId) {
        self.network_id = network_id;
    }

    /// Sequence number the next frame will carry.
    #[must_use]
    pub fn next_sequence(&self) -> u16 {
        self.sequence
    }

    /// Build a frame carrying `payload` to `dest`.
    pub fn make_frame(&mut self, dest: &Eui48, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
        if payload.len() > MTU {
            return Err(FrameError::PayloadTooLarge {
                max: MTU,
                actual: payload.len(),
            });
        }

        let header = FrameHeader {
            frame_type: FRAME_TYPE_DATA,
            retry: false,
            dest: *dest,
            src: self.src,
            network_id: self.network_id,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.resize(FRAME_HEADER_SIZE, 0);
        header.write_to(&mut frame);
        frame.extend_from_slice(payload);
        Ok(frame)
    }

    /// Build a frame carrying `payload` to every neighbor.
    pub fn make_broadcast_frame(&mut self, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
        self.make_frame(&Eui48::BROADCAST, payload)
    }
}

/// Set the retry flag on an already-built frame, as the radio does on retransmission.
pub fn mark_retry(raw: &mut [u8]) -> Result<(), FrameError> {
    if raw.len() < FRAME_HEADER_SIZE {
        return Err(FrameError::TooShort {
            min: FRAME_HEADER_SIZE,
            actual: raw.len(),
        });
    }
    raw[1] |= FRAME_FLAG_RETRY;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn encoder() -> FrameEncoder {
        FrameEncoder::new(
            Eui48::new([0x02, 0, 0, 0, 0, 0x01]),
            NetworkId::new([0x0a; 6]),
        )
    }

    #[test]
    fn test_sequence_byte_layout() {
        // low nibble goes high in byte 22, the remaining 8 bits fill byte 23
        assert_eq!(encode_sequence(0x0abc), [0xc0, 0xab]);
        assert_eq!(encode_sequence(0x0001), [0x10, 0x00]);
        assert_eq!(encode_sequence(0x0fff), [0xf0, 0xff]);
        // bits above 12 are dropped
        assert_eq!(encode_sequence(0x1001), [0x10, 0x00]);
        assert_eq!(decode_sequence([0xc0, 0xab]), 0x0abc);
    }

    #[test]
    fn test_make_frame_layout() {
        let mut enc = encoder();
        let dest = Eui48::new([0x02, 0, 0, 0, 0, 0x02]);
        let frame = enc.make_frame(&dest, &[0xde, 0xad]).unwrap();

        assert_eq!(frame.len(), FRAME_HEADER_SIZE + 2);
        assert_eq!(frame[0], FRAME_TYPE_DATA);
        assert_eq!(frame[1], 0);
        assert_eq!(&frame[4..10], dest.as_ref());
        assert_eq!(&frame[10..16], &[0x02, 0, 0, 0, 0, 0x01]);
        assert_eq!(&frame[16..22], &[0x0a; 6]);
        assert_eq!(&frame[22..24], &[0x00, 0x00]);
        assert_eq!(&frame[24..32], &[0u8; 8]);
        assert_eq!(&frame[32..], &[0xde, 0xad]);
    }

    #[test]
    fn test_sequence_increments_per_frame() {
        let mut enc = encoder();
        let dest = Eui48::new([1; 6]);
        let first = enc.make_frame(&dest, &[]).unwrap();
        let second = enc.make_broadcast_frame(&[]).unwrap();
        let third = enc.make_frame(&Eui48::new([2; 6]), &[]).unwrap();

        assert_eq!(FrameHeader::parse(&first).unwrap().sequence, 0);
        assert_eq!(FrameHeader::parse(&second).unwrap().sequence, 1);
        assert_eq!(FrameHeader::parse(&third).unwrap().sequence, 2);
        assert_eq!(enc.next_sequence(), 3);
    }

    #[test]
    fn test_sequence_wraps() {
        let mut enc = encoder();
        enc.sequence = u16::MAX;
        let frame = enc.make_broadcast_frame(&[]).unwrap();
        assert_eq!(FrameHeader::parse(&frame).unwrap().sequence, 0x0fff);
        assert_eq!(enc.next_sequence(), 0);
    }

    #[test]
    fn test_parse_fields() {
        let mut enc = encoder();
        let frame = enc.make_broadcast_frame(&[1, 2, 3]).unwrap();
        let header = FrameHeader::parse(&frame).unwrap();

        assert!(header.dest.is_broadcast());
        assert_eq!(header.src, enc.src());
        assert_eq!(header.network_id, enc.network_id());
        assert!(!header.retry);
        assert_eq!(payload(&frame).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_mark_retry() {
        let mut enc = encoder();
        let mut frame = enc.make_broadcast_frame(&[]).unwrap();
        mark_retry(&mut frame).unwrap();
        assert!(FrameHeader::parse(&frame).unwrap().retry);
    }

    #[test]
    fn test_parse_too_short() {
        let raw = vec![0u8; FRAME_HEADER_SIZE - 1];
        let err = FrameHeader::parse(&raw).unwrap_err();
        assert_eq!(
            err,
            FrameError::TooShort {
                min: FRAME_HEADER_SIZE,
                actual: FRAME_HEADER_SIZE - 1
            }
        );
        assert!(payload(&raw).is_err());
        assert!(mark_retry(&mut vec![0u8; 3]).is_err());
    }

    #[test]
    fn test_payload_too_large() {
        let mut enc = encoder();
        let big = vec![0u8; MTU + 1];
        assert!(matches!(
            enc.make_broadcast_frame(&big),
            Err(FrameError::PayloadTooLarge { .. })
        ));
        // a rejected frame does not consume a sequence number
        assert_eq!(enc.next_sequence(), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn sequence_roundtrip(seq in 0u16..=FRAME_SEQ_MASK) {
            prop_assert_eq!(decode_sequence(encode_sequence(seq)), seq);
        }

        #[test]
        fn header_roundtrip(
            retry in any::<bool>(),
            dest in any::<[u8; 6]>(),
            src in any::<[u8; 6]>(),
            netid in any::<[u8; 6]>(),
            seq in 0u16..=FRAME_SEQ_MASK,
        ) {
            let header = FrameHeader {
                frame_type: FRAME_TYPE_DATA,
                retry,
                dest: Eui48::new(dest),
                src: Eui48::new(src),
                network_id: NetworkId::new(netid),
                sequence: seq,
            };
            let mut buf = [0u8; FRAME_HEADER_SIZE];
            header.write_to(&mut buf);
            prop_assert_eq!(FrameHeader::parse(&buf).unwrap(), header);
        }
    }
}
