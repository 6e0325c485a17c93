//! Inbound link frame filtering.
//!
//! Checks run in a fixed order and stop at the first decision:
//! network id, loopback, broadcast (accepted without dedup), destination,
//! then per-peer duplicate suppression.

use umesh_core::frame::FrameHeader;
use umesh_core::types::{Eui48, NetworkId};

use crate::dedup::DuplicateFilter;

/// Why an inbound frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Shorter than the link frame header.
    Malformed,
    /// Belongs to another mesh.
    WrongNetwork,
    /// Our own transmission heard back.
    Loopback,
    /// Unicast to some other node.
    NotForUs,
    /// Retransmission of a frame already accepted.
    Duplicate,
}

/// Outcome of filtering one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum FilterVerdict {
    Accept(FrameHeader),
    Reject(RejectReason),
}

impl FilterVerdict {
    #[must_use]
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterVerdict::Accept(_))
    }
}

/// Admission filter for frames arriving on this node's link.
#[derive(Debug, Clone)]
pub struct FrameFilter {
    local: Eui48,
    network_id: NetworkId,
    dedup: DuplicateFilter,
}

impl FrameFilter {
    pub fn new(local: Eui48, network_id: NetworkId) -> Self {
        Self {
            local,
            network_id,
            dedup: DuplicateFilter::new(),
        }
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    pub fn set_network_id(&mut self, network_id: NetworkId) {
        self.network_id = network_id;
    }

    pub fn dedup(&self) -> &DuplicateFilter {
        &self.dedup
    }

    /// Decide whether `raw` should be handed up to the mesh layer.
    pub fn filter_frame(&mut self, raw: &[u8], now_ms: u32) -> FilterVerdict {
        let header = match FrameHeader::parse(raw) {
            Ok(h) => h,
            Err(e) => {
                tracing::trace!(error = %e, "dropping malformed frame");
                return FilterVerdict::Reject(RejectReason::Malformed);
            }
        };

        if header.network_id != self.network_id {
            return FilterVerdict::Reject(RejectReason::WrongNetwork);
        }
        if header.src == self.local {
            return FilterVerdict::Reject(RejectReason::Loopback);
        }
        if header.dest.is_broadcast() {
            return FilterVerdict::Accept(header);
        }
        if header.dest != self.local {
            return FilterVerdict::Reject(RejectReason::NotForUs);
        }

        if self
            .dedup
            .check(&header.src, header.sequence, header.retry, now_ms)
        {
            FilterVerdict::Accept(header)
        } else {
            FilterVerdict::Reject(RejectReason::Duplicate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umesh_core::frame::{FrameEncoder, mark_retry};

    const NET: NetworkId = NetworkId::new([0x0a; 6]);
    const ME: Eui48 = Eui48::new([0x02, 0, 0, 0, 0, 0x01]);
    const PEER: Eui48 = Eui48::new([0x02, 0, 0, 0, 0, 0x02]);

    fn retried(mut frame: Vec<u8>) -> Vec<u8> {
        mark_retry(&mut frame).unwrap();
        frame
    }

    #[test]
    fn test_accepts_unicast_to_us() {
        let mut filter = FrameFilter::new(ME, NET);
        let frame = FrameEncoder::new(PEER, NET).make_frame(&ME, &[1]).unwrap();
        let verdict = filter.filter_frame(&frame, 0);
        assert!(verdict.is_accept());
        if let FilterVerdict::Accept(h) = verdict {
            assert_eq!(h.src, PEER);
        }
    }

    #[test]
    fn test_wrong_network_rejected_regardless_of_dedup_state() {
        let mut filter = FrameFilter::new(ME, NET);
        let other = NetworkId::new([0x0b; 6]);
        let mut enc = FrameEncoder::new(PEER, other);

        let unicast = enc.make_frame(&ME, &[]).unwrap();
        let bcast = enc.make_broadcast_frame(&[]).unwrap();
        assert_eq!(
            filter.filter_frame(&unicast, 0),
            FilterVerdict::Reject(RejectReason::WrongNetwork)
        );
        assert_eq!(
            filter.filter_frame(&bcast, 0),
            FilterVerdict::Reject(RejectReason::WrongNetwork)
        );
        assert!(filter.dedup().is_empty());
    }

    #[test]
    fn test_loopback_rejected() {
        let mut filter = FrameFilter::new(ME, NET);
        let frame = FrameEncoder::new(ME, NET).make_broadcast_frame(&[]).unwrap();
        assert_eq!(
            filter.filter_frame(&frame, 0),
            FilterVerdict::Reject(RejectReason::Loopback)
        );
    }

    #[test]
    fn test_broadcast_bypasses_dedup() {
        let mut filter = FrameFilter::new(ME, NET);
        let frame = retried(FrameEncoder::new(PEER, NET).make_broadcast_frame(&[]).unwrap());
        assert!(filter.filter_frame(&frame, 0).is_accept());
        assert!(filter.filter_frame(&frame, 1).is_accept());
        assert!(filter.dedup().is_empty());
    }

    #[test]
    fn test_unicast_to_other_rejected() {
        let mut filter = FrameFilter::new(ME, NET);
        let third = Eui48::new([0x02, 0, 0, 0, 0, 0x03]);
        let frame = FrameEncoder::new(PEER, NET).make_frame(&third, &[]).unwrap();
        assert_eq!(
            filter.filter_frame(&frame, 0),
            FilterVerdict::Reject(RejectReason::NotForUs)
        );
    }

    #[test]
    fn test_retried_duplicate_rejected_then_accepted_after_window() {
        let mut filter = FrameFilter::new(ME, NET);
        let frame = retried(FrameEncoder::new(PEER, NET).make_frame(&ME, &[]).unwrap());

        assert!(filter.filter_frame(&frame, 10_000).is_accept());
        assert_eq!(
            filter.filter_frame(&frame, 10_500),
            FilterVerdict::Reject(RejectReason::Duplicate)
        );
        assert!(filter.filter_frame(&frame, 12_001).is_accept());
    }

    #[test]
    fn test_non_retry_repeat_accepted() {
        let mut filter = FrameFilter::new(ME, NET);
        let frame = FrameEncoder::new(PEER, NET).make_frame(&ME, &[]).unwrap();
        for t in 0..3 {
            assert!(filter.filter_frame(&frame, t).is_accept());
        }
    }

    #[test]
    fn test_short_frame_rejected() {
        let mut filter = FrameFilter::new(ME, NET);
        assert_eq!(
            filter.filter_frame(&[0x08, 0x00, 0x00], 0),
            FilterVerdict::Reject(RejectReason::Malformed)
        );
    }

    #[test]
    fn test_set_network_id() {
        let mut filter = FrameFilter::new(ME, NET);
        let other = NetworkId::new([0x0b; 6]);
        filter.set_network_id(other);
        assert_eq!(filter.network_id(), other);
        let frame = FrameEncoder::new(PEER, other).make_frame(&ME, &[]).unwrap();
        assert!(filter.filter_frame(&frame, 0).is_accept());
    }
}
