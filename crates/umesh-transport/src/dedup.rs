//! Per-peer duplicate frame suppression.
//!
//! Keeps the last sequence number and arrival time seen from each peer in a
//! small fixed table. When the table is full, the entry with the oldest
//! arrival time is reused.

use umesh_core::types::Eui48;

/// Number of peers tracked at once.
pub const DEDUP_ENTRY_NUM: usize = 32;

/// A retried frame arriving later than this after the peer's previous frame
/// starts a fresh window and is accepted.
pub const DEDUP_WINDOW_MS: u32 = 2000;

/// Last frame seen from one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupEntry {
    pub mac_address: Eui48,
    pub last_sequence: u16,
    pub last_seen_time_ms: u32,
}

impl DedupEntry {
    /// Whether `sequence` is not newer than the last accepted one.
    ///
    /// Uses signed 16-bit wraparound arithmetic.
    #[must_use]
    pub fn is_stale(&self, sequence: u16) -> bool {
        (sequence.wrapping_sub(self.last_sequence) as i16) <= 0
    }

    fn refresh(&mut self, sequence: u16, now_ms: u32) {
        self.last_sequence = sequence;
        self.last_seen_time_ms = now_ms;
    }
}

/// Fixed-size table of per-peer dedup state.
#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    entries: [Option<DedupEntry>; DEDUP_ENTRY_NUM],
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self {
            entries: [None; DEDUP_ENTRY_NUM],
        }
    }

    /// Slot for `mac`: its existing entry, else a free slot, else the oldest entry.
    fn slot_for(&self, mac: &Eui48) -> (usize, bool) {
        if let Some(idx) = self
            .entries
            .iter()
            .position(|e| e.is_some_and(|e| e.mac_address == *mac))
        {
            return (idx, true);
        }
        if let Some(idx) = self.entries.iter().position(Option::is_none) {
            return (idx, false);
        }
        let oldest = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.map(|e| (i, e.last_seen_time_ms)))
            .min_by_key(|&(_, t)| t)
            .map_or(0, |(i, _)| i);
        (oldest, false)
    }

    /// Record a frame and decide whether it is new.
    ///
    /// Returns `false` for a retransmission of a frame already accepted.
    /// Frames without the retry flag are always accepted.
    pub fn check(&mut self, src: &Eui48, sequence: u16, retry: bool, now_ms: u32) -> bool {
        let (idx, found) = self.slot_for(src);

        if !found {
            if let Some(evicted) = self.entries[idx] {
                tracing::trace!(evicted = %evicted.mac_address, "dedup table full, evicting oldest");
            }
            self.entries[idx] = Some(DedupEntry {
                mac_address: *src,
                last_sequence: sequence,
                last_seen_time_ms: now_ms,
            });
            return true;
        }
        let Some(entry) = self.entries[idx].as_mut() else {
            return true;
        };

        if !retry || now_ms.wrapping_sub(entry.last_seen_time_ms) > DEDUP_WINDOW_MS {
            entry.refresh(sequence, now_ms);
            return true;
        }

        if entry.is_stale(sequence) {
            tracing::trace!(
                src = %src,
                sequence,
                last = entry.last_sequence,
                "duplicate frame"
            );
            return false;
        }

        entry.refresh(sequence, now_ms);
        true
    }

    #[must_use]
    pub fn get(&self, mac: &Eui48) -> Option<&DedupEntry> {
        self.entries
            .iter()
            .flatten()
            .find(|e| e.mac_address == *mac)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries = [None; DEDUP_ENTRY_NUM];
    }
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(seed: u8) -> Eui48 {
        Eui48::new([0x02, 0, 0, 0, 0, seed])
    }

    #[test]
    fn test_new_filter_is_empty() {
        let f = DuplicateFilter::new();
        assert!(f.is_empty());
    }

    #[test]
    fn test_first_frame_accepted() {
        let mut f = DuplicateFilter::new();
        assert!(f.check(&peer(1), 5, true, 100));
        let entry = f.get(&peer(1)).unwrap();
        assert_eq!(entry.last_sequence, 5);
        assert_eq!(entry.last_seen_time_ms, 100);
    }

    #[test]
    fn test_retry_within_window_rejected() {
        let mut f = DuplicateFilter::new();
        assert!(f.check(&peer(1), 7, true, 1000));
        assert!(!f.check(&peer(1), 7, true, 1500));
        // exactly at the window edge is still inside it
        assert!(!f.check(&peer(1), 7, true, 3000));
    }

    #[test]
    fn test_retry_after_window_accepted() {
        let mut f = DuplicateFilter::new();
        assert!(f.check(&peer(1), 7, true, 1000));
        assert!(f.check(&peer(1), 7, true, 3001));
        assert_eq!(f.get(&peer(1)).unwrap().last_seen_time_ms, 3001);
    }

    #[test]
    fn test_non_retry_never_deduplicated() {
        let mut f = DuplicateFilter::new();
        for t in 0..5 {
            assert!(f.check(&peer(1), 7, false, t));
        }
    }

    #[test]
    fn test_newer_sequence_accepted() {
        let mut f = DuplicateFilter::new();
        assert!(f.check(&peer(1), 7, true, 0));
        assert!(f.check(&peer(1), 8, true, 10));
        assert!(!f.check(&peer(1), 6, true, 20));
        assert_eq!(f.get(&peer(1)).unwrap().last_sequence, 8);
    }

    #[test]
    fn test_sequence_wraparound() {
        let mut f = DuplicateFilter::new();
        assert!(f.check(&peer(1), 0xfffe, true, 0));
        assert!(f.check(&peer(1), 0x0001, true, 10));
        assert!(!f.check(&peer(1), 0xffff, true, 20));
    }

    #[test]
    fn test_peers_tracked_independently() {
        let mut f = DuplicateFilter::new();
        assert!(f.check(&peer(1), 7, true, 0));
        assert!(f.check(&peer(2), 7, true, 0));
        assert!(!f.check(&peer(1), 7, true, 5));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_full_table_evicts_oldest() {
        let mut f = DuplicateFilter::new();
        for i in 0..DEDUP_ENTRY_NUM as u8 {
            // peer(3) is the oldest
            let t = if i == 3 { 1 } else { 100 + u32::from(i) };
            f.check(&peer(i), 1, false, t);
        }
        assert_eq!(f.len(), DEDUP_ENTRY_NUM);

        assert!(f.check(&peer(0xee), 1, true, 500));
        assert_eq!(f.len(), DEDUP_ENTRY_NUM);
        assert!(f.get(&peer(3)).is_none());
        assert!(f.get(&peer(0xee)).is_some());
        assert!(f.get(&peer(4)).is_some());
    }

    #[test]
    fn test_clear() {
        let mut f = DuplicateFilter::new();
        f.check(&peer(1), 1, true, 0);
        f.clear();
        assert!(f.is_empty());
        assert!(f.check(&peer(1), 1, true, 1));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn immediate_retry_is_always_rejected(seq in any::<u16>(), t in 0u32..1_000_000, dt in 0u32..=DEDUP_WINDOW_MS) {
            let mut f = DuplicateFilter::new();
            let src = Eui48::new([9; 6]);
            prop_assert!(f.check(&src, seq, true, t));
            prop_assert!(!f.check(&src, seq, true, t + dt));
        }

        #[test]
        fn forward_progress_is_accepted(seq in any::<u16>(), step in 1u16..0x8000) {
            let mut f = DuplicateFilter::new();
            let src = Eui48::new([9; 6]);
            prop_assert!(f.check(&src, seq, true, 0));
            prop_assert!(f.check(&src, seq.wrapping_add(step), true, 1));
        }
    }
}
