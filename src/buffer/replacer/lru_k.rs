//! LRU-K replacement policy.
//!
//! Each frame keeps the timestamps of its last K accesses. The victim is the
//! evictable frame with the largest backward K-distance:
//!
//! - Frames with fewer than K accesses have infinite distance and are
//!   evicted first, oldest first access winning (plain LRU among them).
//! - Frames with K accesses are ranked by their K-th most recent access;
//!   the smallest timestamp is evicted first.
//!
//! Timestamps come from a logical counter bumped on every access, so ties
//! cannot occur between distinct accesses.

use std::collections::{HashMap, VecDeque};

use log::trace;
use parking_lot::Mutex;

use crate::common::{Error, FrameId, Result};

#[derive(Debug, Default)]
struct LruKNode {
    /// Oldest access at the front, at most K entries.
    history: VecDeque<u64>,
    is_evictable: bool,
}

impl LruKNode {
    /// Ranking key: cold frames sort before warm ones, then by the oldest
    /// retained timestamp (first access when cold, K-th most recent when warm).
    fn eviction_key(&self, k: usize) -> (bool, u64) {
        let warm = self.history.len() >= k;
        (warm, self.history.front().copied().unwrap_or(0))
    }
}

#[derive(Default)]
struct ReplacerState {
    nodes: HashMap<FrameId, LruKNode>,
    current_timestamp: u64,
    evictable_count: usize,
}

/// Thread-safe LRU-K replacer for a pool of `num_frames` frames.
///
/// Every method takes `&self`; a single internal mutex makes each call
/// atomic with respect to the whole replacer.
///
/// # Example
/// ```
/// use stratadb::buffer::LruKReplacer;
/// use stratadb::common::FrameId;
///
/// let replacer = LruKReplacer::new(4, 2);
/// replacer.record_access(FrameId::new(0)).unwrap();
/// replacer.set_evictable(FrameId::new(0), true).unwrap();
/// assert_eq!(replacer.evict(), Some(FrameId::new(0)));
/// ```
pub struct LruKReplacer {
    state: Mutex<ReplacerState>,
    num_frames: usize,
    k: usize,
}

impl LruKReplacer {
    /// # Panics
    /// Panics if `k == 0`.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "LRU-K requires k >= 1");
        Self {
            state: Mutex::new(ReplacerState::default()),
            num_frames,
            k,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Append the current timestamp to the frame's history, dropping the
    /// oldest entry once K are held. A first access creates the frame's
    /// node as non-evictable.
    ///
    /// # Errors
    /// `InvalidFrameId` if `frame_id >= num_frames`.
    pub fn record_access(&self, frame_id: FrameId) -> Result<()> {
        self.check_frame(frame_id)?;

        let mut state = self.state.lock();
        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;

        let node = state.nodes.entry(frame_id).or_default();
        if node.history.len() == self.k {
            node.history.pop_front();
        }
        node.history.push_back(timestamp);
        Ok(())
    }

    /// Toggle whether the frame may be chosen by [`evict`](Self::evict).
    ///
    /// # Errors
    /// - `InvalidFrameId` if `frame_id >= num_frames`
    /// - `UnknownFrame` if the frame has never been accessed
    /// - `EvictableUnchanged` if the frame is already in the requested state
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        self.check_frame(frame_id)?;

        let mut state = self.state.lock();
        let node = state
            .nodes
            .get_mut(&frame_id)
            .ok_or(Error::UnknownFrame(frame_id))?;

        if node.is_evictable == evictable {
            return Err(Error::EvictableUnchanged {
                frame: frame_id,
                evictable,
            });
        }
        node.is_evictable = evictable;

        if evictable {
            state.evictable_count += 1;
        } else {
            state.evictable_count -= 1;
        }
        Ok(())
    }

    /// Pick and claim a victim frame.
    ///
    /// The victim's history is cleared and it is marked non-evictable.
    /// Returns `None` when no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        let frame_id = self.select_victim(&state)?;

        if let Some(node) = state.nodes.get_mut(&frame_id) {
            node.history.clear();
            node.is_evictable = false;
        }
        state.evictable_count -= 1;

        trace!("LRU-K evicted {}", frame_id);
        Some(frame_id)
    }

    /// The frame [`evict`](Self::evict) would pick, without claiming it.
    pub fn victim(&self) -> Option<FrameId> {
        self.select_victim(&self.state.lock())
    }

    fn select_victim(&self, state: &ReplacerState) -> Option<FrameId> {
        if state.evictable_count == 0 {
            return None;
        }
        state
            .nodes
            .iter()
            .filter(|(_, node)| node.is_evictable)
            .map(|(&frame_id, node)| (frame_id, node.eviction_key(self.k)))
            .min_by_key(|&(frame_id, key)| (key, frame_id))
            .map(|(frame_id, _)| frame_id)
    }

    /// Drop a frame's history outside normal eviction.
    ///
    /// Removing an untracked frame is a no-op.
    ///
    /// # Errors
    /// - `InvalidFrameId` if `frame_id >= num_frames`
    /// - `FrameNotEvictable` if the frame is tracked but pinned
    pub fn remove(&self, frame_id: FrameId) -> Result<()> {
        self.check_frame(frame_id)?;

        let mut state = self.state.lock();
        let is_evictable = match state.nodes.get(&frame_id) {
            None => return Ok(()),
            Some(node) => node.is_evictable,
        };
        if !is_evictable {
            return Err(Error::FrameNotEvictable(frame_id));
        }

        state.nodes.remove(&frame_id);
        state.evictable_count -= 1;
        Ok(())
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().evictable_count
    }

    fn check_frame(&self, frame_id: FrameId) -> Result<()> {
        if frame_id.0 >= self.num_frames {
            return Err(Error::InvalidFrameId(frame_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn f(id: usize) -> FrameId {
        FrameId::new(id)
    }

    fn access(replacer: &LruKReplacer, ids: &[usize]) {
        for &id in ids {
            replacer.record_access(f(id)).unwrap();
        }
    }

    #[test]
    fn test_lru_k_sample_sequence() {
        let replacer = LruKReplacer::new(7, 2);

        // Frames 1..=6 accessed once; 6 stays pinned.
        access(&replacer, &[1, 2, 3, 4, 5, 6]);
        for id in 1..=5 {
            replacer.set_evictable(f(id), true).unwrap();
        }
        assert_eq!(replacer.size(), 5);

        // Frame 1 now has two accesses and becomes warm.
        access(&replacer, &[1]);

        // Cold frames go first, oldest first access first.
        assert_eq!(replacer.evict(), Some(f(2)));
        assert_eq!(replacer.evict(), Some(f(3)));
        assert_eq!(replacer.evict(), Some(f(4)));
        assert_eq!(replacer.size(), 2);

        // Frames 3 and 4 come back, 5 gets a second access.
        access(&replacer, &[3, 4, 5, 4]);
        replacer.set_evictable(f(3), true).unwrap();
        replacer.set_evictable(f(4), true).unwrap();
        assert_eq!(replacer.size(), 4);

        // 3 is the only cold evictable frame.
        assert_eq!(replacer.evict(), Some(f(3)));
        assert_eq!(replacer.size(), 3);

        replacer.set_evictable(f(6), true).unwrap();
        assert_eq!(replacer.size(), 4);
        assert_eq!(replacer.evict(), Some(f(6)));

        // Pin frame 1; of the remaining warm frames, 5 has the older K-th access.
        replacer.set_evictable(f(1), false).unwrap();
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(f(5)));

        access(&replacer, &[1, 1]);
        replacer.set_evictable(f(1), true).unwrap();
        assert_eq!(replacer.evict(), Some(f(4)));
        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_cold_frame_evicted_before_warm() {
        let replacer = LruKReplacer::new(3, 2);
        // B and C are warm, A (frame 0) is accessed last but only once.
        access(&replacer, &[1, 1, 2, 2, 0]);
        for id in 0..3 {
            replacer.set_evictable(f(id), true).unwrap();
        }

        assert_eq!(replacer.evict(), Some(f(0)));
    }

    #[test]
    fn test_cold_frames_ranked_by_first_access() {
        let replacer = LruKReplacer::new(3, 3);
        access(&replacer, &[0, 1, 0]);
        replacer.set_evictable(f(0), true).unwrap();
        replacer.set_evictable(f(1), true).unwrap();

        // Both cold; frame 0's first access is older.
        assert_eq!(replacer.evict(), Some(f(0)));
        assert_eq!(replacer.evict(), Some(f(1)));
    }

    #[test]
    fn test_warm_frames_ranked_by_kth_access() {
        let replacer = LruKReplacer::new(2, 2);
        // Frame 0: accesses at t=0,3. Frame 1: t=1,2.
        access(&replacer, &[0, 1, 1, 0]);
        replacer.set_evictable(f(0), true).unwrap();
        replacer.set_evictable(f(1), true).unwrap();

        // K-th most recent: frame 0 -> 0, frame 1 -> 1.
        assert_eq!(replacer.evict(), Some(f(0)));
    }

    #[test]
    fn test_history_bounded_to_k() {
        let replacer = LruKReplacer::new(2, 2);
        // Frame 0: t=0,1,4 -> keeps 1,4. Frame 1: t=2,3.
        access(&replacer, &[0, 0, 1, 1, 0]);
        replacer.set_evictable(f(0), true).unwrap();
        replacer.set_evictable(f(1), true).unwrap();

        assert_eq!(replacer.evict(), Some(f(0)));
    }

    #[test]
    fn test_pinned_frames_never_evicted() {
        let replacer = LruKReplacer::new(3, 2);
        access(&replacer, &[0, 1, 2]);
        replacer.set_evictable(f(1), true).unwrap();

        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_evict_clears_history() {
        let replacer = LruKReplacer::new(2, 2);
        access(&replacer, &[0, 0, 1]);
        replacer.set_evictable(f(0), true).unwrap();
        assert_eq!(replacer.evict(), Some(f(0)));

        // Reused frame 0 starts cold again, with a newer access than frame 1.
        access(&replacer, &[0]);
        replacer.set_evictable(f(0), true).unwrap();
        replacer.set_evictable(f(1), true).unwrap();
        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.evict(), Some(f(0)));
    }

    #[test]
    fn test_victim_does_not_claim() {
        let replacer = LruKReplacer::new(3, 2);
        assert_eq!(replacer.victim(), None);

        access(&replacer, &[0, 1]);
        replacer.set_evictable(f(0), true).unwrap();
        replacer.set_evictable(f(1), true).unwrap();

        assert_eq!(replacer.victim(), Some(f(0)));
        assert_eq!(replacer.victim(), Some(f(0)));
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(f(0)));
        assert_eq!(replacer.victim(), Some(f(1)));
    }

    #[test]
    fn test_set_evictable_errors() {
        let replacer = LruKReplacer::new(2, 2);

        assert!(matches!(
            replacer.set_evictable(f(0), true),
            Err(Error::UnknownFrame(_))
        ));
        assert!(matches!(
            replacer.set_evictable(f(5), true),
            Err(Error::InvalidFrameId(_))
        ));

        access(&replacer, &[0]);
        assert!(matches!(
            replacer.set_evictable(f(0), false),
            Err(Error::EvictableUnchanged {
                evictable: false,
                ..
            })
        ));
        replacer.set_evictable(f(0), true).unwrap();
        assert!(replacer.set_evictable(f(0), true).is_err());
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_record_access_rejects_out_of_range() {
        let replacer = LruKReplacer::new(2, 2);
        assert!(matches!(
            replacer.record_access(f(2)),
            Err(Error::InvalidFrameId(_))
        ));
    }

    #[test]
    fn test_remove() {
        let replacer = LruKReplacer::new(3, 2);
        access(&replacer, &[0, 1]);
        replacer.set_evictable(f(0), true).unwrap();

        assert!(matches!(
            replacer.remove(f(1)),
            Err(Error::FrameNotEvictable(_))
        ));
        replacer.remove(f(0)).unwrap();
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        // Untracked frames are ignored.
        replacer.remove(f(2)).unwrap();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Access(usize),
        SetEvictable(usize, bool),
        Evict,
        Remove(usize),
    }

    fn op_strategy(frames: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..frames).prop_map(Op::Access),
            (0..frames, any::<bool>()).prop_map(|(id, e)| Op::SetEvictable(id, e)),
            Just(Op::Evict),
            (0..frames).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_size_tracks_evictable_frames(ops in prop::collection::vec(op_strategy(6), 1..200)) {
            let replacer = LruKReplacer::new(6, 3);
            let mut evictable = [false; 6];

            for op in ops {
                match op {
                    Op::Access(id) => {
                        replacer.record_access(f(id)).unwrap();
                    }
                    Op::SetEvictable(id, e) => {
                        if replacer.set_evictable(f(id), e).is_ok() {
                            evictable[id] = e;
                        }
                    }
                    Op::Evict => {
                        if let Some(victim) = replacer.evict() {
                            prop_assert!(evictable[victim.0]);
                            evictable[victim.0] = false;
                        } else {
                            prop_assert!(evictable.iter().all(|e| !e));
                        }
                    }
                    Op::Remove(id) => {
                        if replacer.remove(f(id)).is_ok() {
                            evictable[id] = false;
                        }
                    }
                }
                prop_assert_eq!(replacer.size(), evictable.iter().filter(|e| **e).count());
            }
        }
    }
}
