//! Live intervals: the live range of a virtual register and its sub-ranges.
//!
//! With sub-register liveness enabled, an interval tracks groups of lanes of
//! its register separately in [`SubRange`]s. The lane masks of the sub-ranges
//! are disjoint, empty sub-ranges are removed, and the main range covers the
//! union of all sub-ranges.

use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

use crate::debug_utils::DisplayLiveInterval;
use crate::function::VirtReg;
use crate::live_range::{LiveRange, Segment};
use crate::reginfo::LaneMask;
use crate::slot::SlotIndex;
use crate::updater::LiveRangeUpdater;
use crate::value::{ValNo, ValueArena};

/// Liveness of a subset of the lanes of a register.
#[derive(Debug, Clone, Default)]
pub struct SubRange {
    /// Lanes tracked by this sub-range.
    pub lane_mask: LaneMask,

    range: LiveRange,
}

impl SubRange {
    /// Creates an empty sub-range.
    #[must_use]
    pub fn new(lane_mask: LaneMask) -> Self {
        Self {
            lane_mask,
            range: LiveRange::new(),
        }
    }

    /// The live range of the lanes.
    #[inline]
    pub fn range(&self) -> &LiveRange {
        &self.range
    }

    /// The live range of the lanes.
    #[inline]
    pub fn range_mut(&mut self) -> &mut LiveRange {
        &mut self.range
    }
}

impl Deref for SubRange {
    type Target = LiveRange;

    #[inline]
    fn deref(&self) -> &LiveRange {
        &self.range
    }
}

impl DerefMut for SubRange {
    #[inline]
    fn deref_mut(&mut self) -> &mut LiveRange {
        &mut self.range
    }
}

/// Live range of a virtual register, with optional sub-ranges.
///
/// Derefs to the main range.
#[derive(Debug, Clone)]
pub struct LiveInterval {
    reg: VirtReg,
    range: LiveRange,
    subranges: Vec<SubRange>,
}

impl LiveInterval {
    /// Creates an empty interval for `reg`.
    #[must_use]
    pub fn new(reg: VirtReg) -> Self {
        Self {
            reg,
            range: LiveRange::new(),
            subranges: Vec::new(),
        }
    }

    /// The virtual register described by this interval.
    #[inline]
    pub fn reg(&self) -> VirtReg {
        self.reg
    }

    /// The main range, covering all lanes.
    #[inline]
    pub fn main_range(&self) -> &LiveRange {
        &self.range
    }

    /// The main range, covering all lanes.
    #[inline]
    pub fn main_range_mut(&mut self) -> &mut LiveRange {
        &mut self.range
    }

    /// The sub-ranges of the interval.
    #[inline]
    pub fn subranges(&self) -> &[SubRange] {
        &self.subranges
    }

    /// The sub-ranges of the interval.
    #[inline]
    pub fn subranges_mut(&mut self) -> &mut [SubRange] {
        &mut self.subranges
    }

    /// Returns whether sub-register liveness is tracked for this interval.
    #[inline]
    pub fn has_subranges(&self) -> bool {
        !self.subranges.is_empty()
    }

    /// Splits the borrow of the interval into the main range and the
    /// sub-ranges.
    #[inline]
    pub(crate) fn parts_mut(&mut self) -> (&mut LiveRange, &mut [SubRange]) {
        (&mut self.range, &mut self.subranges)
    }

    /// Adds an empty sub-range for `lane_mask`, which must be disjoint from
    /// the lanes of existing sub-ranges.
    #[track_caller]
    pub fn create_subrange(&mut self, lane_mask: LaneMask) -> &mut SubRange {
        debug_assert!(
            self.subranges
                .iter()
                .all(|sr| !sr.lane_mask.intersects(lane_mask)),
            "sub-range lane masks must be disjoint"
        );
        self.subranges.push(SubRange::new(lane_mask));
        let last = self.subranges.len() - 1;
        &mut self.subranges[last]
    }

    /// Removes all sub-ranges without segments.
    pub fn remove_empty_subranges(&mut self) {
        self.subranges.retain(|sr| !sr.is_empty());
    }

    /// Removes all sub-ranges.
    pub fn clear_subranges(&mut self) {
        self.subranges.clear();
    }

    /// Removes all sub-ranges and all segments and values of the main range.
    pub fn clear(&mut self) {
        self.clear_subranges();
        self.range.clear();
    }

    /// Returns whether any sub-range is live at `pos`.
    pub fn subrange_live_at(&self, pos: SlotIndex) -> bool {
        self.subranges.iter().any(|sr| sr.live_at(pos))
    }

    /// Rebuilds the main range as the union of the sub-ranges.
    ///
    /// The main range must be empty. Each position takes the main range value
    /// of the most recent definition among the sub-range values live there.
    /// Sub-range values defined at the same position share a single main
    /// range value.
    pub fn construct_main_range_from_subranges(&mut self, arena: &mut ValueArena) {
        assert!(
            self.range.is_empty() && self.range.num_values() == 0,
            "main range must be empty"
        );

        // Cut the union of the sub-ranges at every segment boundary.
        let mut points: Vec<SlotIndex> = self
            .subranges
            .iter()
            .flat_map(|sr| sr.segments().iter().flat_map(|seg| [seg.start, seg.end]))
            .collect();
        points.sort_unstable();
        points.dedup();

        let mut pieces: Vec<(SlotIndex, SlotIndex, SlotIndex)> = Vec::new();
        for pair in points.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let def = self
                .subranges
                .iter()
                .filter_map(|sr| sr.value_at(start))
                .map(|vn| arena.def(vn))
                .max();
            if let Some(def) = def {
                pieces.push((start, end, def));
            }
        }

        // One main value per distinct definition, numbered in order of first
        // appearance.
        let mut main_values: HashMap<SlotIndex, ValNo, FxBuildHasher> = HashMap::default();
        let mut segments = Vec::with_capacity(pieces.len());
        for (start, end, def) in pieces {
            let vn = *main_values
                .entry(def)
                .or_insert_with(|| self.range.next_value(def, arena));
            segments.push(Segment::new(start, end, vn));
        }

        let mut updater = LiveRangeUpdater::new(&mut self.range);
        for seg in segments {
            updater.add(seg);
        }
        updater.flush();
        drop(updater);
        trace!(
            "Main range rebuilt from sub-ranges: {}",
            DisplayLiveInterval(self, arena)
        );
    }
}

impl Deref for LiveInterval {
    type Target = LiveRange;

    #[inline]
    fn deref(&self) -> &LiveRange {
        &self.range
    }
}

impl DerefMut for LiveInterval {
    #[inline]
    fn deref_mut(&mut self) -> &mut LiveRange {
        &mut self.range
    }
}
