//! Read-only queries on live ranges.

use super::{LiveRange, Segment};
use crate::function::CoalesceOracle;
use crate::slot::SlotIndex;
use crate::value::{ValNo, ValueArena};

/// Liveness of a range around a single instruction, as returned by
/// [`LiveRange::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveQuery {
    early: Option<ValNo>,
    late: Option<ValNo>,
    end_point: Option<SlotIndex>,
    kill: bool,
}

impl LiveQuery {
    /// Value live into the instruction, if any.
    ///
    /// For an early-clobber def this is the value live before the def.
    #[inline]
    pub fn value_in(&self) -> Option<ValNo> {
        self.early
    }

    /// Returns whether the value live into the instruction is killed by it.
    #[inline]
    pub fn is_kill(&self) -> bool {
        self.kill
    }

    /// Returns whether the instruction defines a value that is immediately
    /// dead.
    #[inline]
    pub fn is_dead_def(&self) -> bool {
        self.end_point.is_some_and(SlotIndex::is_dead)
    }

    /// Value live out of the instruction, `None` for a dead def.
    #[inline]
    pub fn value_out(&self) -> Option<ValNo> {
        if self.is_dead_def() { None } else { self.late }
    }

    /// Value live out of the instruction or defined dead by it.
    #[inline]
    pub fn value_out_or_dead(&self) -> Option<ValNo> {
        self.late
    }

    /// Value defined by the instruction, if any.
    #[inline]
    pub fn value_defined(&self) -> Option<ValNo> {
        if self.early == self.late {
            None
        } else {
            self.late
        }
    }

    /// End of the segment live through or defined by the instruction.
    #[inline]
    pub fn end_point(&self) -> Option<SlotIndex> {
        self.end_point
    }
}

impl LiveRange {
    /// Returns the index of the first segment that ends after `pos`, or
    /// `len()` if there is none.
    ///
    /// The segment contains `pos` if its start is at or before `pos`.
    #[inline]
    pub fn find(&self, pos: SlotIndex) -> usize {
        self.segments.partition_point(|seg| seg.end <= pos)
    }

    /// Advances `i` to the first segment that ends after `pos`.
    ///
    /// This is linear in the number of skipped segments, which is faster than
    /// [`LiveRange::find`] when `pos` is expected to be close.
    #[inline]
    pub fn advance_to(&self, mut i: usize, pos: SlotIndex) -> usize {
        if self.segments.last().is_none_or(|last| pos >= last.end) {
            return self.segments.len();
        }
        while self.segments[i].end <= pos {
            i += 1;
        }
        i
    }

    /// Returns the segment containing `pos`.
    #[inline]
    pub fn segment_at(&self, pos: SlotIndex) -> Option<&Segment> {
        self.segments
            .get(self.find(pos))
            .filter(|seg| seg.start <= pos)
    }

    /// Returns the value live at `pos`.
    #[inline]
    pub fn value_at(&self, pos: SlotIndex) -> Option<ValNo> {
        self.segment_at(pos).map(|seg| seg.valno)
    }

    /// Returns the value live just before `pos`. This is the value live out
    /// of a block when `pos` is the end of the block.
    #[inline]
    pub fn value_before(&self, pos: SlotIndex) -> Option<ValNo> {
        self.value_at(pos.prev_slot())
    }

    /// Returns whether the range is live at `pos`.
    #[inline]
    pub fn live_at(&self, pos: SlotIndex) -> bool {
        self.segment_at(pos).is_some()
    }

    /// Returns whether the range is not live at or after `pos`.
    #[inline]
    pub fn expired_at(&self, pos: SlotIndex) -> bool {
        self.segments.last().is_none_or(|last| pos >= last.end)
    }

    /// Describes the liveness of the range around the instruction containing
    /// `pos`.
    pub fn query(&self, pos: SlotIndex, arena: &ValueArena) -> LiveQuery {
        let base = pos.base_index();
        let mut i = self.find(base);
        let mut result = LiveQuery {
            early: None,
            late: None,
            end_point: None,
            kill: false,
        };
        if i == self.segments.len() {
            return result;
        }

        let seg = self.segments[i];
        if seg.start <= base {
            result.early = Some(seg.valno);
            result.end_point = Some(seg.end);

            // Move to the segment that may be live out.
            if SlotIndex::is_same_inst(pos, seg.end) {
                result.kill = true;
                i += 1;
                if i == self.segments.len() {
                    return result;
                }
            }

            // A PHI value can be defined in the middle of a segment when it is
            // live out of the layout predecessor. Such a value isn't live in.
            if arena.def_of(seg.valno) == Some(base) {
                result.early = None;
            }
        }

        // Ignore segments that start after this instruction.
        let seg = self.segments[i];
        if !SlotIndex::is_earlier_inst(pos, seg.start) {
            result.late = Some(seg.valno);
            result.end_point = Some(seg.end);
        }
        result
    }

    /// Returns whether the two ranges are live at a common position.
    pub fn overlaps(&self, other: &LiveRange) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.overlaps_from(other, 0)
    }

    /// Same as [`LiveRange::overlaps`] but starts scanning `other` at segment
    /// `start`.
    ///
    /// `other.segments()[start]` must not start after the first segment of
    /// `self` unless `start` is 0.
    pub fn overlaps_from(&self, other: &LiveRange, start: usize) -> bool {
        assert!(!self.is_empty(), "empty range");
        assert!(start < other.len(), "bogus start position hint");
        debug_assert!(
            start == 0 || other.segments[start].start <= self.segments[0].start,
            "bogus start position hint"
        );

        let mut a: &[Segment] = &self.segments;
        let mut b: &[Segment] = &other.segments;
        let mut i = 0;
        let mut j = start;

        if a[i].start < b[j].start {
            let target = b[j].start;
            i = a.partition_point(|seg| seg.start <= target).saturating_sub(1);
        } else if b[j].start < a[i].start {
            if j + 1 < b.len() && b[j + 1].start <= a[i].start {
                let target = a[i].start;
                j = j + b[j..].partition_point(|seg| seg.start <= target);
                j = j.saturating_sub(1);
            }
        } else {
            return true;
        }

        if j == b.len() {
            return false;
        }

        while i != a.len() {
            if a[i].start > b[j].start {
                core::mem::swap(&mut a, &mut b);
                core::mem::swap(&mut i, &mut j);
            }
            if a[i].end > b[j].start {
                return true;
            }
            i += 1;
        }
        false
    }

    /// Returns whether the two ranges overlap, ignoring overlaps that start
    /// at a coalescable copy.
    ///
    /// An overlap is excused when the later of the two overlapping segment
    /// starts is an instruction that `oracle` reports as a copy between the
    /// two registers: the value flows from one register to the other so the
    /// overlap is not real interference.
    ///
    /// Only the later start is consulted, so a copy that defines the earlier
    /// of the two segments does not excuse the overlap. Oracles that describe
    /// a copy in one direction make the result depend on which range is
    /// `self`.
    pub fn overlaps_coalescable(&self, other: &LiveRange, oracle: &impl CoalesceOracle) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }

        // Use binary searches to find initial positions.
        let mut a: &[Segment] = &self.segments;
        let mut b: &[Segment] = &other.segments;
        let mut i = self.find(other.begin_index());
        if i == a.len() {
            return false;
        }
        let mut j = other.find(a[i].start);
        if j == b.len() {
            return false;
        }

        loop {
            debug_assert!(b[j].end > a[i].start);
            if b[j].start < a[i].end {
                // Overlapping: allow it if the later start is a coalescable
                // copy.
                let def = core::cmp::max(a[i].start, b[j].start);
                if def.is_block() || !oracle.is_coalescable(def.inst()) {
                    return true;
                }
            }

            // Advance the segment that ends first.
            if b[j].end > a[i].end {
                core::mem::swap(&mut a, &mut b);
                core::mem::swap(&mut i, &mut j);
            }
            loop {
                j += 1;
                if j == b.len() {
                    return false;
                }
                if b[j].end > a[i].start {
                    break;
                }
            }
        }
    }

    /// Returns whether the range is live anywhere in `[start, end)`.
    #[track_caller]
    pub fn overlaps_range(&self, start: SlotIndex, end: SlotIndex) -> bool {
        assert!(start < end, "invalid range [{start},{end})");
        let i = self.segments.partition_point(|seg| seg.start < end);
        i != 0 && self.segments[i - 1].end > start
    }

    /// Returns whether `self` is live everywhere `other` is live.
    pub fn covers(&self, other: &LiveRange) -> bool {
        if self.is_empty() {
            return other.is_empty();
        }

        let mut i = 0;
        for seg in &other.segments {
            i = self.advance_to(i, seg.start);
            if i == self.segments.len() || self.segments[i].start > seg.start {
                return false;
            }

            // Walk through touching segments until we get past the end.
            while self.segments[i].end < seg.end {
                let last_end = self.segments[i].end;
                i += 1;
                if i == self.segments.len() || self.segments[i].start != last_end {
                    return false;
                }
            }
        }
        true
    }

    /// Returns whether the range is live at any of the sorted positions in
    /// `slots`.
    pub fn is_live_at_any_of(&self, slots: &[SlotIndex]) -> bool {
        let Some(&first) = slots.first() else {
            return false;
        };
        let mut i = self.find(first);
        if i == self.segments.len() {
            return false;
        }
        for &slot in slots {
            i = self.advance_to(i, slot);
            if i == self.segments.len() {
                return false;
            }
            if self.segments[i].contains(slot) {
                return true;
            }
        }
        false
    }

    /// Total number of positions covered by the range.
    pub fn size(&self) -> u64 {
        self.segments
            .iter()
            .map(|seg| u64::from(seg.start.distance(seg.end)))
            .sum()
    }
}
