//! Value number lifecycle: deletion, renumbering, merging and joining.
//!
//! Deleting a value other than the last one only marks it
//! [`ValueState::Unused`]; [`LiveRange::renumber_values`] drops such values
//! later and assigns dense ids again.
//!
//! [`ValueState::Unused`]: crate::value::ValueState::Unused

use core::mem;

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;

use super::{LiveRange, Segment};
use crate::debug_utils::DisplayLiveRange;
use crate::slot::SlotIndex;
use crate::updater::LiveRangeUpdater;
use crate::value::{ValNo, ValueArena, ValueId};

impl LiveRange {
    /// Deletes `vn`, which must no longer be used by any segment.
    ///
    /// If `vn` is the last value it is dropped immediately together with any
    /// deleted values before it. Otherwise it is only marked as unused until
    /// the next [`LiveRange::renumber_values`].
    pub fn mark_value_for_deletion(&mut self, vn: ValNo, arena: &mut ValueArena) {
        arena.mark_unused(vn);
        if arena.id(vn).index() + 1 == self.valnos.len() {
            self.valnos.pop();
            while self.valnos.last().is_some_and(|&last| arena.is_unused(last)) {
                self.valnos.pop();
            }
        }
    }

    /// Renumbers values in order of their first segment and drops values that
    /// are no longer used by any segment.
    pub fn renumber_values(&mut self, arena: &mut ValueArena) {
        let mut seen: HashSet<ValNo, FxBuildHasher> = HashSet::default();
        self.valnos.clear();
        for seg in &self.segments {
            if !seen.insert(seg.valno) {
                continue;
            }
            assert!(
                !arena.is_unused(seg.valno),
                "unused value {} used by live segment {seg}",
                seg.valno
            );
            arena.set_id(seg.valno, ValueId::new(self.valnos.len()));
            self.valnos.push(seg.valno);
        }
    }

    /// Removes `[start, end)` from the range.
    ///
    /// The span must be contained in a single segment, which is trimmed or
    /// split in two. If the segment is removed entirely and
    /// `remove_dead_value` is set, its value is deleted when no other
    /// segment uses it.
    #[track_caller]
    pub fn remove_segment(
        &mut self,
        start: SlotIndex,
        end: SlotIndex,
        remove_dead_value: bool,
        arena: &mut ValueArena,
    ) {
        debug_assert!(!self.has_segment_set());
        let i = self.find(start);
        assert!(i != self.segments.len(), "segment is not in range");
        let seg = self.segments[i];
        assert!(
            seg.contains_interval(start, end),
            "[{start},{end}) is not entirely in {seg}"
        );

        // Removing at the start of the segment.
        if seg.start == start {
            if seg.end == end {
                self.segments.remove(i);
                if remove_dead_value && !self.segments.iter().any(|s| s.valno == seg.valno) {
                    self.mark_value_for_deletion(seg.valno, arena);
                }
            } else {
                self.segments[i].start = end;
            }
            return;
        }

        // Removing at the end of the segment.
        if seg.end == end {
            self.segments[i].end = start;
            return;
        }

        // Split the segment in two.
        self.segments[i].end = start;
        self.segments.insert(
            i + 1,
            Segment {
                start: end,
                end: seg.end,
                valno: seg.valno,
            },
        );
    }

    /// Removes every segment of `vn` and deletes it.
    pub fn remove_value_number(&mut self, vn: ValNo, arena: &mut ValueArena) {
        debug_assert!(!self.has_segment_set());
        if self.is_empty() {
            return;
        }
        self.segments.retain(|seg| seg.valno != vn);
        self.mark_value_for_deletion(vn, arena);
    }

    /// Merges two equivalent values of the range and returns the one that
    /// survives.
    ///
    /// The value with the lower id survives so that the value list can be
    /// compacted. It takes the definition of `v2`.
    #[track_caller]
    pub fn merge_value_number_into(
        &mut self,
        v1: ValNo,
        v2: ValNo,
        arena: &mut ValueArena,
    ) -> ValNo {
        assert_ne!(v1, v2, "identical values are always equivalent");
        debug_assert!(!self.has_segment_set());

        let (v1, v2) = if arena.id(v1) < arena.id(v2) {
            arena.copy_from(v1, v2);
            (v2, v1)
        } else {
            (v1, v2)
        };
        trace!("Merging {v1} into {v2}");

        // Relabel v1 segments as v2 and merge the ones that now touch.
        let mut out = 0;
        for i in 0..self.segments.len() {
            let mut seg = self.segments[i];
            if seg.valno == v1 {
                seg.valno = v2;
            }
            if out != 0 {
                let prev = &mut self.segments[out - 1];
                if prev.valno == seg.valno && prev.end == seg.start {
                    prev.end = seg.end;
                    continue;
                }
            }
            self.segments[out] = seg;
            out += 1;
        }
        self.segments.truncate(out);

        self.mark_value_for_deletion(v1, arena);
        v2
    }

    /// Merges `other` into this range, used when two registers are
    /// coalesced.
    ///
    /// `lhs[i]` and `rhs[i]` give, for the value with id `i` of `self` and
    /// `other` respectively, an index into `new_values`, which holds the
    /// values of the joined range. `None` entries in `new_values` are
    /// dropped, no segment may be mapped to them.
    ///
    /// `other` is left empty.
    pub fn join(
        &mut self,
        other: &mut LiveRange,
        lhs: &[usize],
        rhs: &[usize],
        new_values: &[Option<ValNo>],
        arena: &mut ValueArena,
    ) {
        debug_assert!(!self.has_segment_set() && !other.has_segment_set());
        self.debug_check();
        trace!(
            "Joining {} with {}",
            DisplayLiveRange(self, arena),
            DisplayLiveRange(other, arena)
        );

        let map = |vn: ValNo, assignments: &[usize]| -> ValNo {
            let id = arena.id(vn).index();
            new_values[assignments[id]]
                .unwrap_or_else(|| panic!("{vn} is live but mapped to no value"))
        };

        // Relabeling our own segments is uncommon, avoid the scan when
        // possible.
        let must_map = self.valnos.iter().enumerate().any(|(i, &vn)| {
            let l = lhs[i];
            i != l || new_values[l].is_some_and(|new| new != vn)
        });
        if must_map && !self.segments.is_empty() {
            let mut out = 0;
            for i in 0..self.segments.len() {
                let mut seg = self.segments[i];
                seg.valno = map(seg.valno, lhs);

                // [0,4:0)[4,7:1) becomes a single segment when 0 and 1 are
                // mapped to the same value.
                if out != 0 {
                    let prev = &mut self.segments[out - 1];
                    if prev.valno == seg.valno && prev.end == seg.start {
                        prev.end = seg.end;
                        continue;
                    }
                }
                self.segments[out] = seg;
                out += 1;
            }
            self.segments.truncate(out);
        }

        // Relabel the other range using the ids from before renumbering.
        let mut other_segments = mem::take(&mut other.segments);
        for seg in &mut other_segments {
            seg.valno = map(seg.valno, rhs);
        }
        other.clear();

        // Take ownership of the new values and renumber them.
        self.valnos.clear();
        for &vn in new_values.iter().flatten() {
            arena.set_id(vn, ValueId::new(self.valnos.len()));
            self.valnos.push(vn);
        }

        {
            let mut updater = LiveRangeUpdater::new(self);
            for seg in other_segments {
                updater.add(seg);
            }
            updater.flush();
        }
        trace!("Joined range: {}", DisplayLiveRange(self, arena));
    }

    /// Adds all segments of `rhs` to this range with the value `valno`.
    ///
    /// The segments may overlap existing segments of `valno`.
    pub fn merge_segments_in_as_value(&mut self, rhs: &LiveRange, valno: ValNo) {
        let mut updater = LiveRangeUpdater::new(self);
        for seg in &rhs.segments {
            updater.add(Segment { valno, ..*seg });
        }
    }

    /// Adds the segments of `rhs_valno` in `rhs` to this range with the value
    /// `lhs_valno`.
    pub fn merge_value_in_as_value(&mut self, rhs: &LiveRange, rhs_valno: ValNo, lhs_valno: ValNo) {
        let mut updater = LiveRangeUpdater::new(self);
        for seg in rhs.segments.iter().filter(|seg| seg.valno == rhs_valno) {
            updater.add(Segment {
                valno: lhs_valno,
                ..*seg
            });
        }
    }
}
