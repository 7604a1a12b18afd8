//! Amortized insertion of many segments into a live range.
//!
//! Adding segments one at a time with [`LiveRange::add_segment`] shifts the
//! tail of the segment vector on every insertion, which is quadratic when
//! building a large range. [`LiveRangeUpdater`] instead keeps a gap in the
//! vector at the current insertion point and only closes it on
//! [`LiveRangeUpdater::flush`].
//!
//! While the updater is dirty the segments are kept in three areas:
//!
//! 1. `[0, write_i)` at the front of the range.
//! 2. `[read_i, len)` at the back of the range.
//! 3. The spill list.
//!
//! All three areas are sorted and coalesced. Area 1 and the spills precede
//! and can't coalesce with area 2. The spills are not ordered with respect to
//! area 1 and need to be merged with it, but they never overlap or coalesce
//! with it either. When they exist, the last spill and the segment before
//! `write_i` start at or before `last_start`.

use core::{cmp, fmt, iter};

use smallvec::SmallVec;

use crate::live_range::{LiveRange, Segment};
use crate::slot::SlotIndex;
use crate::value::ValNo;

/// Adds segments to a live range in order of non-decreasing start.
///
/// Segments may be added in any order, but each backwards step in start
/// position flushes the updater and loses the amortization.
///
/// The range must not be accessed in any other way while the updater is
/// dirty, which the borrow checker enforces. The updater flushes when it is
/// dropped.
pub struct LiveRangeUpdater<'a> {
    lr: &'a mut LiveRange,
    last_start: Option<SlotIndex>,
    write_i: usize,
    read_i: usize,
    spills: SmallVec<[Segment; 8]>,
}

/// Returns whether `b` should be merged into `a`.
#[inline]
fn coalescable(a: &Segment, b: &Segment) -> bool {
    debug_assert!(a.start <= b.start, "unordered live segments");
    if a.end == b.start {
        return a.valno == b.valno;
    }
    if a.end < b.start {
        return false;
    }
    assert_eq!(a.valno, b.valno, "cannot overlap {a} and {b}: different values");
    true
}

impl<'a> LiveRangeUpdater<'a> {
    /// Creates a clean updater for `lr`.
    pub fn new(lr: &'a mut LiveRange) -> Self {
        Self {
            lr,
            last_start: None,
            write_i: 0,
            read_i: 0,
            spills: SmallVec::new(),
        }
    }

    /// Returns whether there are changes that have not been flushed.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.last_start.is_some()
    }

    /// Adds the segment `[start, end)` with value `valno`.
    #[inline]
    pub fn add_range(&mut self, start: SlotIndex, end: SlotIndex, valno: ValNo) {
        self.add(Segment::new(start, end, valno));
    }

    /// Adds a segment to the range.
    pub fn add(&mut self, mut seg: Segment) {
        // The set form has no gap to maintain.
        if self.lr.has_segment_set() {
            self.lr.add_segment(seg);
            return;
        }

        // Start over if the start moves backwards.
        if self.last_start.is_none_or(|last| last > seg.start) {
            if self.is_dirty() {
                self.flush();
            }
            debug_assert!(self.spills.is_empty(), "leftover spilled segments");
            self.write_i = 0;
            self.read_i = 0;
        }
        self.last_start = Some(seg.start);

        // Advance read_i until it ends after seg.start.
        let len = self.lr.segments.len();
        if self.read_i != len && self.lr.segments[self.read_i].end <= seg.start {
            // First try to close the gap with spills.
            if self.read_i != self.write_i {
                self.merge_spills();
            }
            if self.read_i == self.write_i {
                let i = self.lr.find(seg.start);
                self.read_i = i;
                self.write_i = i;
            } else {
                let segs = &mut self.lr.segments;
                while self.read_i != len && segs[self.read_i].end <= seg.start {
                    segs[self.write_i] = segs[self.read_i];
                    self.write_i += 1;
                    self.read_i += 1;
                }
            }
        }

        let segs = &mut self.lr.segments;
        debug_assert!(self.read_i == len || segs[self.read_i].end > seg.start);

        // The segment at read_i may start before seg.
        if self.read_i != len && segs[self.read_i].start <= seg.start {
            let existing = segs[self.read_i];
            assert_eq!(
                existing.valno, seg.valno,
                "cannot overlap {existing} and {seg}: different values"
            );
            if existing.end >= seg.end {
                return;
            }
            seg.start = existing.start;
            self.read_i += 1;
        }

        // Coalesce as much as possible from area 2 into seg.
        while self.read_i != len && coalescable(&seg, &segs[self.read_i]) {
            seg.end = cmp::max(seg.end, segs[self.read_i].end);
            self.read_i += 1;
        }

        // Try coalescing the last spill into seg.
        if let Some(last) = self.spills.last().copied() {
            if coalescable(&last, &seg) {
                seg.start = last.start;
                seg.end = cmp::max(last.end, seg.end);
                self.spills.pop();
            }
        }

        // Try coalescing seg into the end of area 1.
        if self.write_i != 0 && coalescable(&segs[self.write_i - 1], &seg) {
            let prev = &mut segs[self.write_i - 1];
            prev.end = cmp::max(prev.end, seg.end);
            return;
        }

        // Use the gap if there is one.
        if self.write_i != self.read_i {
            segs[self.write_i] = seg;
            self.write_i += 1;
            return;
        }

        // Otherwise append to the range or to the spills.
        if self.write_i == len {
            segs.push(seg);
            self.write_i = segs.len();
            self.read_i = segs.len();
        } else {
            self.spills.push(seg);
        }
    }

    /// Merges as many spills as possible into the gap between `write_i` and
    /// `read_i`, advancing `write_i`.
    fn merge_spills(&mut self) {
        // Backwards merge of the spills and the end of area 1.
        let segs = &mut self.lr.segments;
        let gap = self.read_i - self.write_i;
        let num_moved = cmp::min(self.spills.len(), gap);
        let mut src = self.write_i;
        let mut dst = src + num_moved;
        let mut spill_src = self.spills.len();

        self.write_i = dst;
        while src != dst {
            dst -= 1;
            if src != 0 && segs[src - 1].start > self.spills[spill_src - 1].start {
                src -= 1;
                segs[dst] = segs[src];
            } else {
                spill_src -= 1;
                segs[dst] = self.spills[spill_src];
            }
        }
        debug_assert_eq!(num_moved, self.spills.len() - spill_src);
        self.spills.truncate(spill_src);
    }

    /// Writes all pending changes to the range.
    pub fn flush(&mut self) {
        if !self.is_dirty() {
            return;
        }
        self.last_start = None;

        if self.spills.is_empty() {
            self.lr.segments.drain(self.write_i..self.read_i);
            self.lr.debug_check();
            return;
        }

        // Resize the gap to fit the spills exactly.
        let gap = self.read_i - self.write_i;
        if gap < self.spills.len() {
            // The filler is overwritten by merge_spills.
            let filler = self.spills[0];
            self.lr.segments.splice(
                self.read_i..self.read_i,
                iter::repeat_n(filler, self.spills.len() - gap),
            );
        } else {
            self.lr
                .segments
                .drain(self.write_i + self.spills.len()..self.read_i);
        }
        self.read_i = self.write_i + self.spills.len();
        self.merge_spills();
        debug_assert!(self.spills.is_empty());
        self.lr.debug_check();
    }
}

impl Drop for LiveRangeUpdater<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

impl fmt::Display for LiveRangeUpdater<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_dirty() {
            write!(f, "Clean updater:")?;
            for seg in &self.lr.segments {
                write!(f, " {seg}")?;
            }
            return writeln!(f);
        }
        write!(f, "Updater with gap = {}", self.read_i - self.write_i)?;
        if let Some(last_start) = self.last_start {
            write!(f, ", last start = {last_start}")?;
        }
        write!(f, ":\n  Area 1:")?;
        for seg in &self.lr.segments[..self.write_i] {
            write!(f, " {seg}")?;
        }
        write!(f, "\n  Spills:")?;
        for seg in &self.spills {
            write!(f, " {seg}")?;
        }
        write!(f, "\n  Area 2:")?;
        for seg in &self.lr.segments[self.read_i..] {
            write!(f, " {seg}")?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::value::ValueArena;

    fn pos(bits: u32) -> SlotIndex {
        SlotIndex::from_bits(bits)
    }

    #[test]
    fn out_of_order_adds_spill() {
        let mut arena = ValueArena::new();
        let mut lr = LiveRange::new();
        let v0 = lr.next_value(pos(0), &mut arena);
        let v1 = lr.next_value(pos(20), &mut arena);
        lr.add_segment(Segment::new(pos(0), pos(10), v0));
        lr.add_segment(Segment::new(pos(40), pos(50), v0));

        {
            let mut updater = LiveRangeUpdater::new(&mut lr);
            updater.add_range(pos(20), pos(25), v1);
            updater.add_range(pos(30), pos(35), v1);
            assert!(updater.is_dirty());
            updater.add_range(pos(10), pos(12), v0);
        }

        let segs: Vec<_> = lr.segments().iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(
            segs,
            [
                (pos(0), pos(12)),
                (pos(20), pos(25)),
                (pos(30), pos(35)),
                (pos(40), pos(50))
            ]
        );
    }

    #[test]
    fn coalesces_touching_segments() {
        let mut arena = ValueArena::new();
        let mut lr = LiveRange::new();
        let v0 = lr.next_value(pos(0), &mut arena);
        lr.add_segment(Segment::new(pos(8), pos(12), v0));

        let mut updater = LiveRangeUpdater::new(&mut lr);
        updater.add_range(pos(0), pos(4), v0);
        updater.add_range(pos(4), pos(8), v0);
        updater.add_range(pos(12), pos(16), v0);
        updater.flush();
        assert!(!updater.is_dirty());
        drop(updater);

        assert_eq!(lr.segments(), [Segment::new(pos(0), pos(16), v0)]);
    }

    /// Generates segments with non-decreasing starts which never overlap a
    /// segment of a different value.
    fn random_segments(rng: &mut StdRng, values: &[ValNo]) -> Vec<Segment> {
        // Pick a value for each slot in a small universe, then cut runs of
        // the same value into random pieces.
        let mut owner = Vec::new();
        for _ in 0..rng.random_range(1..80) {
            let v = if rng.random_bool(0.3) {
                None
            } else {
                Some(values[rng.random_range(0..values.len())])
            };
            let run = rng.random_range(1..6);
            owner.extend(iter::repeat_n(v, run));
        }

        let mut segs = Vec::new();
        for _ in 0..rng.random_range(1..40) {
            let start = rng.random_range(0..owner.len());
            let Some(v) = owner[start] else {
                continue;
            };
            let mut end = start + 1;
            while end < owner.len() && owner[end] == Some(v) && rng.random_bool(0.7) {
                end += 1;
            }
            segs.push(Segment::new(pos(start as u32), pos(end as u32), v));
        }
        segs.sort_by_key(|seg| seg.start);
        segs
    }

    #[test]
    fn matches_add_segment() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..500 {
            let mut arena = ValueArena::new();
            let mut plain = LiveRange::new();
            let values: Vec<_> = (0..4).map(|i| plain.next_value(pos(i), &mut arena)).collect();
            let mut batched = plain.clone();

            // Seed both ranges with the same initial segments.
            let initial = random_segments(&mut rng, &values);
            let extra = random_segments(&mut rng, &values);
            let compatible = |a: &Segment, b: &Segment| {
                a.valno == b.valno || a.end <= b.start || b.end <= a.start
            };
            if !initial
                .iter()
                .all(|a| extra.iter().all(|b| compatible(a, b)))
            {
                continue;
            }
            for &seg in &initial {
                plain.add_segment(seg);
                batched.add_segment(seg);
            }

            for &seg in &extra {
                plain.add_segment(seg);
            }
            let mut updater = LiveRangeUpdater::new(&mut batched);
            for &seg in &extra {
                updater.add(seg);
            }
            drop(updater);

            assert_eq!(plain.segments(), batched.segments());
        }
    }
}
