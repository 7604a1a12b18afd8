//! Segment insertion algorithms shared by both forms of a live range.
//!
//! The algorithms are written once against [`SegmentStore`], which abstracts
//! an ordered collection of segments addressed by cursors. Two stores exist:
//!
//! - `Vec<Segment>`, the normal form. Cursors are indices.
//! - [`SegmentSet`], a B-Tree keyed by segment end used while a range is
//!   built in arbitrary order. Cursors are keys, with `None` past the end.
//!
//! Erasing elements may shift the cursors of later elements so every
//! operation that erases returns the updated cursor.

use alloc::vec::Vec;
use core::cmp;
use core::ops::Bound;

use brie_tree::BTree;

use super::{Segment, push_value};
use crate::slot::SlotIndex;
use crate::value::{ValNo, ValueArena};

/// An ordered collection of non-overlapping segments.
pub(crate) trait SegmentStore {
    type Cursor: Copy + Eq;

    /// Cursor to the first segment.
    fn begin(&self) -> Self::Cursor;

    /// Cursor past the last segment.
    fn end(&self) -> Self::Cursor;

    /// Cursor to the segment after `c`.
    fn next(&self, c: Self::Cursor) -> Self::Cursor;

    /// Cursor to the segment before `c`, which must not be `begin`.
    fn prev(&self, c: Self::Cursor) -> Self::Cursor;

    /// The segment at `c`, which must not be `end`.
    fn at(&self, c: Self::Cursor) -> Segment;

    /// Overwrites the segment at `c`. Returns the cursor of the new segment.
    fn replace(&mut self, c: Self::Cursor, seg: Segment) -> Self::Cursor;

    /// Erases the segments in `[from, to)`. Returns the new cursor of the
    /// segment that was at `to`.
    fn erase(&mut self, from: Self::Cursor, to: Self::Cursor) -> Self::Cursor;

    /// Inserts `seg` before `c`. Returns the cursor of the new segment.
    fn insert_before(&mut self, c: Self::Cursor, seg: Segment) -> Self::Cursor;

    /// First segment that ends after `pos`.
    fn find_pos(&self, pos: SlotIndex) -> Self::Cursor;

    fn no_segments(&self) -> bool;

    /// First segment that starts after `start`.
    fn find_insert_pos(&self, start: SlotIndex) -> Self::Cursor {
        let c = self.find_pos(start);
        if c != self.end() && self.at(c).start <= start {
            self.next(c)
        } else {
            c
        }
    }

    fn create_dead_def(
        &mut self,
        def: SlotIndex,
        valnos: &mut Vec<ValNo>,
        arena: &mut ValueArena,
    ) -> ValNo {
        assert!(!def.is_dead(), "cannot define a value at the dead slot");

        let c = self.find_pos(def);
        if c == self.end() {
            let vn = push_value(valnos, arena, def);
            self.insert_before(c, Segment::new(def, def.dead_slot(), vn));
            return vn;
        }

        let seg = self.at(c);
        if SlotIndex::is_same_inst(def, seg.start) {
            debug_assert_eq!(
                arena.def_of(seg.valno),
                Some(seg.start),
                "inconsistent existing value def"
            );

            // A register may have both a normal and an early-clobber def in
            // one instruction. Keep the earliest one.
            if def < seg.start {
                arena.set_def(seg.valno, def);
                self.replace(c, Segment { start: def, ..seg });
            }
            return seg.valno;
        }

        assert!(
            SlotIndex::is_earlier_inst(def, seg.start),
            "already live at {def}"
        );
        let vn = push_value(valnos, arena, def);
        self.insert_before(c, Segment::new(def, def.dead_slot(), vn));
        vn
    }

    fn extend_in_block(&mut self, block_start: SlotIndex, kill: SlotIndex) -> Option<ValNo> {
        if self.no_segments() {
            return None;
        }
        let c = self.find_insert_pos(kill.prev_slot());
        if c == self.begin() {
            return None;
        }
        let c = self.prev(c);
        let seg = self.at(c);
        if seg.end <= block_start {
            return None;
        }
        if seg.end < kill {
            self.extend_segment_end_to(c, kill);
        }
        Some(seg.valno)
    }

    /// Moves the end of the segment at `c` to `new_end`, absorbing the
    /// following segments it now covers.
    fn extend_segment_end_to(&mut self, c: Self::Cursor, new_end: SlotIndex) -> Self::Cursor {
        debug_assert!(c != self.end(), "not a valid segment");
        let mut seg = self.at(c);

        // Find the first segment that can't be absorbed.
        let mut merge_to = self.next(c);
        let mut last_end = seg.end;
        while merge_to != self.end() {
            let next = self.at(merge_to);
            if new_end < next.end {
                break;
            }
            assert_eq!(
                next.valno, seg.valno,
                "cannot merge with differing values"
            );
            last_end = next.end;
            merge_to = self.next(merge_to);
        }

        // `new_end` may fall in the middle of an absorbed segment.
        seg.end = cmp::max(new_end, last_end);

        // Merge with the next segment if it now touches.
        if merge_to != self.end() {
            let next = self.at(merge_to);
            assert!(
                next.start >= seg.end || next.valno == seg.valno,
                "cannot overlap {next} with a segment of a different value"
            );
            if next.start <= seg.end && next.valno == seg.valno {
                seg.end = next.end;
                merge_to = self.next(merge_to);
            }
        }

        let after = self.next(c);
        self.erase(after, merge_to);
        self.replace(c, seg)
    }

    /// Moves the start of the segment at `c` to `new_start`, absorbing the
    /// preceding segments it now covers.
    fn extend_segment_start_to(&mut self, c: Self::Cursor, new_start: SlotIndex) -> Self::Cursor {
        debug_assert!(c != self.end(), "not a valid segment");
        let seg = self.at(c);

        // Find the first segment that can't be absorbed.
        let mut merge_to = c;
        loop {
            if merge_to == self.begin() {
                let c = self.erase(merge_to, c);
                return self.replace(
                    c,
                    Segment {
                        start: new_start,
                        ..seg
                    },
                );
            }
            assert_eq!(
                self.at(merge_to).valno,
                seg.valno,
                "cannot merge with differing values"
            );
            merge_to = self.prev(merge_to);
            if new_start > self.at(merge_to).start {
                break;
            }
        }

        let prev = self.at(merge_to);
        let after_c = self.next(c);
        if prev.end >= new_start && prev.valno == seg.valno {
            // `new_start` is inside `prev`: extend it over the absorbed
            // segments.
            let first_erased = self.next(merge_to);
            self.erase(first_erased, after_c);
            self.replace(
                merge_to,
                Segment {
                    end: seg.end,
                    ..prev
                },
            )
        } else {
            assert!(
                prev.end <= new_start,
                "cannot overlap {prev} with a segment of a different value"
            );
            let target = self.next(merge_to);
            let first_erased = self.next(target);
            self.erase(first_erased, after_c);
            self.replace(
                target,
                Segment {
                    start: new_start,
                    ..seg
                },
            )
        }
    }

    /// Inserts `seg`, extending a neighbouring segment instead when it has the
    /// same value and touches or overlaps `seg`.
    #[track_caller]
    fn add_segment(&mut self, seg: Segment) -> Self::Cursor {
        let c = self.find_insert_pos(seg.start);

        // Extend the previous segment if `seg` starts inside it or right at
        // its end.
        if c != self.begin() {
            let b = self.prev(c);
            let before = self.at(b);
            if before.valno == seg.valno {
                if before.start <= seg.start && before.end >= seg.start {
                    return self.extend_segment_end_to(b, seg.end);
                }
            } else {
                assert!(
                    before.end <= seg.start,
                    "cannot overlap {before} and {seg} which have differing values \
                     (is the same register defined twice in one instruction?)"
                );
            }
        }

        // Extend the next segment if `seg` ends inside it or right at its
        // start.
        if c != self.end() {
            let after = self.at(c);
            if after.valno == seg.valno {
                if after.start <= seg.end {
                    let c = self.extend_segment_start_to(c, seg.start);

                    // `seg` may cover the whole segment.
                    if seg.end > self.at(c).end {
                        return self.extend_segment_end_to(c, seg.end);
                    }
                    return c;
                }
            } else {
                assert!(
                    after.start >= seg.end,
                    "cannot overlap {after} and {seg} which have differing values"
                );
            }
        }

        self.insert_before(c, seg)
    }

    /// Returns an existing segment that overlaps `seg` with a different
    /// value, if any.
    fn conflict(&self, seg: Segment) -> Option<Segment> {
        let mut c = self.find_pos(seg.start);
        while c != self.end() {
            let existing = self.at(c);
            if existing.start >= seg.end {
                break;
            }
            if existing.valno != seg.valno {
                return Some(existing);
            }
            c = self.next(c);
        }
        None
    }
}

impl SegmentStore for Vec<Segment> {
    type Cursor = usize;

    #[inline]
    fn begin(&self) -> usize {
        0
    }

    #[inline]
    fn end(&self) -> usize {
        self.len()
    }

    #[inline]
    fn next(&self, c: usize) -> usize {
        c + 1
    }

    #[inline]
    fn prev(&self, c: usize) -> usize {
        c - 1
    }

    #[inline]
    fn at(&self, c: usize) -> Segment {
        self[c]
    }

    #[inline]
    fn replace(&mut self, c: usize, seg: Segment) -> usize {
        self[c] = seg;
        c
    }

    #[inline]
    fn erase(&mut self, from: usize, to: usize) -> usize {
        self.drain(from..to);
        from
    }

    #[inline]
    fn insert_before(&mut self, c: usize, seg: Segment) -> usize {
        self.insert(c, seg);
        c
    }

    #[inline]
    fn find_pos(&self, pos: SlotIndex) -> usize {
        self.partition_point(|seg| seg.end <= pos)
    }

    #[inline]
    fn no_segments(&self) -> bool {
        self.is_empty()
    }
}

/// Value stored for each segment in a [`SegmentSet`]. The end of the segment
/// is the key.
#[derive(Debug, Clone, Copy)]
struct SetEntry {
    start: SlotIndex,
    valno: ValNo,
}

/// B-Tree form of a live range's segments.
///
/// Segments never overlap so their end points are unique and ordered the
/// same way as their start points.
#[derive(Default)]
pub(crate) struct SegmentSet {
    btree: BTree<SlotIndex, SetEntry>,
}

impl SegmentSet {
    /// Deep copy of the set.
    pub(crate) fn duplicate(&self) -> Self {
        let mut btree = BTree::default();
        for (end, &entry) in &self.btree {
            btree.insert(end, entry);
        }
        Self { btree }
    }

    /// Iterates over all segments in order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Segment> + '_ {
        (&self.btree).into_iter().map(|(end, entry)| Segment {
            start: entry.start,
            end,
            valno: entry.valno,
        })
    }
}

#[inline]
#[track_caller]
fn key(c: Option<SlotIndex>) -> SlotIndex {
    c.expect("cursor is past the end of the segment set")
}

impl SegmentStore for SegmentSet {
    type Cursor = Option<SlotIndex>;

    fn begin(&self) -> Self::Cursor {
        (&self.btree).into_iter().next().map(|(end, _)| end)
    }

    #[inline]
    fn end(&self) -> Self::Cursor {
        None
    }

    fn next(&self, c: Self::Cursor) -> Self::Cursor {
        self.btree
            .iter_from(Bound::Excluded(key(c)))
            .next()
            .map(|(end, _)| end)
    }

    fn prev(&self, c: Self::Cursor) -> Self::Cursor {
        // Position the B-Tree cursor on `c`, or past the last entry for
        // `end`, and step back once.
        let bound = match c {
            Some(end) => Bound::Excluded(end.prev_slot()),
            None => Bound::Excluded(SlotIndex::from_bits(u32::MAX - 1)),
        };
        let mut cursor = self.btree.cursor_at(bound);
        assert!(cursor.prev(), "no segment before the first one");
        cursor.entry().map(|(end, _)| end)
    }

    fn at(&self, c: Self::Cursor) -> Segment {
        let end = key(c);
        let (found, entry) = self
            .btree
            .iter_from(Bound::Excluded(end.prev_slot()))
            .next()
            .expect("stale segment set cursor");
        debug_assert!(found == end, "stale segment set cursor");
        Segment {
            start: entry.start,
            end,
            valno: entry.valno,
        }
    }

    fn replace(&mut self, c: Self::Cursor, seg: Segment) -> Self::Cursor {
        let old = key(c);
        if old != seg.end {
            self.btree.remove(old);
        }
        self.btree.insert(
            seg.end,
            SetEntry {
                start: seg.start,
                valno: seg.valno,
            },
        );
        Some(seg.end)
    }

    fn erase(&mut self, from: Self::Cursor, to: Self::Cursor) -> Self::Cursor {
        let mut c = from;
        while c != to {
            let Some(end) = c else {
                break;
            };
            let next = self.next(c);
            self.btree.remove(end);
            c = next;
        }
        to
    }

    fn insert_before(&mut self, _c: Self::Cursor, seg: Segment) -> Self::Cursor {
        let prev = self.btree.insert(
            seg.end,
            SetEntry {
                start: seg.start,
                valno: seg.valno,
            },
        );
        debug_assert!(prev.is_none(), "duplicate segment end {}", seg.end);
        Some(seg.end)
    }

    fn find_pos(&self, pos: SlotIndex) -> Self::Cursor {
        self.btree
            .iter_from(Bound::Excluded(pos))
            .next()
            .map(|(end, _)| end)
    }

    #[inline]
    fn no_segments(&self) -> bool {
        self.btree.is_empty()
    }
}
