//! Live ranges: sorted sets of segments tagged with value numbers.
//!
//! A [`LiveRange`] describes where a register holds a value. It is a sorted
//! list of half-open [`Segment`]s, each of which records the value number
//! ([`ValNo`]) live over it, plus the list of values owned by the range.
//!
//! The following properties hold after every public mutation:
//!
//! - Segments are sorted by start position and never overlap.
//! - Two touching segments never carry the same value: they would have been
//!   merged into a single segment.
//! - Every segment's value is owned by the range and the [`ValueId`] of each
//!   value is its index in the range's value list.
//!
//! Ranges are normally backed by a `Vec`. For bulk construction in arbitrary
//! order a range can temporarily switch to a B-Tree backed set with
//! [`LiveRange::use_segment_set`]; [`LiveRange::flush_segment_set`] moves the
//! segments back into the vector. Both forms share the same insertion
//! algorithms, see the `engine` module.

use alloc::vec::Vec;
use core::fmt;

use crate::slot::SlotIndex;
use crate::value::{ValNo, ValueArena, ValueId};

mod engine;
mod lifecycle;
mod query;

pub use query::LiveQuery;

pub(crate) use engine::SegmentSet;
use engine::SegmentStore;

/// A half-open interval `[start, end)` over which `valno` is live.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    /// First position covered by the segment.
    pub start: SlotIndex,

    /// First position after the segment.
    pub end: SlotIndex,

    /// Value live over the segment.
    pub valno: ValNo,
}

impl Segment {
    /// Creates a new segment.
    ///
    /// Panics if the segment is empty.
    #[inline]
    #[track_caller]
    pub fn new(start: SlotIndex, end: SlotIndex, valno: ValNo) -> Self {
        assert!(start < end, "empty segment [{start},{end})");
        Self { start, end, valno }
    }

    /// Returns whether `pos` is inside the segment.
    #[inline]
    pub fn contains(&self, pos: SlotIndex) -> bool {
        self.start <= pos && pos < self.end
    }

    /// Returns whether `[start, end)` is entirely inside the segment.
    #[inline]
    pub fn contains_interval(&self, start: SlotIndex, end: SlotIndex) -> bool {
        debug_assert!(start < end);
        self.start <= start && end <= self.end
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}:{})", self.start, self.end, self.valno)
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Error returned by [`LiveRange::try_add_segment`] when a segment cannot be
/// added to a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SegmentError {
    /// The segment's start is not before its end.
    EmptySegment,

    /// The segment overlaps an existing segment with a different value.
    ///
    /// This usually means that the same register was defined twice by one
    /// instruction.
    ValueConflict {
        /// The existing segment that overlaps the new one.
        existing: Segment,
    },

    /// The segment's value is not owned by the range.
    ForeignValue,
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::EmptySegment => write!(f, "segment start is not before its end"),
            SegmentError::ValueConflict { existing } => {
                write!(f, "segment overlaps {existing} which has a different value")
            }
            SegmentError::ForeignValue => {
                write!(f, "segment value is not owned by the live range")
            }
        }
    }
}

/// Segments and value numbers describing where a register is live.
#[derive(Default)]
pub struct LiveRange {
    pub(crate) segments: Vec<Segment>,
    pub(crate) valnos: Vec<ValNo>,

    /// Active during unordered bulk construction, see
    /// [`LiveRange::use_segment_set`].
    pub(crate) segment_set: Option<SegmentSet>,
}

impl Clone for LiveRange {
    fn clone(&self) -> Self {
        Self {
            segments: self.segments.clone(),
            valnos: self.valnos.clone(),
            segment_set: self.segment_set.as_ref().map(SegmentSet::duplicate),
        }
    }
}

impl fmt::Debug for LiveRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveRange")
            .field("segments", &self.segments)
            .field("valnos", &self.valnos)
            .field("segment_set", &self.segment_set.is_some())
            .finish()
    }
}

impl LiveRange {
    /// Creates an empty range.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments of the range, in order.
    ///
    /// This is empty while the segment set is in use.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns whether the range has no segments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Start of the first segment.
    ///
    /// Panics if the range is empty.
    #[inline]
    #[track_caller]
    pub fn begin_index(&self) -> SlotIndex {
        self.segments.first().expect("empty live range").start
    }

    /// End of the last segment.
    ///
    /// Panics if the range is empty.
    #[inline]
    #[track_caller]
    pub fn end_index(&self) -> SlotIndex {
        self.segments.last().expect("empty live range").end
    }

    /// Value numbers owned by the range, indexed by [`ValueId`].
    #[inline]
    pub fn values(&self) -> &[ValNo] {
        &self.valnos
    }

    /// Number of value numbers, including deleted ones that have not been
    /// dropped yet.
    #[inline]
    pub fn num_values(&self) -> usize {
        self.valnos.len()
    }

    /// Returns the value with the given id.
    #[inline]
    pub fn value(&self, id: ValueId) -> ValNo {
        self.valnos[id.index()]
    }

    /// Returns whether the range has at most one value.
    #[inline]
    pub fn has_at_most_one_value(&self) -> bool {
        self.valnos.len() <= 1
    }

    /// Creates a new value defined at `def` and adds it to the range.
    pub fn next_value(&mut self, def: SlotIndex, arena: &mut ValueArena) -> ValNo {
        push_value(&mut self.valnos, arena, def)
    }

    /// Creates a new value that copies the definition of `orig`, which may be
    /// owned by another range.
    pub fn create_value_copy(&mut self, orig: ValNo, arena: &mut ValueArena) -> ValNo {
        let vn = arena.alloc_copy(ValueId::new(self.valnos.len()), orig);
        self.valnos.push(vn);
        vn
    }

    /// Removes all segments and values.
    ///
    /// The values stay allocated in the arena but are no longer owned by the
    /// range.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.valnos.clear();
        self.segment_set = None;
    }

    /// Returns whether the segment set is active.
    #[inline]
    pub fn has_segment_set(&self) -> bool {
        self.segment_set.is_some()
    }

    /// Switches the range to the set form for construction in arbitrary
    /// order.
    ///
    /// The range must be empty. Only [`LiveRange::add_segment`],
    /// [`LiveRange::create_dead_def`] and [`LiveRange::extend_in_block`] may be
    /// used until [`LiveRange::flush_segment_set`] is called.
    pub fn use_segment_set(&mut self) {
        assert!(
            self.segments.is_empty(),
            "segment set can only be used on an empty range"
        );
        assert!(self.segment_set.is_none(), "segment set is already in use");
        self.segment_set = Some(SegmentSet::default());
    }

    /// Moves all segments from the set into the vector and deactivates the
    /// set.
    pub fn flush_segment_set(&mut self) {
        let set = self
            .segment_set
            .take()
            .expect("segment set must have been created");
        assert!(
            self.segments.is_empty(),
            "segment set can be used only initially before switching to the vector"
        );
        self.segments.extend(set.iter());
        self.debug_check();
    }

    /// Creates a new value defined at `def` which is immediately dead.
    ///
    /// If a segment of the range already starts in the same instruction, its
    /// value is returned instead. When that value is defined at a later slot
    /// its definition is moved to `def`: this happens when a register has both
    /// a normal and an early-clobber def in the same instruction.
    ///
    /// Panics if `def` is a dead slot or if the range is already live at
    /// `def`.
    pub fn create_dead_def(&mut self, def: SlotIndex, arena: &mut ValueArena) -> ValNo {
        match &mut self.segment_set {
            Some(set) => set.create_dead_def(def, &mut self.valnos, arena),
            None => self.segments.create_dead_def(def, &mut self.valnos, arena),
        }
    }

    /// Extends the range up to `kill` if it is live before `kill` in the
    /// block starting at `block_start`.
    ///
    /// Returns the value that was extended, or `None` if the range is not live
    /// between `block_start` and `kill`.
    pub fn extend_in_block(&mut self, block_start: SlotIndex, kill: SlotIndex) -> Option<ValNo> {
        match &mut self.segment_set {
            Some(set) => set.extend_in_block(block_start, kill),
            None => self.segments.extend_in_block(block_start, kill),
        }
    }

    /// Adds a segment to the range, merging it with neighbouring segments of
    /// the same value.
    ///
    /// Panics if the segment overlaps a segment with a different value.
    #[track_caller]
    pub fn add_segment(&mut self, seg: Segment) {
        match &mut self.segment_set {
            Some(set) => {
                set.add_segment(seg);
            }
            None => {
                self.segments.add_segment(seg);
            }
        }
    }

    /// Checked version of [`LiveRange::add_segment`] for callers that need
    /// to diagnose malformed input.
    ///
    /// Nothing is modified when an error is returned.
    pub fn try_add_segment(
        &mut self,
        seg: Segment,
        arena: &ValueArena,
    ) -> Result<(), SegmentError> {
        if seg.start >= seg.end {
            return Err(SegmentError::EmptySegment);
        }
        let id = arena.id(seg.valno);
        if self.valnos.get(id.index()) != Some(&seg.valno) {
            return Err(SegmentError::ForeignValue);
        }
        let conflict = match &self.segment_set {
            Some(set) => set.conflict(seg),
            None => self.segments.conflict(seg),
        };
        if let Some(existing) = conflict {
            return Err(SegmentError::ValueConflict { existing });
        }
        self.add_segment(seg);
        Ok(())
    }

    /// Appends a segment that starts at or after the end of the range.
    ///
    /// This is cheaper than [`LiveRange::add_segment`] but performs no
    /// coalescing.
    #[track_caller]
    pub fn append(&mut self, seg: Segment) {
        assert!(
            self.segments.last().is_none_or(|last| last.end <= seg.start),
            "appended segment {seg} is not after the end of the range"
        );
        self.segments.push(seg);
    }

    /// Runs the structural checks in debug builds.
    #[inline]
    pub(crate) fn debug_check(&self) {
        if cfg!(debug_assertions) {
            for pair in self.segments.windows(2) {
                debug_assert!(pair[0].start < pair[0].end, "empty segment {}", pair[0]);
                debug_assert!(
                    pair[0].end <= pair[1].start,
                    "overlapping segments {} and {}",
                    pair[0],
                    pair[1]
                );
                debug_assert!(
                    pair[0].end != pair[1].start || pair[0].valno != pair[1].valno,
                    "uncoalesced segments {} and {}",
                    pair[0],
                    pair[1]
                );
            }
        }
    }
}

/// Allocates a new value with the next id of `valnos`.
pub(crate) fn push_value(valnos: &mut Vec<ValNo>, arena: &mut ValueArena, def: SlotIndex) -> ValNo {
    let vn = arena.alloc(ValueId::new(valnos.len()), def);
    valnos.push(vn);
    vn
}
