//! Support for displaying human-readable representations of live ranges and
//! live intervals.
//!
//! The format is also machine-parseable, see [`parse_live_intervals`]
//! (requires the `parse` cargo feature).
//!
//! [`parse_live_intervals`]: crate::debug_utils::parse_live_intervals

use core::fmt;

use crate::live_interval::LiveInterval;
use crate::live_range::{LiveRange, Segment};
use crate::value::ValueArena;

/// Wrapper around a [`LiveRange`] that provides a [`Display`] implementation.
///
/// Segments are printed as `[start,end:id)` where `id` is the index of the
/// segment's value in the range, followed by the definition of every value:
///
/// ```text
/// [16r,32B:0)[32B,64d:1)  0@16r 1@32B-phi
/// ```
///
/// Deleted values are printed as `id@x` and a range without segments as
/// `EMPTY`.
///
/// [`Display`]: core::fmt::Display
pub struct DisplayLiveRange<'a>(pub &'a LiveRange, pub &'a ValueArena);

impl fmt::Debug for DisplayLiveRange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for DisplayLiveRange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let DisplayLiveRange(lr, arena) = *self;

        // Segments still held in a segment set are shown after the vector.
        let set_segments = lr.segment_set.iter().flat_map(|set| set.iter());
        let mut empty = true;
        for seg in lr.segments().iter().copied().chain(set_segments) {
            let Segment { start, end, valno } = seg;
            write!(f, "[{start},{end}:{})", arena.id(valno))?;
            empty = false;
        }
        if empty {
            f.write_str("EMPTY")?;
        }

        for (i, &vn) in lr.values().iter().enumerate() {
            if i == 0 {
                f.write_str("  ")?;
            } else {
                f.write_str(" ")?;
            }
            match arena.def_of(vn) {
                Some(def) if def.is_block() => write!(f, "{}@{def}-phi", arena.id(vn))?,
                Some(def) => write!(f, "{}@{def}", arena.id(vn))?,
                None => write!(f, "{}@x", arena.id(vn))?,
            }
        }
        Ok(())
    }
}

/// Wrapper around a [`LiveInterval`] that provides a [`Display`]
/// implementation.
///
/// The register comes first, followed by the main range and then each
/// sub-range prefixed by its lane mask:
///
/// ```text
/// %3 [16r,64d:0)  0@16r L00000001 [16r,32B:0)  0@16r L00000002 [24r,64d:0)  0@24r
/// ```
///
/// [`Display`]: core::fmt::Display
pub struct DisplayLiveInterval<'a>(pub &'a LiveInterval, pub &'a ValueArena);

impl fmt::Debug for DisplayLiveInterval<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for DisplayLiveInterval<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let DisplayLiveInterval(li, arena) = *self;
        write!(f, "{} {}", li.reg(), DisplayLiveRange(li.main_range(), arena))?;
        for sr in li.subranges() {
            write!(f, " L{} {}", sr.lane_mask, DisplayLiveRange(sr, arena))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;
    use crate::function::{Inst, VirtReg};
    use crate::reginfo::LaneMask;
    use crate::slot::{Slot, SlotIndex};

    fn idx(inst: usize, slot: Slot) -> SlotIndex {
        Inst::new(inst).slot(slot)
    }

    #[test]
    fn range_format() {
        let mut arena = ValueArena::new();
        let mut lr = LiveRange::new();
        assert_eq!(DisplayLiveRange(&lr, &arena).to_string(), "EMPTY");

        let a = lr.next_value(idx(16, Slot::Register), &mut arena);
        let b = lr.next_value(idx(32, Slot::Block), &mut arena);
        lr.add_segment(Segment::new(idx(16, Slot::Register), idx(32, Slot::Block), a));
        lr.add_segment(Segment::new(idx(32, Slot::Block), idx(64, Slot::Dead), b));
        assert_eq!(
            DisplayLiveRange(&lr, &arena).to_string(),
            "[16r,32B:0)[32B,64d:1)  0@16r 1@32B-phi"
        );

        let c = lr.next_value(idx(80, Slot::Register), &mut arena);
        arena.mark_unused(c);
        assert_eq!(
            DisplayLiveRange(&lr, &arena).to_string(),
            "[16r,32B:0)[32B,64d:1)  0@16r 1@32B-phi 2@x"
        );
    }

    #[test]
    fn interval_format() {
        let mut arena = ValueArena::new();
        let mut li = LiveInterval::new(VirtReg::new(3));
        let vn = li.next_value(idx(16, Slot::Register), &mut arena);
        li.add_segment(Segment::new(idx(16, Slot::Register), idx(20, Slot::Block), vn));
        let sr = li.create_subrange(LaneMask(1));
        let svn = sr.next_value(idx(16, Slot::Register), &mut arena);
        sr.add_segment(Segment::new(idx(16, Slot::Register), idx(18, Slot::Block), svn));

        assert_eq!(
            DisplayLiveInterval(&li, &arena).to_string(),
            "%3 [16r,20B:0)  0@16r L00000001 [16r,18B:0)  0@16r"
        );
    }
}
