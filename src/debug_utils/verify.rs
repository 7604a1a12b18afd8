//! Structural checks for live ranges and live intervals.

use anyhow::{Result, bail, ensure};

use crate::entity::EntityRef;
use crate::live_interval::LiveInterval;
use crate::live_range::{LiveRange, Segment};
use crate::reginfo::LaneMask;
use crate::value::ValueArena;

/// Checks that `lr` satisfies all the invariants maintained by the public
/// operations of [`LiveRange`].
///
/// The range must not be in segment-set mode.
pub fn verify_live_range(lr: &LiveRange, arena: &ValueArena) -> Result<()> {
    ensure!(
        !lr.has_segment_set(),
        "range has segments in an unflushed segment set"
    );

    for (i, &vn) in lr.values().iter().enumerate() {
        ensure!(vn.index() < arena.len(), "{vn}: invalid value reference");
        let id = arena.id(vn);
        ensure!(
            id.index() == i,
            "{vn} is at index {i} of the value list but has id {id}"
        );
    }

    let mut prev: Option<&Segment> = None;
    for seg in lr.segments() {
        ensure!(seg.start < seg.end, "{seg}: empty segment");
        ensure!(
            seg.valno.index() < arena.len(),
            "{seg}: invalid value reference"
        );
        let id = arena.id(seg.valno);
        ensure!(
            lr.values().get(id.index()) == Some(&seg.valno),
            "{seg}: value is not owned by the range"
        );
        ensure!(
            !arena.is_unused(seg.valno),
            "{seg}: value has been deleted"
        );

        if let Some(prev) = prev {
            if prev.end > seg.start {
                bail!("{prev} and {seg} overlap or are out of order");
            }
            ensure!(
                !(prev.end == seg.start && prev.valno == seg.valno),
                "{prev} and {seg} should have been merged"
            );
        }
        prev = Some(seg);
    }

    Ok(())
}

/// Checks that `li` satisfies all the invariants of [`LiveInterval`], in
/// addition to checking its main range and every sub-range with
/// [`verify_live_range`].
///
/// If `max_lane_mask` is given, every sub-range must only contain lanes from
/// it.
pub fn verify_live_interval(
    li: &LiveInterval,
    arena: &ValueArena,
    max_lane_mask: Option<LaneMask>,
) -> Result<()> {
    verify_live_range(li.main_range(), arena)?;

    let mut seen = LaneMask::NONE;
    for sr in li.subranges() {
        let mask = sr.lane_mask;
        ensure!(!mask.is_empty(), "{}: sub-range with empty lane mask", li.reg());
        ensure!(
            !seen.intersects(mask),
            "{}: sub-range lane mask {mask:?} overlaps another sub-range",
            li.reg()
        );
        seen |= mask;
        if let Some(max) = max_lane_mask {
            ensure!(
                (mask & !max).is_empty(),
                "{}: sub-range lane mask {mask:?} is outside of {max:?}",
                li.reg()
            );
        }

        ensure!(!sr.is_empty(), "{}: empty sub-range {mask:?}", li.reg());
        verify_live_range(sr, arena)
            .map_err(|err| err.context(alloc::format!("{}: sub-range {mask:?}", li.reg())))?;
        ensure!(
            li.covers(sr),
            "{}: main range does not cover sub-range {mask:?}",
            li.reg()
        );
    }

    Ok(())
}
