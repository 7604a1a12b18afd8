//! Randomly generated live ranges and live intervals for fuzzing.

use core::ops::RangeInclusive;

use arbitrary::{Result, Unstructured};

use crate::function::VirtReg;
use crate::live_interval::LiveInterval;
use crate::live_range::{LiveRange, Segment};
use crate::reginfo::LaneMask;
use crate::slot::SlotIndex;
use crate::value::{ValNo, ValueArena};

/// Configuration options for [`arbitrary_live_range`] and
/// [`arbitrary_live_interval`].
///
/// These are ranges from which a value is arbitrarily chosen when generating a
/// range.
///
/// It's generally fine to just use `Default::default` for this.
#[derive(Debug, Clone)]
pub struct ArbitraryRangeConfig {
    /// Number of segments in each range.
    pub segments: RangeInclusive<usize>,

    /// Number of positions between two consecutive segments. Zero makes them
    /// touch.
    pub gap: RangeInclusive<u32>,

    /// Number of positions covered by each segment.
    pub length: RangeInclusive<u32>,

    /// Number of lanes of the register. Intervals get up to this many
    /// sub-ranges.
    pub lanes: RangeInclusive<u32>,
}

impl Default for ArbitraryRangeConfig {
    fn default() -> Self {
        Self {
            segments: 0..=12,
            gap: 0..=12,
            length: 1..=24,
            lanes: 1..=4,
        }
    }
}

/// Generates a range with sorted, non-overlapping segments.
///
/// Every value is defined at the start of its first segment. A segment either
/// starts a new value or continues one of the existing values.
pub fn arbitrary_live_range(
    u: &mut Unstructured<'_>,
    arena: &mut ValueArena,
    config: &ArbitraryRangeConfig,
) -> Result<LiveRange> {
    let mut lr = LiveRange::new();
    let mut pos = u.int_in_range(0..=16)?;
    let mut prev: Option<Segment> = None;
    for _ in 0..u.int_in_range(config.segments.clone())? {
        let start = pos + u.int_in_range(config.gap.clone())?;
        let end = start + u.int_in_range(config.length.clone())?;
        if end > (SlotIndex::MAX_INST as u32) << 2 {
            break;
        }
        let (start, end) = (SlotIndex::from_bits(start), SlotIndex::from_bits(end));

        // Reusing the value of a touching segment would require merging.
        let reuse: Option<ValNo> = if !lr.values().is_empty() && u.arbitrary()? {
            Some(*u.choose(lr.values())?)
        } else {
            None
        };
        let valno = match reuse {
            Some(vn) if prev.is_none_or(|p| p.end != start || p.valno != vn) => vn,
            _ => lr.next_value(start, arena),
        };

        let seg = Segment::new(start, end, valno);
        lr.append(seg);
        prev = Some(seg);
        pos = end.bits();
    }
    Ok(lr)
}

/// Generates an interval for `reg` with sub-ranges over disjoint lane masks
/// and a main range built from them.
///
/// Returns the interval and the lanes of the register.
pub fn arbitrary_live_interval(
    u: &mut Unstructured<'_>,
    arena: &mut ValueArena,
    reg: VirtReg,
    config: &ArbitraryRangeConfig,
) -> Result<(LiveInterval, LaneMask)> {
    let lanes = u.int_in_range(config.lanes.clone())?;
    let reg_mask = LaneMask(u32::MAX >> (32 - lanes));
    let mut li = LiveInterval::new(reg);

    // Hand out the lanes to sub-ranges, possibly leaving some unused.
    let mut lane = 0;
    while lane < lanes {
        let width = u.int_in_range(1..=lanes - lane)?;
        let mask = LaneMask((u32::MAX >> (32 - width)) << lane);
        lane += width;
        if u.ratio(1, 4)? {
            continue;
        }
        let range = arbitrary_live_range(u, arena, config)?;
        if range.is_empty() {
            continue;
        }
        *li.create_subrange(mask).range_mut() = range;
    }

    if li.has_subranges() {
        li.construct_main_range_from_subranges(arena);
    } else {
        *li.main_range_mut() = arbitrary_live_range(u, arena, config)?;
    }
    Ok((li, reg_mask))
}
