use std::fmt;

use arbitrary::{Arbitrary, Result, Unstructured};
use liveintervals::LiveInterval;
use liveintervals::debug_utils::{self, ArbitraryRangeConfig, DisplayLiveInterval};
use liveintervals::function::VirtReg;
use liveintervals::live_range::LiveRange;
use liveintervals::reginfo::LaneMask;
use liveintervals::value::ValueArena;

/// Common implementation of a test case used by the fuzz targets working on
/// whole intervals.
pub struct TestCase {
    pub arena: ValueArena,
    pub intervals: Vec<LiveInterval>,
    pub lanes: Vec<LaneMask>,
}

impl Arbitrary<'_> for TestCase {
    fn arbitrary(u: &mut Unstructured) -> Result<Self> {
        // Ensure the logger is initialized.
        let _ = pretty_env_logger::try_init();

        let config = ArbitraryRangeConfig::default();
        let mut arena = ValueArena::new();
        let mut intervals = vec![];
        let mut lanes = vec![];
        for i in 0..u.int_in_range(1..=4)? {
            let (li, mask) =
                debug_utils::arbitrary_live_interval(u, &mut arena, VirtReg::new(i), &config)?;
            log::trace!("Generated {}", DisplayLiveInterval(&li, &arena));
            intervals.push(li);
            lanes.push(mask);
        }
        Ok(TestCase {
            arena,
            intervals,
            lanes,
        })
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for li in &self.intervals {
            writeln!(f, "{}", DisplayLiveInterval(li, &self.arena))?;
        }
        Ok(())
    }
}

/// Two live ranges sharing a value arena.
pub struct RangePair {
    pub arena: ValueArena,
    pub a: LiveRange,
    pub b: LiveRange,
}

impl Arbitrary<'_> for RangePair {
    fn arbitrary(u: &mut Unstructured) -> Result<Self> {
        // Ensure the logger is initialized.
        let _ = pretty_env_logger::try_init();

        let config = ArbitraryRangeConfig::default();
        let mut arena = ValueArena::new();
        let a = debug_utils::arbitrary_live_range(u, &mut arena, &config)?;
        let b = debug_utils::arbitrary_live_range(u, &mut arena, &config)?;
        Ok(RangePair { arena, a, b })
    }
}

impl fmt::Debug for RangePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "a: {}", debug_utils::DisplayLiveRange(&self.a, &self.arena))?;
        writeln!(f, "b: {}", debug_utils::DisplayLiveRange(&self.b, &self.arena))
    }
}

/// Returns, for every position up to `limit`, the index of the segment of
/// `lr` covering it.
pub fn coverage(lr: &LiveRange, limit: u32) -> Vec<Option<usize>> {
    let mut map = vec![None; limit as usize];
    for (i, seg) in lr.segments().iter().enumerate() {
        for pos in seg.start.bits()..seg.end.bits().min(limit) {
            map[pos as usize] = Some(i);
        }
    }
    map
}
