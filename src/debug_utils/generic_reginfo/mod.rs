//! Generic implementation of a [`RegInfo`] which can be used for testing.

use crate::entity::PrimaryMap;
use crate::function::VirtReg;
use crate::reginfo::{LaneMask, RegInfo, SubRegIdx};

/// A generic implementation of [`RegInfo`] where every virtual register has
/// the same lanes.
///
/// Sub-register indices are created with [`GenericRegInfo::add_subreg`].
/// [`SubRegIdx::NONE`] always covers all lanes of the register.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenericRegInfo {
    subregs: PrimaryMap<SubRegIdx, LaneMask>,
}

impl GenericRegInfo {
    /// Creates a register description where registers have the lanes in
    /// `reg_lanes`.
    #[must_use]
    pub fn new(reg_lanes: LaneMask) -> Self {
        let mut subregs = PrimaryMap::new();
        subregs.push(reg_lanes);
        Self { subregs }
    }

    /// Creates a register description with `num_lanes` lanes and one
    /// sub-register index per lane, numbered from 1.
    #[must_use]
    pub fn with_lanes(num_lanes: u32) -> Self {
        assert!((1..=32).contains(&num_lanes));
        let mut reginfo = Self::new(LaneMask(u32::MAX >> (32 - num_lanes)));
        for lane in 0..num_lanes {
            reginfo.add_subreg(LaneMask(1 << lane));
        }
        reginfo
    }

    /// Adds a sub-register index covering `lanes`.
    #[track_caller]
    pub fn add_subreg(&mut self, lanes: LaneMask) -> SubRegIdx {
        assert!(!lanes.is_empty(), "sub-register without lanes");
        assert!(
            (lanes & !self.subregs[SubRegIdx::NONE]).is_empty(),
            "sub-register lanes {lanes:?} are outside of the register"
        );
        self.subregs.push(lanes)
    }
}

impl RegInfo for GenericRegInfo {
    fn subreg_lane_mask(&self, idx: SubRegIdx) -> LaneMask {
        self.subregs[idx]
    }

    fn reg_lane_mask(&self, _reg: VirtReg) -> LaneMask {
        self.subregs[SubRegIdx::NONE]
    }
}
