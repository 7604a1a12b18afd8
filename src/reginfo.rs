//! Sub-register lane layout.
//!
//! A register is made of lanes, and a [`LaneMask`] selects a subset of them.
//! Each sub-register index covers some of the lanes. Sub-ranges of a
//! [`LiveInterval`](crate::LiveInterval) track liveness per group of lanes.

use core::{fmt, ops};

use crate::function::VirtReg;

entity_def! {
    /// Sub-register index of an operand.
    ///
    /// Index 0 ([`SubRegIdx::NONE`]) refers to the whole register.
    pub entity SubRegIdx(u16, "sub");
}

impl SubRegIdx {
    /// The whole register.
    pub const NONE: Self = Self(0);

    /// Returns whether this refers to the whole register.
    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// A set of register lanes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneMask(pub u32);

impl LaneMask {
    /// No lanes.
    pub const NONE: Self = Self(0);

    /// Every lane.
    pub const ALL: Self = Self(!0);

    /// Returns whether no lane is selected.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns whether the two masks share a lane.
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl ops::BitAnd for LaneMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl ops::BitOr for LaneMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for LaneMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl ops::Not for LaneMask {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Display for LaneMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl fmt::Debug for LaneMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{self}")
    }
}

/// Target description of sub-register lanes.
pub trait RegInfo {
    /// Lanes covered by a sub-register index. [`SubRegIdx::NONE`] must map to
    /// all lanes of a register.
    fn subreg_lane_mask(&self, idx: SubRegIdx) -> LaneMask;

    /// All lanes that exist in `reg`.
    fn reg_lane_mask(&self, reg: VirtReg) -> LaneMask;
}
