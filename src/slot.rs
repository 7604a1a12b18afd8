//! Program positions at sub-instruction granularity.
//!
//! Every instruction owns four consecutive positions, one per [`Slot`]. Live
//! ranges are half-open intervals of [`SlotIndex`], which makes it possible to
//! express that a use and a def in the same instruction do not interfere, or
//! that an early-clobber def does.
//!
//! Instruction numbers come from the client and do not need to be dense:
//! leaving gaps between instructions makes room for instructions inserted
//! later (e.g. implicit definitions created when repairing split registers).

use core::fmt;

use brie_tree::BTreeKey;
use brie_tree::nonmax::NonMaxU32;

use crate::function::Inst;

/// A slot within an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Slot {
    /// The boundary before the instruction.
    ///
    /// Values that are live into a basic block start at the `Block` slot of
    /// its first instruction. A value whose definition is at a `Block` slot is
    /// a PHI value.
    Block = 0,

    /// Early-clobber defs are defined here, so that they interfere with the
    /// uses of the same instruction.
    EarlyClobber = 1,

    /// Normal defs are defined here and uses are killed here.
    Register = 2,

    /// Values defined and never read end here.
    Dead = 3,
}

impl Slot {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => Slot::Block,
            1 => Slot::EarlyClobber,
            2 => Slot::Register,
            _ => Slot::Dead,
        }
    }

    /// Single character used when printing a [`SlotIndex`].
    pub fn letter(self) -> char {
        match self {
            Slot::Block => 'B',
            Slot::EarlyClobber => 'e',
            Slot::Register => 'r',
            Slot::Dead => 'd',
        }
    }
}

/// A position in the linear instruction order.
///
/// This is logically an `(Inst, Slot)` pair, bit-packed in 32 bits so that
/// positions compare as plain integers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotIndex {
    /// inst:30 slot:2
    bits: u32,
}

impl SlotIndex {
    /// Largest instruction number that can be represented.
    ///
    /// The last instruction is reserved so that the all-ones bit pattern never
    /// appears as a key in the segment set.
    pub const MAX_INST: usize = (1 << 30) - 2;

    /// Returns the position of `slot` in `inst`.
    #[inline]
    pub fn new(inst: Inst, slot: Slot) -> Self {
        debug_assert!(inst.index() <= Self::MAX_INST);
        Self {
            bits: (inst.index() as u32) << 2 | slot as u32,
        }
    }

    /// Reconstructs a position from [`SlotIndex::bits`].
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    /// Raw bit-packed representation.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.bits
    }

    /// The instruction this position belongs to.
    #[inline]
    pub fn inst(self) -> Inst {
        Inst::new((self.bits >> 2) as usize)
    }

    /// The slot within the instruction.
    #[inline]
    pub fn slot(self) -> Slot {
        Slot::from_bits(self.bits)
    }

    /// Returns whether this is a `Block` slot.
    #[inline]
    pub fn is_block(self) -> bool {
        self.slot() == Slot::Block
    }

    /// Returns whether this is a `EarlyClobber` slot.
    #[inline]
    pub fn is_early_clobber(self) -> bool {
        self.slot() == Slot::EarlyClobber
    }

    /// Returns whether this is a `Register` slot.
    #[inline]
    pub fn is_register(self) -> bool {
        self.slot() == Slot::Register
    }

    /// Returns whether this is a `Dead` slot.
    #[inline]
    pub fn is_dead(self) -> bool {
        self.slot() == Slot::Dead
    }

    /// The `Block` slot of the same instruction.
    #[inline]
    pub fn base_index(self) -> Self {
        Self {
            bits: self.bits & !0b11,
        }
    }

    /// The slot at which a def of this instruction is defined.
    #[inline]
    pub fn reg_slot(self, early_clobber: bool) -> Self {
        let slot = if early_clobber {
            Slot::EarlyClobber
        } else {
            Slot::Register
        };
        Self {
            bits: self.base_index().bits | slot as u32,
        }
    }

    /// The `Dead` slot of the same instruction.
    #[inline]
    pub fn dead_slot(self) -> Self {
        Self {
            bits: self.bits | 0b11,
        }
    }

    /// The position immediately after this one, crossing into the next
    /// instruction after the `Dead` slot.
    #[inline]
    pub fn next_slot(self) -> Self {
        Self {
            bits: self.bits + 1,
        }
    }

    /// The position immediately before this one.
    ///
    /// Panics in debug builds when called on the very first position.
    #[inline]
    pub fn prev_slot(self) -> Self {
        debug_assert_ne!(self.bits, 0, "no position before the first one");
        Self {
            bits: self.bits - 1,
        }
    }

    /// The `Block` slot of the following instruction.
    #[inline]
    pub fn next_index(self) -> Self {
        Self {
            bits: self.base_index().bits + 4,
        }
    }

    /// Returns whether `a` and `b` are in the same instruction.
    #[inline]
    pub fn is_same_inst(a: Self, b: Self) -> bool {
        a.bits >> 2 == b.bits >> 2
    }

    /// Returns whether `a` is in an instruction before the one containing
    /// `b`.
    #[inline]
    pub fn is_earlier_inst(a: Self, b: Self) -> bool {
        a.bits >> 2 < b.bits >> 2
    }

    /// Number of positions from `self` to `other`. `other` must not come
    /// before `self`.
    #[inline]
    pub fn distance(self, other: Self) -> u32 {
        debug_assert!(self <= other);
        other.bits - self.bits
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.bits >> 2, self.slot().letter())
    }
}

impl fmt::Debug for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Inst {
    /// Helper to create a [`SlotIndex`] in this instruction.
    #[inline]
    pub fn slot(self, slot: Slot) -> SlotIndex {
        SlotIndex::new(self, slot)
    }
}

impl BTreeKey for SlotIndex {
    type Int = NonMaxU32;

    fn to_int(self) -> Self::Int {
        NonMaxU32::new(self.bits).unwrap()
    }

    fn from_int(int: Self::Int) -> Self {
        SlotIndex { bits: int.get() }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    fn idx(inst: usize, slot: Slot) -> SlotIndex {
        Inst::new(inst).slot(slot)
    }

    #[test]
    fn derivations() {
        let r = idx(4, Slot::Register);
        assert_eq!(r.base_index(), idx(4, Slot::Block));
        assert_eq!(r.dead_slot(), idx(4, Slot::Dead));
        assert_eq!(r.reg_slot(true), idx(4, Slot::EarlyClobber));
        assert_eq!(r.dead_slot().next_slot(), idx(5, Slot::Block));
        assert_eq!(idx(5, Slot::Block).prev_slot(), idx(4, Slot::Dead));
        assert_eq!(r.next_index(), idx(5, Slot::Block));
        assert!(SlotIndex::is_same_inst(r, idx(4, Slot::Block)));
        assert!(SlotIndex::is_earlier_inst(r, idx(5, Slot::Block)));
        assert!(!SlotIndex::is_earlier_inst(r, idx(4, Slot::Dead)));
        assert_eq!(idx(1, Slot::Block).distance(idx(2, Slot::Register)), 6);
    }

    #[test]
    fn display() {
        assert_eq!(idx(16, Slot::Register).to_string(), "16r");
        assert_eq!(idx(0, Slot::Block).to_string(), "0B");
        assert_eq!(idx(3, Slot::EarlyClobber).to_string(), "3e");
        assert_eq!(idx(7, Slot::Dead).to_string(), "7d");
    }
}
