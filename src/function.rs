//! Interfaces to the program whose registers are being tracked.
//!
//! Liveness data structures do not own the program they describe. The
//! operations that need to look at it (connected component analysis and
//! register splitting) go through a few narrow traits instead:
//!
//! - [`Cfg`] maps positions to basic blocks and lists block predecessors.
//! - [`RegOperands`] enumerates the operands that refer to a virtual register
//!   and rewrites them after a split.
//! - [`ImplicitDefInserter`] creates the placeholder definitions needed to
//!   repair a split register.
//! - [`CoalesceOracle`] decides whether an instruction is a copy that can be
//!   coalesced away.
//!
//! [`GenericFunction`](crate::debug_utils::GenericFunction) implements all of
//! them for testing.

use alloc::vec::Vec;

use crate::reginfo::SubRegIdx;
use crate::slot::{Slot, SlotIndex};

entity_def! {
    /// A basic block in the function.
    pub entity Block(u32, "bb");

    /// An instruction in the function.
    ///
    /// Instruction numbers also define positions: see [`SlotIndex`].
    pub entity Inst(u32, "inst");

    /// A virtual register.
    pub entity VirtReg(u32, "%");

    /// Opaque identifier for a register operand of an instruction.
    pub entity OperandId(u32, "op");
}

bitflags::bitflags! {
    /// Properties of a register operand.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OperandFlags: u8 {
        /// The operand writes the register. Otherwise it is a use.
        const DEF = 1 << 0;

        /// The def is written before the uses of the same instruction are
        /// read.
        const EARLY_CLOBBER = 1 << 1;

        /// For uses: the value read is irrelevant. For sub-register defs: the
        /// other lanes of the register are not live into the instruction.
        const UNDEF = 1 << 2;

        /// The defined value is never read.
        const DEAD = 1 << 3;
    }
}

/// A register operand, as seen by the liveness analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegOperand {
    /// Identifier used to rewrite the operand.
    pub id: OperandId,

    /// Instruction containing the operand.
    pub inst: Inst,

    /// Sub-register accessed by the operand, [`SubRegIdx::NONE`] for the whole
    /// register.
    pub subreg: SubRegIdx,

    /// Operand properties.
    pub flags: OperandFlags,
}

impl RegOperand {
    /// Returns whether the operand defines the register.
    #[inline]
    pub fn is_def(&self) -> bool {
        self.flags.contains(OperandFlags::DEF)
    }

    /// Returns whether the operand is an early-clobber def.
    #[inline]
    pub fn is_early_clobber(&self) -> bool {
        self.flags.contains(OperandFlags::EARLY_CLOBBER)
    }

    /// Returns whether the operand carries the undef flag.
    #[inline]
    pub fn is_undef(&self) -> bool {
        self.flags.contains(OperandFlags::UNDEF)
    }

    /// Returns whether the operand carries the dead flag.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.flags.contains(OperandFlags::DEAD)
    }

    /// Returns whether the operand reads the current value of the register.
    ///
    /// Sub-register defs without the undef flag read the lanes they do not
    /// write.
    #[inline]
    pub fn reads_reg(&self) -> bool {
        !self.is_undef() && (!self.is_def() || !self.subreg.is_none())
    }

    /// Position of the instruction containing the operand.
    #[inline]
    pub fn inst_index(&self) -> SlotIndex {
        self.inst.slot(Slot::Block)
    }

    /// Position at which the operand accesses the register: the def slot for
    /// defs and the start of the instruction for uses.
    #[inline]
    pub fn access_index(&self) -> SlotIndex {
        if self.is_def() {
            self.inst_index().reg_slot(self.is_early_clobber())
        } else {
            self.inst_index()
        }
    }
}

/// Control flow graph of the function.
pub trait Cfg {
    /// Returns the block containing the given position.
    fn block_at(&self, pos: SlotIndex) -> Block;

    /// Predecessors of `block`.
    fn block_preds(&self, block: Block) -> &[Block];

    /// Position of the start of `block`.
    fn block_start(&self, block: Block) -> SlotIndex;

    /// Position just past the end of `block`.
    ///
    /// This is the start of the next block in layout order, so a value live
    /// out of `block` is live at `block_end(block).prev_slot()`.
    fn block_end(&self, block: Block) -> SlotIndex;
}

/// Access to the register operands of the function.
pub trait RegOperands {
    /// Appends every operand referring to `reg` to `out`, in instruction order.
    fn reg_operands(&self, reg: VirtReg, out: &mut Vec<RegOperand>);

    /// Makes `op` refer to `reg` instead of its current register.
    fn set_operand_reg(&mut self, op: OperandId, reg: VirtReg);

    /// Replaces the flags of `op`.
    fn set_operand_flags(&mut self, op: OperandId, flags: OperandFlags);

    /// Creates a new virtual register with the same register class as `like`.
    fn create_vreg(&mut self, like: VirtReg) -> VirtReg;
}

/// Inserts implicit definitions when a split leaves a register undefined on
/// some path.
pub trait ImplicitDefInserter {
    /// Inserts an instruction defining `reg` with an undefined value at the
    /// end of `pred`, before the edge to `succ`.
    ///
    /// Returns the position of the new instruction.
    fn insert_implicit_def(&mut self, pred: Block, succ: Block, reg: VirtReg) -> SlotIndex;
}

/// Decides whether an instruction is a copy between the two registers being
/// coalesced.
pub trait CoalesceOracle {
    /// Returns whether `inst` is a coalescable copy.
    fn is_coalescable(&self, inst: Inst) -> bool;
}

impl<F: Fn(Inst) -> bool> CoalesceOracle for F {
    fn is_coalescable(&self, inst: Inst) -> bool {
        self(inst)
    }
}
