//! Generic implementation of the function traits which can be used for
//! testing.

use alloc::vec::Vec;

use super::GenericRegInfo;
use crate::entity::{EntityRef, EntitySet, PrimaryMap};
use crate::function::{
    Block, Cfg, CoalesceOracle, ImplicitDefInserter, Inst, OperandFlags, OperandId, RegOperand,
    RegOperands, VirtReg,
};
use crate::live_interval::LiveInterval;
use crate::live_range::LiveRange;
use crate::reginfo::{LaneMask, SubRegIdx};
use crate::slot::{Slot, SlotIndex};
use crate::value::ValueArena;

/// Number of instructions reserved at the end of every block for implicit
/// defs inserted while repairing split registers.
pub const IMPLICIT_DEF_SLOTS: usize = 4;

#[derive(Clone, Debug)]
struct BlockData {
    first_inst: Inst,
    num_insts: usize,
    implicit_defs: usize,
    preds: Vec<Block>,
}

impl BlockData {
    fn end_inst(&self) -> Inst {
        Inst::new(self.first_inst.index() + self.num_insts + IMPLICIT_DEF_SLOTS)
    }
}

#[derive(Clone, Debug)]
struct OperandData {
    inst: Inst,
    reg: VirtReg,
    subreg: SubRegIdx,
    flags: OperandFlags,
}

/// A generic implementation of [`Cfg`], [`RegOperands`],
/// [`ImplicitDefInserter`] and [`CoalesceOracle`] built up incrementally.
///
/// Blocks are laid out in creation order. Each block has the requested number
/// of instructions followed by [`IMPLICIT_DEF_SLOTS`] spare instructions that
/// receive implicit defs.
#[derive(Clone, Debug, Default)]
pub struct GenericFunction {
    blocks: PrimaryMap<Block, BlockData>,
    operands: PrimaryMap<OperandId, OperandData>,
    copies: EntitySet<Inst>,
    num_insts: usize,
    num_vregs: usize,
    implicit_defs: Vec<(Inst, VirtReg)>,
}

impl GenericFunction {
    /// Creates an empty function.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block with `num_insts` instructions.
    pub fn add_block(&mut self, num_insts: usize) -> Block {
        let first_inst = Inst::new(self.num_insts);
        self.num_insts += num_insts + IMPLICIT_DEF_SLOTS;
        self.copies.grow_to(self.num_insts);
        self.blocks.push(BlockData {
            first_inst,
            num_insts,
            implicit_defs: 0,
            preds: Vec::new(),
        })
    }

    /// Adds a control flow edge from `pred` to `succ`.
    pub fn add_edge(&mut self, pred: Block, succ: Block) {
        self.blocks[succ].preds.push(pred);
    }

    /// Returns the `n`th instruction of `block`.
    #[track_caller]
    pub fn block_inst(&self, block: Block, n: usize) -> Inst {
        let data = &self.blocks[block];
        assert!(n < data.num_insts, "{block} only has {} instructions", data.num_insts);
        Inst::new(data.first_inst.index() + n)
    }

    /// Creates a new virtual register.
    pub fn new_vreg(&mut self) -> VirtReg {
        let reg = VirtReg::new(self.num_vregs);
        self.num_vregs += 1;
        reg
    }

    /// Number of virtual registers created so far.
    pub fn num_vregs(&self) -> usize {
        self.num_vregs
    }

    /// Adds an operand referring to `reg` to `inst`.
    pub fn add_operand(
        &mut self,
        inst: Inst,
        reg: VirtReg,
        subreg: SubRegIdx,
        flags: OperandFlags,
    ) -> OperandId {
        debug_assert!(inst.index() < self.num_insts);
        self.operands.push(OperandData {
            inst,
            reg,
            subreg,
            flags,
        })
    }

    /// Returns the current state of an operand.
    pub fn operand(&self, op: OperandId) -> RegOperand {
        let data = &self.operands[op];
        RegOperand {
            id: op,
            inst: data.inst,
            subreg: data.subreg,
            flags: data.flags,
        }
    }

    /// Returns the register an operand currently refers to.
    pub fn operand_reg(&self, op: OperandId) -> VirtReg {
        self.operands[op].reg
    }

    /// Marks `inst` as a coalescable copy.
    pub fn set_copy(&mut self, inst: Inst) {
        self.copies.insert(inst);
    }

    /// Implicit defs inserted so far, in insertion order.
    pub fn implicit_defs(&self) -> &[(Inst, VirtReg)] {
        &self.implicit_defs
    }

    /// Builds a single-block function whose operands match `intervals`.
    ///
    /// Every value defined at an instruction gets a def operand and every
    /// segment ending at a register slot gets a use operand. Sub-range
    /// operands use a sub-register index covering the lanes of the
    /// sub-range, which is added to the returned register description.
    pub fn from_intervals(
        intervals: &[LiveInterval],
        arena: &ValueArena,
    ) -> (GenericFunction, GenericRegInfo) {
        let masks: Vec<LaneMask> = intervals
            .iter()
            .flat_map(|li| li.subranges().iter().map(|sr| sr.lane_mask))
            .collect();
        let reg_lanes = masks.iter().fold(LaneMask(1), |acc, &mask| acc | mask);
        let mut reginfo = GenericRegInfo::new(reg_lanes);
        let mut subregs: Vec<(LaneMask, SubRegIdx)> = Vec::new();
        for mask in masks {
            if !subregs.iter().any(|&(m, _)| m == mask) {
                subregs.push((mask, reginfo.add_subreg(mask)));
            }
        }

        let mut func = GenericFunction::new();
        let num_insts = intervals
            .iter()
            .flat_map(|li| {
                core::iter::once(li.main_range()).chain(li.subranges().iter().map(|sr| sr.range()))
            })
            .filter_map(|lr| lr.segments().last())
            .map(|seg| seg.end.inst().index() + 1)
            .max()
            .unwrap_or(0);
        func.add_block(num_insts);
        let num_vregs = intervals
            .iter()
            .map(|li| li.reg().index() + 1)
            .max()
            .unwrap_or(0);
        while func.num_vregs < num_vregs {
            func.new_vreg();
        }

        for li in intervals {
            if !li.has_subranges() {
                func.add_range_operands(li.reg(), li.main_range(), SubRegIdx::NONE, arena);
                continue;
            }
            for sr in li.subranges() {
                let subreg = subregs
                    .iter()
                    .find(|&&(m, _)| m == sr.lane_mask)
                    .map_or(SubRegIdx::NONE, |&(_, idx)| idx);
                func.add_range_operands(li.reg(), sr.range(), subreg, arena);
            }
        }
        (func, reginfo)
    }

    fn add_range_operands(
        &mut self,
        reg: VirtReg,
        lr: &LiveRange,
        subreg: SubRegIdx,
        arena: &ValueArena,
    ) {
        for &vn in lr.values() {
            let Some(def) = arena.def_of(vn) else {
                continue;
            };
            if def.is_block() {
                continue;
            }
            let mut flags = OperandFlags::DEF;
            if def.is_early_clobber() {
                flags |= OperandFlags::EARLY_CLOBBER;
            }
            self.add_operand(def.inst(), reg, subreg, flags);
        }
        for seg in lr.segments() {
            if seg.end.is_register() {
                self.add_operand(seg.end.inst(), reg, subreg, OperandFlags::empty());
            }
        }
    }
}

impl Cfg for GenericFunction {
    fn block_at(&self, pos: SlotIndex) -> Block {
        let inst = pos.inst().index();
        let n = self
            .blocks
            .values()
            .as_slice()
            .partition_point(|data| data.first_inst.index() <= inst);
        assert!(n != 0, "{pos} is before the first block");
        Block::new(n - 1)
    }

    fn block_preds(&self, block: Block) -> &[Block] {
        &self.blocks[block].preds
    }

    fn block_start(&self, block: Block) -> SlotIndex {
        self.blocks[block].first_inst.slot(Slot::Block)
    }

    fn block_end(&self, block: Block) -> SlotIndex {
        self.blocks[block].end_inst().slot(Slot::Block)
    }
}

impl RegOperands for GenericFunction {
    fn reg_operands(&self, reg: VirtReg, out: &mut Vec<RegOperand>) {
        let start = out.len();
        out.extend(
            self.operands
                .keys()
                .filter(|&op| self.operands[op].reg == reg)
                .map(|op| self.operand(op)),
        );
        // Stable, so operands of one instruction stay in creation order.
        out[start..].sort_by_key(|op| op.inst);
    }

    fn set_operand_reg(&mut self, op: OperandId, reg: VirtReg) {
        self.operands[op].reg = reg;
    }

    fn set_operand_flags(&mut self, op: OperandId, flags: OperandFlags) {
        self.operands[op].flags = flags;
    }

    fn create_vreg(&mut self, _like: VirtReg) -> VirtReg {
        self.new_vreg()
    }
}

impl ImplicitDefInserter for GenericFunction {
    fn insert_implicit_def(&mut self, pred: Block, succ: Block, reg: VirtReg) -> SlotIndex {
        let data = &mut self.blocks[pred];
        assert!(
            data.implicit_defs < IMPLICIT_DEF_SLOTS,
            "no room left for implicit defs in {pred}"
        );
        let inst = Inst::new(data.first_inst.index() + data.num_insts + data.implicit_defs);
        data.implicit_defs += 1;
        trace!("Implicit def of {reg} in {inst} on edge {pred} -> {succ}");

        self.add_operand(inst, reg, SubRegIdx::NONE, OperandFlags::DEF);
        self.implicit_defs.push((inst, reg));
        inst.slot(Slot::Block)
    }
}

impl CoalesceOracle for GenericFunction {
    fn is_coalescable(&self, inst: Inst) -> bool {
        self.copies.contains(inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_range::Segment;
    use crate::reginfo::RegInfo;

    #[test]
    fn layout() {
        let mut func = GenericFunction::new();
        let b0 = func.add_block(2);
        let b1 = func.add_block(3);
        func.add_edge(b0, b1);

        assert_eq!(func.block_start(b1), func.block_end(b0));
        assert_eq!(func.block_at(func.block_start(b1)), b1);
        assert_eq!(func.block_at(func.block_end(b0).prev_slot()), b0);
        assert_eq!(func.block_at(func.block_inst(b1, 2).slot(Slot::Dead)), b1);
        assert_eq!(func.block_preds(b1), [b0]);

        let reg = func.new_vreg();
        let pos = func.insert_implicit_def(b0, b1, reg);
        assert_eq!(func.block_at(pos), b0);
        assert!(pos > func.block_inst(b0, 1).slot(Slot::Dead));
        assert_eq!(func.implicit_defs(), [(pos.inst(), reg)]);
    }

    #[test]
    fn operands_in_inst_order() {
        let mut func = GenericFunction::new();
        let b0 = func.add_block(4);
        let reg = func.new_vreg();
        let late = func.add_operand(func.block_inst(b0, 3), reg, SubRegIdx::NONE, OperandFlags::empty());
        let early = func.add_operand(func.block_inst(b0, 1), reg, SubRegIdx::NONE, OperandFlags::DEF);

        let mut ops = Vec::new();
        func.reg_operands(reg, &mut ops);
        assert_eq!(ops.iter().map(|op| op.id).collect::<Vec<_>>(), [early, late]);

        let other = func.create_vreg(reg);
        func.set_operand_reg(late, other);
        ops.clear();
        func.reg_operands(reg, &mut ops);
        assert_eq!(ops.len(), 1);
        assert_eq!(func.operand_reg(late), other);
    }

    #[test]
    fn operands_from_intervals() {
        let mut arena = ValueArena::new();
        let mut li = LiveInterval::new(VirtReg::new(1));
        let at = |n, slot| Inst::new(n).slot(slot);

        // Low lane defined at i1 and read at i3, high lane dead at i2.
        let lo = li.create_subrange(LaneMask(0b01)).range_mut();
        let v = lo.next_value(at(1, Slot::Register), &mut arena);
        lo.add_segment(Segment::new(at(1, Slot::Register), at(3, Slot::Register), v));
        let hi = li.create_subrange(LaneMask(0b10)).range_mut();
        let v = hi.next_value(at(2, Slot::Register), &mut arena);
        hi.add_segment(Segment::new(at(2, Slot::Register), at(2, Slot::Dead), v));

        let (func, reginfo) = GenericFunction::from_intervals(&[li], &arena);
        assert_eq!(func.num_vregs(), 2);
        assert_eq!(reginfo.reg_lane_mask(VirtReg::new(1)), LaneMask(0b11));
        assert_eq!(func.block_end(Block::new(0)), at(4 + IMPLICIT_DEF_SLOTS, Slot::Block));

        let mut ops = Vec::new();
        func.reg_operands(VirtReg::new(1), &mut ops);
        let summary: Vec<_> = ops
            .iter()
            .map(|op| (op.inst.index(), op.is_def(), reginfo.subreg_lane_mask(op.subreg)))
            .collect();
        assert_eq!(
            summary,
            [
                (1, true, LaneMask(0b01)),
                (2, true, LaneMask(0b10)),
                (3, false, LaneMask(0b01)),
            ]
        );
    }
}
