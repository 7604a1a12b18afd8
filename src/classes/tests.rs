use alloc::string::ToString;
use alloc::vec::Vec;

use super::*;
use crate::SplitOptions;
use crate::debug_utils::{DisplayLiveInterval, GenericFunction, GenericRegInfo, verify_live_interval};
use crate::function::{Block, Inst, OperandFlags, OperandId, VirtReg};
use crate::live_range::Segment;
use crate::reginfo::{LaneMask, RegInfo, SubRegIdx};
use crate::slot::{Slot, SlotIndex};

fn insts(func: &GenericFunction, block: Block, n: usize) -> Vec<Inst> {
    (0..n).map(|i| func.block_inst(block, i)).collect()
}

/// Adds a value defined at `start` and live until `end`.
fn def(lr: &mut LiveRange, arena: &mut ValueArena, start: SlotIndex, end: SlotIndex) -> ValNo {
    let vn = lr.next_value(start, arena);
    lr.add_segment(Segment::new(start, end, vn));
    vn
}

#[test]
fn disconnected_defs() {
    let mut arena = ValueArena::new();
    let mut func = GenericFunction::new();
    let b0 = func.add_block(6);
    let i = insts(&func, b0, 6);
    let reg = func.new_vreg();

    // %0 = def; use %0; %0 = def; use %0
    let def0 = func.add_operand(i[1], reg, SubRegIdx::NONE, OperandFlags::DEF);
    let use0 = func.add_operand(i[2], reg, SubRegIdx::NONE, OperandFlags::empty());
    let def1 = func.add_operand(i[4], reg, SubRegIdx::NONE, OperandFlags::DEF);
    let use1 = func.add_operand(i[5], reg, SubRegIdx::NONE, OperandFlags::empty());

    let mut li = LiveInterval::new(reg);
    let v0 = def(&mut li, &mut arena, i[1].slot(Slot::Register), i[2].slot(Slot::Register));
    let v1 = def(&mut li, &mut arena, i[4].slot(Slot::Register), i[5].slot(Slot::Register));

    let mut classes = ConnectedValueClasses::new();
    assert_eq!(classes.classify(&li, &arena, &func), 2);
    assert_eq!(classes.num_classes(), 2);
    assert_eq!(classes.class_of(v0, &arena), 0);
    assert_eq!(classes.class_of(v1, &arena), 1);

    let mut split = [LiveInterval::new(func.new_vreg())];
    classes.distribute(&mut li, &mut split, &mut func, &mut arena);

    assert_eq!(func.operand_reg(def0), reg);
    assert_eq!(func.operand_reg(use0), reg);
    assert_eq!(func.operand_reg(def1), split[0].reg());
    assert_eq!(func.operand_reg(use1), split[0].reg());

    assert_eq!(li.values(), [v0]);
    assert_eq!(split[0].values(), [v1]);
    assert_eq!(arena.id(v1), ValueId::new(0));
    assert_eq!(
        split[0].segments(),
        [Segment::new(i[4].slot(Slot::Register), i[5].slot(Slot::Register), v1)]
    );
    verify_live_interval(&li, &arena, None).unwrap();
    verify_live_interval(&split[0], &arena, None).unwrap();
}

#[test]
fn redefinition_stays_connected() {
    let mut arena = ValueArena::new();
    let mut func = GenericFunction::new();
    let b0 = func.add_block(6);
    let i = insts(&func, b0, 6);

    // %0 = def; %0 = add %0, 1; use %0
    let mut lr = LiveRange::new();
    let v0 = def(&mut lr, &mut arena, i[1].slot(Slot::Register), i[3].slot(Slot::Register));
    let v1 = def(&mut lr, &mut arena, i[3].slot(Slot::Register), i[5].slot(Slot::Register));

    let mut classes = ConnectedValueClasses::new();
    assert_eq!(classes.classify(&lr, &arena, &func), 1);
    assert_eq!(classes.class_of(v0, &arena), classes.class_of(v1, &arena));
}

/// Three blocks where the last one merges a value from each of the first two
/// and then defines an unrelated value.
#[test]
fn phi_connects_predecessors() {
    let mut arena = ValueArena::new();
    let mut func = GenericFunction::new();
    let b0 = func.add_block(2);
    let b1 = func.add_block(2);
    let b2 = func.add_block(3);
    func.add_edge(b0, b2);
    func.add_edge(b1, b2);
    let i0 = insts(&func, b0, 2);
    let i1 = insts(&func, b1, 2);
    let i2 = insts(&func, b2, 3);

    let mut lr = LiveRange::new();
    let v0 = def(&mut lr, &mut arena, i0[0].slot(Slot::Register), func.block_end(b0));
    let v1 = def(&mut lr, &mut arena, i1[0].slot(Slot::Register), func.block_end(b1));
    let phi = def(&mut lr, &mut arena, func.block_start(b2), i2[1].slot(Slot::Register));
    let dead = lr.create_dead_def(i2[2].slot(Slot::Register), &mut arena);
    assert!(arena.is_phi_def(phi));

    let mut classes = ConnectedValueClasses::new();
    assert_eq!(classes.classify(&lr, &arena, &func), 2);
    for vn in [v0, v1, phi] {
        assert_eq!(classes.class_of(vn, &arena), 0);
    }
    assert_eq!(classes.class_of(dead, &arena), 1);
    assert_eq!(classes.class_of_id(arena.id(dead)), 1);

    let mut targets = [LiveRange::new()];
    classes.distribute_range(&mut lr, &mut targets, &mut arena);
    assert_eq!(lr.values(), [v0, v1, phi]);
    assert_eq!(lr.len(), 3);
    assert_eq!(targets[0].values(), [dead]);
    assert_eq!(
        targets[0].segments(),
        [Segment::new(
            i2[2].slot(Slot::Register),
            i2[2].slot(Slot::Dead),
            dead
        )]
    );
}

#[test]
fn unused_values_join_last_used_class() {
    let mut arena = ValueArena::new();
    let mut func = GenericFunction::new();
    let b0 = func.add_block(6);
    let i = insts(&func, b0, 6);

    let mut lr = LiveRange::new();
    let v0 = def(&mut lr, &mut arena, i[1].slot(Slot::Register), i[2].slot(Slot::Register));
    let gone = lr.next_value(i[3].slot(Slot::Register), &mut arena);
    let v2 = def(&mut lr, &mut arena, i[4].slot(Slot::Register), i[5].slot(Slot::Register));
    lr.mark_value_for_deletion(gone, &mut arena);
    assert_eq!(lr.num_values(), 3);

    let mut classes = ConnectedValueClasses::new();
    assert_eq!(classes.classify(&lr, &arena, &func), 2);
    assert_eq!(classes.class_of(v0, &arena), 0);
    assert_eq!(classes.class_of(gone, &arena), 1);
    assert_eq!(classes.class_of(v2, &arena), 1);
}

#[test]
fn subranges_follow_main_range() {
    let mut arena = ValueArena::new();
    let mut func = GenericFunction::new();
    let reginfo = GenericRegInfo::with_lanes(2);
    let b0 = func.add_block(6);
    let i = insts(&func, b0, 6);
    let reg = func.new_vreg();
    func.add_operand(i[1], reg, SubRegIdx::NONE, OperandFlags::DEF);
    func.add_operand(i[2], reg, SubRegIdx::NONE, OperandFlags::empty());
    func.add_operand(i[4], reg, SubRegIdx::NONE, OperandFlags::DEF);
    func.add_operand(i[5], reg, SubRegIdx::NONE, OperandFlags::empty());

    // Both lanes are defined together twice.
    let mut li = LiveInterval::new(reg);
    for lane in [LaneMask(0b01), LaneMask(0b10)] {
        let sr = li.create_subrange(lane);
        def(sr, &mut arena, i[1].slot(Slot::Register), i[2].slot(Slot::Register));
        def(sr, &mut arena, i[4].slot(Slot::Register), i[5].slot(Slot::Register));
    }
    li.construct_main_range_from_subranges(&mut arena);
    verify_live_interval(&li, &arena, Some(reginfo.reg_lane_mask(reg))).unwrap();

    let mut classes = ConnectedValueClasses::new();
    assert_eq!(classes.classify(&li, &arena, &func), 2);
    let mut split = [LiveInterval::new(func.new_vreg())];
    classes.distribute(&mut li, &mut split, &mut func, &mut arena);

    for new_li in [&li, &split[0]] {
        verify_live_interval(new_li, &arena, None).unwrap();
        assert_eq!(new_li.subranges().len(), 2);
        assert_eq!(new_li.num_values(), 1);
        for sr in new_li.subranges() {
            let span = |lr: &LiveRange| -> Vec<_> {
                lr.segments().iter().map(|seg| (seg.start, seg.end)).collect()
            };
            assert_eq!(span(sr.range()), span(new_li.main_range()));
            assert_eq!(sr.num_values(), 1);
        }
    }
    assert_eq!(li.begin_index(), i[1].slot(Slot::Register));
    assert_eq!(split[0].begin_index(), i[4].slot(Slot::Register));
}

/// `%0.sub1` and `%0.sub2` are defined and used independently.
fn independent_lanes(
    func: &mut GenericFunction,
    arena: &mut ValueArena,
) -> (LiveInterval, [OperandId; 4]) {
    let b0 = func.add_block(6);
    let i = insts(func, b0, 6);
    let reg = func.new_vreg();
    let (sub1, sub2) = (SubRegIdx::new(1), SubRegIdx::new(2));
    let ops = [
        func.add_operand(i[0], reg, sub1, OperandFlags::DEF | OperandFlags::UNDEF),
        func.add_operand(i[1], reg, sub2, OperandFlags::DEF),
        func.add_operand(i[2], reg, sub1, OperandFlags::empty()),
        func.add_operand(i[3], reg, sub2, OperandFlags::empty()),
    ];

    let mut li = LiveInterval::new(reg);
    let lo = li.create_subrange(LaneMask(0b01));
    def(lo, arena, i[0].slot(Slot::Register), i[2].slot(Slot::Register));
    let hi = li.create_subrange(LaneMask(0b10));
    def(hi, arena, i[1].slot(Slot::Register), i[3].slot(Slot::Register));
    li.construct_main_range_from_subranges(arena);
    (li, ops)
}

#[test]
fn split_independent_lanes() {
    let mut arena = ValueArena::new();
    let mut func = GenericFunction::new();
    let reginfo = GenericRegInfo::with_lanes(2);
    let (mut li, [def_lo, def_hi, use_lo, use_hi]) = independent_lanes(&mut func, &mut arena);
    let reg = li.reg();
    assert_eq!(li.num_values(), 2);

    let mut splitter = ConnectedSubRegClasses::new(SplitOptions::default());
    let split = splitter.rename_components(&mut li, &mut func, &reginfo, &mut arena);
    assert_eq!(split.len(), 1, "{}", DisplayLiveInterval(&li, &arena));
    let new_reg = split[0].reg();
    assert_eq!(new_reg, VirtReg::new(1));

    assert_eq!(func.operand_reg(def_lo), reg);
    assert_eq!(func.operand_reg(use_lo), reg);
    assert_eq!(func.operand_reg(def_hi), new_reg);
    assert_eq!(func.operand_reg(use_hi), new_reg);

    // The high lanes were written on top of the low lanes, which are now in
    // another register.
    assert!(func.operand(def_hi).is_undef());
    assert!(!func.operand(def_hi).is_dead());

    assert_eq!(li.subranges().len(), 1);
    assert_eq!(li.subranges()[0].lane_mask, LaneMask(0b01));
    assert_eq!(split[0].subranges().len(), 1);
    assert_eq!(split[0].subranges()[0].lane_mask, LaneMask(0b10));

    // Main ranges are rebuilt from what is left.
    assert_eq!(li.num_values(), 1);
    assert_eq!(li.len(), 1);
    assert_eq!(li.begin_index(), li.subranges()[0].begin_index());
    assert_eq!(li.end_index(), li.subranges()[0].end_index());
    assert_eq!(split[0].num_values(), 1);
    assert!(split[0].covers(&split[0].subranges()[0]));

    let stats = splitter.stats().to_string();
    assert!(stats.contains("intervals_split: 1"), "{stats}");
    assert!(stats.contains("operands_rewritten: 2"), "{stats}");
    assert!(stats.contains("undef_flags: 1"), "{stats}");
}

#[test]
fn connected_lanes_are_not_split() {
    let mut arena = ValueArena::new();
    let mut func = GenericFunction::new();
    let reginfo = GenericRegInfo::with_lanes(2);
    let b0 = func.add_block(6);
    let i = insts(&func, b0, 6);
    let reg = func.new_vreg();

    // A full def followed by separate uses of each lane.
    func.add_operand(i[0], reg, SubRegIdx::NONE, OperandFlags::DEF);
    func.add_operand(i[2], reg, SubRegIdx::new(1), OperandFlags::empty());
    func.add_operand(i[3], reg, SubRegIdx::new(2), OperandFlags::empty());

    let mut li = LiveInterval::new(reg);
    let lo = li.create_subrange(LaneMask(0b01));
    def(lo, &mut arena, i[0].slot(Slot::Register), i[2].slot(Slot::Register));
    let hi = li.create_subrange(LaneMask(0b10));
    def(hi, &mut arena, i[0].slot(Slot::Register), i[3].slot(Slot::Register));
    li.construct_main_range_from_subranges(&mut arena);
    assert_eq!(li.num_values(), 1);

    // Single main value: nothing to look at.
    let mut splitter = ConnectedSubRegClasses::new(SplitOptions::default());
    assert!(splitter.rename_components(&mut li, &mut func, &reginfo, &mut arena).is_empty());

    // Give the main range a second value so that the components are
    // actually computed.
    let redef = func.add_operand(i[4], reg, SubRegIdx::NONE, OperandFlags::DEF);
    for sr in li.subranges_mut() {
        sr.create_dead_def(i[4].slot(Slot::Register), &mut arena);
    }
    li.main_range_mut().clear();
    li.construct_main_range_from_subranges(&mut arena);
    assert_eq!(li.num_values(), 2);

    let split = splitter.rename_components(&mut li, &mut func, &reginfo, &mut arena);
    assert_eq!(split.len(), 1);

    // The dead redefinition covers both lanes and moves as a whole.
    assert_eq!(func.operand_reg(redef), split[0].reg());
    assert_eq!(split[0].subranges().len(), 2);
    assert_eq!(li.subranges().len(), 2);
    assert_eq!(func.num_vregs(), 2);
}

/// ```text
/// bb0: %0.sub1 = def; %0.sub2 = def        -> bb2
/// bb1: %0.sub1 = def                       -> bb2
/// bb2: use %0.sub1; use %0.sub2
/// ```
///
/// The high lanes are only live out of `bb0`. Once they move to their own
/// register, that register needs a definition at the end of `bb1`.
fn partial_phi(func: &mut GenericFunction, arena: &mut ValueArena) -> (LiveInterval, Block, OperandId) {
    let b0 = func.add_block(2);
    let b1 = func.add_block(1);
    let b2 = func.add_block(2);
    func.add_edge(b0, b2);
    func.add_edge(b1, b2);
    let i0 = insts(func, b0, 2);
    let i1 = insts(func, b1, 1);
    let i2 = insts(func, b2, 2);
    let reg = func.new_vreg();
    let (sub1, sub2) = (SubRegIdx::new(1), SubRegIdx::new(2));

    func.add_operand(i0[0], reg, sub1, OperandFlags::DEF | OperandFlags::UNDEF);
    let def_hi = func.add_operand(i0[1], reg, sub2, OperandFlags::DEF);
    func.add_operand(i1[0], reg, sub1, OperandFlags::DEF | OperandFlags::UNDEF);
    func.add_operand(i2[0], reg, sub1, OperandFlags::empty());
    func.add_operand(i2[1], reg, sub2, OperandFlags::empty());

    let mut li = LiveInterval::new(reg);
    let lo = li.create_subrange(LaneMask(0b01));
    def(lo, arena, i0[0].slot(Slot::Register), func.block_end(b0));
    def(lo, arena, i1[0].slot(Slot::Register), func.block_end(b1));
    def(lo, arena, func.block_start(b2), i2[0].slot(Slot::Register));
    let hi = li.create_subrange(LaneMask(0b10));
    def(hi, arena, i0[1].slot(Slot::Register), func.block_end(b0));
    def(hi, arena, func.block_start(b2), i2[1].slot(Slot::Register));
    li.construct_main_range_from_subranges(arena);
    (li, b1, def_hi)
}

#[test]
fn split_repairs_phi_inputs() {
    let mut arena = ValueArena::new();
    let mut func = GenericFunction::new();
    let reginfo = GenericRegInfo::with_lanes(2);
    let (mut li, b1, def_hi) = partial_phi(&mut func, &mut arena);
    verify_live_interval(&li, &arena, None).unwrap();
    assert_eq!(li.num_values(), 4);

    let mut splitter = ConnectedSubRegClasses::new(SplitOptions::default());
    let split = splitter.rename_components(&mut li, &mut func, &reginfo, &mut arena);
    assert_eq!(split.len(), 1);
    let new_li = &split[0];

    // An implicit def of the new register in bb1 feeds the PHI.
    let b1_end = func.block_end(b1);
    assert_eq!(func.implicit_defs().len(), 1);
    let (inst, reg) = func.implicit_defs()[0];
    assert_eq!(reg, new_li.reg());
    assert_eq!(func.block_at(inst.slot(Slot::Block)), b1);
    let sr = &new_li.subranges()[0];
    let imp = sr
        .value_before(b1_end)
        .expect("high lanes should be live out of bb1");
    assert_eq!(arena.def(imp), inst.slot(Slot::Register));
    assert!(new_li.live_at(b1_end.prev_slot()));
    assert_eq!(sr.num_values(), 3);

    // The original register needed no repair.
    assert_eq!(li.subranges().len(), 1);
    assert_eq!(li.num_values(), 3);

    assert_eq!(func.operand_reg(def_hi), new_li.reg());
    assert!(func.operand(def_hi).is_undef());
    assert!(splitter.stats().to_string().contains("implicit_defs: 1"));
}

#[test]
fn split_without_repairs() {
    let mut arena = ValueArena::new();
    let mut func = GenericFunction::new();
    let reginfo = GenericRegInfo::with_lanes(2);
    let (mut li, b1, def_hi) = partial_phi(&mut func, &mut arena);

    let options = SplitOptions {
        repair_phi_inputs: false,
        fix_operand_flags: false,
        verify: true,
    };
    let mut splitter = ConnectedSubRegClasses::new(options);
    let split = splitter.rename_components(&mut li, &mut func, &reginfo, &mut arena);
    assert_eq!(split.len(), 1);

    assert!(func.implicit_defs().is_empty());
    assert!(!split[0].live_at(func.block_end(b1).prev_slot()));
    assert_eq!(func.operand_reg(def_hi), split[0].reg());
    assert!(!func.operand(def_hi).is_undef());
}
