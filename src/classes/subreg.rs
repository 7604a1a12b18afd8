//! Splitting a register whose sub-ranges form several connected components.
//!
//! With sub-register liveness, lanes of a register that are never accessed
//! together can end up with unrelated values. [`ConnectedSubRegClasses`]
//! finds the connected components across all the sub-ranges of an interval
//! and moves each component other than the first into a new register.

use alloc::vec::Vec;

use smallvec::SmallVec;

use super::{ConnectedValueClasses, distribute_range};
use crate::debug_utils::{DisplayLiveInterval, verify_live_interval};
use crate::function::{Block, Cfg, ImplicitDefInserter, OperandFlags, RegOperand, RegOperands};
use crate::live_interval::LiveInterval;
use crate::live_range::{LiveRange, Segment};
use crate::reginfo::RegInfo;
use crate::slot::SlotIndex;
use crate::union_find::UnionFind;
use crate::value::{ValNo, ValueArena};
use crate::{SplitOptions, Stats};

entity_def! {
    /// Component number across all the sub-ranges of an interval.
    entity Component(u32);
}

/// Value classes of one sub-range and the first global component number
/// assigned to them.
struct SubRangeInfo {
    classes: ConnectedValueClasses,
    base: usize,
}

impl SubRangeInfo {
    #[inline]
    fn component(&self, vn: ValNo, arena: &ValueArena) -> Component {
        Component::new(self.base + self.classes.class_of(vn, arena))
    }
}

/// Splits intervals whose sub-ranges are not connected into separate
/// registers.
pub struct ConnectedSubRegClasses {
    options: SplitOptions,
    subranges: Vec<SubRangeInfo>,
    components: UnionFind<Component>,
    operands: Vec<RegOperand>,
    stats: Stats,
}

impl ConnectedSubRegClasses {
    /// Creates a new instance with the given options.
    #[must_use]
    pub fn new(options: SplitOptions) -> Self {
        Self {
            options,
            subranges: Vec::new(),
            components: UnionFind::new(),
            operands: Vec::new(),
            stats: Stats::default(),
        }
    }

    /// Statistics accumulated since this instance was created.
    #[inline]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Moves each connected component of `li` other than the first into a
    /// new interval and returns the new intervals.
    ///
    /// Operands are rewritten to the new registers, implicit defs are inserted
    /// where a PHI value lost one of its inputs, undef/dead flags of
    /// sub-register defs are recomputed and the main ranges of all affected
    /// intervals are rebuilt from their sub-ranges.
    ///
    /// Returns an empty vector if `li` is fully connected.
    pub fn rename_components<F>(
        &mut self,
        li: &mut LiveInterval,
        func: &mut F,
        reginfo: &impl RegInfo,
        arena: &mut ValueArena,
    ) -> Vec<LiveInterval>
    where
        F: Cfg + RegOperands + ImplicitDefInserter,
    {
        stat!(self.stats, intervals_examined);

        // Shortcut: with fewer than two values there is nothing to split.
        if li.num_values() < 2 {
            return Vec::new();
        }

        // Compute the connected components across all sub-ranges.
        if !self.find_components(li, &*func, reginfo, arena) {
            return Vec::new();
        }
        let num_components = self.components.num_classes();
        trace!(
            "Splitting {} into {num_components} components",
            DisplayLiveInterval(li, arena)
        );
        stat!(self.stats, intervals_split);
        stat!(self.stats, components, num_components);

        // Create a new register for every component except the first.
        let mut intervals: Vec<LiveInterval> = (1..num_components)
            .map(|_| LiveInterval::new(func.create_vreg(li.reg())))
            .collect();
        stat!(self.stats, vregs_created, intervals.len());

        self.rewrite_operands(li, &intervals, func, reginfo, arena);
        self.distribute(li, &mut intervals, arena);
        self.repair(li, true, func, arena);
        for new_li in &mut intervals {
            self.repair(new_li, false, func, arena);
        }

        if self.options.verify {
            for interval in core::iter::once(&*li).chain(&intervals) {
                if let Err(err) = verify_live_interval(interval, arena, None) {
                    panic!(
                        "invalid interval after split: {err}\n{}",
                        DisplayLiveInterval(interval, arena)
                    );
                }
            }
        }
        for interval in core::iter::once(&*li).chain(&intervals) {
            trace!("  {}", DisplayLiveInterval(interval, arena));
        }
        intervals
    }

    /// Classifies the values of every sub-range and unions the components
    /// that are accessed by the same operand. Returns whether there is more
    /// than one component.
    fn find_components(
        &mut self,
        li: &LiveInterval,
        func: &(impl Cfg + RegOperands),
        reginfo: &impl RegInfo,
        arena: &ValueArena,
    ) -> bool {
        self.subranges.clear();
        let mut num_components = 0;
        for sr in li.subranges() {
            let mut classes = ConnectedValueClasses::new();
            let num_classes = classes.classify(sr, arena, func);
            self.subranges.push(SubRangeInfo {
                classes,
                base: num_components,
            });
            num_components += num_classes;
        }

        // Fewer than two sub-ranges can't be split this way.
        if self.subranges.len() < 2 {
            return false;
        }
        self.components.reset(num_components);

        // Merge components of values accessed by the same operand.
        self.operands.clear();
        func.reg_operands(li.reg(), &mut self.operands);
        for op in &self.operands {
            if !op.is_def() && !op.reads_reg() {
                continue;
            }
            let lane_mask = reginfo.subreg_lane_mask(op.subreg);
            let pos = op.access_index();

            let mut merged = None;
            for (sr, info) in li.subranges().iter().zip(&self.subranges) {
                if !sr.lane_mask.intersects(lane_mask) {
                    continue;
                }
                let Some(vn) = sr.value_at(pos) else {
                    continue;
                };
                let component = info.component(vn, arena);
                merged = Some(match merged {
                    Some(prev) => self.components.union(prev, component),
                    None => component,
                });
            }
        }

        self.components.compress() > 1
    }

    /// Points each operand of `li.reg()` at the register of the component it
    /// accesses.
    fn rewrite_operands(
        &mut self,
        li: &LiveInterval,
        intervals: &[LiveInterval],
        func: &mut impl RegOperands,
        reginfo: &impl RegInfo,
        arena: &ValueArena,
    ) {
        for op in &self.operands {
            if !op.is_def() && !op.reads_reg() {
                continue;
            }
            let lane_mask = reginfo.subreg_lane_mask(op.subreg);
            let pos = op.inst_index();

            // The first sub-range with a segment at or after the operand
            // decides. Operands past the end of every sub-range keep their
            // register.
            let component = li
                .subranges()
                .iter()
                .zip(&self.subranges)
                .filter(|(sr, _)| sr.lane_mask.intersects(lane_mask))
                .find_map(|(sr, info)| {
                    let seg = sr.segments().get(sr.find(pos))?;
                    Some(info.component(seg.valno, arena))
                });
            let Some(component) = component else {
                continue;
            };
            let class = self.components.class(component);
            if class != 0 {
                func.set_operand_reg(op.id, intervals[class - 1].reg());
                stat!(self.stats, operands_rewritten);
            }
        }
    }

    /// Moves sub-range values to the interval of their component.
    fn distribute(
        &self,
        li: &mut LiveInterval,
        intervals: &mut [LiveInterval],
        arena: &mut ValueArena,
    ) {
        for (sr, info) in li.subranges_mut().iter_mut().zip(&self.subranges) {
            let lane_mask = sr.lane_mask;
            let mapping: SmallVec<[usize; 8]> = sr
                .values()
                .iter()
                .map(|&vn| self.components.class(info.component(vn, arena)))
                .collect();

            // Only create sub-ranges in the intervals that receive values.
            let mut targets: SmallVec<[Option<&mut LiveRange>; 4]> = intervals
                .iter_mut()
                .enumerate()
                .map(|(k, new_li)| {
                    if mapping.contains(&(k + 1)) {
                        Some(new_li.create_subrange(lane_mask).range_mut())
                    } else {
                        None
                    }
                })
                .collect();
            distribute_range(sr.range_mut(), &mapping, &mut targets, arena);
        }
    }

    /// Restores the interval invariants broken by the split and rebuilds the
    /// main range.
    fn repair<F>(&mut self, li: &mut LiveInterval, original: bool, func: &mut F, arena: &mut ValueArena)
    where
        F: Cfg + RegOperands + ImplicitDefInserter,
    {
        li.remove_empty_subranges();

        // A PHI value may have lost the value coming from one of its
        // predecessors to another register. Give it an undefined value there.
        if self.options.repair_phi_inputs {
            let phi_defs: SmallVec<[SlotIndex; 8]> = li
                .subranges()
                .iter()
                .flat_map(|sr| sr.values().iter())
                .filter_map(|&vn| arena.def_of(vn))
                .filter(|def| def.is_block())
                .collect();
            for def in phi_defs {
                let block = func.block_at(def);
                let preds: SmallVec<[Block; 4]> = SmallVec::from_slice(func.block_preds(block));
                for pred in preds {
                    let pred_end = func.block_end(pred);
                    if li.subrange_live_at(pred_end.prev_slot()) {
                        continue;
                    }

                    let def_pos = func.insert_implicit_def(pred, block, li.reg());
                    let reg_def = def_pos.reg_slot(false);
                    trace!("Inserted implicit def of {} at {def_pos}", li.reg());
                    stat!(self.stats, implicit_defs);

                    // The implicit def covers all lanes.
                    for sr in li.subranges_mut() {
                        let vn = sr.next_value(reg_def, arena);
                        sr.add_segment(Segment::new(reg_def, pred_end, vn));
                    }
                }
            }
        }

        // Sub-register defs have undef/dead flags that depend on the other
        // lanes, which may now live in a different register.
        if self.options.fix_operand_flags {
            self.operands.clear();
            func.reg_operands(li.reg(), &mut self.operands);
            for op in &self.operands {
                if !op.is_def() || op.subreg.is_none() {
                    continue;
                }
                let pos = op.inst_index();
                let mut flags = op.flags;
                if !op.is_undef() && !li.subrange_live_at(pos) {
                    flags |= OperandFlags::UNDEF;
                    stat!(self.stats, undef_flags);
                }
                if !op.is_dead() && !li.subrange_live_at(pos.dead_slot()) {
                    flags |= OperandFlags::DEAD;
                    stat!(self.stats, dead_flags);
                }
                if flags != op.flags {
                    func.set_operand_flags(op.id, flags);
                }
            }
        }

        if original {
            li.main_range_mut().clear();
        }
        li.construct_main_range_from_subranges(arena);
    }
}
