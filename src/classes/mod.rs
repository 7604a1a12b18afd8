//! Connected components of the values of a live range.
//!
//! Two values of a range are connected when one flows into the other: a PHI
//! value is connected to the values live out of its predecessors, and a value
//! defined by an instruction that also reads the register is connected to
//! the value it reads. Each connected component can be assigned to a
//! different register, which is how an interval with several unrelated
//! definitions is split.

use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::debug_utils::DisplayLiveRange;
use crate::function::{Cfg, RegOperand, RegOperands};
use crate::live_interval::LiveInterval;
use crate::live_range::LiveRange;
use crate::union_find::UnionFind;
use crate::value::{ValNo, ValueArena, ValueId};

mod subreg;

pub use subreg::ConnectedSubRegClasses;

/// Computes the connected components of the values of a single live range.
///
/// Class 0 contains the value with id 0. Classes are numbered in order of
/// their lowest value id.
#[derive(Default)]
pub struct ConnectedValueClasses {
    classes: UnionFind<ValueId>,
    operands: Vec<RegOperand>,
}

impl ConnectedValueClasses {
    /// Creates a new instance with no classes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the classes of the values of `lr` and returns how many there
    /// are.
    ///
    /// All unused values are put in the same class as the last used value.
    pub fn classify(&mut self, lr: &LiveRange, arena: &ValueArena, cfg: &impl Cfg) -> usize {
        assert!(
            !lr.has_segment_set(),
            "segment set must be flushed before classifying"
        );
        self.classes.reset(lr.num_values());

        let mut used = None;
        let mut unused = None;
        for &vn in lr.values() {
            let id = arena.id(vn);

            // Group all unused values into one class.
            let Some(def) = arena.def_of(vn) else {
                if let Some(prev) = unused {
                    self.classes.union(prev, id);
                }
                unused = Some(id);
                continue;
            };
            used = Some(id);

            if def.is_block() {
                // Connect to the values live out of the predecessors.
                let block = cfg.block_at(def);
                for &pred in cfg.block_preds(block) {
                    if let Some(pvn) = lr.value_before(cfg.block_end(pred)) {
                        self.classes.union(id, arena.id(pvn));
                    }
                }
            } else if let Some(uvn) = lr.value_before(def) {
                // Instruction that reads and redefines the register.
                self.classes.union(id, arena.id(uvn));
            }
        }

        if let (Some(used), Some(unused)) = (used, unused) {
            self.classes.union(used, unused);
        }

        let num_classes = self.classes.compress();
        trace!(
            "Found {num_classes} value classes in {}",
            DisplayLiveRange(lr, arena)
        );
        num_classes
    }

    /// Number of classes found by the last [`ConnectedValueClasses::classify`].
    #[inline]
    pub fn num_classes(&self) -> usize {
        self.classes.num_classes()
    }

    /// Class of `vn`, which must belong to the last classified range.
    #[inline]
    pub fn class_of(&self, vn: ValNo, arena: &ValueArena) -> usize {
        self.classes.class(arena.id(vn))
    }

    /// Class of the value with id `id` in the last classified range.
    #[inline]
    pub fn class_of_id(&self, id: ValueId) -> usize {
        self.classes.class(id)
    }

    /// Moves the values of classes `1..n` of `lr`, and their segments, into
    /// `targets[0..n-1]`.
    ///
    /// `lr` must be the last classified range. The targets must either be
    /// empty or end before the segments moved into them.
    pub fn distribute_range(
        &self,
        lr: &mut LiveRange,
        targets: &mut [LiveRange],
        arena: &mut ValueArena,
    ) {
        let mapping: SmallVec<[usize; 8]> = (0..lr.num_values())
            .map(|i| self.classes.class(ValueId::new(i)))
            .collect();
        let mut targets: SmallVec<[Option<&mut LiveRange>; 4]> =
            targets.iter_mut().map(Some).collect();
        distribute_range(lr, &mapping, &mut targets, arena);
    }

    /// Splits the classified main range of `li` into `split`, which receives
    /// classes `1..n`.
    ///
    /// Operands of `li.reg()` that read or define a value of class `k >= 1`
    /// are rewritten to `split[k - 1].reg()`. Sub-range values follow the
    /// main range value at their definition.
    pub fn distribute(
        &mut self,
        li: &mut LiveInterval,
        split: &mut [LiveInterval],
        func: &mut impl RegOperands,
        arena: &mut ValueArena,
    ) {
        // Rewrite instructions.
        self.operands.clear();
        func.reg_operands(li.reg(), &mut self.operands);
        for op in &self.operands {
            let query = li.query(op.inst_index(), arena);
            let vn = if op.reads_reg() {
                query.value_in()
            } else {
                query.value_defined()
            };
            let Some(vn) = vn else {
                continue;
            };
            let class = self.class_of(vn, arena);
            if class != 0 {
                func.set_operand_reg(op.id, split[class - 1].reg());
            }
        }

        // Distribute sub-ranges according to the class of the main range
        // value at each sub-range value's definition.
        if li.has_subranges() {
            let (main, subranges) = li.parts_mut();
            for sr in subranges.iter_mut() {
                let lane_mask = sr.lane_mask;
                let mapping: SmallVec<[usize; 8]> = sr
                    .values()
                    .iter()
                    .map(|&vn| match arena.def_of(vn) {
                        Some(def) => {
                            let main_vn = main
                                .value_at(def)
                                .unwrap_or_else(|| panic!("main range not live at {def}"));
                            self.class_of(main_vn, arena)
                        }
                        None => 0,
                    })
                    .collect();
                let mut targets: SmallVec<[Option<&mut LiveRange>; 4]> = split
                    .iter_mut()
                    .enumerate()
                    .map(|(k, split_li)| {
                        if mapping.contains(&(k + 1)) {
                            Some(split_li.create_subrange(lane_mask).range_mut())
                        } else {
                            None
                        }
                    })
                    .collect();
                distribute_range(sr.range_mut(), &mapping, &mut targets, arena);
            }
            li.remove_empty_subranges();
        }

        // Distribute the main range.
        let mapping: SmallVec<[usize; 8]> = (0..li.num_values())
            .map(|i| self.classes.class(ValueId::new(i)))
            .collect();
        let mut targets: SmallVec<[Option<&mut LiveRange>; 4]> = split
            .iter_mut()
            .map(|split_li| Some(split_li.main_range_mut()))
            .collect();
        distribute_range(li.main_range_mut(), &mapping, &mut targets, arena);
    }
}

/// Moves segments and values of `lr` with class `k >= 1` into
/// `targets[k - 1]`. `classes` is indexed by value id.
///
/// Values that move are renumbered in their new range and the values that
/// stay are renumbered in `lr`.
pub(crate) fn distribute_range(
    lr: &mut LiveRange,
    classes: &[usize],
    targets: &mut [Option<&mut LiveRange>],
    arena: &mut ValueArena,
) {
    debug_assert_eq!(classes.len(), lr.num_values());
    debug_assert!(!lr.has_segment_set());

    // Move segments to their new ranges.
    let mut out = 0;
    for i in 0..lr.segments.len() {
        let seg = lr.segments[i];
        let class = classes[arena.id(seg.valno).index()];
        if class == 0 {
            lr.segments[out] = seg;
            out += 1;
            continue;
        }
        let target = targets[class - 1]
            .as_deref_mut()
            .unwrap_or_else(|| panic!("no range for class {class}"));
        debug_assert!(
            target.expired_at(seg.start),
            "segments must be moved into empty ranges"
        );
        target.segments.push(seg);
    }
    lr.segments.truncate(out);

    // Transfer values to their new owners and renumber them.
    let mut out = 0;
    for i in 0..lr.valnos.len() {
        let vn = lr.valnos[i];
        let class = classes[i];
        if class == 0 {
            arena.set_id(vn, ValueId::new(out));
            lr.valnos[out] = vn;
            out += 1;
            continue;
        }
        let target = targets[class - 1]
            .as_deref_mut()
            .unwrap_or_else(|| panic!("no range for class {class}"));
        arena.set_id(vn, ValueId::new(target.valnos.len()));
        target.valnos.push(vn);
    }
    lr.valnos.truncate(out);
}

#[cfg(test)]
mod tests;
