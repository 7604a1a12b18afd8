//! Value numbers: one per definition of a register.
//!
//! Value records live in a [`ValueArena`] shared by all the ranges of a pass.
//! A [`ValNo`] is a stable handle to a record; the [`ValueId`] stored in the
//! record is the dense position of the value in its owning range's value list
//! and changes whenever that list is renumbered.
//!
//! Records are never freed individually. Deleting a value from a range marks
//! it [`ValueState::Unused`]; the arena is cleared at the end of the pass.

use core::fmt;

use crate::entity::PrimaryMap;
use crate::slot::SlotIndex;

entity_def! {
    /// Handle to a value record in a [`ValueArena`].
    pub entity ValNo(u32, "vn");

    /// Dense index of a value in its owning range.
    pub entity ValueId(u32, "");
}

/// Whether a value is still defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueState {
    /// The value is defined at the given position.
    Def(SlotIndex),

    /// The value has been deleted and is waiting to be dropped by
    /// renumbering.
    Unused,
}

/// A value record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueData {
    /// Index in the owning range's value list.
    pub id: ValueId,

    /// Definition, or the deleted marker.
    pub state: ValueState,
}

/// Storage for value records.
#[derive(Default, Clone)]
pub struct ValueArena {
    values: PrimaryMap<ValNo, ValueData>,
}

impl ValueArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new value defined at `def`.
    pub fn alloc(&mut self, id: ValueId, def: SlotIndex) -> ValNo {
        self.values.push(ValueData {
            id,
            state: ValueState::Def(def),
        })
    }

    /// Allocates a new value with the same state as `orig`.
    pub fn alloc_copy(&mut self, id: ValueId, orig: ValNo) -> ValNo {
        let state = self.values[orig].state;
        self.values.push(ValueData { id, state })
    }

    /// Number of records ever allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether no record has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Releases every record. All outstanding handles become invalid.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Returns the record for `vn`.
    #[inline]
    pub fn data(&self, vn: ValNo) -> &ValueData {
        &self.values[vn]
    }

    /// Index of `vn` in its owning range.
    #[inline]
    pub fn id(&self, vn: ValNo) -> ValueId {
        self.values[vn].id
    }

    #[inline]
    pub(crate) fn set_id(&mut self, vn: ValNo, id: ValueId) {
        self.values[vn].id = id;
    }

    /// Definition of `vn`, or `None` if it was deleted.
    #[inline]
    pub fn def_of(&self, vn: ValNo) -> Option<SlotIndex> {
        match self.values[vn].state {
            ValueState::Def(def) => Some(def),
            ValueState::Unused => None,
        }
    }

    /// Definition of `vn`.
    ///
    /// Panics if the value was deleted.
    #[inline]
    #[track_caller]
    pub fn def(&self, vn: ValNo) -> SlotIndex {
        match self.values[vn].state {
            ValueState::Def(def) => def,
            ValueState::Unused => panic!("{vn} has been deleted"),
        }
    }

    /// Moves the definition of `vn`.
    #[inline]
    pub fn set_def(&mut self, vn: ValNo, def: SlotIndex) {
        self.values[vn].state = ValueState::Def(def);
    }

    /// Returns whether `vn` has been deleted.
    #[inline]
    pub fn is_unused(&self, vn: ValNo) -> bool {
        self.values[vn].state == ValueState::Unused
    }

    /// Returns whether `vn` is defined at the start of a basic block, merging
    /// the values live out of its predecessors.
    #[inline]
    pub fn is_phi_def(&self, vn: ValNo) -> bool {
        self.def_of(vn).is_some_and(SlotIndex::is_block)
    }

    /// Marks `vn` as deleted.
    #[inline]
    pub fn mark_unused(&mut self, vn: ValNo) {
        self.values[vn].state = ValueState::Unused;
    }

    /// Copies the definition of `src` onto `dst`, keeping `dst`'s id.
    #[inline]
    pub fn copy_from(&mut self, dst: ValNo, src: ValNo) {
        self.values[dst].state = self.values[src].state;
    }
}

impl fmt::Debug for ValueArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}
