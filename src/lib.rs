//! Live range and live interval data structures for register allocators.
//!
//! This crate is compatible with `#![no_std]` and only requires `alloc`.
//!
//! # Overview
//!
//! A [`LiveRange`] is a sorted list of [`Segment`]s over [`SlotIndex`]
//! positions, each tagged with the value number ([`ValNo`]) live over it. A
//! [`LiveInterval`] associates a main range with a virtual register and can
//! track groups of lanes of the register separately in [`SubRange`]s.
//!
//! Value records are stored in a [`ValueArena`] that is shared by all the
//! ranges of a pass. Ranges refer to records through [`ValNo`] handles and
//! the arena is cleared once the pass is done.
//!
//! Segments can be added one at a time with [`LiveRange::add_segment`], in
//! bulk in sorted order through a [`LiveRangeUpdater`], or in any order after
//! switching the range to a B-Tree with [`LiveRange::use_segment_set`].
//!
//! # Splitting registers
//!
//! [`ConnectedValueClasses`] computes the groups of values of a range that
//! are connected through PHIs and read-modify-write instructions and can move
//! each group to its own register. [`ConnectedSubRegClasses`] does the same
//! across the sub-ranges of an interval, for registers whose lanes are used
//! independently.
//!
//! Both need access to the program through the traits in the [`function`]
//! module and to lane masks through [`RegInfo`].
//!
//! # Validation
//!
//! [`debug_utils::verify_live_range`] and
//! [`debug_utils::verify_live_interval`] check the structural invariants of
//! ranges and intervals. They are relatively expensive and are meant for
//! testing and debugging.
//!
//! [`SlotIndex`]: slot::SlotIndex
//! [`ValNo`]: value::ValNo
//! [`ValueArena`]: value::ValueArena
//! [`RegInfo`]: reginfo::RegInfo

#![no_std]
#![warn(rust_2018_idioms, missing_docs)]
#![allow(
    clippy::too_many_arguments,
    clippy::collapsible_if,
    clippy::collapsible_else_if,
    clippy::single_char_add_str,
    clippy::cast_possible_truncation,
    clippy::too_many_lines,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::doc_markdown
)]
#![warn(
    clippy::explicit_iter_loop,
    clippy::range_plus_one,
    clippy::map_unwrap_or,
    clippy::cloned_instead_of_copied,
    clippy::semicolon_if_nothing_returned,
    clippy::must_use_candidate,
    clippy::iter_without_into_iter,
    clippy::uninlined_format_args,
    clippy::ignored_unit_patterns
)]

extern crate alloc;
#[cfg(any(test, feature = "parse"))]
extern crate std;

// Even when trace logging is disabled, the trace macro has a significant
// performance cost so we disable it in release builds.
macro_rules! trace {
    ($($tt:tt)*) => {
        if cfg!(feature = "trace-log") {
            ::log::trace!($($tt)*);
        }
    };
}
#[allow(unused_macros)]
macro_rules! trace_enabled {
    () => {
        cfg!(feature = "trace-log") && ::log::log_enabled!(::log::Level::Trace)
    };
}

// Macro for collecting statistics.
macro_rules! stat {
    ($stats:expr, $field:ident) => {
        $stats.$field += 1
    };
    ($stats:expr, $field:ident, $count:expr) => {
        $stats.$field += $count
    };
}

#[macro_use]
pub mod entity;

pub mod classes;
pub mod debug_utils;
pub mod function;
pub mod live_interval;
pub mod live_range;
pub mod reginfo;
pub mod slot;
pub mod updater;
pub mod value;

mod union_find;

pub use classes::{ConnectedSubRegClasses, ConnectedValueClasses};
pub use live_interval::{LiveInterval, SubRange};
pub use live_range::{LiveQuery, LiveRange, Segment, SegmentError};
pub use updater::LiveRangeUpdater;

/// Configuration options for [`ConnectedSubRegClasses`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct SplitOptions {
    /// Insert implicit defs on predecessor edges where a split leaves a PHI
    /// value without an incoming value.
    #[cfg_attr(feature = "clap", arg(long, default_value_t = true, action = clap::ArgAction::Set))]
    pub repair_phi_inputs: bool,

    /// Recompute the undef and dead flags of sub-register defs after a split.
    #[cfg_attr(feature = "clap", arg(long, default_value_t = true, action = clap::ArgAction::Set))]
    pub fix_operand_flags: bool,

    /// Verify every interval produced by a split and panic if one is
    /// malformed.
    ///
    /// Enabled by default in debug builds.
    #[cfg_attr(feature = "clap", arg(long))]
    pub verify: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            repair_phi_inputs: true,
            fix_operand_flags: true,
            verify: cfg!(debug_assertions),
        }
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for SplitOptions {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self {
            repair_phi_inputs: u.arbitrary()?,
            fix_operand_flags: u.arbitrary()?,
            // Fuzzing always wants malformed intervals to be caught.
            verify: true,
        })
    }
}

/// Statistics collected while splitting registers.
///
/// This is an opaque type since the set of statistics may vary between
/// different versions of this crate, even across minor versions.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    intervals_examined: usize,
    intervals_split: usize,
    components: usize,
    vregs_created: usize,
    operands_rewritten: usize,
    implicit_defs: usize,
    undef_flags: usize,
    dead_flags: usize,
}

impl core::fmt::Display for Stats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:#?}")
    }
}
