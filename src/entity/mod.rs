//! Liveness information is indexed by "entities": newtype wrappers around
//! integers which represent an index into an array.
//!
//! These types implement the [`EntityRef`] trait which allows them to be
//! converted to and from `usize`, but they store a smaller integer type
//! internally to keep segments and value tables compact.
//!
//! The containers in this module are keyed by entities:
//!
//! - [`PrimaryMap<K, V>`] owns the main definition of an entity and hands out
//!   new keys. The [`ValueArena`] is built on it.
//! - [`EntitySet<T>`] is a bitset of entities.
//!
//! [`ValueArena`]: crate::value::ValueArena

#[macro_use]
pub mod base;
pub mod primary_map;
pub mod set;

pub use base::EntityRef;
pub use primary_map::PrimaryMap;
pub use set::EntitySet;
