//! Utility functions and types for debugging liveness computations.
//!
//! These are not needed for normal compilation, but are useful during
//! development of both this crate and the register allocators built on it.

#[cfg(feature = "arbitrary")]
mod arbitrary;
mod display;
mod generic_function;
mod generic_reginfo;
#[cfg(feature = "parse")]
mod parse;
mod verify;

#[cfg(feature = "arbitrary")]
pub use arbitrary::*;
pub use display::*;
pub use generic_function::*;
pub use generic_reginfo::*;
#[cfg(feature = "parse")]
pub use parse::*;
pub use verify::*;
