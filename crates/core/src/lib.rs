//! Core domain types and errors for `stash`.
//!
//! This crate holds the pieces every other crate in the workspace agrees on:
//!
//! - **`errors`**: the `Error` enum and `Result` alias shared by the codec,
//!   the backends and the stash itself.
//! - **`value`**: the `Value` tagged union that stands in for "any storable
//!   value". Containers, sets, byte strings, paths, n-d arrays, frames,
//!   classes, functions and instances are all variants of it, so the
//!   serializers can dispatch on shape without runtime reflection.

pub mod errors;
pub mod value;

pub use self::{
    errors::{Error, Result, ResultExt},
    value::{
        ClassDef, ClassRef, DType, DataFrame, FunctionRef, Instance, NdArray, Opaque,
        Series, State, Stashable, Value, ValueSet,
    },
};
