//! Implementation of the `#[derive(Seekable)]` macro.
//!
//! Generates the static field descriptor table, field name constants and
//! the field accessor from struct annotations.

mod attrs;
mod derive;

pub use derive::seekable_derive_impl;
