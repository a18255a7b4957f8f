//! Utility types for strata.
//!
//! This module contains fundamental types used throughout the library:
//! - [`NodePath`] - Hierarchy paths with deterministic ordering
//! - [`Error`] / [`Result`] - Error handling

mod error;
mod path;

pub use error::*;
pub use path::*;
