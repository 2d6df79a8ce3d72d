//! Library target for the `vodrip` package.
//!
//! The primary deliverable of this package is the `vodrip` CLI binary
//! (`src/main.rs`). Input parsing and the error type live here so they can be
//! unit and doc tested.

#[doc(hidden)]
pub use vodrip_engine;

pub mod error;
pub mod utils;
