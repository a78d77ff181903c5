//! This crate contains core primitives, traits, and types shared by the
//! chain-agnostic relay engine and the per-chain collaborators that plug into
//! it.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![forbid(unsafe_code)]

pub use error::*;

/// Async traits implemented by chain-specific collaborators
pub mod traits;
pub use traits::*;

/// Core relay data structures
pub mod types;
pub use types::*;

mod error;
