//! The chain-agnostic relay engine: scans source chains for cross-chain
//! messages and keeps the submission side of destination chains ordered.
//! Chain specifics are supplied through the collaborator traits in
//! `relay-core`.

// Forbid unsafe code outside of tests
#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(missing_docs)]

pub mod settings;

mod listener;
pub use listener::*;

mod metrics;
pub use metrics::*;

mod scan;
pub use scan::*;

mod submission;
pub use submission::*;
