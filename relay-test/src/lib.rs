//! Mocks and in-memory fakes of the relay collaborator traits.

#![allow(missing_docs)]

pub mod mocks;
pub mod test_utils;
