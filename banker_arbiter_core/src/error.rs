//! Precondition errors for arbiter inputs.
//!
//! Request outcomes (`Granted`, denials) are ordinary values in
//! `crate::request::Outcome`; the variants here signal malformed input
//! (wrong-length vectors, unknown process ids, allocation above the declared
//! claim). None of them leave the matrices partially mutated.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArbiterError {
    #[error("expected a vector of length {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("process id {id} out of range (arena holds {processes} processes)")]
    UnknownProcess { id: usize, processes: usize },

    #[error("allocation {allocated} exceeds declared maximum {maximum} for process {id}, resource {resource}")]
    AllocationAboveMaximum {
        id: usize,
        resource: usize,
        allocated: u32,
        maximum: u32,
    },
}
