//! Errors a worker's search loop can report (§7).
use thiserror::Error;

/// An error that aborts a worker's search.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("exceeded the configured memory limit")]
    OutOfMemory,

    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
}
