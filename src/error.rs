//! Errors raised by the inference engine.
//!
//! Degenerate (all-zero) distributions are not errors: they are
//! reported through `log::warn!` and recovered locally.

use thiserror::Error;

/// Errors that can escape an inference query.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// A query (or a network edge) references a node absent from the network.
    #[error("missing variable: {0}")]
    MissingVariable(String),

    /// The evidence contradicts every relevant node table.
    #[error("inconsistent evidence: {0}")]
    InconsistentEvidence(String),

    /// The query deadline expired before elimination completed.
    #[error("inference timed out")]
    Timeout,

    /// Factor scope mismatch, negative probability, or a similar broken invariant.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

pub type Result<T> = std::result::Result<T, InferenceError>;
