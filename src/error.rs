//! Error types for opdsgen operations.

use thiserror::Error;

/// Errors that abort an entire feed build.
///
/// Per-entry failures are not represented here; they degrade to
/// [`OpdsMessage`](crate::feed::OpdsMessage) placeholders via
/// [`EntryError`](crate::annotator::EntryError) and the rest of the
/// feed still succeeds.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed pagination or facet parameters. Rejected before any
    /// annotation work begins.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
