//! Error taxonomy shared across the pipeline
//!
//! Workers attach these to per-fragment results and keep going; only
//! `Config`, `EmptyInput` and `EmptyMerge` abort a whole run.

use thiserror::Error;

/// Errors produced anywhere in the synthesis pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing configuration. Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network-level failure talking to a synthesis service.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A poll deadline or request timeout elapsed.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A produced audio file failed the header/size check.
    #[error("audio validation failed: {0}")]
    Validation(String),

    /// The run-scoped cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Filtering left nothing to synthesize.
    #[error("no valid text fragments in input")]
    EmptyInput,

    /// Every fragment failed; there is nothing to merge.
    #[error("no valid audio fragments to merge")]
    EmptyMerge,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether another synthesis attempt for the same fragment makes sense.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Protocol(_) | Error::Timeout(_) | Error::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
