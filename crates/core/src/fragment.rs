//! Fragment and result types flowing through the pipeline

use std::path::PathBuf;

use crate::error::Error;

/// One normalized unit of text handed to a single synthesize call.
///
/// `index` reflects source order (line number in plain mode, sentence
/// ordinal in markdown mode) and is unique within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub index: usize,
    pub text: String,
}

impl Fragment {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// Outcome of synthesizing one fragment.
///
/// Exactly one of `audio_path` / `error` is set. Collected once by the
/// dispatcher and discarded after the merge.
#[derive(Debug)]
pub struct SynthesisResult {
    pub index: usize,
    pub audio_path: Option<PathBuf>,
    pub error: Option<Error>,
}

impl SynthesisResult {
    pub fn ok(index: usize, audio_path: PathBuf) -> Self {
        Self {
            index,
            audio_path: Some(audio_path),
            error: None,
        }
    }

    pub fn failed(index: usize, error: Error) -> Self {
        Self {
            index,
            audio_path: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.audio_path.is_some()
    }
}

/// Totals reported by the merge stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Results handed to the merger (successes only).
    pub total: usize,
    /// Files that passed revalidation and were written out.
    pub valid: usize,
    /// Files rejected (and deleted) at merge time.
    pub invalid: usize,
    /// Size of the final artifact in bytes.
    pub bytes_written: u64,
}
