//! The synthesis backend capability
//!
//! A backend turns one text fragment into one on-disk audio file. The
//! dispatcher treats every backend the same: it rate-limits calls,
//! validates the produced file, and retries with the backend's own
//! backoff base.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use speakdown_core::Result;

use crate::validator::AudioCodec;

/// Pluggable speech-synthesis provider.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Produce one audio file for `text` under the backend's temp
    /// directory, named by [`fragment_filename`]. Every suspension point
    /// inside must observe `cancel`.
    async fn synthesize(
        &self,
        cancel: &CancellationToken,
        text: &str,
        index: usize,
    ) -> Result<PathBuf>;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Reject unusable configuration before any work starts.
    fn validate_config(&self) -> Result<()>;

    /// Maximum accepted text length in characters; 0 means unbounded.
    fn max_text_length(&self) -> usize;

    /// Sustainable request rate in calls per second.
    fn recommended_rate_limit(&self) -> u32;

    /// Backoff base between retry attempts; attempt k sleeps k times this.
    fn retry_backoff(&self) -> Duration;
}

/// Canonical per-fragment filename: `audio_007.mp3`
pub fn fragment_filename(index: usize, codec: &AudioCodec) -> String {
    format!("audio_{index:03}.{}", codec.extension())
}
