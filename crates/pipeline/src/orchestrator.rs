//! Run orchestration
//!
//! Wires the text layer, dispatcher and merger into the two entry
//! points: line-by-line plain text and AST-based Markdown. The
//! orchestrator owns the run-scoped cancellation token; everything
//! downstream observes it.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use speakdown_core::{Error, Fragment, MergeReport, Result};
use speakdown_text::{MarkdownExtractor, TextNormalizer};

use crate::backend::SynthesisBackend;
use crate::dispatcher::Dispatcher;
use crate::merger::Merger;
use crate::rate_limit::RateLimiter;
use crate::validator::AudioCodec;

/// Everything one run needs, assembled by the CLI layer and immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub final_name: String,
    pub max_workers: usize,
    /// Tokens per second; 0 means "use the backend recommendation".
    pub rate_limit: u32,
    /// Bucket capacity; defaults to the effective rate.
    pub burst: Option<u32>,
    pub max_retries: usize,
    pub codec: AudioCodec,
}

/// Drives a whole document through segmentation, synthesis and merge.
pub struct Orchestrator {
    config: RunConfig,
    backend: Arc<dyn SynthesisBackend>,
    normalizer: TextNormalizer,
    extractor: MarkdownExtractor,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Fails fast on unusable backend configuration.
    pub fn new(config: RunConfig, backend: Arc<dyn SynthesisBackend>) -> Result<Self> {
        backend.validate_config()?;
        Ok(Self {
            config,
            backend,
            normalizer: TextNormalizer::new(),
            extractor: MarkdownExtractor::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Token cancelling this run; hand it to a signal handler.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Line-by-line mode: each valid line becomes one fragment indexed
    /// by its source line number.
    pub async fn process_plain(&self) -> Result<MergeReport> {
        let content = fs::read_to_string(&self.config.input_path)?;
        let fragments = self.plain_fragments(&content);
        self.run(fragments).await
    }

    /// Markdown mode: the extractor walks the document AST and each
    /// sentence becomes one fragment indexed by its ordinal.
    pub async fn process_markdown(&self) -> Result<MergeReport> {
        let content = fs::read_to_string(&self.config.input_path)?;

        let max_len = self.backend.max_text_length();
        let fragments: Vec<Fragment> = self
            .extractor
            .extract(&content)
            .into_iter()
            .enumerate()
            .map(|(i, sentence)| Fragment::new(i, self.fit(&sentence, max_len)))
            .collect();

        tracing::info!(sentences = fragments.len(), "markdown extraction complete");
        self.run(fragments).await
    }

    fn plain_fragments(&self, content: &str) -> Vec<Fragment> {
        let max_len = self.backend.max_text_length();
        let mut fragments = Vec::new();
        let mut total = 0usize;
        let mut empty = 0usize;
        let mut skipped = 0usize;
        let mut in_fence = false;

        for (index, line) in content.lines().enumerate() {
            total += 1;
            let trimmed = line.trim();

            // Fence lines toggle code state; everything inside is dropped
            // even when a lone line would otherwise read as prose.
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                skipped += 1;
                continue;
            }
            if in_fence {
                skipped += 1;
                continue;
            }

            if trimmed.is_empty() {
                empty += 1;
                continue;
            }
            if !self.normalizer.is_valid(line) {
                skipped += 1;
                continue;
            }

            let text = self.normalizer.normalize(line);
            if text.is_empty() {
                skipped += 1;
                continue;
            }

            fragments.push(Fragment::new(index, self.fit(&text, max_len)));
        }

        tracing::info!(
            total,
            empty,
            skipped,
            valid = fragments.len(),
            "line filtering complete"
        );
        fragments
    }

    fn fit(&self, text: &str, max_len: usize) -> String {
        if max_len > 0 && text.chars().count() > max_len {
            let fitted = self.normalizer.split_to_fit(text, max_len);
            tracing::warn!(
                limit = max_len,
                "fragment exceeded backend text limit, shortened"
            );
            fitted
        } else {
            text.to_string()
        }
    }

    async fn run(&self, fragments: Vec<Fragment>) -> Result<MergeReport> {
        if fragments.is_empty() {
            return Err(Error::EmptyInput);
        }

        fs::create_dir_all(&self.config.temp_dir)?;
        fs::create_dir_all(&self.config.output_dir)?;

        let rate = if self.config.rate_limit == 0 {
            self.backend.recommended_rate_limit()
        } else {
            self.config.rate_limit
        };
        let burst = self.config.burst.unwrap_or(rate);
        let limiter = Arc::new(RateLimiter::new(rate, burst));

        tracing::info!(
            backend = self.backend.name(),
            fragments = fragments.len(),
            workers = self.config.max_workers,
            rate,
            burst,
            "starting run"
        );

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.backend),
            limiter,
            self.config.codec.clone(),
            self.config.max_workers,
            self.config.max_retries,
        );
        let results = dispatcher.run(fragments, self.cancel.clone()).await;

        let output_path = self.config.output_dir.join(&self.config.final_name);
        Merger::new(self.config.codec.clone()).merge(&results, &output_path)
    }
}
