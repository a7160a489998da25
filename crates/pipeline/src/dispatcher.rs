//! Concurrent fragment dispatcher
//!
//! Fans a slice of fragments out over a bounded worker pool. Workers pull
//! from a shared task channel, pace themselves through one shared rate
//! limiter, retry with the backend's backoff, and push results into a
//! channel sized so no worker ever blocks on send. Results come back
//! sorted by fragment index; failed indices stay as gaps.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use speakdown_core::{Error, Fragment, SynthesisResult};

use crate::backend::SynthesisBackend;
use crate::rate_limit::RateLimiter;
use crate::validator::{AudioCodec, AudioValidator};

/// Worker-pool dispatcher around one backend.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn SynthesisBackend>,
    limiter: Arc<RateLimiter>,
    codec: AudioCodec,
    max_workers: usize,
    max_retries: usize,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn SynthesisBackend>,
        limiter: Arc<RateLimiter>,
        codec: AudioCodec,
        max_workers: usize,
        max_retries: usize,
    ) -> Self {
        Self {
            backend,
            limiter,
            codec,
            max_workers: max_workers.max(1),
            max_retries: max_retries.max(1),
        }
    }

    /// Synthesize every fragment and collect the results in ascending
    /// index order. Per-fragment failures are recorded, never raised.
    pub async fn run(
        &self,
        fragments: Vec<Fragment>,
        cancel: CancellationToken,
    ) -> Vec<SynthesisResult> {
        let total = fragments.len();
        if total == 0 {
            return Vec::new();
        }

        let (task_tx, task_rx) = mpsc::channel::<Fragment>(total);
        for fragment in fragments {
            // Capacity equals the fragment count, so this never waits.
            if task_tx.send(fragment).await.is_err() {
                break;
            }
        }
        drop(task_tx);
        let task_rx = Arc::new(Mutex::new(task_rx));

        let (result_tx, mut result_rx) = mpsc::channel::<SynthesisResult>(total);

        let workers = self.max_workers.min(total);
        tracing::info!(
            workers,
            total,
            backend = self.backend.name(),
            "starting synthesis workers"
        );

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let dispatcher = self.clone();
            let task_rx = Arc::clone(&task_rx);
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                dispatcher
                    .worker_loop(worker_id, task_rx, result_tx, cancel)
                    .await;
            }));
        }
        drop(result_tx);

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "synthesis worker panicked");
            }
        }

        let mut results = Vec::with_capacity(total);
        let mut success = 0usize;
        let mut failure = 0usize;
        while let Some(result) = result_rx.recv().await {
            match (&result.audio_path, &result.error) {
                (Some(path), _) => {
                    tracing::info!(index = result.index, path = %path.display(), "task completed");
                    success += 1;
                }
                (None, Some(error)) => {
                    tracing::warn!(index = result.index, error = %error, "task failed");
                    failure += 1;
                }
                (None, None) => failure += 1,
            }
            results.push(result);
        }

        tracing::info!(success, failure, "synthesis finished");

        results.sort_by_key(|r| r.index);
        results
    }

    async fn worker_loop(
        &self,
        worker_id: usize,
        task_rx: Arc<Mutex<mpsc::Receiver<Fragment>>>,
        result_tx: mpsc::Sender<SynthesisResult>,
        cancel: CancellationToken,
    ) {
        loop {
            let fragment = {
                let mut rx = task_rx.lock().await;
                rx.recv().await
            };
            let Some(fragment) = fragment else {
                break;
            };

            // Surface cancellation for the fragment in hand, then stop
            // taking work.
            if cancel.is_cancelled() {
                let _ = result_tx
                    .send(SynthesisResult::failed(fragment.index, Error::Cancelled))
                    .await;
                break;
            }

            if let Err(e) = self.limiter.acquire(&cancel).await {
                let _ = result_tx
                    .send(SynthesisResult::failed(fragment.index, e))
                    .await;
                continue;
            }

            tracing::debug!(
                worker = worker_id,
                index = fragment.index,
                text = %fragment.text,
                "processing fragment"
            );

            let result = self.attempt(&fragment, &cancel).await;
            let _ = result_tx.send(result).await;
        }
    }

    /// One fragment, up to `max_retries` synthesize attempts with the
    /// backend's linear backoff between them.
    async fn attempt(&self, fragment: &Fragment, cancel: &CancellationToken) -> SynthesisResult {
        let mut last_error = Error::Cancelled;

        for attempt in 1..=self.max_retries {
            if cancel.is_cancelled() {
                return SynthesisResult::failed(fragment.index, Error::Cancelled);
            }

            let outcome = self
                .backend
                .synthesize(cancel, &fragment.text, fragment.index)
                .await
                .and_then(|path| {
                    AudioValidator::validate(&path, &self.codec)?;
                    Ok(path)
                });

            match outcome {
                Ok(path) => {
                    if attempt > 1 {
                        tracing::info!(
                            index = fragment.index,
                            attempt,
                            "fragment succeeded after retry"
                        );
                    }
                    return SynthesisResult::ok(fragment.index, path);
                }
                Err(e) if !e.is_retriable() => {
                    return SynthesisResult::failed(fragment.index, e);
                }
                Err(e) => {
                    tracing::warn!(
                        index = fragment.index,
                        attempt,
                        error = %e,
                        "attempt failed"
                    );
                    last_error = e;
                }
            }

            if attempt < self.max_retries {
                let backoff = self.backend.retry_backoff() * attempt as u32;
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return SynthesisResult::failed(fragment.index, Error::Cancelled);
                    }
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }

        SynthesisResult::failed(fragment.index, last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::backend::fragment_filename;

    /// Backend writing a valid MP3 header plus the fragment index, with
    /// scripted failures.
    struct ScriptedBackend {
        dir: PathBuf,
        calls: AtomicUsize,
        fail_first_attempts: usize,
        fail_index_forever: Option<usize>,
        attempts_per_index: parking_lot::Mutex<std::collections::HashMap<usize, usize>>,
    }

    impl ScriptedBackend {
        fn new(dir: PathBuf) -> Self {
            Self {
                dir,
                calls: AtomicUsize::new(0),
                fail_first_attempts: 0,
                fail_index_forever: None,
                attempts_per_index: parking_lot::Mutex::new(Default::default()),
            }
        }

        fn write_fragment(&self, index: usize) -> PathBuf {
            let path = self.dir.join(fragment_filename(index, &AudioCodec::Mp3));
            let mut bytes = b"ID3\x04\x00".to_vec();
            bytes.resize(1400, 0);
            bytes.extend_from_slice(index.to_string().as_bytes());
            std::fs::write(&path, bytes).unwrap();
            path
        }
    }

    #[async_trait]
    impl SynthesisBackend for ScriptedBackend {
        async fn synthesize(
            &self,
            _cancel: &CancellationToken,
            _text: &str,
            index: usize,
        ) -> speakdown_core::Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let attempt = {
                let mut map = self.attempts_per_index.lock();
                let entry = map.entry(index).or_insert(0);
                *entry += 1;
                *entry
            };

            if self.fail_index_forever == Some(index) {
                return Err(Error::Transport("permanent failure".into()));
            }
            if attempt <= self.fail_first_attempts {
                return Err(Error::Transport("transient failure".into()));
            }

            Ok(self.write_fragment(index))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn validate_config(&self) -> speakdown_core::Result<()> {
            Ok(())
        }

        fn max_text_length(&self) -> usize {
            0
        }

        fn recommended_rate_limit(&self) -> u32 {
            100
        }

        fn retry_backoff(&self) -> Duration {
            Duration::from_millis(5)
        }
    }

    fn fragments(n: usize) -> Vec<Fragment> {
        (0..n)
            .map(|i| Fragment::new(i, format!("line-{}", i + 1)))
            .collect()
    }

    fn dispatcher(backend: Arc<ScriptedBackend>, workers: usize, retries: usize) -> Dispatcher {
        Dispatcher::new(
            backend,
            Arc::new(RateLimiter::new(1000, 1000)),
            AudioCodec::Mp3,
            workers,
            retries,
        )
    }

    #[tokio::test]
    async fn results_sorted_ascending_under_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(dir.path().to_path_buf()));
        let d = dispatcher(backend, 8, 1);

        let results = d.run(fragments(20), CancellationToken::new()).await;

        let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..20).collect::<Vec<_>>());
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn transient_failures_recover_within_retry_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = ScriptedBackend::new(dir.path().to_path_buf());
        backend.fail_first_attempts = 1;
        let backend = Arc::new(backend);
        let d = dispatcher(Arc::clone(&backend), 4, 2);

        let results = d.run(fragments(5), CancellationToken::new()).await;

        assert!(results.iter().all(|r| r.is_ok()));
        // Exactly two synthesize calls per fragment.
        let map = backend.attempts_per_index.lock();
        assert!(map.values().all(|&attempts| attempts == 2));
    }

    #[tokio::test]
    async fn retry_budget_is_a_hard_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = ScriptedBackend::new(dir.path().to_path_buf());
        backend.fail_index_forever = Some(2);
        let backend = Arc::new(backend);
        let d = dispatcher(Arc::clone(&backend), 2, 3);

        let results = d.run(fragments(5), CancellationToken::new()).await;

        let failed: Vec<&SynthesisResult> = results.iter().filter(|r| !r.is_ok()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, 2);
        assert_eq!(*backend.attempts_per_index.lock().get(&2).unwrap(), 3);
    }

    #[tokio::test]
    async fn gaps_preserved_for_failed_indices() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = ScriptedBackend::new(dir.path().to_path_buf());
        backend.fail_index_forever = Some(2);
        let backend = Arc::new(backend);
        let d = dispatcher(backend, 2, 1);

        let results = d.run(fragments(5), CancellationToken::new()).await;
        let ok_indices: Vec<usize> = results
            .iter()
            .filter(|r| r.is_ok())
            .map(|r| r.index)
            .collect();
        assert_eq!(ok_indices, vec![0, 1, 3, 4]);
    }

    #[tokio::test]
    async fn pre_cancelled_run_starts_no_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(dir.path().to_path_buf()));
        let d = dispatcher(Arc::clone(&backend), 4, 3);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let results = d.run(fragments(8), cancel).await;

        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(results
            .iter()
            .all(|r| matches!(r.error, Some(Error::Cancelled))));
    }

    #[tokio::test]
    async fn empty_input_yields_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(dir.path().to_path_buf()));
        let d = dispatcher(backend, 4, 1);

        let results = d.run(Vec::new(), CancellationToken::new()).await;
        assert!(results.is_empty());
    }
}
