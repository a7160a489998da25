//! Cloud task-API backend
//!
//! Three-step synthesis against a long-text TTS service: submit a job,
//! poll its status on a fixed cadence, then download the produced audio.
//! Each fragment gets its own job; the 60 s poll deadline is per
//! fragment and independent of run cancellation.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use speakdown_config::{is_placeholder, CloudTtsConfig};
use speakdown_core::{Error, Result};

use crate::backend::{fragment_filename, SynthesisBackend};
use crate::validator::AudioCodec;

const DEFAULT_ENDPOINT: &str = "https://tts.cloud-task.example.com/v1";
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const POLL_DEADLINE: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Job status codes of the task API.
const STATUS_QUEUED: i64 = 0;
const STATUS_RUNNING: i64 = 1;
const STATUS_SUCCESS: i64 = 2;
const STATUS_FAILED: i64 = 3;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest<'a> {
    text: &'a str,
    voice_type: i64,
    volume: i64,
    speed: f64,
    primary_language: i64,
    sample_rate: u32,
    codec: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskStatusResponse {
    status: i64,
    #[serde(default)]
    status_str: String,
    #[serde(default)]
    result_url: Option<String>,
    #[serde(default)]
    error_msg: Option<String>,
}

/// Backend for the asynchronous cloud task API.
pub struct CloudTaskBackend {
    config: CloudTtsConfig,
    endpoint: String,
    temp_dir: PathBuf,
    codec: AudioCodec,
    client: Client,
}

impl CloudTaskBackend {
    pub fn new(config: CloudTtsConfig, temp_dir: PathBuf) -> Result<Self> {
        Self::with_endpoint(config, temp_dir, DEFAULT_ENDPOINT.to_string())
    }

    /// Point the backend at a non-default service endpoint (used by
    /// tests and self-hosted gateways).
    pub fn with_endpoint(
        config: CloudTtsConfig,
        temp_dir: PathBuf,
        endpoint: String,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;

        let codec = AudioCodec::from_name(&config.codec);
        Ok(Self {
            config,
            endpoint,
            temp_dir,
            codec,
            client,
        })
    }

    async fn create_task(&self, text: &str) -> Result<String> {
        let body = CreateTaskRequest {
            text,
            voice_type: self.config.voice_type,
            volume: self.config.volume,
            speed: self.config.speed,
            primary_language: self.config.primary_language,
            sample_rate: self.config.sample_rate,
            codec: &self.config.codec,
        };

        let response = self
            .client
            .post(format!("{}/task", self.endpoint))
            .header("X-Secret-Id", &self.config.secret_id)
            .header("X-Secret-Key", &self.config.secret_key)
            .header("X-Region", &self.config.region)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("create task: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Protocol(format!(
                "create task: http {}",
                response.status()
            )));
        }

        let created: CreateTaskResponse = response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("create task response: {e}")))?;
        Ok(created.task_id)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse> {
        let response = self
            .client
            .get(format!("{}/task/{}", self.endpoint, task_id))
            .header("X-Secret-Id", &self.config.secret_id)
            .header("X-Secret-Key", &self.config.secret_key)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("task status: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Protocol(format!(
                "task status: http {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("task status response: {e}")))
    }

    /// Poll until the job reaches a terminal state, then return the
    /// audio URL. 2 s cadence, 60 s deadline.
    async fn wait_for_audio_url(
        &self,
        cancel: &CancellationToken,
        task_id: &str,
        index: usize,
    ) -> Result<String> {
        let started = tokio::time::Instant::now();

        loop {
            if started.elapsed() >= POLL_DEADLINE {
                return Err(Error::Timeout(format!(
                    "task {task_id} still pending after {POLL_DEADLINE:?}"
                )));
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let status = self.task_status(task_id).await?;
            match status.status {
                STATUS_SUCCESS => {
                    return status.result_url.filter(|url| !url.is_empty()).ok_or_else(|| {
                        Error::Protocol(format!("task {task_id} finished without an audio url"))
                    });
                }
                STATUS_FAILED => {
                    let reason = status
                        .error_msg
                        .unwrap_or_else(|| "unspecified server error".to_string());
                    return Err(Error::Protocol(format!("task {task_id} failed: {reason}")));
                }
                STATUS_QUEUED | STATUS_RUNNING => {
                    tracing::debug!(index, task_id, state = %status.status_str, "task pending");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    }
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "task {task_id}: unknown status {other}"
                    )));
                }
            }
        }
    }

    async fn download_audio(&self, url: &str, index: usize) -> Result<PathBuf> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("download: {e}")))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::Transport(format!(
                "download: http {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("download body: {e}")))?;

        let path = self.temp_dir.join(fragment_filename(index, &self.codec));
        std::fs::write(&path, &bytes)?;
        Ok(path)
    }
}

#[async_trait]
impl SynthesisBackend for CloudTaskBackend {
    async fn synthesize(
        &self,
        cancel: &CancellationToken,
        text: &str,
        index: usize,
    ) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let task_id = self.create_task(text).await?;
        tracing::debug!(index, %task_id, "cloud task created");

        let url = self.wait_for_audio_url(cancel, &task_id, index).await?;
        self.download_audio(&url, index).await
    }

    fn name(&self) -> &'static str {
        "cloud-task"
    }

    fn validate_config(&self) -> Result<()> {
        if is_placeholder(&self.config.secret_id) {
            return Err(Error::Config("cloud_tts.secret_id is not set".into()));
        }
        if is_placeholder(&self.config.secret_key) {
            return Err(Error::Config("cloud_tts.secret_key is not set".into()));
        }
        if self.config.region.is_empty() {
            return Err(Error::Config("cloud_tts.region is not set".into()));
        }
        Ok(())
    }

    fn max_text_length(&self) -> usize {
        150
    }

    fn recommended_rate_limit(&self) -> u32 {
        5
    }

    fn retry_backoff(&self) -> Duration {
        Duration::from_secs(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(config: CloudTtsConfig) -> CloudTaskBackend {
        CloudTaskBackend::new(config, std::env::temp_dir()).unwrap()
    }

    #[test]
    fn placeholder_credentials_rejected() {
        let b = backend(CloudTtsConfig::default());
        assert!(matches!(b.validate_config(), Err(Error::Config(_))));
    }

    #[test]
    fn real_credentials_accepted() {
        let config = CloudTtsConfig {
            secret_id: "AKIDexample".into(),
            secret_key: "sk-example".into(),
            ..CloudTtsConfig::default()
        };
        assert!(backend(config).validate_config().is_ok());
    }

    #[test]
    fn limits_match_provider_contract() {
        let b = backend(CloudTtsConfig::default());
        assert_eq!(b.max_text_length(), 150);
        assert_eq!(b.recommended_rate_limit(), 5);
        assert_eq!(b.retry_backoff(), Duration::from_secs(2));
        assert_eq!(b.name(), "cloud-task");
    }
}
