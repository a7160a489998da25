//! Settings tree and loading
//!
//! A single YAML document configures the whole run. Every field has a
//! default so a missing or partial file still yields a usable settings
//! tree; environment variables prefixed `SPEAKDOWN_` override the file.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use speakdown_core::{Error, Result};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Input document to synthesize
    #[serde(default = "default_input_file")]
    pub input_file: String,

    /// Cloud task-API backend parameters
    #[serde(default)]
    pub cloud_tts: CloudTtsConfig,

    /// Direct-stream backend parameters
    #[serde(default)]
    pub edge_tts: EdgeTtsConfig,

    /// Filesystem destinations and merge options
    #[serde(default)]
    pub audio: AudioConfig,

    /// Worker-pool and pacing options
    #[serde(default)]
    pub concurrent: ConcurrentConfig,
}

impl Settings {
    /// Load settings from a YAML file, then apply `SPEAKDOWN_*`
    /// environment overrides (e.g. `SPEAKDOWN_CONCURRENT__MAX_WORKERS`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let settings: Settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("SPEAKDOWN").separator("__"))
            .build()
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
            .try_deserialize()
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings no run can work with. A zero rate limit is
    /// permitted and means "use the backend's recommendation".
    pub fn validate(&self) -> Result<()> {
        if self.concurrent.max_workers == 0 {
            return Err(Error::Config(
                "concurrent.max_workers must be at least 1".into(),
            ));
        }
        if self.concurrent.max_retries == 0 {
            return Err(Error::Config(
                "concurrent.max_retries must be at least 1".into(),
            ));
        }
        if self.audio.final_output.trim().is_empty() {
            return Err(Error::Config("audio.final_output must not be empty".into()));
        }
        if self.audio.temp_dir.trim().is_empty() || self.audio.output_dir.trim().is_empty() {
            return Err(Error::Config(
                "audio.temp_dir and audio.output_dir must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Cloud task-API backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudTtsConfig {
    #[serde(default = "default_secret_placeholder")]
    pub secret_id: String,

    #[serde(default = "default_secret_key_placeholder")]
    pub secret_key: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Numeric voice selector of the cloud service
    #[serde(default = "default_voice_type")]
    pub voice_type: i64,

    #[serde(default = "default_volume")]
    pub volume: i64,

    #[serde(default = "default_speed")]
    pub speed: f64,

    #[serde(default = "default_primary_language")]
    pub primary_language: i64,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Audio codec of the produced fragments; selects validator rules
    #[serde(default = "default_codec")]
    pub codec: String,
}

impl Default for CloudTtsConfig {
    fn default() -> Self {
        Self {
            secret_id: default_secret_placeholder(),
            secret_key: default_secret_key_placeholder(),
            region: default_region(),
            voice_type: default_voice_type(),
            volume: default_volume(),
            speed: default_speed(),
            primary_language: default_primary_language(),
            sample_rate: default_sample_rate(),
            codec: default_codec(),
        }
    }
}

/// Direct-stream backend configuration. Rate and volume are signed
/// percentages ("+10%"), pitch is a signed frequency offset ("+2Hz").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeTtsConfig {
    #[serde(default = "default_edge_voice")]
    pub voice: String,

    #[serde(default = "default_percent")]
    pub rate: String,

    #[serde(default = "default_percent")]
    pub volume: String,

    #[serde(default = "default_pitch")]
    pub pitch: String,
}

impl Default for EdgeTtsConfig {
    fn default() -> Self {
        Self {
            voice: default_edge_voice(),
            rate: default_percent(),
            volume: default_percent(),
            pitch: default_pitch(),
        }
    }
}

/// Filesystem destinations and merge options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,

    #[serde(default = "default_final_output")]
    pub final_output: String,

    /// Seconds of silence between fragments. Accepted for forward
    /// compatibility; the byte-level merge does not apply it.
    #[serde(default = "default_silence_duration")]
    pub silence_duration: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
            final_output: default_final_output(),
            silence_duration: default_silence_duration(),
        }
    }
}

/// Worker-pool and pacing options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConcurrentConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Steady-state synthesize calls per second across the whole pool.
    /// 0 defers to the backend's recommended limit.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    /// Per-fragment attempt ceiling
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Accepted for forward compatibility; the dispatcher enqueues all
    /// fragments up front.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ConcurrentConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            rate_limit: default_rate_limit(),
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_input_file() -> String {
    "input.txt".into()
}
fn default_secret_placeholder() -> String {
    "your_secret_id".into()
}
fn default_secret_key_placeholder() -> String {
    "your_secret_key".into()
}
fn default_region() -> String {
    "ap-beijing".into()
}
fn default_voice_type() -> i64 {
    101008
}
fn default_volume() -> i64 {
    5
}
fn default_speed() -> f64 {
    1.0
}
fn default_primary_language() -> i64 {
    1
}
fn default_sample_rate() -> u32 {
    16000
}
fn default_codec() -> String {
    "mp3".into()
}
fn default_edge_voice() -> String {
    "zh-CN-XiaoyiNeural".into()
}
fn default_percent() -> String {
    "+0%".into()
}
fn default_pitch() -> String {
    "+0Hz".into()
}
fn default_output_dir() -> String {
    "output".into()
}
fn default_temp_dir() -> String {
    "temp".into()
}
fn default_final_output() -> String {
    "merged_audio.mp3".into()
}
fn default_silence_duration() -> f64 {
    0.5
}
fn default_max_workers() -> usize {
    5
}
fn default_rate_limit() -> u32 {
    20
}
fn default_max_retries() -> usize {
    3
}
fn default_batch_size() -> usize {
    10
}
