//! Direct-stream backend
//!
//! Speaks the Edge read-aloud websocket protocol: one duplex connection
//! per fragment, a JSON synthesis-config message, an SSML message with
//! voice/rate/volume/pitch, then binary audio frames until the server
//! signals the end of the turn. No credentials are required.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;

use speakdown_config::EdgeTtsConfig;
use speakdown_core::{Error, Result};

use crate::backend::{fragment_filename, SynthesisBackend};
use crate::validator::AudioCodec;

const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";
const WSS_ENDPOINT: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";
const VOICES_ENDPOINT: &str =
    "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list";
const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_VOICE: &str = "zh-CN-XiaoyiNeural";
const DEFAULT_RATE: &str = "+0%";
const DEFAULT_VOLUME: &str = "+0%";
const DEFAULT_PITCH: &str = "+0Hz";

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Backend streaming audio over a duplex websocket.
pub struct EdgeStreamBackend {
    config: EdgeTtsConfig,
    temp_dir: PathBuf,
    codec: AudioCodec,
}

impl EdgeStreamBackend {
    /// The stream service always produces MP3 frames.
    pub fn new(config: EdgeTtsConfig, temp_dir: PathBuf) -> Self {
        Self {
            config,
            temp_dir,
            codec: AudioCodec::Mp3,
        }
    }

    fn voice(&self) -> &str {
        non_empty_or(&self.config.voice, DEFAULT_VOICE)
    }

    fn build_ssml(&self, text: &str) -> String {
        let rate = non_empty_or(&self.config.rate, DEFAULT_RATE);
        let volume = non_empty_or(&self.config.volume, DEFAULT_VOLUME);
        let pitch = non_empty_or(&self.config.pitch, DEFAULT_PITCH);

        format!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='en-US'>\
             <voice name='{}'><prosody pitch='{}' rate='{}' volume='{}'>{}</prosody></voice></speak>",
            self.voice(),
            pitch,
            rate,
            volume,
            escape_xml(text),
        )
    }

    /// Drive one synthesis turn and return the raw audio bytes.
    async fn stream_audio(&self, cancel: &CancellationToken, text: &str) -> Result<Vec<u8>> {
        let request_id = next_request_id();
        let url = format!(
            "{WSS_ENDPOINT}?TrustedClientToken={TRUSTED_CLIENT_TOKEN}&ConnectionId={request_id}"
        );
        let request = url
            .into_client_request()
            .map_err(|e| Error::Transport(format!("build request: {e}")))?;

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| Error::Transport(format!("connect: {e}")))?;
        let (mut write, mut read) = ws.split();

        let timestamp = unix_timestamp();
        let config_message = format!(
            "X-Timestamp:{timestamp}\r\n\
             Content-Type:application/json; charset=utf-8\r\n\
             Path:speech.config\r\n\r\n\
             {{\"context\":{{\"synthesis\":{{\"audio\":{{\"metadataoptions\":\
             {{\"sentenceBoundaryEnabled\":\"false\",\"wordBoundaryEnabled\":\"false\"}},\
             \"outputFormat\":\"{OUTPUT_FORMAT}\"}}}}}}}}"
        );
        write
            .send(Message::Text(config_message))
            .await
            .map_err(|e| Error::Transport(format!("send config: {e}")))?;

        let ssml_message = format!(
            "X-RequestId:{request_id}\r\n\
             Content-Type:application/ssml+xml\r\n\
             X-Timestamp:{timestamp}\r\n\
             Path:ssml\r\n\r\n{}",
            self.build_ssml(text)
        );
        write
            .send(Message::Text(ssml_message))
            .await
            .map_err(|e| Error::Transport(format!("send ssml: {e}")))?;

        let mut audio = Vec::new();
        let deadline = tokio::time::Instant::now() + RECEIVE_TIMEOUT;

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(Error::Timeout("no end-of-turn within receive window".into()));
                }
                frame = read.next() => frame,
            };

            let Some(frame) = frame else {
                return Err(Error::Protocol("connection closed before turn end".into()));
            };
            let frame = frame.map_err(|e| Error::Transport(format!("receive: {e}")))?;

            match frame {
                Message::Text(payload) => {
                    if payload.contains("Path:turn.end") {
                        break;
                    }
                    // turn.start / response / audio.metadata frames carry
                    // no audio.
                }
                Message::Binary(payload) => {
                    if let Some(chunk) = extract_audio_payload(&payload) {
                        audio.extend_from_slice(chunk);
                    }
                }
                Message::Close(_) => {
                    return Err(Error::Protocol("connection closed before turn end".into()));
                }
                _ => {}
            }
        }

        if audio.is_empty() {
            return Err(Error::Protocol("turn ended without audio frames".into()));
        }
        Ok(audio)
    }
}

#[async_trait]
impl SynthesisBackend for EdgeStreamBackend {
    async fn synthesize(
        &self,
        cancel: &CancellationToken,
        text: &str,
        index: usize,
    ) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let audio = self.stream_audio(cancel, text).await?;

        let path = self.temp_dir.join(fragment_filename(index, &self.codec));
        std::fs::write(&path, &audio)?;
        tracing::debug!(index, bytes = audio.len(), path = %path.display(), "stream complete");
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "edge-stream"
    }

    fn validate_config(&self) -> Result<()> {
        // No credentials; an empty voice falls back to the default.
        Ok(())
    }

    fn max_text_length(&self) -> usize {
        1000
    }

    fn recommended_rate_limit(&self) -> u32 {
        10
    }

    fn retry_backoff(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// One entry of the provider's voice catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceInfo {
    #[serde(rename = "ShortName")]
    pub short_name: String,
    #[serde(rename = "Locale")]
    pub locale: String,
    #[serde(rename = "Gender", default)]
    pub gender: String,
}

/// Fetch the voice catalog, optionally filtered by locale prefix
/// ("zh", "en-US", ...). The filter is case-insensitive.
pub async fn list_voices(filter: Option<&str>) -> Result<Vec<VoiceInfo>> {
    let url = format!("{VOICES_ENDPOINT}?trustedclienttoken={TRUSTED_CLIENT_TOKEN}");

    let response = reqwest::get(&url)
        .await
        .map_err(|e| Error::Transport(format!("voice list: {e}")))?;
    if !response.status().is_success() {
        return Err(Error::Protocol(format!(
            "voice list: http {}",
            response.status()
        )));
    }

    let mut voices: Vec<VoiceInfo> = response
        .json()
        .await
        .map_err(|e| Error::Protocol(format!("voice list response: {e}")))?;

    if let Some(filter) = filter {
        let filter = filter.to_lowercase();
        voices.retain(|v| v.locale.to_lowercase().starts_with(&filter));
    }

    voices.sort_by(|a, b| a.short_name.cmp(&b.short_name));
    Ok(voices)
}

/// Binary frames carry a big-endian header length, the header text, then
/// the payload. Only `Path:audio` frames contain playable bytes.
fn extract_audio_payload(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 2 {
        return None;
    }
    let header_len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    if frame.len() < 2 + header_len {
        return None;
    }
    let header = std::str::from_utf8(&frame[2..2 + header_len]).ok()?;
    if !header.contains("Path:audio") {
        return None;
    }
    Some(&frame[2 + header_len..])
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Connection ids must be unique per request; a timestamp plus a process
/// counter is enough without pulling in a uuid dependency.
fn next_request_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed) as u128;
    format!("{:032x}", nanos ^ (count << 96))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_payload_extraction() {
        let header = b"Path:audio\r\n";
        let mut frame = (header.len() as u16).to_be_bytes().to_vec();
        frame.extend_from_slice(header);
        frame.extend_from_slice(b"AUDIODATA");
        assert_eq!(extract_audio_payload(&frame), Some(&b"AUDIODATA"[..]));
    }

    #[test]
    fn non_audio_frames_ignored() {
        let header = b"Path:metadata\r\n";
        let mut frame = (header.len() as u16).to_be_bytes().to_vec();
        frame.extend_from_slice(header);
        frame.extend_from_slice(b"{}");
        assert_eq!(extract_audio_payload(&frame), None);

        assert_eq!(extract_audio_payload(&[0x01]), None);
        assert_eq!(extract_audio_payload(&[0x00, 0xFF, b'x']), None);
    }

    #[test]
    fn ssml_uses_config_and_escapes_text() {
        let backend = EdgeStreamBackend::new(
            EdgeTtsConfig {
                voice: "en-US-AriaNeural".into(),
                rate: "+20%".into(),
                volume: "-10%".into(),
                pitch: "+5Hz".into(),
            },
            std::env::temp_dir(),
        );
        let ssml = backend.build_ssml("a < b & c");
        assert!(ssml.contains("name='en-US-AriaNeural'"));
        assert!(ssml.contains("rate='+20%'"));
        assert!(ssml.contains("volume='-10%'"));
        assert!(ssml.contains("pitch='+5Hz'"));
        assert!(ssml.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn blank_parameters_fall_back_to_defaults() {
        let backend = EdgeStreamBackend::new(
            EdgeTtsConfig {
                voice: "".into(),
                rate: " ".into(),
                volume: "".into(),
                pitch: "".into(),
            },
            std::env::temp_dir(),
        );
        let ssml = backend.build_ssml("hi");
        assert!(ssml.contains(DEFAULT_VOICE));
        assert!(ssml.contains("rate='+0%'"));
        assert!(ssml.contains("pitch='+0Hz'"));
    }

    #[test]
    fn request_ids_are_unique_and_hex() {
        let a = next_request_id();
        let b = next_request_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn provider_limits() {
        let backend = EdgeStreamBackend::new(EdgeTtsConfig::default(), std::env::temp_dir());
        assert_eq!(backend.max_text_length(), 1000);
        assert_eq!(backend.recommended_rate_limit(), 10);
        assert_eq!(backend.retry_backoff(), Duration::from_secs(1));
        assert!(backend.validate_config().is_ok());
    }
}
