//! Post-synthesis audio file validation
//!
//! A fragment file may only enter the merge if it exists, is at least
//! 1 KiB, and its leading bytes match the codec's header rule. Files
//! that fail are deleted so a failed attempt never leaves artifacts.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use speakdown_core::{Error, Result};

/// Minimum plausible fragment size; anything smaller is an empty or
/// truncated synthesis response.
const MIN_FILE_SIZE: u64 = 1024;

/// Audio codec of the fragment files, selecting the header rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCodec {
    Mp3,
    Wav,
    Flac,
    Ogg,
    M4a,
    Aac,
    /// Unrecognized codec: size check only
    Other(String),
}

impl AudioCodec {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "mp3" => AudioCodec::Mp3,
            "wav" => AudioCodec::Wav,
            "flac" => AudioCodec::Flac,
            "ogg" => AudioCodec::Ogg,
            "m4a" => AudioCodec::M4a,
            "aac" => AudioCodec::Aac,
            other => AudioCodec::Other(other.to_string()),
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Wav => "wav",
            AudioCodec::Flac => "flac",
            AudioCodec::Ogg => "ogg",
            AudioCodec::M4a => "m4a",
            AudioCodec::Aac => "aac",
            AudioCodec::Other(name) => name,
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Header and size checks for per-fragment audio files.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioValidator;

impl AudioValidator {
    /// Check one fragment file. On failure the file is deleted before
    /// the error is returned.
    pub fn validate(path: &Path, codec: &AudioCodec) -> Result<()> {
        let meta = fs::metadata(path)
            .map_err(|e| Error::Validation(format!("{}: {e}", path.display())))?;

        if !meta.is_file() {
            return Err(Error::Validation(format!(
                "{}: not a regular file",
                path.display()
            )));
        }

        if meta.len() < MIN_FILE_SIZE {
            return Self::reject(path, format!("file too small ({} bytes)", meta.len()));
        }

        let mut header = [0u8; 12];
        let read = {
            let mut file = fs::File::open(path)
                .map_err(|e| Error::Validation(format!("{}: {e}", path.display())))?;
            file.read(&mut header)
                .map_err(|e| Error::Validation(format!("{}: {e}", path.display())))?
        };

        let ok = match codec {
            AudioCodec::Mp3 => {
                read >= 3
                    && (&header[..3] == b"ID3"
                        || (header[0] == 0xFF && (header[1] & 0xF0) == 0xF0))
            }
            AudioCodec::Wav => read >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WAVE",
            AudioCodec::Flac => read >= 4 && &header[..4] == b"fLaC",
            AudioCodec::Ogg => read >= 4 && &header[..4] == b"OggS",
            // Containers without a fixed magic: size check only
            AudioCodec::M4a | AudioCodec::Aac | AudioCodec::Other(_) => read >= 8,
        };

        if ok {
            tracing::debug!(path = %path.display(), codec = %codec, size = meta.len(), "audio file valid");
            Ok(())
        } else {
            Self::reject(path, format!("header does not match {codec} format"))
        }
    }

    fn reject(path: &Path, reason: String) -> Result<()> {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete invalid audio file");
        }
        Err(Error::Validation(format!("{}: {reason}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    fn padded(header: &[u8]) -> Vec<u8> {
        let mut bytes = header.to_vec();
        bytes.resize(1500, 0);
        bytes
    }

    #[test]
    fn mp3_id3_header_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.mp3", &padded(b"ID3\x04\x00"));
        assert!(AudioValidator::validate(&path, &AudioCodec::Mp3).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn mp3_frame_sync_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.mp3", &padded(&[0xFF, 0xFB, 0x90, 0x00]));
        assert!(AudioValidator::validate(&path, &AudioCodec::Mp3).is_ok());
    }

    #[test]
    fn mp3_wrong_header_rejected_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.mp3", &padded(b"JUNK"));
        let err = AudioValidator::validate(&path, &AudioCodec::Mp3).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!path.exists());
    }

    #[test]
    fn small_file_rejected_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.mp3", b"ID3 tiny");
        assert!(AudioValidator::validate(&path, &AudioCodec::Mp3).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.mp3");
        assert!(AudioValidator::validate(&path, &AudioCodec::Mp3).is_err());
    }

    #[test]
    fn wav_header_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut header = Vec::new();
        header.extend_from_slice(b"RIFF");
        header.extend_from_slice(&[0x24, 0x00, 0x00, 0x00]);
        header.extend_from_slice(b"WAVE");
        let path = write_file(&dir, "a.wav", &padded(&header));
        assert!(AudioValidator::validate(&path, &AudioCodec::Wav).is_ok());

        let bad = write_file(&dir, "b.wav", &padded(b"RIFFxxxxNOPE"));
        assert!(AudioValidator::validate(&bad, &AudioCodec::Wav).is_err());
    }

    #[test]
    fn flac_and_ogg_magics() {
        let dir = tempfile::tempdir().unwrap();
        let flac = write_file(&dir, "a.flac", &padded(b"fLaC"));
        assert!(AudioValidator::validate(&flac, &AudioCodec::Flac).is_ok());

        let ogg = write_file(&dir, "a.ogg", &padded(b"OggS"));
        assert!(AudioValidator::validate(&ogg, &AudioCodec::Ogg).is_ok());
    }

    #[test]
    fn unknown_codec_size_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.opus", &padded(b"anything"));
        assert!(AudioValidator::validate(&path, &AudioCodec::Other("opus".into())).is_ok());
    }

    #[test]
    fn codec_parsing_round_trip() {
        assert_eq!(AudioCodec::from_name("MP3"), AudioCodec::Mp3);
        assert_eq!(AudioCodec::from_name("wav").extension(), "wav");
        assert_eq!(
            AudioCodec::from_name("opus"),
            AudioCodec::Other("opus".into())
        );
    }
}
