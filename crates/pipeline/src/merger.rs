//! Ordered byte-concatenation of fragment audio
//!
//! Two entry points: the run merge consuming dispatcher results, and a
//! standalone directory merge used by the `merge` command. Neither
//! re-encodes anything; fragments must share a codec.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use speakdown_core::{Error, MergeReport, Result, SynthesisResult};

use crate::validator::{AudioCodec, AudioValidator};

/// File extensions the directory merge picks up.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg"];

/// Merges validated fragments into one output stream.
#[derive(Debug, Clone)]
pub struct Merger {
    codec: AudioCodec,
}

impl Merger {
    pub fn new(codec: AudioCodec) -> Self {
        Self { codec }
    }

    /// Concatenate the successful results, ascending by index, into
    /// `output_path`. Every file is revalidated first; files that have
    /// become invalid since synthesis are dropped (and deleted by the
    /// validator). Fails only when nothing valid remains.
    pub fn merge(&self, results: &[SynthesisResult], output_path: &Path) -> Result<MergeReport> {
        let mut successes: Vec<(usize, &PathBuf)> = results
            .iter()
            .filter(|r| r.is_ok())
            .filter_map(|r| r.audio_path.as_ref().map(|p| (r.index, p)))
            .collect();
        successes.sort_by_key(|(index, _)| *index);

        let total = successes.len();
        let mut valid: Vec<&PathBuf> = Vec::with_capacity(total);
        let mut invalid = 0usize;

        for (index, path) in successes {
            match AudioValidator::validate(path, &self.codec) {
                Ok(()) => valid.push(path),
                Err(e) => {
                    tracing::warn!(index, error = %e, "dropping fragment at merge time");
                    invalid += 1;
                }
            }
        }

        if valid.is_empty() {
            return Err(Error::EmptyMerge);
        }

        if let Some(dir) = output_path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let mut output = fs::File::create(output_path)?;
        let mut bytes_written = 0u64;

        for (i, path) in valid.iter().enumerate() {
            tracing::debug!(
                file = %path.display(),
                position = i + 1,
                of = valid.len(),
                "merging fragment"
            );
            let mut input = fs::File::open(path)?;
            bytes_written += io::copy(&mut input, &mut output)?;
        }

        let report = MergeReport {
            total,
            valid: valid.len(),
            invalid,
            bytes_written,
        };
        tracing::info!(
            output = %output_path.display(),
            total = report.total,
            valid = report.valid,
            invalid = report.invalid,
            bytes = report.bytes_written,
            "merge complete"
        );
        Ok(report)
    }
}

/// One audio file discovered by the directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFileEntry {
    pub path: PathBuf,
    pub name: String,
    /// Longest digit run in the basename; None sorts to the tail.
    pub number: Option<u64>,
}

/// Recursively collect audio files under `dir` by extension.
pub fn scan_audio_files(dir: &Path) -> Result<Vec<AudioFileEntry>> {
    let mut entries = Vec::new();
    collect_audio_files(dir, &mut entries)?;
    Ok(entries)
}

fn collect_audio_files(dir: &Path, out: &mut Vec<AudioFileEntry>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            collect_audio_files(&path, out)?;
            continue;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        let Some(ext) = ext else { continue };
        if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let number = digit_run_key(&name);
        out.push(AudioFileEntry { path, name, number });
    }
    Ok(())
}

/// Sort key for merge ordering: the longest digit run in the basename
/// (extension removed). The leftmost run wins a length tie inside one
/// name; names without digits yield None.
pub fn digit_run_key(filename: &str) -> Option<u64> {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);

    let mut best: Option<&str> = None;
    let mut run_start: Option<usize> = None;

    for (i, c) in stem.char_indices() {
        if c.is_ascii_digit() {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            let run = &stem[start..i];
            if best.map_or(true, |b| run.len() > b.len()) {
                best = Some(run);
            }
        }
    }
    if let Some(start) = run_start {
        let run = &stem[start..];
        if best.map_or(true, |b| run.len() > b.len()) {
            best = Some(run);
        }
    }

    best.and_then(|run| run.parse().ok())
}

/// Order scanned files for merging: numeric key ascending, ties broken
/// by the whole basename, digitless names last.
pub fn sort_audio_files(files: &mut [AudioFileEntry]) {
    files.sort_by(|a, b| {
        let ka = a.number.unwrap_or(u64::MAX);
        let kb = b.number.unwrap_or(u64::MAX);
        ka.cmp(&kb).then_with(|| a.name.cmp(&b.name))
    });
}

/// Merge every audio file in a directory into `output_path`, ordered by
/// the digit-run rule. Files failing validation are skipped (but not
/// deleted: the inputs belong to the user, not to a synthesis run).
pub fn merge_directory(
    input_dir: &Path,
    output_path: &Path,
    codec: &AudioCodec,
) -> Result<MergeReport> {
    if !input_dir.is_dir() {
        return Err(Error::Config(format!(
            "input directory does not exist: {}",
            input_dir.display()
        )));
    }

    let mut files = scan_audio_files(input_dir)?;
    if files.is_empty() {
        return Err(Error::EmptyMerge);
    }
    sort_audio_files(&mut files);

    tracing::info!(count = files.len(), dir = %input_dir.display(), "merging directory");

    if let Some(dir) = output_path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let total = files.len();
    let mut output = fs::File::create(output_path)?;
    let mut bytes_written = 0u64;
    let mut valid = 0usize;
    let mut invalid = 0usize;

    for file in &files {
        let check = check_header(&file.path, codec);
        if let Err(e) = check {
            tracing::warn!(file = %file.name, error = %e, "skipping invalid audio file");
            invalid += 1;
            continue;
        }

        let mut input = fs::File::open(&file.path)?;
        bytes_written += io::copy(&mut input, &mut output)?;
        valid += 1;
    }

    if valid == 0 {
        return Err(Error::EmptyMerge);
    }

    let report = MergeReport {
        total,
        valid,
        invalid,
        bytes_written,
    };
    tracing::info!(
        output = %output_path.display(),
        valid = report.valid,
        invalid = report.invalid,
        bytes = report.bytes_written,
        "directory merge complete"
    );
    Ok(report)
}

/// Non-destructive variant of the fragment validation used for
/// user-supplied files.
fn check_header(path: &Path, codec: &AudioCodec) -> Result<()> {
    use std::io::Read;

    let meta = fs::metadata(path).map_err(|e| Error::Validation(format!("{}: {e}", path.display())))?;
    if meta.len() < 1024 {
        return Err(Error::Validation(format!(
            "{}: file too small ({} bytes)",
            path.display(),
            meta.len()
        )));
    }

    let mut header = [0u8; 12];
    let read = fs::File::open(path)
        .and_then(|mut f| f.read(&mut header))
        .map_err(|e| Error::Validation(format!("{}: {e}", path.display())))?;

    let ok = match codec {
        AudioCodec::Mp3 => {
            read >= 3
                && (&header[..3] == b"ID3" || (header[0] == 0xFF && (header[1] & 0xF0) == 0xF0))
        }
        AudioCodec::Wav => read >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WAVE",
        AudioCodec::Flac => read >= 4 && &header[..4] == b"fLaC",
        AudioCodec::Ogg => read >= 4 && &header[..4] == b"OggS",
        AudioCodec::M4a | AudioCodec::Aac | AudioCodec::Other(_) => read >= 8,
    };

    if ok {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{}: header does not match {codec} format",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp3_bytes(tag: &str) -> Vec<u8> {
        let mut bytes = b"ID3\x04\x00".to_vec();
        bytes.resize(1200, 0);
        bytes.extend_from_slice(tag.as_bytes());
        bytes
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn merge_concatenates_in_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![
            SynthesisResult::ok(2, write(dir.path(), "audio_002.mp3", &mp3_bytes("C"))),
            SynthesisResult::ok(0, write(dir.path(), "audio_000.mp3", &mp3_bytes("A"))),
            SynthesisResult::ok(1, write(dir.path(), "audio_001.mp3", &mp3_bytes("B"))),
        ];

        let output = dir.path().join("merged.mp3");
        let report = Merger::new(AudioCodec::Mp3).merge(&results, &output).unwrap();

        assert_eq!(report.valid, 3);
        let merged = fs::read(&output).unwrap();
        let a = find(&merged, b"A");
        let b = find(&merged, b"B");
        let c = find(&merged, b"C");
        assert!(a < b && b < c);
        assert_eq!(report.bytes_written, merged.len() as u64);
    }

    #[test]
    fn failed_results_are_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![
            SynthesisResult::ok(0, write(dir.path(), "audio_000.mp3", &mp3_bytes("A"))),
            SynthesisResult::failed(1, Error::Transport("gone".into())),
            SynthesisResult::ok(2, write(dir.path(), "audio_002.mp3", &mp3_bytes("C"))),
        ];

        let output = dir.path().join("merged.mp3");
        let report = Merger::new(AudioCodec::Mp3).merge(&results, &output).unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.valid, 2);
        let merged = fs::read(&output).unwrap();
        assert!(find(&merged, b"A") < find(&merged, b"C"));
    }

    #[test]
    fn invalid_file_dropped_and_deleted_at_merge_time() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "audio_000.mp3", &mp3_bytes("A"));
        let bad = write(dir.path(), "audio_001.mp3", b"short");

        let results = vec![
            SynthesisResult::ok(0, good),
            SynthesisResult::ok(1, bad.clone()),
        ];

        let output = dir.path().join("merged.mp3");
        let report = Merger::new(AudioCodec::Mp3).merge(&results, &output).unwrap();

        assert_eq!(report.valid, 1);
        assert_eq!(report.invalid, 1);
        assert!(!bad.exists());

        let merged = fs::read(&output).unwrap();
        assert!(!contains(&merged, b"short"));
    }

    #[test]
    fn all_failed_is_empty_merge() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![
            SynthesisResult::failed(0, Error::Transport("a".into())),
            SynthesisResult::failed(1, Error::Timeout("b".into())),
        ];

        let err = Merger::new(AudioCodec::Mp3)
            .merge(&results, &dir.path().join("merged.mp3"))
            .unwrap_err();
        assert!(matches!(err, Error::EmptyMerge));
    }

    #[test]
    fn digit_run_extraction() {
        assert_eq!(digit_run_key("audio_001.mp3"), Some(1));
        assert_eq!(digit_run_key("audio_010.mp3"), Some(10));
        assert_eq!(digit_run_key("sound10.wav"), Some(10));
        // The longest run wins, not the first.
        assert_eq!(digit_run_key("take2_part0042.mp3"), Some(42));
        assert_eq!(digit_run_key("no_digits.mp3"), None);
    }

    #[test]
    fn sort_order_number_then_name_then_digitless() {
        let entry = |name: &str| AudioFileEntry {
            path: PathBuf::from(name),
            name: name.to_string(),
            number: digit_run_key(name),
        };
        let mut files = vec![
            entry("z_no_digits.mp3"),
            entry("audio_010.mp3"),
            entry("audio_002.mp3"),
            entry("b_5.mp3"),
            entry("a_5.mp3"),
        ];
        sort_audio_files(&mut files);

        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "audio_002.mp3",
                "a_5.mp3",
                "b_5.mp3",
                "audio_010.mp3",
                "z_no_digits.mp3",
            ]
        );
    }

    #[test]
    fn directory_merge_orders_and_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "part_2.mp3", &mp3_bytes("TWO"));
        write(dir.path(), "part_1.mp3", &mp3_bytes("ONE"));
        write(dir.path(), "part_3.mp3", b"bogus");
        write(dir.path(), "notes.txt", b"not audio at all");

        let output = dir.path().join("out").join("merged.mp3");
        let report = merge_directory(dir.path(), &output, &AudioCodec::Mp3).unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.valid, 2);
        assert_eq!(report.invalid, 1);
        // User files are never deleted by the directory merge.
        assert!(dir.path().join("part_3.mp3").exists());

        let merged = fs::read(&output).unwrap();
        assert!(find(&merged, b"ONE") < find(&merged, b"TWO"));
    }

    #[test]
    fn directory_merge_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = merge_directory(dir.path(), &dir.path().join("out.mp3"), &AudioCodec::Mp3)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyMerge));
    }

    fn find(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .position(|w| w == needle)
            .expect("needle present")
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }
}
