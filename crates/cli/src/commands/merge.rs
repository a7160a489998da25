//! `speakdown merge` — concatenate existing audio files from a directory
//!
//! Files are ordered by the longest digit run in their basename
//! (audio_001.mp3, sound2.wav, ...); name order breaks ties and files
//! without digits go last.

use std::path::PathBuf;

use clap::Args;

use speakdown_pipeline::{merge_directory, AudioCodec};

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Directory containing the audio files
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Merged output file
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Codec of the input files, for header validation
    #[arg(long, default_value = "mp3")]
    pub format: String,
}

pub fn run(args: MergeArgs) -> anyhow::Result<()> {
    let codec = AudioCodec::from_name(&args.format);
    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        codec = %codec,
        "directory merge starting"
    );

    let report = merge_directory(&args.input, &args.output, &codec)?;

    println!(
        "merged {} of {} files into {} ({:.2} KiB, {} skipped)",
        report.valid,
        report.total,
        args.output.display(),
        report.bytes_written as f64 / 1024.0,
        report.invalid
    );
    Ok(())
}
