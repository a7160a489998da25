//! `speakdown tts` — pipeline run with the cloud task backend

use std::path::PathBuf;

use clap::Args;

use speakdown_pipeline::{create_backend, AudioCodec, BackendChoice};

use super::{execute_run, load_settings, markdown_mode, run_config};

#[derive(Debug, Args)]
pub struct TtsArgs {
    /// Config file path
    #[arg(short = 'c', long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Input document (overrides the config file)
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Output directory (overrides the config file)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Force the AST Markdown path on or off; without the flag,
    /// .md/.markdown inputs enable it automatically
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub smart_markdown: Option<bool>,
}

pub async fn run(args: TtsArgs) -> anyhow::Result<()> {
    let settings = load_settings(&args.config)?;

    let codec = AudioCodec::from_name(&settings.cloud_tts.codec);
    let config = run_config(&settings, args.input, args.output, codec);

    let markdown = markdown_mode(args.smart_markdown, &config.input_path);
    tracing::info!(
        input = %config.input_path.display(),
        output = %config.output_dir.display(),
        markdown,
        "cloud task synthesis starting"
    );

    let backend = create_backend(
        BackendChoice::CloudTask,
        &settings,
        config.temp_dir.clone(),
    )?;
    execute_run(config, backend, markdown).await?;
    Ok(())
}
