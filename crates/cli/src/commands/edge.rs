//! `speakdown edge` — pipeline run with the direct-stream backend,
//! plus voice-catalog listing

use std::path::PathBuf;

use clap::Args;

use speakdown_pipeline::{create_backend, list_voices, AudioCodec, BackendChoice};

use super::{execute_run, load_settings, markdown_mode, run_config};

#[derive(Debug, Args)]
pub struct EdgeArgs {
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

    /// Voice to use (e.g. zh-CN-YunyangNeural)
    #[arg(long)]
    pub voice: Option<String>,

    /// Speaking rate (e.g. +20%, -10%)
    #[arg(long)]
    pub rate: Option<String>,

    /// Volume (e.g. +10%, -20%)
    #[arg(long)]
    pub volume: Option<String>,

    /// Pitch (e.g. +10Hz, -5Hz)
    #[arg(long)]
    pub pitch: Option<String>,

    /// List voices for a language prefix (zh, en, ja, ...)
    #[arg(long, value_name = "LANG")]
    pub list: Option<String>,

    /// List every available voice
    #[arg(long)]
    pub list_all: bool,
}

pub async fn run(args: EdgeArgs) -> anyhow::Result<()> {
    if args.list_all || args.list.is_some() {
        return print_voices(args.list.as_deref()).await;
    }

    let mut settings = load_settings(&args.config)?;
    if let Some(voice) = args.voice {
        settings.edge_tts.voice = voice;
    }
    if let Some(rate) = args.rate {
        settings.edge_tts.rate = rate;
    }
    if let Some(volume) = args.volume {
        settings.edge_tts.volume = volume;
    }
    if let Some(pitch) = args.pitch {
        settings.edge_tts.pitch = pitch;
    }

    // The stream service emits MP3 regardless of the cloud codec setting.
    let config = run_config(&settings, args.input, args.output, AudioCodec::Mp3);

    let markdown = markdown_mode(args.smart_markdown, &config.input_path);
    tracing::info!(
        input = %config.input_path.display(),
        output = %config.output_dir.display(),
        voice = %settings.edge_tts.voice,
        markdown,
        "stream synthesis starting"
    );

    let backend = create_backend(
        BackendChoice::EdgeStream,
        &settings,
        config.temp_dir.clone(),
    )?;
    execute_run(config, backend, markdown).await?;
    Ok(())
}

async fn print_voices(filter: Option<&str>) -> anyhow::Result<()> {
    let voices = list_voices(filter).await?;
    if voices.is_empty() {
        anyhow::bail!(
            "no voices match '{}'",
            filter.unwrap_or_default()
        );
    }

    println!("{:<42} {:<10} {}", "voice", "locale", "gender");
    println!("{:-<42} {:-<10} {:-<8}", "", "", "");
    for voice in &voices {
        println!(
            "{:<42} {:<10} {}",
            voice.short_name, voice.locale, voice.gender
        );
    }

    println!();
    println!("usage:");
    println!("  speakdown edge -i input.txt --voice {}", voices[0].short_name);
    println!("  speakdown edge -i input.txt --rate +20% --volume +10%");
    Ok(())
}
