//! speakdown command line interface

mod commands;

use clap::{Parser, Subcommand};

use commands::{edge::EdgeArgs, init::InitArgs, merge::MergeArgs, tts::TtsArgs};

#[derive(Debug, Parser)]
#[command(
    name = "speakdown",
    version,
    about = "Convert text and Markdown documents into a single merged speech audio file",
    long_about = "Convert text and Markdown documents into a single merged speech audio file.\n\n\
        Documents are split into speakable fragments, synthesized concurrently\n\
        under a rate budget, validated, and byte-merged in source order.\n\n\
        Quick start:\n  \
        speakdown init                 # scaffold config.yaml and input.txt\n  \
        speakdown edge -i input.txt    # free streaming engine, no credentials\n  \
        speakdown tts -i input.txt     # cloud task engine (needs credentials)\n  \
        speakdown edge --list zh       # list Chinese voices"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scaffold the config file and a sample input document
    Init(InitArgs),
    /// Run the pipeline with the cloud task backend
    Tts(TtsArgs),
    /// Run the pipeline with the direct-stream backend
    Edge(EdgeArgs),
    /// Concatenate existing audio files from a directory
    Merge(MergeArgs),
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "speakdown=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Tts(args) => commands::tts::run(args).await,
        Commands::Edge(args) => commands::edge::run(args).await,
        Commands::Merge(args) => commands::merge::run(args),
    }
}
