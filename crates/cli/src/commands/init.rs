//! `speakdown init` — first-run scaffolding

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use speakdown_config::{scaffold_config, scaffold_sample_input};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Config file to write
    #[arg(short = 'c', long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Sample input file to write
    #[arg(short = 'i', long, default_value = "input.txt")]
    pub input: PathBuf,

    /// Overwrite existing files
    #[arg(short = 'f', long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    let wrote_config = scaffold_config(&args.config, args.force)
        .with_context(|| format!("writing {}", args.config.display()))?;
    println!(
        "{} {}",
        if wrote_config { "wrote" } else { "kept" },
        args.config.display()
    );

    let wrote_input = scaffold_sample_input(&args.input, args.force)
        .with_context(|| format!("writing {}", args.input.display()))?;
    println!(
        "{} {}",
        if wrote_input { "wrote" } else { "kept" },
        args.input.display()
    );

    println!();
    println!("next steps:");
    println!("  1. edit {} (cloud credentials are only needed for `tts`)", args.config.display());
    println!("  2. put your text into {}", args.input.display());
    println!("  3. run: speakdown edge -i {}", args.input.display());
    Ok(())
}
