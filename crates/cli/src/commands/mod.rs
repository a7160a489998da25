//! Subcommand implementations

pub mod edge;
pub mod init;
pub mod merge;
pub mod tts;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use speakdown_config::Settings;
use speakdown_core::MergeReport;
use speakdown_pipeline::{AudioCodec, Orchestrator, RunConfig, SynthesisBackend};

/// Load settings, scaffolding a default config first if none exists yet
/// (first-run convenience, matching `init`'s output).
pub(crate) fn load_settings(config_path: &Path) -> anyhow::Result<Settings> {
    if !config_path.exists() {
        tracing::info!(path = %config_path.display(), "no config file, writing defaults");
        speakdown_config::scaffold_config(config_path, false)
            .with_context(|| format!("scaffolding {}", config_path.display()))?;
    }
    Ok(Settings::load(config_path)?)
}

/// Decide between the AST Markdown path and the line-by-line path:
/// an explicit flag always wins, otherwise the input extension decides.
pub(crate) fn markdown_mode(explicit: Option<bool>, input: &Path) -> bool {
    if let Some(choice) = explicit {
        return choice;
    }
    matches!(
        input
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref(),
        Some("md") | Some("markdown")
    )
}

/// Build the run configuration from settings plus flag overrides.
pub(crate) fn run_config(
    settings: &Settings,
    input_override: Option<PathBuf>,
    output_override: Option<PathBuf>,
    codec: AudioCodec,
) -> RunConfig {
    let input_path = input_override.unwrap_or_else(|| PathBuf::from(&settings.input_file));
    let output_dir = output_override.unwrap_or_else(|| PathBuf::from(&settings.audio.output_dir));

    RunConfig {
        input_path,
        output_dir,
        temp_dir: PathBuf::from(&settings.audio.temp_dir),
        final_name: settings.audio.final_output.clone(),
        max_workers: settings.concurrent.max_workers,
        rate_limit: settings.concurrent.rate_limit,
        burst: None,
        max_retries: settings.concurrent.max_retries,
        codec,
    }
}

/// Run the orchestrator with Ctrl-C wired to the run's cancellation
/// token, then report the outcome.
pub(crate) async fn execute_run(
    config: RunConfig,
    backend: Arc<dyn SynthesisBackend>,
    markdown: bool,
) -> anyhow::Result<MergeReport> {
    let output = config.output_dir.join(&config.final_name);
    let orchestrator = Orchestrator::new(config, backend)?;

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight fragments");
            cancel.cancel();
        }
    });

    let report = if markdown {
        orchestrator.process_markdown().await?
    } else {
        orchestrator.process_plain().await?
    };

    println!(
        "merged {} fragments ({} dropped) into {} ({:.2} KiB)",
        report.valid,
        report.invalid,
        output.display(),
        report.bytes_written as f64 / 1024.0
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_drives_markdown_mode() {
        assert!(markdown_mode(None, Path::new("doc.md")));
        assert!(markdown_mode(None, Path::new("doc.MARKDOWN")));
        assert!(!markdown_mode(None, Path::new("doc.txt")));
        assert!(!markdown_mode(None, Path::new("doc")));
    }

    #[test]
    fn explicit_flag_overrides_extension() {
        assert!(markdown_mode(Some(true), Path::new("doc.txt")));
        assert!(!markdown_mode(Some(false), Path::new("doc.md")));
    }

    #[test]
    fn overrides_replace_settings_paths() {
        let settings = Settings::default();
        let config = run_config(
            &settings,
            Some(PathBuf::from("book.txt")),
            Some(PathBuf::from("/tmp/out")),
            AudioCodec::Mp3,
        );
        assert_eq!(config.input_path, PathBuf::from("book.txt"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.final_name, "merged_audio.mp3");
    }
}
