//! First-run scaffolding
//!
//! Writes a commented config file and a sample input document so a new
//! user can run the pipeline immediately. Existing files are left alone
//! unless overwriting is forced.

use std::fs;
use std::path::Path;

use speakdown_core::Result;

/// Default configuration written by `speakdown init`.
///
/// Kept in sync with the serde defaults; a unit test parses it back and
/// compares against `Settings::default()`.
pub const CONFIG_TEMPLATE: &str = r#"# speakdown configuration

# Document to synthesize (plain text or Markdown)
input_file: input.txt

# Cloud task-API backend (requires credentials)
cloud_tts:
  secret_id: your_secret_id
  secret_key: your_secret_key
  region: ap-beijing
  voice_type: 101008
  volume: 5
  speed: 1.0
  primary_language: 1
  sample_rate: 16000
  codec: mp3

# Direct-stream backend (no credentials needed)
edge_tts:
  voice: zh-CN-XiaoyiNeural
  rate: "+0%"
  volume: "+0%"
  pitch: "+0Hz"

audio:
  output_dir: output
  temp_dir: temp
  final_output: merged_audio.mp3
  silence_duration: 0.5

concurrent:
  max_workers: 5
  rate_limit: 20
  max_retries: 3
  batch_size: 10
"#;

/// Sample input written by `speakdown init`.
pub const SAMPLE_INPUT: &str = r#"欢迎使用语音合成工具！

这是一个文本转语音的示例文件。
支持云端任务接口和流式接口两种引擎。

特殊字符处理示例：
**代理（Agents）**能基于用户输入自主决策执行流程。
\*\*转义字符\*\*也能正确处理。
AI Agent可以automatically处理various任务。

请编辑此文件，添加您要转换的文本内容。
每行文本将被转换为一个音频片段，最后自动合并。
"#;

/// Write the default config file. Returns true when a file was written,
/// false when an existing file was kept.
pub fn scaffold_config(path: impl AsRef<Path>, force: bool) -> Result<bool> {
    write_if_absent(path.as_ref(), CONFIG_TEMPLATE, force)
}

/// Write the sample input document. Same overwrite rules as the config.
pub fn scaffold_sample_input(path: impl AsRef<Path>, force: bool) -> Result<bool> {
    write_if_absent(path.as_ref(), SAMPLE_INPUT, force)
}

fn write_if_absent(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        tracing::info!(path = %path.display(), "file exists, skipping");
        return Ok(false);
    }

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    fs::write(path, content)?;

    tracing::info!(path = %path.display(), "wrote file");
    Ok(true)
}

/// Guard against running with scaffold placeholders still in place.
pub fn is_placeholder(value: &str) -> bool {
    value.is_empty() || value.starts_with("your_secret")
}
