//! Configuration for the speakdown pipeline
//!
//! YAML settings with serde-level defaults, environment overrides, and
//! the first-run scaffolding used by `speakdown init`.

pub mod init;
mod settings;

pub use init::{is_placeholder, scaffold_config, scaffold_sample_input};
pub use settings::{
    AudioConfig, CloudTtsConfig, ConcurrentConfig, EdgeTtsConfig, Settings,
};
