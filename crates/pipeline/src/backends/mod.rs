//! Concrete synthesis backends and their factory

mod cloud;
mod edge;

pub use cloud::CloudTaskBackend;
pub use edge::{list_voices, EdgeStreamBackend, VoiceInfo};

use std::path::PathBuf;
use std::sync::Arc;

use speakdown_config::Settings;
use speakdown_core::{Error, Result};

use crate::backend::SynthesisBackend;

/// Which backend a run instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    CloudTask,
    EdgeStream,
}

impl BackendChoice {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "cloud" | "cloud-task" | "cloudtask" => Ok(BackendChoice::CloudTask),
            "edge" | "edge-stream" | "edgetts" => Ok(BackendChoice::EdgeStream),
            other => Err(Error::Config(format!("unsupported backend: {other}"))),
        }
    }
}

/// Build the chosen backend from settings. Fragment files are written
/// under `temp_dir`.
pub fn create_backend(
    choice: BackendChoice,
    settings: &Settings,
    temp_dir: PathBuf,
) -> Result<Arc<dyn SynthesisBackend>> {
    match choice {
        BackendChoice::CloudTask => {
            let backend = CloudTaskBackend::new(settings.cloud_tts.clone(), temp_dir)?;
            Ok(Arc::new(backend))
        }
        BackendChoice::EdgeStream => {
            let backend = EdgeStreamBackend::new(settings.edge_tts.clone(), temp_dir);
            Ok(Arc::new(backend))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_parsing() {
        assert_eq!(BackendChoice::parse("edge").unwrap(), BackendChoice::EdgeStream);
        assert_eq!(BackendChoice::parse("Cloud").unwrap(), BackendChoice::CloudTask);
        assert!(BackendChoice::parse("polly").is_err());
    }

    #[test]
    fn factory_builds_both_backends() {
        let settings = Settings::default();
        let dir = std::env::temp_dir();

        let edge = create_backend(BackendChoice::EdgeStream, &settings, dir.clone()).unwrap();
        assert_eq!(edge.name(), "edge-stream");

        let cloud = create_backend(BackendChoice::CloudTask, &settings, dir).unwrap();
        assert_eq!(cloud.name(), "cloud-task");
    }
}
