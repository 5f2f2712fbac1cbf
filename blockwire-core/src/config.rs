//! Run settings shared by the CLI and embedders.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub backend: BackendKind,
    /// Frames to simulate.
    pub frames: u32,
    /// Screen size reported to the program, in pixels.
    pub screen_size: [f32; 2],
    pub random_seed: u64,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            backend: BackendKind::Interpreter,
            frames: 1,
            screen_size: [1080.0, 1920.0],
            random_seed: 0,
            log_level: "warn".to_string(),
        }
    }
}

impl RunConfig {
    pub fn from_json_str(input: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let source = fs::read_to_string(path)?;
        Self::from_json_str(&source)
    }
}
