//! Segmentation model specification and preprocessing parameters

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the Hugging Face preprocessor sidecar looked up next to a model
pub const PREPROCESSOR_CONFIG_FILE: &str = "preprocessor_config.json";

/// Preprocessing parameters the model was trained with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Square input edge length in pixels
    pub target_size: u32,
    /// Per-channel mean in the 0-1 range
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation in the 0-1 range
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    /// `ISNet` general-use defaults
    fn default() -> Self {
        Self {
            target_size: 1024,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

impl PreprocessingConfig {
    /// Reject parameters that would produce an empty or non-finite tensor
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` for a zero target size or a
    /// non-positive standard deviation.
    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 || self.target_size > 4096 {
            return Err(BgRemovalError::config_value_error(
                "model target size",
                self.target_size,
                "1-4096",
            ));
        }
        if self
            .normalization_std
            .iter()
            .any(|std| !std.is_finite() || *std <= 0.0)
        {
            return Err(BgRemovalError::invalid_config(
                "normalization std values must be positive",
            ));
        }
        if self.normalization_mean.iter().any(|mean| !mean.is_finite()) {
            return Err(BgRemovalError::invalid_config(
                "normalization mean values must be finite",
            ));
        }
        Ok(())
    }

    /// Parse a Hugging Face `preprocessor_config.json` document
    ///
    /// `image_mean` and `image_std` are given in the 0-255 range there and are
    /// converted to 0-1. Missing keys fall back to the defaults.
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` for malformed JSON or arrays
    /// with fewer than three values.
    pub fn from_huggingface_json(content: &str) -> Result<Self> {
        let preprocessor: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            BgRemovalError::invalid_config(format!("Invalid preprocessor config: {e}"))
        })?;
        let defaults = Self::default();

        let target_size = preprocessor
            .get("size")
            .and_then(|size| size.get("width").or_else(|| size.get("height")))
            .and_then(serde_json::Value::as_u64)
            .map_or(defaults.target_size, |size| size as u32);

        let normalization_mean = match preprocessor.get("image_mean") {
            Some(value) => Self::parse_channel_triplet(value, "image_mean")?,
            None => defaults.normalization_mean,
        };
        let normalization_std = match preprocessor.get("image_std") {
            Some(value) => Self::parse_channel_triplet(value, "image_std")?,
            None => defaults.normalization_std,
        };

        let config = Self {
            target_size,
            normalization_mean,
            normalization_std,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a 3-value array given in 0-255 and convert it to 0-1
    fn parse_channel_triplet(value: &serde_json::Value, key: &str) -> Result<[f32; 3]> {
        let values = value.as_array().ok_or_else(|| {
            BgRemovalError::invalid_config(format!("{key} must be an array"))
        })?;
        if values.len() < 3 {
            return Err(BgRemovalError::invalid_config(format!(
                "{key} must have at least 3 values"
            )));
        }

        let mut out = [0.0_f32; 3];
        for (slot, raw) in out.iter_mut().zip(values) {
            let channel = raw.as_f64().ok_or_else(|| {
                BgRemovalError::invalid_config(format!("Invalid {key} value: {raw}"))
            })?;
            *slot = (channel / 255.0) as f32;
        }
        Ok(out)
    }
}

/// Location and preprocessing parameters of an ONNX segmentation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Path to the `.onnx` file
    pub path: PathBuf,
    /// Preprocessing the model expects
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
}

impl ModelSpec {
    /// Describe a model at `path`, reading a `preprocessor_config.json` sidecar if present
    ///
    /// `path` may point at the `.onnx` file or at a directory holding
    /// `model.onnx`.
    ///
    /// # Errors
    /// - Sidecar exists but cannot be read or parsed
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let model_path = if path.is_dir() {
            path.join("model.onnx")
        } else {
            path.to_path_buf()
        };

        let sidecar = model_path
            .parent()
            .map(|dir| dir.join(PREPROCESSOR_CONFIG_FILE));

        let preprocessing = match sidecar {
            Some(sidecar) if sidecar.is_file() => {
                debug!(path = %sidecar.display(), "Reading preprocessor config");
                let content = fs::read_to_string(&sidecar).map_err(|e| {
                    BgRemovalError::file_io_error("read preprocessor config", &sidecar, &e)
                })?;
                PreprocessingConfig::from_huggingface_json(&content)?
            },
            _ => PreprocessingConfig::default(),
        };

        Ok(Self {
            path: model_path,
            preprocessing,
        })
    }

    /// Human readable model name (file stem)
    #[must_use]
    pub fn display_name(&self) -> String {
        self.path
            .file_stem()
            .map_or_else(|| self.path.display().to_string(), |s| s.to_string_lossy().into_owned())
    }

    /// Read the model bytes
    ///
    /// # Errors
    /// Returns `BgRemovalError::Model` when the file is missing or unreadable
    pub fn load_bytes(&self) -> Result<Vec<u8>> {
        if !self.path.is_file() {
            return Err(BgRemovalError::model(format!(
                "Model file not found: {}",
                self.path.display()
            )));
        }
        fs::read(&self.path)
            .map_err(|e| BgRemovalError::model(format!("Failed to read model file: {e}")))
    }
}
