//! Configuration types for background removal operations

use crate::{
    error::{BgRemovalError, Result},
    models::ModelSpec,
    utils::ColorParser,
};
use image::Rgb;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, path::Path, str::FromStr};

/// Default per-channel cutoff for the near-white fallback heuristic
pub const DEFAULT_FALLBACK_THRESHOLD: u8 = 200;

/// What to put behind the extracted subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundDirective {
    /// Keep the removed background fully transparent
    #[default]
    Transparent,
    /// Composite the subject over an opaque solid color
    Solid(Rgb<u8>),
}

impl BackgroundDirective {
    /// Sentinel string selecting a transparent background
    pub const TRANSPARENT: &'static str = "transparent";

    /// Resolve a directive string
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidColorSpec` when the string is neither
    /// `transparent` nor a color [`ColorParser`] understands.
    pub fn parse(spec: &str) -> Result<Self> {
        if spec.trim().eq_ignore_ascii_case(Self::TRANSPARENT) {
            return Ok(Self::Transparent);
        }
        ColorParser::parse(spec).map(Self::Solid)
    }

    /// Build a solid directive from RGB components
    #[must_use]
    pub fn solid(r: u8, g: u8, b: u8) -> Self {
        Self::Solid(Rgb([r, g, b]))
    }

    #[must_use]
    pub fn is_transparent(&self) -> bool {
        matches!(self, Self::Transparent)
    }
}

impl FromStr for BackgroundDirective {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BackgroundDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transparent => f.write_str(Self::TRANSPARENT),
            Self::Solid(color) => f.write_str(&ColorParser::to_hex(color)),
        }
    }
}

impl Serialize for BackgroundDirective {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BackgroundDirective {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let spec = String::deserialize(deserializer)?;
        Self::parse(&spec).map_err(serde::de::Error::custom)
    }
}

/// Configuration for background removal operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Segmentation model; `None` selects the threshold fallback
    pub model: Option<ModelSpec>,

    /// Per-channel cutoff above which a pixel counts as background in the fallback
    pub fallback_threshold: u8,

    /// Background used when a request does not name one
    pub default_background: BackgroundDirective,

    /// Upper bound on one segmentation call when run through the async API
    pub segmentation_timeout_ms: Option<u64>,

    /// Maximum number of images processed concurrently (0 = available parallelism)
    pub max_workers: usize,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model: None,
            fallback_threshold: DEFAULT_FALLBACK_THRESHOLD,
            default_background: BackgroundDirective::Transparent,
            segmentation_timeout_ms: None,
            max_workers: 0,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::new()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON for this structure
    /// - Resulting configuration fails [`RemovalConfig::validate`]
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BgRemovalError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            BgRemovalError::invalid_config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Zero segmentation timeout
    /// - Model preprocessing parameters that would produce an unusable tensor
    pub fn validate(&self) -> Result<()> {
        if self.segmentation_timeout_ms == Some(0) {
            return Err(BgRemovalError::config_value_error(
                "segmentation timeout (ms)",
                0,
                "> 0",
            ));
        }
        if let Some(model) = &self.model {
            model.preprocessing.validate()?;
        }
        Ok(())
    }

    /// Timeout as a `Duration`, if configured
    #[must_use]
    pub fn segmentation_timeout(&self) -> Option<std::time::Duration> {
        self.segmentation_timeout_ms
            .map(std::time::Duration::from_millis)
    }

    /// Effective worker count, resolving 0 to the available parallelism
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    }
}

/// Builder for `RemovalConfig`
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RemovalConfig::default(),
        }
    }

    /// Start from an existing configuration, e.g. one loaded from a file
    #[must_use]
    pub fn from_config(config: RemovalConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn model(mut self, model: ModelSpec) -> Self {
        self.config.model = Some(model);
        self
    }

    #[must_use]
    pub fn fallback_threshold(mut self, threshold: u8) -> Self {
        self.config.fallback_threshold = threshold;
        self
    }

    #[must_use]
    pub fn default_background(mut self, background: BackgroundDirective) -> Self {
        self.config.default_background = background;
        self
    }

    #[must_use]
    pub fn segmentation_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.segmentation_timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.max_workers = workers;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` when validation fails
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RemovalConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
