//! Core types for background removal results

use crate::{
    config::BackgroundDirective,
    error::Result,
    services::ImageIOService,
};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

/// Which removal path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Model-backed segmentation
    Delegated,
    /// Near-white threshold heuristic
    Fallback,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delegated => write!(f, "delegated"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Single-channel alpha mask, one byte per pixel in row-major order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    pub data: Vec<u8>,
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Mask value at `(x, y)`, 0 when out of bounds
    #[must_use]
    pub fn value_at(&self, x: u32, y: u32) -> u8 {
        let (width, height) = self.dimensions;
        if x >= width || y >= height {
            return 0;
        }
        let index = (y as usize) * (width as usize) + x as usize;
        self.data.get(index).copied().unwrap_or(0)
    }

    /// Fraction of pixels with a non-zero mask value
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v > 0).count();
        foreground as f32 / self.data.len() as f32
    }
}

/// Per-stage processing times in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Segmentation or fallback thresholding
    pub removal_ms: u64,
    /// Solid-color compositing (0 for transparent output)
    pub composite_ms: u64,
    /// Whole invocation
    pub total_ms: u64,
}

/// Processed image together with how it was produced
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// RGBA output; fully opaque when a solid background was applied
    pub image: RgbaImage,
    pub strategy: StrategyKind,
    pub background: BackgroundDirective,
    pub timings: ProcessingTimings,
}

impl RemovalResult {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode the image as PNG
    ///
    /// # Errors
    /// Returns `BgRemovalError::Processing` if encoding fails
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        ImageIOService::encode_png(&self.image)
    }

    /// Write the image as PNG, creating parent directories
    ///
    /// # Errors
    /// - Directory creation or file write failures
    /// - Encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ImageIOService::save_png(&self.image, path)
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}
