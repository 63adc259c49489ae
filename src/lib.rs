#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

//! # Background Remover
//!
//! Removes image backgrounds and optionally paints a solid color behind the
//! subject.
//!
//! Two removal paths exist and one is chosen when a processor is built:
//!
//! - **Delegated**: an ONNX segmentation model run through Tract produces an
//!   alpha mask for the subject.
//! - **Fallback**: with no model available, pixels whose R, G and B are all
//!   above a threshold (200 by default) are made transparent white. This only
//!   handles plain white backdrops.
//!
//! A failing model is reported as [`BgRemovalError::Segmentation`] and is
//! never papered over by the fallback.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bg_remover::{BackgroundDirective, BackgroundProcessor, RemovalConfig, ModelSpec};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = RemovalConfig::builder()
//!     .model(ModelSpec::from_path("models/isnet")?)
//!     .build()?;
//! let processor = BackgroundProcessor::from_config(&config)?;
//!
//! let image = image::open("input.jpg")?;
//! let background: BackgroundDirective = "rebeccapurple".parse()?;
//! let result = processor.process_with_metadata(&image, &background)?;
//! result.save_png("output.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): model-backed segmentation with Tract
//! - `cli` (default): the `bg-remover` binary and its tracing subscriber
//! - `tracing-json`: JSON log output for the CLI
//! - `webp-support`: WebP decoding
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! bg-remover = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod composite;
pub mod config;
pub mod error;
pub mod fallback;
pub mod models;
pub mod processor;
pub mod segmentation;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::sync::Arc;
use tokio::io::AsyncRead;

// Public API exports
#[cfg(feature = "tract")]
pub use backends::TractSegmenter;
pub use composite::apply_background;
pub use config::{BackgroundDirective, RemovalConfig, RemovalConfigBuilder, DEFAULT_FALLBACK_THRESHOLD};
pub use error::{BgRemovalError, Result};
pub use fallback::ThresholdFallback;
pub use models::{ModelSpec, PreprocessingConfig};
pub use processor::{BackgroundProcessor, RemovalStrategy};
pub use segmentation::Segmenter;
pub use services::ImageIOService;
pub use types::{ProcessingTimings, RemovalResult, SegmentationMask, StrategyKind};
pub use utils::{ColorParser, ImagePreprocessor, LetterboxTransform, PreprocessingOptions};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background of an encoded image
///
/// Builds a processor from `config`, decodes `image_bytes` and runs the
/// pipeline on tokio's blocking pool with the configured default background
/// and timeout. Long-lived callers should build one [`BackgroundProcessor`]
/// and reuse it instead, since model loading dominates the cost here.
///
/// # Examples
/// ```rust,no_run
/// use bg_remover::{remove_background_from_bytes, RemovalConfig};
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let config = RemovalConfig::default();
/// let result = remove_background_from_bytes(&upload, &config).await?;
/// let png = result.to_png_bytes()?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let image = ImageIOService::decode(image_bytes)?;
    remove_background_from_image(image, config).await
}

/// Remove the background of an already decoded image
pub async fn remove_background_from_image(
    image: image::DynamicImage,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let processor = Arc::new(BackgroundProcessor::from_config(config)?);
    processor
        .process_blocking(image, config.default_background, None)
        .await
}

/// Remove the background of an image read from an async stream
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    remove_background_from_bytes(&buffer, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn white_square_png() -> Vec<u8> {
        ImageIOService::encode_png(&RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]))).unwrap()
    }

    #[tokio::test]
    async fn test_remove_background_from_bytes_fallback() {
        let result = remove_background_from_bytes(&white_square_png(), &RemovalConfig::default())
            .await
            .unwrap();
        assert_eq!(result.strategy, StrategyKind::Fallback);
        assert!(result.image.pixels().all(|p| p.0[3] == 0));
    }

    #[tokio::test]
    async fn test_remove_background_uses_default_background() {
        let config = RemovalConfig::builder()
            .default_background(BackgroundDirective::solid(0, 128, 0))
            .build()
            .unwrap();
        let reader = std::io::Cursor::new(white_square_png());
        let result = remove_background_from_reader(reader, &config).await.unwrap();
        assert!(result.image.pixels().all(|p| p.0 == [0, 128, 0, 255]));
    }

    #[tokio::test]
    async fn test_remove_background_from_bytes_invalid() {
        assert!(matches!(
            remove_background_from_bytes(b"nope", &RemovalConfig::default()).await,
            Err(BgRemovalError::InvalidImage(_))
        ));
    }
}
