//! Unified background removal processor
//!
//! `BackgroundProcessor` owns the removal strategy chosen at construction and
//! runs the full pipeline for one image: background removal through either
//! the segmentation backend or the threshold fallback, then optional
//! compositing onto a solid color. It holds no per-call state and is shared
//! across workers behind an `Arc`.

use crate::{
    composite::apply_background,
    config::{BackgroundDirective, RemovalConfig},
    error::{BgRemovalError, Result},
    fallback::ThresholdFallback,
    segmentation::{ensure_same_dimensions, Segmenter},
    services::ImageIOService,
    types::{ProcessingTimings, RemovalResult, StrategyKind},
};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, span, warn, Level};

/// How the background is removed, fixed for the lifetime of a processor
pub enum RemovalStrategy {
    /// Hand the image to a segmentation backend
    Delegated(Box<dyn Segmenter>),
    /// Clear near-white pixels
    Fallback(ThresholdFallback),
}

impl RemovalStrategy {
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Delegated(_) => StrategyKind::Delegated,
            Self::Fallback(_) => StrategyKind::Fallback,
        }
    }

    /// Backend name for delegated strategies
    #[must_use]
    pub fn backend_name(&self) -> Option<&str> {
        match self {
            Self::Delegated(segmenter) => Some(segmenter.name()),
            Self::Fallback(_) => None,
        }
    }

    /// Produce the RGBA image with the background removed
    ///
    /// Segmentation failures are returned as-is; the fallback never stands in
    /// for a failed backend.
    fn remove(&self, image: &DynamicImage) -> Result<RgbaImage> {
        match self {
            Self::Delegated(segmenter) => {
                let output = segmenter.segment(image)?;
                ensure_same_dimensions(image, &output)?;
                Ok(output)
            },
            Self::Fallback(fallback) => Ok(fallback.apply(image)),
        }
    }
}

impl std::fmt::Debug for RemovalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delegated(segmenter) => f.debug_tuple("Delegated").field(&segmenter.name()).finish(),
            Self::Fallback(fallback) => f.debug_tuple("Fallback").field(fallback).finish(),
        }
    }
}

/// Background removal processor
#[derive(Debug)]
pub struct BackgroundProcessor {
    strategy: RemovalStrategy,
    segmentation_timeout: Option<Duration>,
}

impl BackgroundProcessor {
    /// Create a processor around an explicit strategy
    #[must_use]
    pub fn new(strategy: RemovalStrategy) -> Self {
        Self {
            strategy,
            segmentation_timeout: None,
        }
    }

    /// Create a processor that delegates to `segmenter`
    #[must_use]
    pub fn with_segmenter<S: Segmenter + 'static>(segmenter: S) -> Self {
        Self::new(RemovalStrategy::Delegated(Box::new(segmenter)))
    }

    /// Create a processor using the threshold fallback with the default cutoff
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(RemovalStrategy::Fallback(ThresholdFallback::default()))
    }

    /// Bound delegated segmentation calls made through [`Self::process_blocking`]
    #[must_use]
    pub fn with_segmentation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.segmentation_timeout = timeout;
        self
    }

    /// Build a processor from configuration
    ///
    /// A configured model is loaded eagerly; when it cannot be loaded this
    /// fails instead of silently falling back. Without a model (or without a
    /// compiled-in inference backend) the threshold fallback is used.
    ///
    /// # Errors
    /// - `BgRemovalError::InvalidConfig` when the configuration does not validate
    /// - `BgRemovalError::Model` when the configured model cannot be loaded
    pub fn from_config(config: &RemovalConfig) -> Result<Self> {
        config.validate()?;
        let fallback = ThresholdFallback::new(config.fallback_threshold);

        let strategy = match &config.model {
            #[cfg(feature = "tract")]
            Some(spec) => {
                let segmenter = crate::backends::TractSegmenter::load(spec)?;
                info!(model = %spec.display_name(), "Using model-based segmentation");
                RemovalStrategy::Delegated(Box::new(segmenter))
            },
            #[cfg(not(feature = "tract"))]
            Some(spec) => {
                warn!(
                    model = %spec.display_name(),
                    threshold = config.fallback_threshold,
                    "Built without an inference backend; ignoring model and using near-white threshold fallback"
                );
                RemovalStrategy::Fallback(fallback)
            },
            None => {
                warn!(
                    threshold = config.fallback_threshold,
                    "No segmentation model configured; using near-white threshold fallback, \
                     which only removes plain white backgrounds"
                );
                RemovalStrategy::Fallback(fallback)
            },
        };

        Ok(Self::new(strategy).with_segmentation_timeout(config.segmentation_timeout()))
    }

    /// Which removal path this processor uses
    #[must_use]
    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    #[must_use]
    pub fn strategy(&self) -> &RemovalStrategy {
        &self.strategy
    }

    #[must_use]
    pub fn segmentation_timeout(&self) -> Option<Duration> {
        self.segmentation_timeout
    }

    /// Remove the background of `image` and apply `background`
    ///
    /// # Errors
    /// Returns `BgRemovalError::Segmentation` when the delegated backend fails
    pub fn process(&self, image: &DynamicImage, background: &BackgroundDirective) -> Result<RgbaImage> {
        self.process_with_metadata(image, background)
            .map(RemovalResult::into_image)
    }

    /// Like [`Self::process`] but also reports the strategy and stage timings
    ///
    /// # Errors
    /// Returns `BgRemovalError::Segmentation` when the delegated backend fails
    #[instrument(
        skip(self, image),
        fields(
            strategy = %self.strategy.kind(),
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_with_metadata(
        &self,
        image: &DynamicImage,
        background: &BackgroundDirective,
    ) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let removed = self.remove_with_timing(image)?;
        let (image, composite_ms) = Self::composite_with_timing(removed.0, background);

        let timings = ProcessingTimings {
            removal_ms: removed.1,
            composite_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        };
        debug!(?timings, "Image processed");

        Ok(RemovalResult {
            image,
            strategy: self.strategy.kind(),
            background: *background,
            timings,
        })
    }

    /// Decode `bytes` and process the result
    ///
    /// # Errors
    /// - `BgRemovalError::InvalidImage` when the bytes cannot be decoded
    /// - `BgRemovalError::Segmentation` when the delegated backend fails
    pub fn process_bytes(&self, bytes: &[u8], background: &BackgroundDirective) -> Result<RemovalResult> {
        let image = ImageIOService::decode(bytes)?;
        self.process_with_metadata(&image, background)
    }

    /// Process with an unparsed directive string
    ///
    /// Removal runs first and the directive is only resolved when compositing,
    /// so a segmentation failure is reported ahead of a bad color.
    ///
    /// # Errors
    /// - `BgRemovalError::Segmentation` when the delegated backend fails
    /// - `BgRemovalError::InvalidColorSpec` when the directive cannot be resolved
    pub fn process_str_directive(&self, image: &DynamicImage, background: &str) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let (removed, removal_ms) = self.remove_with_timing(image)?;
        let background = BackgroundDirective::parse(background)?;
        let (image, composite_ms) = Self::composite_with_timing(removed, &background);

        Ok(RemovalResult {
            image,
            strategy: self.strategy.kind(),
            background,
            timings: ProcessingTimings {
                removal_ms,
                composite_ms,
                total_ms: total_start.elapsed().as_millis() as u64,
            },
        })
    }

    /// Process on tokio's blocking pool
    ///
    /// For delegated processors the call is bounded by `timeout`, or by the
    /// configured segmentation timeout when `timeout` is `None`. Expiry is
    /// reported as a segmentation failure; the blocking task runs to
    /// completion in the background.
    ///
    /// # Errors
    /// - `BgRemovalError::Segmentation` on backend failure or timeout
    /// - `BgRemovalError::Processing` when the worker task panics
    pub async fn process_blocking(
        self: Arc<Self>,
        image: DynamicImage,
        background: BackgroundDirective,
        timeout: Option<Duration>,
    ) -> Result<RemovalResult> {
        let limit = match self.strategy.kind() {
            StrategyKind::Delegated => timeout.or(self.segmentation_timeout),
            StrategyKind::Fallback => None,
        };

        let task =
            tokio::task::spawn_blocking(move || self.process_with_metadata(&image, &background));

        let joined = match limit {
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
                warn!(timeout_ms = limit.as_millis() as u64, "Segmentation timed out");
                BgRemovalError::segmentation(format!(
                    "segmentation timed out after {} ms",
                    limit.as_millis()
                ))
            })?,
            None => task.await,
        };

        joined.map_err(|e| BgRemovalError::processing(format!("Worker task failed: {e}")))?
    }

    fn remove_with_timing(&self, image: &DynamicImage) -> Result<(RgbaImage, u64)> {
        let _span = span!(
            Level::DEBUG,
            "background_removal",
            strategy = %self.strategy.kind(),
            backend = self.strategy.backend_name().unwrap_or("threshold")
        )
        .entered();

        let start = Instant::now();
        let removed = self.strategy.remove(image).map_err(|e| {
            warn!(error = %e, "Background removal failed");
            e
        })?;
        Ok((removed, start.elapsed().as_millis() as u64))
    }

    fn composite_with_timing(image: RgbaImage, background: &BackgroundDirective) -> (RgbaImage, u64) {
        if background.is_transparent() {
            return (image, 0);
        }
        let _span = span!(Level::DEBUG, "compositing", background = %background).entered();
        let start = Instant::now();
        let composited = apply_background(image, background);
        (composited, start.elapsed().as_millis() as u64)
    }
}
