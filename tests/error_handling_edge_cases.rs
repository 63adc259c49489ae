//! Error handling and edge case testing
//!
//! Failure conditions of the removal pipeline: backend failures, bad color
//! directives, undecodable input and timeouts.

use bg_remover::{
    BackgroundDirective, BackgroundProcessor, BgRemovalError, ImageIOService, RemovalConfig,
    Result, Segmenter, StrategyKind,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Segmenter that always fails and counts its calls
#[derive(Default)]
struct FailingSegmenter {
    calls: Arc<AtomicUsize>,
}

impl Segmenter for FailingSegmenter {
    fn segment(&self, _image: &DynamicImage) -> Result<RgbaImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BgRemovalError::segmentation("model crashed"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Segmenter that keeps the left half of the image
struct LeftHalfSegmenter;

impl Segmenter for LeftHalfSegmenter {
    fn segment(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let mut rgba = image.to_rgba8();
        let half = rgba.width() / 2;
        for (x, _, pixel) in rgba.enumerate_pixels_mut() {
            if x >= half {
                pixel.0[3] = 0;
            }
        }
        Ok(rgba)
    }

    fn name(&self) -> &str {
        "left-half"
    }
}

/// Segmenter that blocks longer than any reasonable timeout
struct SlowSegmenter(Duration);

impl Segmenter for SlowSegmenter {
    fn segment(&self, image: &DynamicImage) -> Result<RgbaImage> {
        std::thread::sleep(self.0);
        Ok(image.to_rgba8())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

fn white_image() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])))
}

#[test]
fn test_segmentation_failure_is_not_replaced_by_fallback() {
    let calls = Arc::new(AtomicUsize::new(0));
    let processor = BackgroundProcessor::with_segmenter(FailingSegmenter {
        calls: Arc::clone(&calls),
    });

    // A white image would be trivially handled by the fallback
    let err = processor
        .process(&white_image(), &BackgroundDirective::Transparent)
        .unwrap_err();

    assert!(matches!(err, BgRemovalError::Segmentation(_)));
    assert!(err.to_string().contains("model crashed"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_segmentation_failure_skips_compositing() {
    let processor = BackgroundProcessor::with_segmenter(FailingSegmenter::default());
    let result = processor.process(&white_image(), &BackgroundDirective::solid(255, 0, 0));
    assert!(result.unwrap_err().is_segmentation());
}

#[test]
fn test_delegated_result_is_composited() -> Result<()> {
    let processor = BackgroundProcessor::with_segmenter(LeftHalfSegmenter);
    assert_eq!(processor.strategy_kind(), StrategyKind::Delegated);

    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 1, Rgba([10, 20, 30, 255])));
    let output = processor.process(&image, &BackgroundDirective::parse("lime")?)?;

    assert_eq!(output.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    assert_eq!(output.get_pixel(3, 0), &Rgba([0, 255, 0, 255]));
    Ok(())
}

#[test]
fn test_invalid_color_directive() {
    for spec in ["notacolor", "#12345", "rgb(1, 2)", "rgba(1, 2, 3, 0.5)", ""] {
        assert!(
            matches!(
                BackgroundDirective::parse(spec),
                Err(BgRemovalError::InvalidColorSpec(_))
            ),
            "{spec:?} should be rejected"
        );
    }

    let processor = BackgroundProcessor::fallback();
    assert!(matches!(
        processor.process_str_directive(&white_image(), "notacolor"),
        Err(BgRemovalError::InvalidColorSpec(_))
    ));
}

#[test]
fn test_invalid_image_bytes() {
    let processor = BackgroundProcessor::fallback();
    for bytes in [&b""[..], b"GIF89a", b"\x89PNG\r\n\x1a\ntruncated"] {
        assert!(matches!(
            processor.process_bytes(bytes, &BackgroundDirective::Transparent),
            Err(BgRemovalError::InvalidImage(_))
        ));
    }
}

#[test]
fn test_invalid_image_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fake.jpg");
    std::fs::write(&path, b"plain text")?;

    let err = ImageIOService::load_image(&path).unwrap_err();
    assert!(matches!(err, BgRemovalError::InvalidImage(_)));
    Ok(())
}

#[tokio::test]
async fn test_timeout_reported_as_segmentation_error() {
    let processor = Arc::new(
        BackgroundProcessor::with_segmenter(SlowSegmenter(Duration::from_millis(500)))
            .with_segmentation_timeout(Some(Duration::from_millis(20))),
    );

    let err = processor
        .process_blocking(white_image(), BackgroundDirective::Transparent, None)
        .await
        .unwrap_err();
    assert!(err.is_segmentation());
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_explicit_timeout_overrides_configured() -> Result<()> {
    let processor = Arc::new(
        BackgroundProcessor::with_segmenter(SlowSegmenter(Duration::from_millis(30)))
            .with_segmentation_timeout(Some(Duration::from_millis(1))),
    );

    let result = processor
        .process_blocking(
            white_image(),
            BackgroundDirective::Transparent,
            Some(Duration::from_secs(10)),
        )
        .await?;
    assert_eq!(result.strategy, StrategyKind::Delegated);
    Ok(())
}

#[tokio::test]
async fn test_blocking_failure_propagates() {
    let processor = Arc::new(BackgroundProcessor::with_segmenter(FailingSegmenter::default()));
    let err = processor
        .process_blocking(white_image(), BackgroundDirective::Transparent, None)
        .await
        .unwrap_err();
    assert!(err.is_segmentation());
}

#[test]
fn test_config_errors() {
    assert!(matches!(
        RemovalConfig::builder().segmentation_timeout_ms(0).build(),
        Err(BgRemovalError::InvalidConfig(_))
    ));

    let mut config = RemovalConfig::default();
    config.segmentation_timeout_ms = Some(0);
    assert!(matches!(
        BackgroundProcessor::from_config(&config),
        Err(BgRemovalError::InvalidConfig(_))
    ));
}

#[test]
fn test_zero_sized_image_through_fallback() -> Result<()> {
    let image = DynamicImage::new_rgba8(0, 0);
    let output =
        BackgroundProcessor::fallback().process(&image, &BackgroundDirective::solid(1, 2, 3))?;
    assert_eq!(output.dimensions(), (0, 0));
    Ok(())
}
