//! Pixel-level properties of the removal pipeline
//!
//! Exercises the threshold fallback and solid-color compositing through the
//! public `BackgroundProcessor` API.

use bg_remover::{
    BackgroundDirective, BackgroundProcessor, ImageIOService, RemovalConfig, Result,
    StrategyKind, ThresholdFallback,
};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

fn two_by_two_white_over_black() -> DynamicImage {
    let mut image = RgbImage::new(2, 2);
    image.put_pixel(0, 0, Rgb([255, 255, 255]));
    image.put_pixel(1, 0, Rgb([255, 255, 255]));
    image.put_pixel(0, 1, Rgb([0, 0, 0]));
    image.put_pixel(1, 1, Rgb([0, 0, 0]));
    DynamicImage::ImageRgb8(image)
}

fn gradient() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(32, 16, |x, y| {
        Rgba([(x * 8) as u8, (y * 16) as u8, 180 + (x % 76) as u8, 255 - (y * 4) as u8])
    }))
}

#[test]
fn test_transparent_scenario() -> Result<()> {
    let processor = BackgroundProcessor::fallback();
    let output =
        processor.process(&two_by_two_white_over_black(), &BackgroundDirective::Transparent)?;

    let pixels: Vec<[u8; 4]> = output.pixels().map(|p| p.0).collect();
    assert_eq!(
        pixels,
        vec![[255, 255, 255, 0], [255, 255, 255, 0], [0, 0, 0, 255], [0, 0, 0, 255]]
    );
    Ok(())
}

#[test]
fn test_red_scenario() -> Result<()> {
    let processor = BackgroundProcessor::fallback();
    let red: BackgroundDirective = "red".parse()?;
    let output = processor.process(&two_by_two_white_over_black(), &red)?;

    let pixels: Vec<[u8; 4]> = output.pixels().map(|p| p.0).collect();
    assert_eq!(
        pixels,
        vec![[255, 0, 0, 255], [255, 0, 0, 255], [0, 0, 0, 255], [0, 0, 0, 255]]
    );
    Ok(())
}

#[test]
fn test_all_white_fully_transparent() -> Result<()> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(17, 9, Rgb([255, 255, 255])));
    let output =
        BackgroundProcessor::fallback().process(&image, &BackgroundDirective::Transparent)?;
    assert!(output.pixels().all(|p| p.0[3] == 0));
    Ok(())
}

#[test]
fn test_all_black_unchanged_and_opaque() -> Result<()> {
    let image = DynamicImage::ImageRgb8(RgbImage::new(9, 17));
    let output =
        BackgroundProcessor::fallback().process(&image, &BackgroundDirective::Transparent)?;
    assert_eq!(output.dimensions(), (9, 17));
    assert!(output.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    Ok(())
}

#[test]
fn test_fallback_idempotent() -> Result<()> {
    let processor = BackgroundProcessor::fallback();
    let once = processor.process(&gradient(), &BackgroundDirective::Transparent)?;
    let twice = processor.process(
        &DynamicImage::ImageRgba8(once.clone()),
        &BackgroundDirective::Transparent,
    )?;
    assert_eq!(once, twice);
    Ok(())
}

#[test]
fn test_threshold_boundary_is_foreground() -> Result<()> {
    let processor = BackgroundProcessor::fallback();

    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([200, 200, 200])));
    let output = processor.process(&image, &BackgroundDirective::Transparent)?;
    assert_eq!(output.get_pixel(0, 0), &Rgba([200, 200, 200, 255]));

    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([201, 201, 201])));
    let output = processor.process(&image, &BackgroundDirective::Transparent)?;
    assert_eq!(output.get_pixel(0, 0), &Rgba([255, 255, 255, 0]));
    Ok(())
}

#[test]
fn test_transparent_composite_is_byte_identical() -> Result<()> {
    let removed = ThresholdFallback::default().apply(&gradient());
    let output =
        BackgroundProcessor::fallback().process(&gradient(), &BackgroundDirective::Transparent)?;
    assert_eq!(output.as_raw(), removed.as_raw());
    Ok(())
}

#[test]
fn test_solid_directives_always_opaque() -> Result<()> {
    let processor = BackgroundProcessor::fallback();
    let specs = [
        "white",
        "#123",
        "#0a0b0c",
        "rgb(10%, 50%, 90%)",
        "hsl(200, 50%, 40%)",
        "hsv(10, 100%, 100%)",
    ];
    for spec in specs {
        let background: BackgroundDirective = spec.parse()?;
        let output = processor.process(&gradient(), &background)?;
        assert!(
            output.pixels().all(|p| p.0[3] == 255),
            "non-opaque pixel for background {spec}"
        );
    }
    Ok(())
}

#[test]
fn test_configured_threshold_is_used() -> Result<()> {
    let config = RemovalConfig::builder().fallback_threshold(100).build()?;
    let processor = BackgroundProcessor::from_config(&config)?;
    assert_eq!(processor.strategy_kind(), StrategyKind::Fallback);

    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([150, 160, 170])));
    let output = processor.process(&image, &BackgroundDirective::Transparent)?;
    assert!(output.pixels().all(|p| p.0 == [255, 255, 255, 0]));
    Ok(())
}

#[test]
fn test_process_bytes_and_png_output() -> Result<()> {
    let input = ImageIOService::encode_png(&two_by_two_white_over_black().to_rgba8())?;
    let result = BackgroundProcessor::fallback()
        .process_bytes(&input, &BackgroundDirective::solid(0, 0, 255))?;

    assert_eq!(result.strategy, StrategyKind::Fallback);
    assert_eq!(result.background, BackgroundDirective::solid(0, 0, 255));

    let decoded = ImageIOService::decode(&result.to_png_bytes()?)?.to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
    assert_eq!(decoded.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
    Ok(())
}
