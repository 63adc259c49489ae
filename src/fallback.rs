//! Near-white threshold heuristic used when no segmentation model is available
//!
//! A pixel is treated as background when every color channel is strictly
//! above the threshold. Background pixels become transparent white; every
//! other pixel is passed through untouched, alpha included. There is no
//! feathering, so subjects on light but not white backdrops keep them.

use crate::config::DEFAULT_FALLBACK_THRESHOLD;
use image::{DynamicImage, Rgba, RgbaImage};

/// Value written for pixels classified as background
pub const CLEARED_PIXEL: Rgba<u8> = Rgba([255, 255, 255, 0]);

/// Threshold-based background classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdFallback {
    threshold: u8,
}

impl ThresholdFallback {
    #[must_use]
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Whether a pixel counts as background
    #[inline]
    #[must_use]
    pub fn is_background(&self, pixel: &Rgba<u8>) -> bool {
        let [r, g, b, _] = pixel.0;
        r > self.threshold && g > self.threshold && b > self.threshold
    }

    /// Convert to RGBA and clear near-white pixels
    #[must_use]
    pub fn apply(&self, image: &DynamicImage) -> RgbaImage {
        let mut rgba = image.to_rgba8();
        self.apply_in_place(&mut rgba);
        rgba
    }

    /// Clear near-white pixels of an RGBA buffer in place
    pub fn apply_in_place(&self, image: &mut RgbaImage) {
        for pixel in image.pixels_mut() {
            if self.is_background(pixel) {
                *pixel = CLEARED_PIXEL;
            }
        }
    }
}

impl Default for ThresholdFallback {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_white_becomes_transparent() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([255, 255, 255, 255])));
        let output = ThresholdFallback::default().apply(&image);
        assert!(output.pixels().all(|p| p.0[3] == 0));
        assert!(output.pixels().all(|p| *p == CLEARED_PIXEL));
    }

    #[test]
    fn test_all_black_passes_through() {
        let image = DynamicImage::new_rgb8(4, 2);
        let output = ThresholdFallback::default().apply(&image);
        assert!(output.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_threshold_is_strict() {
        let fallback = ThresholdFallback::default();
        assert!(!fallback.is_background(&Rgba([200, 255, 255, 255])));
        assert!(!fallback.is_background(&Rgba([255, 200, 255, 255])));
        assert!(!fallback.is_background(&Rgba([255, 255, 200, 255])));
        assert!(fallback.is_background(&Rgba([201, 201, 201, 255])));
    }

    #[test]
    fn test_original_alpha_preserved_for_foreground() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([10, 20, 30, 77]));
        image.put_pixel(1, 0, Rgba([250, 250, 250, 12]));

        let output = ThresholdFallback::default().apply(&DynamicImage::ImageRgba8(image));
        assert_eq!(output.get_pixel(0, 0), &Rgba([10, 20, 30, 77]));
        assert_eq!(output.get_pixel(1, 0), &CLEARED_PIXEL);
    }

    #[test]
    fn test_idempotent() {
        let image = RgbaImage::from_fn(8, 8, |x, y| {
            let v = (x * 32 + y) as u8;
            Rgba([v, v.wrapping_add(40), 230, 255])
        });
        let fallback = ThresholdFallback::default();
        let once = fallback.apply(&DynamicImage::ImageRgba8(image));
        let twice = fallback.apply(&DynamicImage::ImageRgba8(once.clone()));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_custom_threshold() {
        let fallback = ThresholdFallback::new(100);
        assert_eq!(fallback.threshold(), 100);
        assert!(fallback.is_background(&Rgba([150, 150, 150, 255])));
        assert!(!ThresholdFallback::default().is_background(&Rgba([150, 150, 150, 255])));
    }
}
