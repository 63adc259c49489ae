//! Solid-color background compositing

use crate::config::BackgroundDirective;
use image::{Rgb, Rgba, RgbaImage};

/// Blend one channel of `fg` over `bg` with coverage `alpha`, rounding to nearest
#[inline]
fn blend_channel(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    let value = (u32::from(fg) * a + u32::from(bg) * (255 - a) + 127) / 255;
    value.min(255) as u8
}

/// Composite `image` over an opaque canvas of `color`
///
/// The image's own alpha is the blend mask; every output pixel is opaque.
#[must_use]
pub fn composite_over(mut image: RgbaImage, color: Rgb<u8>) -> RgbaImage {
    let [bg_r, bg_g, bg_b] = color.0;
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        *pixel = Rgba([
            blend_channel(r, bg_r, a),
            blend_channel(g, bg_g, a),
            blend_channel(b, bg_b, a),
            255,
        ]);
    }
    image
}

/// Apply a background directive to a removal result
///
/// `Transparent` returns the buffer unchanged.
#[must_use]
pub fn apply_background(image: RgbaImage, background: &BackgroundDirective) -> RgbaImage {
    match background {
        BackgroundDirective::Transparent => image,
        BackgroundDirective::Solid(color) => composite_over(image, *color),
    }
}
