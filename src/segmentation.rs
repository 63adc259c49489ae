//! Segmentation backend abstraction
//!
//! A [`Segmenter`] takes a decoded image and returns an RGBA image of the same
//! size with the background made transparent. Model-backed implementations
//! share the tensor-to-mask and mask application helpers below.

use crate::{
    error::{BgRemovalError, Result},
    types::SegmentationMask,
    utils::LetterboxTransform,
};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use ndarray::Array4;

/// Trait for segmentation backends
pub trait Segmenter: Send + Sync {
    /// Remove the background of `image`
    ///
    /// # Errors
    /// Returns `BgRemovalError::Segmentation` when the backend cannot produce
    /// a result. Implementations must not fall back to a heuristic.
    fn segment(&self, image: &DynamicImage) -> Result<RgbaImage>;

    /// Short backend name for logs and reports
    fn name(&self) -> &str;
}

/// Check that a segmenter honored the size contract
///
/// # Errors
/// Returns `BgRemovalError::Segmentation` when the dimensions differ
pub fn ensure_same_dimensions(input: &DynamicImage, output: &RgbaImage) -> Result<()> {
    if input.dimensions() != output.dimensions() {
        return Err(BgRemovalError::segmentation(format!(
            "segmenter returned {}x{} for a {}x{} input",
            output.width(),
            output.height(),
            input.width(),
            input.height()
        )));
    }
    Ok(())
}

/// Convert a `[1, 1, H, W]` model output into a mask over the original image
///
/// # Errors
/// Returns `BgRemovalError::Segmentation` for any other tensor shape
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn tensor_to_mask(
    tensor: &Array4<f32>,
    transform: &LetterboxTransform,
    original_dimensions: (u32, u32),
) -> Result<SegmentationMask> {
    let shape = tensor.shape();
    if shape[0] != 1 || shape[1] != 1 {
        return Err(BgRemovalError::segmentation(format!(
            "expected a [1, 1, H, W] output tensor, got {shape:?}"
        )));
    }
    let (mask_height, mask_width) = (shape[2] as u32, shape[3] as u32);
    let (orig_width, orig_height) = original_dimensions;

    let mut data = Vec::with_capacity(orig_width as usize * orig_height as usize);
    for y in 0..orig_height {
        for x in 0..orig_width {
            let (tensor_x, tensor_y) = transform.to_model(x, y);
            let value = if tensor_x < mask_width && tensor_y < mask_height {
                tensor
                    .get([0, 0, tensor_y as usize, tensor_x as usize])
                    .copied()
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            data.push((value.clamp(0.0, 1.0) * 255.0) as u8);
        }
    }

    Ok(SegmentationMask::new(data, original_dimensions))
}

/// Apply a mask to an image: RGB kept, alpha scaled by the mask
///
/// # Errors
/// Returns `BgRemovalError::Segmentation` when mask and image sizes differ
pub fn apply_mask(image: &DynamicImage, mask: &SegmentationMask) -> Result<RgbaImage> {
    if image.dimensions() != mask.dimensions {
        return Err(BgRemovalError::segmentation(format!(
            "mask is {}x{} but image is {}x{}",
            mask.dimensions.0,
            mask.dimensions.1,
            image.width(),
            image.height()
        )));
    }

    let mut rgba = image.to_rgba8();
    for (x, y, pixel) in rgba.enumerate_pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let coverage = u16::from(mask.value_at(x, y));
        let alpha = (coverage * u16::from(a) + 127) / 255;
        *pixel = Rgba([r, g, b, alpha as u8]);
    }
    Ok(rgba)
}
