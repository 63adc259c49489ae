//! Image preprocessing for model inference
//!
//! Letterboxes the input into the model's square input (aspect ratio
//! preserving resize, then center padding) and normalizes it into an NCHW
//! tensor. The applied geometry is returned so the output mask can be mapped
//! back onto the original pixels.

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{DynamicImage, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Configuration for preprocessing behavior
#[derive(Debug, Clone)]
pub struct PreprocessingOptions {
    /// Padding color for aspect ratio preservation (RGB)
    pub padding_color: [u8; 3],
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            padding_color: [255, 255, 255],
        }
    }
}

/// Geometry of the letterbox applied to an image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    /// Scale factor from original to model coordinates
    pub scale: f32,
    /// Left padding in model coordinates
    pub offset_x: u32,
    /// Top padding in model coordinates
    pub offset_y: u32,
    /// Square edge of the model input
    pub target_size: u32,
}

impl LetterboxTransform {
    /// Compute the letterbox for an image of `original` size into `target_size`
    #[must_use]
    pub fn new(original: (u32, u32), target_size: u32) -> Self {
        let (orig_width, orig_height) = original;
        let target = target_size as f32;
        let scale = (target / orig_width.max(1) as f32).min(target / orig_height.max(1) as f32);

        let (scaled_width, scaled_height) = Self::scaled_dimensions(original, scale, target_size);

        Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            target_size,
        }
    }

    /// Resized content dimensions, at least 1 and at most `target_size`
    fn scaled_dimensions(original: (u32, u32), scale: f32, target_size: u32) -> (u32, u32) {
        let width = ((original.0 as f32 * scale).round() as u32).clamp(1, target_size);
        let height = ((original.1 as f32 * scale).round() as u32).clamp(1, target_size);
        (width, height)
    }

    /// Map an original pixel coordinate into model coordinates
    #[must_use]
    pub fn to_model(&self, x: u32, y: u32) -> (u32, u32) {
        let scaled_x = (x as f32 * self.scale).round() as u32;
        let scaled_y = (y as f32 * self.scale).round() as u32;
        (scaled_x + self.offset_x, scaled_y + self.offset_y)
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image for model inference
    ///
    /// Handles RGB conversion, aspect ratio preserving resize, center padding
    /// to the target size and normalization to an NCHW tensor.
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidImage` for images with a zero dimension
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn preprocess_image(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
        options: &PreprocessingOptions,
    ) -> Result<(Array4<f32>, LetterboxTransform)> {
        let target_size = preprocessing_config.target_size;

        let rgb_image = image.to_rgb8();
        let original = rgb_image.dimensions();
        if original.0 == 0 || original.1 == 0 {
            return Err(BgRemovalError::invalid_image(format!(
                "cannot segment an image of size {}x{}",
                original.0, original.1
            )));
        }

        let transform = LetterboxTransform::new(original, target_size);
        let (new_width, new_height) =
            LetterboxTransform::scaled_dimensions(original, transform.scale, target_size);

        let resized = image::imageops::resize(
            &rgb_image,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );

        let padding = options.padding_color;
        let mut canvas: RgbImage =
            ImageBuffer::from_pixel(target_size, target_size, image::Rgb(padding));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(transform.offset_x),
            i64::from(transform.offset_y),
        );

        let tensor = Self::canvas_to_tensor(&canvas, preprocessing_config);
        Ok((tensor, transform))
    }

    /// Convert canvas to normalized tensor
    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        Array4::from_shape_fn((1, 3, height as usize, width as usize), |(_, c, y, x)| {
            let pixel = canvas.get_pixel(x as u32, y as u32);
            let channel = pixel.0.get(c).copied().unwrap_or(0);
            let (m, s) = (
                mean.get(c).copied().unwrap_or(0.0),
                std.get(c).copied().unwrap_or(1.0),
            );
            (f32::from(channel) / 255.0 - m) / s
        })
    }

    /// Tensor and letterbox only, with default options
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidImage` for images with a zero dimension
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<(Array4<f32>, LetterboxTransform)> {
        Self::preprocess_image(image, preprocessing_config, &PreprocessingOptions::default())
    }
}
