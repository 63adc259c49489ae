//! Image I/O operations service
//!
//! This module separates decoding, encoding and file handling from the
//! removal logic, so the processor only ever sees in-memory buffers.

use crate::error::{BgRemovalError, Result};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix appended to the input stem for generated output names
pub const OUTPUT_SUFFIX: &str = "_bg_removed";

/// Extensions picked up when scanning directories
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif", "gif"];

/// Service for handling image input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Decode uploaded bytes into an image, detecting the format from content
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidImage` for empty or undecodable input
    ///
    /// # Examples
    /// ```rust
    /// use bg_remover::services::ImageIOService;
    ///
    /// assert!(ImageIOService::decode(b"definitely not an image").is_err());
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(BgRemovalError::invalid_image("no image data received"));
        }
        image::load_from_memory(bytes).map_err(|e| {
            BgRemovalError::invalid_image(format!(
                "Failed to decode image from {} bytes: {}",
                bytes.len(),
                e
            ))
        })
    }

    /// Load an image from a file path
    ///
    /// The format is taken from the file content, not its extension.
    ///
    /// # Errors
    /// - `BgRemovalError::Io` when the file cannot be read
    /// - `BgRemovalError::InvalidImage` when its content cannot be decoded
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("read image file", path_ref, &e))?;

        debug!(path = %path_ref.display(), bytes = data.len(), "Loaded image file");

        Self::decode(&data).map_err(|e| match e {
            BgRemovalError::InvalidImage(msg) => {
                BgRemovalError::invalid_image(format!("{}: {}", path_ref.display(), msg))
            },
            other => other,
        })
    }

    /// Encode an RGBA buffer as PNG bytes
    ///
    /// # Errors
    /// Returns `BgRemovalError::Processing` if the encoder fails
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| BgRemovalError::processing(format!("Failed to encode PNG: {e}")))?;
        Ok(buffer.into_inner())
    }

    /// Save an RGBA buffer as PNG, creating parent directories
    ///
    /// # Errors
    /// - Directory creation or file write failures
    /// - Encoding failures
    pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BgRemovalError::file_io_error("create output directory", parent, &e)
            })?;
        }

        let bytes = Self::encode_png(image)?;
        std::fs::write(path_ref, bytes)
            .map_err(|e| BgRemovalError::file_io_error("write PNG", path_ref, &e))?;

        debug!(path = %path_ref.display(), "Saved PNG");
        Ok(())
    }

    /// Output path for `input`: `<dir>/<stem>_bg_removed.png`
    ///
    /// `dir` defaults to the input's own directory.
    #[must_use]
    pub fn output_path_for(input: &Path, output_dir: Option<&Path>) -> PathBuf {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        Self::output_dir_for(input, output_dir).join(format!("{stem}{OUTPUT_SUFFIX}.png"))
    }

    /// Output path that keeps the source extension: `<dir>/<stem>_<ext>_bg_removed.png`
    ///
    /// Used when inputs such as `cat.jpg` and `cat.png` would otherwise share
    /// one output file. Inputs without an extension get the plain name.
    #[must_use]
    pub fn output_path_with_extension(input: &Path, output_dir: Option<&Path>) -> PathBuf {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let name = match input.extension() {
            Some(ext) => format!("{stem}_{}{OUTPUT_SUFFIX}.png", ext.to_string_lossy()),
            None => format!("{stem}{OUTPUT_SUFFIX}.png"),
        };
        Self::output_dir_for(input, output_dir).join(name)
    }

    fn output_dir_for<'a>(input: &'a Path, output_dir: Option<&'a Path>) -> &'a Path {
        output_dir
            .or_else(|| input.parent())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Whether `path` carries one of the supported image extensions
    #[must_use]
    pub fn is_supported_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    }
}
