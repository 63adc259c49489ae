//! Segmentation backend implementations
//!
//! - Tract backend (pure Rust ONNX inference)

#[cfg(feature = "tract")]
pub mod tract;

#[cfg(feature = "tract")]
pub use self::tract::TractSegmenter;
