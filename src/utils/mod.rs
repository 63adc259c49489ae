//! Shared utilities: color parsing and model input preprocessing

pub mod color;
pub mod preprocessing;

pub use color::ColorParser;
pub use preprocessing::{ImagePreprocessor, LetterboxTransform, PreprocessingOptions};
