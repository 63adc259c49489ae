//! Service layer separating I/O from the removal logic

pub mod io;

pub use io::{ImageIOService, OUTPUT_SUFFIX, SUPPORTED_EXTENSIONS};
