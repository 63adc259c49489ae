//! Background Remover CLI Tool
//!
//! Command-line interface for removing image backgrounds with a Tract-backed
//! segmentation model or the near-white threshold fallback.

#[cfg(feature = "cli")]
use bg_remover::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
