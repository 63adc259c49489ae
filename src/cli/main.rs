//! Background Removal CLI Tool
//!
//! Command-line interface over `BackgroundProcessor`. Images are processed
//! concurrently on tokio's blocking pool, bounded by `--jobs`.

use super::config::CliConfigBuilder;
use crate::{
    config::BackgroundDirective,
    processor::BackgroundProcessor,
    services::ImageIOService,
    tracing_config::{init_cli_tracing, spans, TracingFormat},
    types::StrategyKind,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Read, Write};
use instant::Instant;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// Remove image backgrounds, optionally replacing them with a solid color
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bg-remover")]
pub struct Cli {
    /// Input image files or directories (use "-" for stdin)
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<String>,

    /// Output file (single input) or directory (batch processing). Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Background: "transparent", a color name, #rrggbb, rgb(), hsl() or hsv() [default: transparent]
    #[arg(short, long, value_name = "COLOR")]
    pub background: Option<String>,

    /// ONNX segmentation model file or folder; without it the near-white threshold fallback is used
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Fallback cutoff: pixels with R, G and B all above it are removed [default: 200]
    #[arg(long, value_name = "0-255")]
    pub threshold: Option<u8>,

    /// Number of images processed concurrently [default: available parallelism]
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Give up on a segmentation call after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Process directory recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Pattern for batch processing (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// JSON configuration file; command-line flags take precedence
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print one JSON report per input to stdout
    #[arg(long)]
    pub json: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Console)]
    pub log_format: LogFormat,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum LogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<LogFormat> for TracingFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Console => Self::Console,
            LogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            LogFormat::Json => Self::Json,
        }
    }
}

/// Where one processed image goes
#[derive(Debug, Clone, PartialEq, Eq)]
enum OutputTarget {
    File(PathBuf),
    Stdout,
}

impl OutputTarget {
    fn display(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Stdout => "-".to_string(),
        }
    }
}

/// Per-input JSON report
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum FileReport {
    Success {
        success: bool,
        filename: String,
        output_path: String,
        strategy: StrategyKind,
    },
    Failure {
        success: bool,
        input: String,
        error: String,
    },
}

impl FileReport {
    fn success(input: &str, output: &OutputTarget, strategy: StrategyKind) -> Self {
        let filename = Path::new(input)
            .file_name()
            .map_or_else(|| input.to_string(), |name| name.to_string_lossy().into_owned());
        Self::Success {
            success: true,
            filename,
            output_path: output.display(),
            strategy,
        }
    }

    fn failure(input: &str, error: &anyhow::Error) -> Self {
        Self::Failure {
            success: false,
            input: input.to_string(),
            error: format!("{error:#}"),
        }
    }
}

/// Result of processing one input
struct FileOutcome {
    input: String,
    output: OutputTarget,
    result: Result<StrategyKind>,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli)?;

    let processor = Arc::new(
        BackgroundProcessor::from_config(&config)
            .context("Failed to initialize background processor")?,
    );
    info!(
        strategy = %processor.strategy_kind(),
        background = %config.default_background,
        "Background remover ready"
    );

    let outcomes = if cli.input.first().is_some_and(|s| s == "-") {
        vec![process_stdin(&cli, &processor, config.default_background).await]
    } else {
        let jobs = collect_jobs(&cli)?;
        if jobs.is_empty() {
            warn!("No supported image files found in the provided inputs");
            return Ok(());
        }
        process_batch(&cli, processor, jobs, config.default_background, config.effective_workers())
            .await?
    };

    let failed = report_outcomes(&cli, &outcomes)?;
    if failed > 0 {
        anyhow::bail!("{failed} of {} input(s) failed", outcomes.len());
    }
    Ok(())
}

/// Resolve inputs into (input, output) pairs
fn collect_jobs(cli: &Cli) -> Result<Vec<(PathBuf, OutputTarget)>> {
    let mut all_files = Vec::new();

    for input in &cli.input {
        let path = PathBuf::from(input);
        if path.is_file() {
            all_files.push(path);
        } else if path.is_dir() {
            all_files.extend(find_image_files(&path, cli.recursive, cli.pattern.as_deref())?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    // Sort files alphanumerically for consistent processing order
    all_files.sort();
    all_files.dedup();

    if all_files.is_empty() {
        return Ok(Vec::new());
    }

    if all_files.len() == 1 {
        let input = all_files.remove(0);
        let output = single_output_target(&input, cli.output.as_deref());
        return Ok(vec![(input, output)]);
    }

    let output_dir = match cli.output.as_deref() {
        Some("-") => {
            anyhow::bail!("Cannot use stdout (-) as output when processing multiple files")
        },
        Some(output) => {
            let output_path = PathBuf::from(output);
            if output_path.is_file() {
                anyhow::bail!(
                    "Output path exists and is a file, not a directory: {}",
                    output_path.display()
                );
            }
            std::fs::create_dir_all(&output_path).with_context(|| {
                format!(
                    "Failed to create output directory: {}",
                    output_path.display()
                )
            })?;
            Some(output_path)
        },
        None => None,
    };

    assign_batch_outputs(all_files, output_dir.as_deref())
}

/// Map batch inputs to output files without two inputs sharing one
///
/// Inputs whose default `<stem>_bg_removed.png` collides (`cat.jpg` and
/// `cat.png`) keep their extension in the name. Any collision left after that
/// is an error.
fn assign_batch_outputs(
    inputs: Vec<PathBuf>,
    output_dir: Option<&Path>,
) -> Result<Vec<(PathBuf, OutputTarget)>> {
    let mut default_counts: HashMap<PathBuf, usize> = HashMap::new();
    for input in &inputs {
        *default_counts
            .entry(ImageIOService::output_path_for(input, output_dir))
            .or_default() += 1;
    }

    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut jobs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let default = ImageIOService::output_path_for(&input, output_dir);
        let output = if default_counts.get(&default).copied().unwrap_or(0) > 1 {
            let renamed = ImageIOService::output_path_with_extension(&input, output_dir);
            debug!(
                input = %input.display(),
                output = %renamed.display(),
                "Output name shared with another input; keeping the extension"
            );
            renamed
        } else {
            default
        };

        if let Some(previous) = claimed.get(&output) {
            anyhow::bail!(
                "Inputs {} and {} would both be written to {}",
                previous.display(),
                input.display(),
                output.display()
            );
        }
        claimed.insert(output.clone(), input.clone());
        jobs.push((input, OutputTarget::File(output)));
    }

    Ok(jobs)
}

/// Output for a single input: explicit file, file inside a directory, stdout, or alongside the input
fn single_output_target(input: &Path, output: Option<&str>) -> OutputTarget {
    match output {
        Some("-") => OutputTarget::Stdout,
        Some(output) => {
            let path = PathBuf::from(output);
            if path.is_dir() {
                OutputTarget::File(ImageIOService::output_path_for(input, Some(&path)))
            } else {
                OutputTarget::File(path)
            }
        },
        None => OutputTarget::File(ImageIOService::output_path_for(input, None)),
    }
}

/// Process all jobs with at most `workers` images in flight
async fn process_batch(
    cli: &Cli,
    processor: Arc<BackgroundProcessor>,
    jobs: Vec<(PathBuf, OutputTarget)>,
    background: BackgroundDirective,
    workers: usize,
) -> Result<Vec<FileOutcome>> {
    let file_count = jobs.len();
    let batch_start = Instant::now();
    let batch_span = spans::batch_processing(file_count, workers);
    info!("Found {} image file(s) to process", file_count);

    let progress = if file_count > 1 && !cli.json {
        let pb = ProgressBar::new(file_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut outcomes: Vec<FileOutcome> = futures::stream::iter(jobs)
        .map(|(input, output)| {
            let processor = Arc::clone(&processor);
            let progress = progress.clone();
            let input_display = input.display().to_string();
            async move {
                let result =
                    process_single_file(processor, input, &output, background).await;
                if let Some(pb) = &progress {
                    pb.set_message(input_display.clone());
                    pb.inc(1);
                }
                FileOutcome {
                    input: input_display,
                    output,
                    result,
                }
            }
            .instrument(batch_span.clone())
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    outcomes.sort_by(|a, b| a.input.cmp(&b.input));

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Completed! Processed: {}, Failed: {failed}",
            file_count - failed
        ));
    }

    if file_count > 1 {
        let total = batch_start.elapsed();
        info!(
            processed = file_count - failed,
            failed,
            total_s = %format!("{:.2}", total.as_secs_f64()),
            "Batch processing summary"
        );
    }

    Ok(outcomes)
}

/// Load, process and save one file
async fn process_single_file(
    processor: Arc<BackgroundProcessor>,
    input: PathBuf,
    output: &OutputTarget,
    background: BackgroundDirective,
) -> Result<StrategyKind> {
    let input_display = input.display().to_string();
    let span = spans::file_processing(&input_display);

    async move {
        let start = Instant::now();
        let image = tokio::task::spawn_blocking(move || ImageIOService::load_image(&input))
            .await
            .context("Image loading task failed")??;

        let result = processor.process_blocking(image, background, None).await?;
        let strategy = result.strategy;

        match output.clone() {
            OutputTarget::File(path) => {
                tokio::task::spawn_blocking(move || result.save_png(&path))
                    .await
                    .context("Image saving task failed")??;
            },
            OutputTarget::Stdout => write_stdout(&result.to_png_bytes()?)?,
        }

        debug!(
            output = %output.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Processed image"
        );
        Ok::<_, anyhow::Error>(strategy)
    }
    .instrument(span)
    .await
}

/// Process image data from stdin
async fn process_stdin(
    cli: &Cli,
    processor: &Arc<BackgroundProcessor>,
    background: BackgroundDirective,
) -> FileOutcome {
    info!("Reading image from stdin");
    let output = match cli.output.as_deref() {
        None | Some("-") => OutputTarget::Stdout,
        Some(path) => OutputTarget::File(PathBuf::from(path)),
    };

    let result = async {
        let data = read_stdin()?;
        let image = ImageIOService::decode(&data)?;
        let result = Arc::clone(processor)
            .process_blocking(image, background, None)
            .await?;
        match &output {
            OutputTarget::File(path) => result.save_png(path)?,
            OutputTarget::Stdout => write_stdout(&result.to_png_bytes()?)?,
        }
        Ok::<_, anyhow::Error>(result.strategy)
    }
    .await;

    FileOutcome {
        input: "-".to_string(),
        output,
        result,
    }
}

/// Log each outcome and print JSON reports; returns the failure count
fn report_outcomes(cli: &Cli, outcomes: &[FileOutcome]) -> Result<usize> {
    let mut failed = 0;
    for outcome in outcomes {
        let report = match &outcome.result {
            Ok(strategy) => {
                if cli.verbose > 0 {
                    info!(input = %outcome.input, output = %outcome.output.display(), "Processed");
                }
                FileReport::success(&outcome.input, &outcome.output, *strategy)
            },
            Err(e) => {
                failed += 1;
                error!(input = %outcome.input, "Failed to process: {e:#}");
                FileReport::failure(&outcome.input, e)
            },
        };

        // stdout already carries the PNG for this input
        if cli.json && outcome.output != OutputTarget::Stdout {
            println!(
                "{}",
                serde_json::to_string(&report).context("Failed to serialize report")?
            );
        }
    }
    Ok(failed)
}

/// Read image data from stdin
fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read image data from stdin")?;

    if buffer.is_empty() {
        anyhow::bail!("No data received from stdin");
    }

    Ok(buffer)
}

/// Write image data to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Find supported image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && ImageIOService::is_supported_image(path)
            && matches_pattern(path, pattern)
            && !is_previous_output(path)
        {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Skip files produced by an earlier run
fn is_previous_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with(crate::services::OUTPUT_SUFFIX))
}

/// Check if file matches the given pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}
