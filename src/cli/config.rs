//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::{BackgroundDirective, RemovalConfig, RemovalConfigBuilder},
    models::ModelSpec,
};
use anyhow::{Context, Result};

/// Convert CLI arguments to a `RemovalConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the configuration: config file first, then flag overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<RemovalConfig> {
        let base = match &cli.config {
            Some(path) => RemovalConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => RemovalConfig::default(),
        };

        let mut builder = RemovalConfigBuilder::from_config(base);

        if let Some(model) = &cli.model {
            let spec = ModelSpec::from_path(model)
                .with_context(|| format!("Invalid model path {}", model.display()))?;
            builder = builder.model(spec);
        }

        if let Some(threshold) = cli.threshold {
            builder = builder.fallback_threshold(threshold);
        }

        if let Some(background) = &cli.background {
            let directive = BackgroundDirective::parse(background)
                .with_context(|| format!("Invalid --background value '{background}'"))?;
            builder = builder.default_background(directive);
        }

        if let Some(timeout_ms) = cli.timeout_ms {
            builder = builder.segmentation_timeout_ms(timeout_ms);
        }

        if let Some(jobs) = cli.jobs {
            builder = builder.max_workers(jobs);
        }

        builder.build().context("Invalid configuration")
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.jobs == Some(0) {
            anyhow::bail!("--jobs must be at least 1");
        }

        let uses_stdin = cli.input.iter().any(|input| input == "-");
        if uses_stdin && cli.input.len() > 1 {
            anyhow::bail!("stdin (-) cannot be combined with other inputs");
        }

        if let Some(pattern) = &cli.pattern {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid --pattern '{pattern}'"))?;
        }

        Ok(())
    }
}
