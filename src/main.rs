//! Chunk pipeline CLI
//!
//! Runs a configured source -> transforms -> sink pipeline over two files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chunk_pipeline::{assemble, PipelineConfig, StageRegistry};

#[derive(Parser)]
#[command(name = "chunk-pipeline", version)]
#[command(about = "Stream a file through a chain of byte transforms", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "pipeline.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline (default if no command specified)
    Run,

    /// Validate configuration without touching the input or output
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "pipeline.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => run_command(&cli.config),
        Some(Commands::Validate) => {
            init_logging(None)?;
            validate_command(&cli.config)
        }
        Some(Commands::GenerateConfig { output }) => {
            init_logging(None)?;
            generate_config_command(&output)
        }
    }
}

/// Console logging, plus a plain-text copy in `log_file` when one is given
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
    Ok(())
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    let config = PipelineConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn run_command(config_path: &Path) -> Result<()> {
    let config = match PipelineConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            init_logging(None)?;
            tracing::error!("Failed to load configuration from {}: {:#}", config_path.display(), e);
            return Err(e);
        }
    };
    init_logging(config.log_file.as_deref())?;

    if let Err(e) = execute(&config) {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

fn execute(config: &PipelineConfig) -> Result<()> {
    config.validate()?;
    let registry = StageRegistry::with_defaults();

    let input = File::open(&config.input)
        .with_context(|| format!("Failed to open input {}", config.input.display()))?;
    let output = File::create(&config.output)
        .with_context(|| format!("Failed to create output {}", config.output.display()))?;

    let mut pipeline = assemble(config, &registry, input, output)?;
    pipeline.run()?;

    for snapshot in pipeline.all_metrics().iter().map(|m| m.snapshot()) {
        tracing::info!("{}", snapshot);
    }
    tracing::info!(
        "{} -> {}: success",
        config.input.display(),
        config.output.display()
    );
    Ok(())
}

fn validate_command(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = StageRegistry::with_defaults();
    for entry in &config.transforms {
        registry.create(entry)?;
    }
    tracing::info!(
        "Configuration is valid: {} transform stage(s)",
        config.transforms.len()
    );
    Ok(())
}

fn generate_config_command(output: &Path) -> Result<()> {
    let yaml = PipelineConfig::sample().to_yaml()?;
    std::fs::write(output, yaml)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!("Sample configuration written to {}", output.display());
    Ok(())
}
