//! Babelsberg CLI - structure-preserving PDF translation.
//!
//! # Commands
//!
//! - `translate`: run the full pipeline on a PDF and write the translated
//!   document JSON, extracted images, and metadata sidecar
//! - `extract`: dump the typed block stream without translating
//! - `cache`: show statistics for or clear the persistent translation cache
//! - `version`: show version information
//!
//! # Configuration
//!
//! Configuration files in TOML or JSON are supported:
//! - Explicit: `--config path/to/babelsberg.toml`
//! - Auto-discovery: searches for `babelsberg.{toml,json}` in the current
//!   and parent directories
//! - Command-line flags override config file settings
//!
//! # Exit codes
//!
//! - 0: success
//! - 1: partial success (some blocks kept their original text)
//! - 2: fatal I/O error

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use babelsberg::config::PipelineConfig;
use babelsberg::pipeline::{Pipeline, PipelineOutput};
use babelsberg::source::{IdentityBackend, TranslationBackend};
use babelsberg::{HttpBackend, PdfiumSource};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Babelsberg PDF translation CLI
#[derive(Parser)]
#[command(name = "babelsberg")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a PDF, preserving document structure
    Translate {
        /// Path to the PDF document
        path: PathBuf,

        /// Path to config file (TOML or JSON). If not specified, searches for
        /// babelsberg.toml/json in current and parent directories.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Target language (overrides config file)
        #[arg(short, long)]
        lang: Option<String>,

        /// Output directory for the document, images, and sidecar
        #[arg(short, long, default_value = "babelsberg_output")]
        output_dir: PathBuf,

        /// Translation service endpoint; without it the pipeline runs
        /// structure-only with an identity backend
        #[arg(long)]
        endpoint: Option<String>,

        /// Model name pinned into cache keys (overrides config file)
        #[arg(long)]
        model: Option<String>,

        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Extract the typed block stream without translating
    Extract {
        /// Path to the PDF document
        path: PathBuf,

        /// Path to config file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for extracted images
        #[arg(short, long, default_value = "babelsberg_output")]
        output_dir: PathBuf,

        /// Output format (text or json)
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Translation cache management
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Show version information
    Version {
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show persistent cache statistics
    Stats {
        /// Path to config file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Clear the persistent cache
    Clear {
        /// Path to config file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {}. Use 'text' or 'json'", s)),
        }
    }
}

/// Validates that a file exists and is a regular file.
fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!(
            "File not found: '{}'. Please check that the file exists and is accessible.",
            path.display()
        );
    }
    if !path.is_file() {
        anyhow::bail!(
            "Path is not a file: '{}'. Please provide a path to a regular file.",
            path.display()
        );
    }
    Ok(())
}

/// Loads pipeline configuration from a file or discovers it automatically.
fn load_config(config_path: Option<PathBuf>) -> Result<PipelineConfig> {
    if let Some(path) = config_path {
        PipelineConfig::from_file(&path).with_context(|| {
            format!(
                "Failed to load configuration from '{}'. Ensure the file exists, is readable, and contains valid configuration.",
                path.display()
            )
        })
    } else {
        match PipelineConfig::discover() {
            Ok(Some(config)) => Ok(config),
            Ok(None) => Ok(PipelineConfig::default()),
            Err(e) => Err(anyhow::anyhow!(e)).context(
                "Failed to auto-discover configuration. Searched for babelsberg.{toml,json} in current and parent directories. Use --config to specify an explicit path.",
            ),
        }
    }
}

fn print_run_summary(output: &PipelineOutput, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let stats = &output.stats;
            println!("Translated {} blocks over {} pages", stats.blocks_total, stats.pages_total);
            println!("  API calls:         {}", stats.api_calls);
            println!(
                "  Cache hits:        {} memory, {} persistent",
                stats.cache_hits_memory, stats.cache_hits_persistent
            );
            println!(
                "  Regions:           {} kept, {} filtered",
                stats.regions_kept, stats.regions_filtered
            );
            println!("  Fallback blocks:   {}", stats.fallback_translations);
            if let Some(title) = &output.document.title {
                println!("  Title:             {title}");
            }
        }
        OutputFormat::Json => {
            let summary = json!({
                "document": output.document,
                "stats": output.stats,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialize run summary to JSON")?
            );
        }
    }
    Ok(())
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Translate {
            path,
            config: config_path,
            lang,
            output_dir,
            endpoint,
            model,
            format,
        } => {
            validate_file_exists(&path)?;

            let mut config = load_config(config_path)?;
            if let Some(lang) = lang {
                config.target_language = lang;
            }
            if let Some(model) = model {
                config.model_name = Some(model);
            }

            let backend: Arc<dyn TranslationBackend> = match endpoint {
                Some(url) => {
                    let model = config.model_name.clone().unwrap_or_else(|| "default".to_string());
                    Arc::new(HttpBackend::new(url, model))
                }
                None => {
                    tracing::warn!("no --endpoint given; running structure-only with the identity backend");
                    Arc::new(IdentityBackend)
                }
            };

            let pipeline = Pipeline::new(config)
                .map_err(|e| anyhow::anyhow!(e))
                .context("Invalid pipeline configuration")?;
            let mut source = PdfiumSource::open(&path)
                .map_err(|e| anyhow::anyhow!(e))
                .with_context(|| format!("Failed to open '{}'", path.display()))?;

            let output = pipeline
                .run(&mut source, backend, None, &output_dir)
                .await
                .map_err(|e| anyhow::anyhow!(e))
                .with_context(|| format!("Translation of '{}' failed", path.display()))?;

            let document_path = output_dir.join("document.json");
            std::fs::write(&document_path, serde_json::to_string_pretty(&output.document)?)
                .with_context(|| format!("Failed to write '{}'", document_path.display()))?;

            print_run_summary(&output, format)?;

            if output.stats.fallback_translations > 0 {
                // Partial success: some blocks kept their original text.
                return Ok(ExitCode::from(1));
            }
        }

        Commands::Extract {
            path,
            config: config_path,
            output_dir,
            format,
        } => {
            validate_file_exists(&path)?;

            let config = load_config(config_path)?;
            let pipeline = Pipeline::new(config)
                .map_err(|e| anyhow::anyhow!(e))
                .context("Invalid pipeline configuration")?;
            let mut source = PdfiumSource::open(&path)
                .map_err(|e| anyhow::anyhow!(e))
                .with_context(|| format!("Failed to open '{}'", path.display()))?;

            let output = pipeline
                .extract(&mut source, &output_dir)
                .map_err(|e| anyhow::anyhow!(e))
                .with_context(|| format!("Extraction of '{}' failed", path.display()))?;

            match format {
                OutputFormat::Text => {
                    for block in &output.document.blocks {
                        println!(
                            "p{:>3} #{:>3} {:<18} {}",
                            block.page_num,
                            block.reading_order_position,
                            block.kind.type_name(),
                            block.kind.translatable_text().unwrap_or(""),
                        );
                    }
                }
                OutputFormat::Json => {
                    let summary = json!({
                        "document": output.document,
                        "stats": output.stats,
                    });
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&summary)
                            .context("Failed to serialize extraction result to JSON")?
                    );
                }
            }
        }

        Commands::Cache { command } => match command {
            CacheCommands::Stats {
                config: config_path,
                format,
            } => {
                let config = load_config(config_path)?;
                let cache = babelsberg::cache::TwoTierCache::from_config(&config.cache);
                let stats = cache.persistent_stats();

                match format {
                    OutputFormat::Text => {
                        println!("Translation cache");
                        println!("=================");
                        println!("File:        {}", config.cache.cache_file_path.display());
                        println!("Entries:     {}", stats.entry_count);
                        println!("Total usage: {}", stats.total_usage);
                    }
                    OutputFormat::Json => {
                        let output = json!({
                            "file": config.cache.cache_file_path,
                            "entries": stats.entry_count,
                            "total_usage": stats.total_usage,
                        });
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&output)
                                .context("Failed to serialize cache statistics to JSON")?
                        );
                    }
                }
            }
            CacheCommands::Clear { config: config_path } => {
                let config = load_config(config_path)?;
                let cache = babelsberg::cache::TwoTierCache::from_config(&config.cache);
                let before = cache.persistent_stats().entry_count;
                cache.clear();
                cache
                    .save()
                    .map_err(|e| anyhow::anyhow!(e))
                    .context("Failed to persist the cleared cache")?;
                println!("Cleared {before} cached translations");
            }
        },

        Commands::Version { format } => {
            let version = env!("CARGO_PKG_VERSION");
            let name = "babelsberg";
            match format {
                OutputFormat::Text => println!("{name} {version}"),
                OutputFormat::Json => {
                    let output = json!({ "name": name, "version": version });
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&output)
                            .context("Failed to serialize version information to JSON")?
                    );
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            // Fatal errors (unreadable input, unwritable output) exit 2.
            ExitCode::from(2)
        }
    }
}
