//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod extract;
mod reset;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use extract::ExtractOptions;

#[derive(Parser)]
#[command(name = "manuals")]
#[command(about = "Resumable text extraction from online manual viewers")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: ./manuals.toml when present)
    #[arg(short, long, global = true, env = "MANUALS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text for every manual in the URL cache that is not done yet
    Extract {
        /// URL cache written by the listing crawl (overrides config)
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Only extract these categories (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Only extract manuals of this brand (case-insensitive)
        #[arg(short, long)]
        brand: Option<String>,
        /// Number of workers, each with its own browser (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Limit number of manuals to consider (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// List pending manuals without fetching anything
        #[arg(long)]
        dry_run: bool,
        /// Disable the OCR fallback even when Tesseract is installed
        #[arg(long)]
        no_ocr: bool,
    },

    /// Show per-category progress from the checkpoint
    Status,

    /// Clear progress so manuals are extracted again
    Reset {
        /// Category the manual belongs to
        category: String,
        /// Manual id to reset
        id: Option<String>,
        /// Clear every abandoned manual in the category
        #[arg(long)]
        abandoned: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract {
            cache,
            categories,
            brand,
            workers,
            limit,
            dry_run,
            no_ocr,
        } => {
            let options = ExtractOptions {
                cache,
                categories,
                brand,
                workers,
                limit,
                dry_run,
                no_ocr,
            };
            extract::cmd_extract(&settings, options).await
        }
        Commands::Status => status::cmd_status(&settings).await,
        Commands::Reset {
            category,
            id,
            abandoned,
        } => reset::cmd_reset(&settings, &category, id.as_deref(), abandoned).await,
    }
}
