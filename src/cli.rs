//! Command-line interface definitions.
//!
//! Every flag is optional and overrides the matching field of the YAML
//! configuration (see [`crate::config::Settings`]). Most can also be set
//! through environment variables.

use std::path::PathBuf;

use clap::Parser;

use crate::models::Category;

/// Archive crossword puzzles, resuming from the last run's checkpoints.
///
/// # Examples
///
/// ```sh
/// # Fetch cryptic and prize puzzles with the built-in ranges
/// crossword_archiver
///
/// # Only the prize series, into a different directory
/// crossword_archiver --category prize -o /srv/crosswords
///
/// # Hand every new file to the importer
/// crossword_archiver --import-command "guardian-cc import"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long, env = "CROSSWORD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory that archived puzzles are filed under
    #[arg(short, long, env = "CROSSWORD_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory holding the per-category checkpoint files
    #[arg(long, env = "CROSSWORD_CHECKPOINT_DIR")]
    pub checkpoint_dir: Option<PathBuf>,

    /// Directory for payloads that parsed but couldn't be filed
    #[arg(long, env = "CROSSWORD_QUARANTINE_DIR")]
    pub quarantine_dir: Option<PathBuf>,

    /// Page URL template with {category} and {id} placeholders
    #[arg(long, env = "CROSSWORD_BASE_URL")]
    pub base_url: Option<String>,

    /// Categories to fetch, in order (repeatable; defaults to all configured)
    #[arg(long = "category", value_enum)]
    pub categories: Vec<Category>,

    /// Consecutive misses before a category (or the run) stops
    #[arg(short = 't', long)]
    pub failure_threshold: Option<u32>,

    /// Count misses across all categories together instead of per category
    #[arg(long)]
    pub shared_failures: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Pause between requests in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Command run with each newly archived file as its last argument
    #[arg(long, env = "CROSSWORD_IMPORT_COMMAND")]
    pub import_command: Option<String>,
}
