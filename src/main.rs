//! # Crossword Archiver
//!
//! Walks the Guardian's crossword identifier space one puzzle at a time,
//! pulls the puzzle JSON out of each page and files it by series and setter.
//! Progress is checkpointed after every success, so running it again picks up
//! where the last run stopped.
//!
//! ## Usage
//!
//! ```sh
//! crossword_archiver -o ./crosswords --category cryptic --category prize
//! ```
//!
//! ## Architecture
//!
//! 1. **Resume**: read each category's checkpoint ([`checkpoint`])
//! 2. **Fetch**: download the page for the next identifier ([`source`])
//! 3. **Extract**: find the embedded JSON in one of the known page formats ([`extractors`])
//! 4. **File**: write it under `<category>/setter/<setter>/<id>.json` ([`archive`])
//! 5. **Stop**: once a run of consecutive misses says the sequence is exhausted ([`fetcher`])

use std::error::Error;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod archive;
mod checkpoint;
mod cli;
mod config;
mod error;
mod extractors;
mod fetcher;
mod import;
mod models;
mod source;
mod step;
mod utils;

#[cfg(test)]
mod testing;

use archive::Archive;
use checkpoint::CheckpointStore;
use cli::Cli;
use config::Settings;
use extractors::ExtractionStrategy;
use fetcher::{Fetcher, FetcherOptions};
use import::CommandImporter;
use source::{HttpSource, RetrySource};
use step::FetchStep;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("crossword_archiver starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let settings = match Settings::load(args.config.as_deref()).and_then(|s| s.resolve(&args)) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Configuration rejected");
            return Err(e.into());
        }
    };
    info!(
        base_url = %settings.base_url,
        output_dir = %settings.output_dir.display(),
        checkpoint_dir = %settings.checkpoint_dir.display(),
        threshold = settings.failure_threshold,
        policy = ?settings.failure_policy,
        categories = ?settings.categories.iter().map(|r| r.category).collect::<Vec<_>>(),
        "Configuration loaded"
    );

    // Fail early rather than after the first successful fetch.
    for dir in [&settings.output_dir, &settings.checkpoint_dir, &settings.quarantine_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir.display(), error = %e, "Directory is not writable (fix perms or choose a different path)");
            return Err(e.into());
        }
    }

    let http = HttpSource::new(
        settings.url_template()?,
        settings.request_timeout(),
        &settings.user_agent,
    )?;
    let source = RetrySource::new(http, settings.max_retries, settings.retry_base_delay());
    let archive = Archive::new(
        &settings.output_dir,
        &settings.quarantine_dir,
        settings.extension.clone(),
    );
    let importer = settings
        .import_command
        .as_deref()
        .and_then(CommandImporter::from_command_line);
    if let Some(importer) = &importer {
        info!(?importer, "Import hand-off enabled");
    }

    let step = FetchStep::new(source, ExtractionStrategy::known_formats(), archive, importer)
        .with_import_timeout(settings.import_timeout());
    let fetcher = Fetcher::new(
        step,
        CheckpointStore::new(&settings.checkpoint_dir),
        settings.categories.clone(),
        FetcherOptions {
            failure_threshold: settings.failure_threshold,
            failure_policy: settings.failure_policy,
            request_delay: settings.request_delay(),
        },
    );

    let summary = match fetcher.run().await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Run aborted; checkpoints reflect the last saved puzzle");
            return Err(e.into());
        }
    };

    for category in &summary.state.categories {
        info!(
            category = %category.category,
            saved = category.saved,
            already_present = category.already_present,
            misses = category.misses,
            checkpoint = ?category.checkpoint,
            exhausted = category.exhausted,
            "Category finished"
        );
    }

    let elapsed = (summary.finished_at - summary.started_at)
        .to_std()
        .unwrap_or(Duration::ZERO);
    info!(
        halt = ?summary.halt,
        started_at = %summary.started_at.to_rfc3339(),
        ?elapsed,
        secs = elapsed.as_secs(),
        "Execution complete"
    );

    Ok(())
}
