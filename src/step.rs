//! Fetch, extract and file a single puzzle.
//!
//! [`FetchStep::process`] turns one `(category, identifier)` pair into a
//! [`StepOutcome`]. Per-puzzle problems (missing page, unknown page format,
//! broken JSON) come back as outcomes; only failures to write to disk are
//! returned as errors, since they would make every later puzzle fail too.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::archive::{Archive, Filed};
use crate::error::{ExtractionError, FetchError, Result};
use crate::extractors::ExtractionStrategy;
use crate::import::ImportNotifier;
use crate::models::{Category, Identifier, StepOutcome};
use crate::source::PageSource;
use crate::utils::truncate_for_log;

/// How long an import hand-off may run before it is abandoned.
pub const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct FetchStep<S, I> {
    source: S,
    strategy: ExtractionStrategy,
    archive: Archive,
    importer: I,
    import_timeout: Duration,
}

impl<S, I> FetchStep<S, I>
where
    S: PageSource,
    I: ImportNotifier,
{
    pub fn new(source: S, strategy: ExtractionStrategy, archive: Archive, importer: I) -> Self {
        Self {
            source,
            strategy,
            archive,
            importer,
            import_timeout: DEFAULT_IMPORT_TIMEOUT,
        }
    }

    pub fn with_import_timeout(mut self, import_timeout: Duration) -> Self {
        self.import_timeout = import_timeout;
        self
    }

    #[instrument(level = "info", skip(self))]
    pub async fn process(&self, category: Category, id: Identifier) -> Result<StepOutcome> {
        let document = match self.source.fetch(category, id).await {
            Ok(document) => document,
            Err(FetchError::NotFound { .. }) => {
                debug!("No puzzle at this identifier");
                return Ok(StepOutcome::NotFound);
            }
            Err(e) => {
                warn!(error = %e, "Fetch failed");
                return Ok(StepOutcome::FetchFailed(e.to_string()));
            }
        };

        debug!(url = %document.url, status = document.status, "Page fetched");

        let record = match self.strategy.extract(&document.body) {
            Ok(record) => record,
            Err(ExtractionError::NotFound) => {
                warn!(
                    url = %document.url,
                    locators = ?self.strategy.locator_names(),
                    "Page fetched but no known payload format matched; the site layout may have changed"
                );
                return Ok(StepOutcome::ExtractionFailed(
                    ExtractionError::NotFound.to_string(),
                ));
            }
            Err(ExtractionError::MalformedPayload {
                locator,
                reason,
                raw,
            }) => {
                warn!(
                    url = %document.url,
                    locator,
                    reason = %reason,
                    fragment = %truncate_for_log(&raw, 300),
                    "Payload is not valid JSON"
                );
                return Ok(StepOutcome::ExtractionFailed(format!(
                    "{locator} payload is not valid JSON: {reason}"
                )));
            }
            Err(ExtractionError::MissingRequiredField {
                locator,
                field,
                payload,
            }) => {
                let path = self.archive.quarantine(category, id, &payload).await?;
                warn!(
                    url = %document.url,
                    locator,
                    field,
                    quarantine = %path.display(),
                    "Payload missing a required field; quarantined"
                );
                return Ok(StepOutcome::ExtractionFailed(format!(
                    "missing `{field}`; quarantined at {}",
                    path.display()
                )));
            }
        };

        match self.archive.store(category, id, &record).await? {
            Filed::Existing(path) => Ok(StepOutcome::AlreadyPresent(id, path)),
            Filed::Written(path) => {
                info!(setter = %record.setter, locator = record.locator, path = %path.display(), "Saved puzzle");
                match timeout(self.import_timeout, self.importer.notify(&path)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(path = %path.display(), error = %e, "Import hand-off failed; puzzle stays archived");
                    }
                    Err(_) => {
                        warn!(
                            path = %path.display(),
                            timeout = ?self.import_timeout,
                            "Import hand-off timed out; puzzle stays archived"
                        );
                    }
                }
                Ok(StepOutcome::Saved(id, path))
            }
        }
    }
}

#[cfg(test)]
impl<S, I> FetchStep<S, I> {
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn importer(&self) -> &I {
        &self.importer
    }
}
