//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{FetchError, ImportError};
use crate::import::ImportNotifier;
use crate::models::{Category, FetchedDocument, Identifier};
use crate::source::PageSource;

/// Serves canned pages; anything not registered is a 404.
#[derive(Debug, Default)]
pub struct FakeSource {
    pages: HashMap<(Category, Identifier), String>,
    transient: Mutex<HashMap<(Category, Identifier), usize>>,
    calls: Mutex<Vec<(Category, Identifier)>>,
}

impl FakeSource {
    pub fn with_page(mut self, category: Category, id: Identifier, body: &str) -> Self {
        self.pages.insert((category, id), body.to_string());
        self
    }

    /// Fail the next `times` fetches of this page with a transient error.
    pub fn with_transient(self, category: Category, id: Identifier, times: usize) -> Self {
        self.transient.lock().unwrap().insert((category, id), times);
        self
    }

    pub fn calls(&self) -> Vec<(Category, Identifier)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PageSource for FakeSource {
    async fn fetch(
        &self,
        category: Category,
        id: Identifier,
    ) -> Result<FetchedDocument, FetchError> {
        self.calls.lock().unwrap().push((category, id));
        let url = format!("fake://{category}/{id}");

        if let Some(remaining) = self.transient.lock().unwrap().get_mut(&(category, id)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::Transient {
                    url,
                    reason: "connection reset".to_string(),
                });
            }
        }

        match self.pages.get(&(category, id)) {
            Some(body) => Ok(FetchedDocument {
                url,
                status: 200,
                body: body.clone(),
            }),
            None => Err(FetchError::NotFound { url }),
        }
    }
}

/// Records every path it's told about, optionally failing each time.
#[derive(Debug, Default)]
pub struct RecordingImporter {
    pub fail: bool,
    seen: Mutex<Vec<PathBuf>>,
}

impl RecordingImporter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl ImportNotifier for RecordingImporter {
    async fn notify(&self, path: &Path) -> Result<(), ImportError> {
        self.seen.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return Err(ImportError::Failed {
                program: "recording".to_string(),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Never finishes, like an importer stuck on a lock.
#[derive(Debug, Default)]
pub struct StalledImporter;

impl ImportNotifier for StalledImporter {
    async fn notify(&self, _path: &Path) -> Result<(), ImportError> {
        std::future::pending().await
    }
}

/// A legacy container page carrying `payload` as its crossword data.
pub fn container_page(payload: &serde_json::Value) -> String {
    let escaped = payload.to_string().replace('&', "&amp;").replace('"', "&quot;");
    format!(
        r#"<html><body><div class="js-crossword " data-crossword-data="{escaped}"></div></body></html>"#
    )
}

/// A legacy container page for a puzzle by `setter`.
pub fn puzzle_page(setter: &str, id: Identifier) -> String {
    container_page(&serde_json::json!({
        "id": format!("crosswords/cryptic/{id}"),
        "number": id,
        "creator": {"name": setter},
        "entries": [{"id": "1-across", "clue": "Example (5)", "solution": "NUDGE"}],
    }))
}
