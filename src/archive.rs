//! On-disk layout for archived puzzles and quarantined payloads.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── cryptic/
//! │   └── setter/
//! │       ├── Araucaria/
//! │       │   ├── 21620.json
//! │       │   └── 21634.json
//! │       └── Paul/
//! │           └── 21625.json
//! └── prize/
//!     └── setter/...
//!
//! quarantine_dir/
//! └── cryptic/
//!     └── 21702.json   # parsed, but no setter
//! ```
//!
//! Records are written to a temporary sibling and renamed into place, so a
//! file at the final path is always complete.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::checkpoint::write_atomic;
use crate::error::ArchiveError;
use crate::models::{Category, Identifier, PuzzleRecord};

static UNSAFE_SEGMENT_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[/\\\p{Cc}]").expect("static regex"));

/// Longest setter segment, in bytes. Filesystems cap a name at 255.
const MAX_SEGMENT_BYTES: usize = 200;

/// Turn a published setter name into a single safe path segment.
///
/// Path separators and control characters become `_`, surrounding whitespace
/// is trimmed, and `.`/`..` are replaced so the segment can't climb out of its
/// parent. Names longer than [`MAX_SEGMENT_BYTES`] are cut on a character
/// boundary. An empty name files under `unknown`.
pub fn sanitize_setter(name: &str) -> String {
    let cleaned = UNSAFE_SEGMENT_CHARS.replace_all(name.trim(), "_");
    let mut cut = cleaned.len().min(MAX_SEGMENT_BYTES);
    while !cleaned.is_char_boundary(cut) {
        cut -= 1;
    }
    let cleaned = cleaned[..cut].trim();
    match cleaned {
        "" => "unknown".to_string(),
        "." | ".." => "_".to_string(),
        other => other.to_string(),
    }
}

/// Where a record ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filed {
    Written(PathBuf),
    Existing(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Archive {
    output_dir: PathBuf,
    quarantine_dir: PathBuf,
    extension: String,
}

impl Archive {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        quarantine_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            quarantine_dir: quarantine_dir.into(),
            extension: extension.into(),
        }
    }

    /// `<output_dir>/<category>/setter/<setter>/<id>.<ext>`
    pub fn record_path(&self, category: Category, id: Identifier, setter: &str) -> PathBuf {
        self.output_dir
            .join(category.as_str())
            .join("setter")
            .join(sanitize_setter(setter))
            .join(format!("{}.{}", id, self.extension))
    }

    /// `<quarantine_dir>/<category>/<id>.json`
    pub fn quarantine_path(&self, category: Category, id: Identifier) -> PathBuf {
        self.quarantine_dir
            .join(category.as_str())
            .join(format!("{}.json", id))
    }

    /// File a puzzle under its setter, leaving any existing copy untouched.
    #[instrument(level = "debug", skip(self, record), fields(setter = %record.setter))]
    pub async fn store(
        &self,
        category: Category,
        id: Identifier,
        record: &PuzzleRecord,
    ) -> Result<Filed, ArchiveError> {
        let path = self.record_path(category, id, &record.setter);

        if fs::try_exists(&path)
            .await
            .map_err(|source| ArchiveError::Io {
                path: path.clone(),
                source,
            })?
        {
            debug!(path = %path.display(), "Puzzle already archived");
            return Ok(Filed::Existing(path));
        }

        write_json(&path, &record.payload).await?;
        info!(path = %path.display(), "Archived puzzle");
        Ok(Filed::Written(path))
    }

    /// Keep a payload that parsed but couldn't be filed.
    #[instrument(level = "debug", skip(self, payload))]
    pub async fn quarantine(
        &self,
        category: Category,
        id: Identifier,
        payload: &Value,
    ) -> Result<PathBuf, ArchiveError> {
        let path = self.quarantine_path(category, id);
        write_json(&path, payload).await?;
        Ok(path)
    }
}

async fn write_json(path: &Path, value: &Value) -> Result<(), ArchiveError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| ArchiveError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| ArchiveError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    write_atomic(path, &json)
        .await
        .map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })
}
