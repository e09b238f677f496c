//! Data models shared by the fetch loop, the extractors and the archive.
//!
//! - [`Category`]: a puzzle series with its own identifier sequence
//! - [`FetchedDocument`]: one downloaded puzzle page, dropped after extraction
//! - [`PuzzleRecord`]: the decoded payload plus the setter used for filing
//! - [`StepOutcome`]: what happened to a single identifier

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Numeric puzzle identifier within a category.
pub type Identifier = u64;

/// A Guardian crossword series.
///
/// Each series has an independent identifier sequence and its own checkpoint.
/// The lowercase name is used both as a URL segment and as a directory name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cryptic,
    Prize,
    Quick,
    Quiptic,
    Speedy,
    Everyman,
    Genius,
    Azed,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cryptic => "cryptic",
            Category::Prize => "prize",
            Category::Quick => "quick",
            Category::Quiptic => "quiptic",
            Category::Speedy => "speedy",
            Category::Everyman => "everyman",
            Category::Genius => "genius",
            Category::Azed => "azed",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully downloaded puzzle page.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// The URL that was requested.
    pub url: String,
    /// HTTP status code of the response.
    pub status: u16,
    /// Raw markup.
    pub body: String,
}

/// A decoded puzzle payload that is ready to be filed.
#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleRecord {
    /// Setter name as published, before any path sanitization.
    pub setter: String,
    /// Name of the locator that found the payload.
    pub locator: &'static str,
    /// The full puzzle object.
    pub payload: serde_json::Value,
}

/// Result of processing one identifier in one category.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Saved(Identifier, PathBuf),
    AlreadyPresent(Identifier, PathBuf),
    NotFound,
    FetchFailed(String),
    ExtractionFailed(String),
}

impl StepOutcome {
    /// Whether the identifier counts as processed for checkpointing.
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Saved(..) | StepOutcome::AlreadyPresent(..))
    }
}
