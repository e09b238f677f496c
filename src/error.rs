//! Error types for every stage of an archive run.
//!
//! Each concern gets its own enum so callers can match on the failure they
//! actually care about: the fetch loop treats [`FetchError`] and
//! [`ExtractionError`] as per-identifier misses, while [`CheckpointError`] and
//! [`ArchiveError`] stop the run.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Category;

pub type Result<T> = core::result::Result<T, Error>;

/// Fatal errors that end a run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Outcome of a failed page fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The site answered with its standard "no such page" status.
    #[error("No puzzle page at {url}")]
    NotFound { url: String },

    /// Network failure, timeout, 5xx or rate limiting. Worth retrying.
    #[error("Transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },

    /// Any other non-success status. Not retried.
    #[error("{url} answered with HTTP {status}")]
    Rejected { url: String, status: u16 },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// None of the known locators matched the page.
    #[error("No known puzzle payload found in page")]
    NotFound,

    #[error("Payload located by {locator} is not valid JSON: {reason}")]
    MalformedPayload {
        locator: &'static str,
        reason: String,
        raw: String,
    },

    /// Payload decoded but lacks a field needed to file it.
    #[error("Payload located by {locator} has no usable `{field}`")]
    MissingRequiredField {
        locator: &'static str,
        field: &'static str,
        payload: serde_json::Value,
    },
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint file {path} for {category} is malformed: {contents:?}")]
    Malformed {
        category: Category,
        path: PathBuf,
        contents: String,
    },

    #[error("Checkpoint I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't serialize puzzle for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Couldn't start importer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Importer `{program}` exited with {status}")]
    Failed { program: String, status: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
