//! Run configuration.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! command-line flags and environment variables. The YAML file uses the same
//! field names as [`Settings`]:
//!
//! ```yaml
//! base_url: "https://www.theguardian.com/crosswords/{category}/{id}"
//! output_dir: crosswords
//! checkpoint_dir: tools
//! failure_threshold: 3
//! failure_policy: per_category
//! categories:
//!   - category: cryptic
//!     lower_id: 21620
//!     upper_id: 39480
//!   - category: prize
//!     lower_id: 21622
//!     upper_id: 50000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::models::{Category, Identifier};
use crate::source::UrlTemplate;

pub const DEFAULT_BASE_URL: &str = "https://www.theguardian.com/crosswords/{category}/{id}";

/// How consecutive misses are counted across categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Each category has its own counter and stops on its own.
    #[default]
    PerCategory,
    /// One counter for the whole run.
    Shared,
}

/// The identifier window to scan for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRange {
    pub category: Category,
    /// First identifier to try when there is no checkpoint.
    pub lower_id: Identifier,
    /// Last identifier to try, inclusive.
    pub upper_id: Identifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub output_dir: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub quarantine_dir: PathBuf,
    pub extension: String,
    pub failure_threshold: u32,
    pub failure_policy: FailurePolicy,
    pub request_timeout_secs: u64,
    pub request_delay_ms: u64,
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub user_agent: String,
    pub import_command: Option<String>,
    pub import_timeout_secs: u64,
    pub categories: Vec<CategoryRange>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from("crosswords"),
            checkpoint_dir: PathBuf::from("tools"),
            quarantine_dir: PathBuf::from("quarantine"),
            extension: "json".to_string(),
            failure_threshold: 3,
            failure_policy: FailurePolicy::PerCategory,
            request_timeout_secs: 30,
            request_delay_ms: 500,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            import_command: None,
            import_timeout_secs: 120,
            categories: vec![
                CategoryRange {
                    category: Category::Cryptic,
                    lower_id: 21620,
                    upper_id: 39480,
                },
                CategoryRange {
                    category: Category::Prize,
                    lower_id: 21622,
                    upper_id: 50000,
                },
            ],
        }
    }
}

impl Settings {
    /// Defaults, overlaid with the YAML file at `path` if one is given.
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Apply command-line overrides, then validate the result.
    pub fn resolve(mut self, cli: &Cli) -> Result<Self, ConfigError> {
        if let Some(base_url) = &cli.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(dir) = &cli.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(dir) = &cli.checkpoint_dir {
            self.checkpoint_dir = dir.clone();
        }
        if let Some(dir) = &cli.quarantine_dir {
            self.quarantine_dir = dir.clone();
        }
        if let Some(threshold) = cli.failure_threshold {
            self.failure_threshold = threshold;
        }
        if cli.shared_failures {
            self.failure_policy = FailurePolicy::Shared;
        }
        if let Some(secs) = cli.timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(ms) = cli.delay_ms {
            self.request_delay_ms = ms;
        }
        if let Some(command) = &cli.import_command {
            self.import_command = Some(command.clone());
        }

        if !cli.categories.is_empty() {
            let mut selected = Vec::new();
            for category in cli.categories.iter().unique() {
                let range = self
                    .categories
                    .iter()
                    .find(|r| r.category == *category)
                    .copied()
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!(
                            "no identifier range configured for category `{category}`"
                        ))
                    })?;
                selected.push(range);
            }
            self.categories = selected;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        UrlTemplate::parse(&self.base_url)?;
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.import_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "import_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid("no categories configured".to_string()));
        }
        if let Some(dup) = self.categories.iter().map(|r| r.category).duplicates().next() {
            return Err(ConfigError::Invalid(format!(
                "category `{dup}` is configured more than once"
            )));
        }
        for range in &self.categories {
            if range.lower_id > range.upper_id {
                return Err(ConfigError::Invalid(format!(
                    "category `{}` has lower_id {} above upper_id {}",
                    range.category, range.lower_id, range.upper_id
                )));
            }
        }
        if self.extension.is_empty() || self.extension.contains(['/', '\\', '.']) {
            return Err(ConfigError::Invalid(format!(
                "extension {:?} must be a bare file extension",
                self.extension
            )));
        }
        Ok(())
    }

    pub fn url_template(&self) -> Result<UrlTemplate, ConfigError> {
        UrlTemplate::parse(&self.base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn import_timeout(&self) -> Duration {
        Duration::from_secs(self.import_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
