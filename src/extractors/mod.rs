//! Locating and decoding the puzzle payload embedded in a puzzle page.
//!
//! The Guardian has moved the crossword JSON around several times. Each known
//! page format is handled by its own [`Locator`], and an
//! [`ExtractionStrategy`] tries them in a fixed order. The first locator whose
//! element is present in the page owns the result; later locators are not
//! consulted, even if that locator's payload turns out to be broken.
//!
//! # Known Formats
//!
//! | Locator | Element | Attribute | Puzzle object |
//! |---------|---------|-----------|---------------|
//! | `container-exact` | `div.js-crossword` | `data-crossword-data` | whole payload |
//! | `container-tolerant` | `div.js-crossword.<modifier>` | `data-crossword-data` | whole payload |
//! | `island` | `gu-island[name=CrosswordComponent]` | `props` | `data` member |
//!
//! Adding a format means writing a new [`Locator`] and appending it to the
//! list passed to [`ExtractionStrategy::new`].

use scraper::Html;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::ExtractionError;
use crate::models::PuzzleRecord;

pub mod container;
pub mod island;

use container::ContainerLocator;
use island::IslandLocator;

/// JSON pointer to the setter name inside a puzzle object.
pub const SETTER_POINTER: &str = "/creator/name";

/// One known way of finding the puzzle payload in a page.
pub trait Locator: Send + Sync {
    /// Short stable name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Return the captured payload text if this locator's element is present.
    fn capture(&self, document: &Html) -> Option<String>;

    /// Decode the captured text.
    fn decode(&self, raw: &str) -> Result<Value, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Select the puzzle object inside the decoded payload.
    fn puzzle<'a>(&self, decoded: &'a Value) -> Option<&'a Value> {
        Some(decoded)
    }
}

/// An ordered list of locators.
pub struct ExtractionStrategy {
    locators: Vec<Box<dyn Locator>>,
}

impl ExtractionStrategy {
    pub fn new(locators: Vec<Box<dyn Locator>>) -> Self {
        Self { locators }
    }

    /// Every page format the site is known to have used, oldest first.
    pub fn known_formats() -> Self {
        Self::new(vec![
            Box::new(ContainerLocator::exact()),
            Box::new(ContainerLocator::tolerant()),
            Box::new(IslandLocator),
        ])
    }

    pub fn locator_names(&self) -> Vec<&'static str> {
        self.locators.iter().map(|l| l.name()).collect()
    }

    /// Find, decode and validate the puzzle in `body`.
    ///
    /// # Errors
    ///
    /// - [`ExtractionError::NotFound`] if no locator's element is present
    /// - [`ExtractionError::MalformedPayload`] if the captured text isn't JSON
    /// - [`ExtractionError::MissingRequiredField`] if the JSON has no setter
    #[instrument(level = "debug", skip_all, fields(bytes = body.len()))]
    pub fn extract(&self, body: &str) -> Result<PuzzleRecord, ExtractionError> {
        let document = Html::parse_document(body);

        for locator in &self.locators {
            let Some(raw) = locator.capture(&document) else {
                continue;
            };
            debug!(locator = locator.name(), "Locator matched");
            return validate(locator.as_ref(), raw);
        }

        Err(ExtractionError::NotFound)
    }
}

impl Default for ExtractionStrategy {
    fn default() -> Self {
        Self::known_formats()
    }
}

fn validate(locator: &dyn Locator, raw: String) -> Result<PuzzleRecord, ExtractionError> {
    let decoded = match locator.decode(&raw) {
        Ok(value) => value,
        Err(e) => {
            return Err(ExtractionError::MalformedPayload {
                locator: locator.name(),
                reason: e.to_string(),
                raw,
            });
        }
    };

    let Some(puzzle) = locator.puzzle(&decoded).filter(|p| p.is_object()) else {
        return Err(ExtractionError::MissingRequiredField {
            locator: locator.name(),
            field: "data",
            payload: decoded,
        });
    };

    let setter = puzzle
        .pointer(SETTER_POINTER)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    match setter {
        Some(setter) => Ok(PuzzleRecord {
            setter,
            locator: locator.name(),
            payload: puzzle.clone(),
        }),
        None => Err(ExtractionError::MissingRequiredField {
            locator: locator.name(),
            field: "creator.name",
            payload: decoded,
        }),
    }
}
