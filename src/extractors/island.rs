//! Current puzzle pages: an interactive `gu-island` component.
//!
//! The component's serialized props hold the puzzle under `data`. The HTML
//! parser already undoes one level of entity escaping on attribute values;
//! some pages escape the props twice, so any leftover entities are decoded
//! before a second parse attempt.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

use super::Locator;
use crate::utils::decode_html_entities;

static ISLAND_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"gu-island[name="CrosswordComponent"][props]"#).expect("static selector")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct IslandLocator;

impl Locator for IslandLocator {
    fn name(&self) -> &'static str {
        "island"
    }

    fn capture(&self, document: &Html) -> Option<String> {
        document
            .select(&ISLAND_SELECTOR)
            .next()
            .and_then(|el| el.value().attr("props"))
            .map(str::to_string)
    }

    fn decode(&self, raw: &str) -> Result<Value, serde_json::Error> {
        match serde_json::from_str(raw) {
            Ok(value) => Ok(value),
            Err(e) if raw.contains('&') => {
                serde_json::from_str(&decode_html_entities(raw)).map_err(|_| e)
            }
            Err(e) => Err(e),
        }
    }

    fn puzzle<'a>(&self, decoded: &'a Value) -> Option<&'a Value> {
        decoded.get("data")
    }
}
