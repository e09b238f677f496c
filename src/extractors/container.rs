//! Legacy puzzle pages that carry the JSON on a `div.js-crossword` container.
//!
//! Older pages used `class="js-crossword "` on its own. Later ones added
//! modifier classes such as `has-grouped-clues`. Both keep the payload in the
//! `data-crossword-data` attribute.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::Locator;

const CONTAINER_CLASS: &str = "js-crossword";
const DATA_ATTRIBUTE: &str = "data-crossword-data";

static CONTAINER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.js-crossword[data-crossword-data]").expect("static selector")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassMatch {
    /// `js-crossword` and nothing else.
    Exact,
    /// `js-crossword` plus at least one modifier class.
    Tolerant,
}

#[derive(Debug, Clone, Copy)]
pub struct ContainerLocator {
    class_match: ClassMatch,
}

impl ContainerLocator {
    pub fn exact() -> Self {
        Self {
            class_match: ClassMatch::Exact,
        }
    }

    pub fn tolerant() -> Self {
        Self {
            class_match: ClassMatch::Tolerant,
        }
    }

    fn accepts(&self, class_attr: &str) -> bool {
        let extra = class_attr
            .split_whitespace()
            .filter(|c| *c != CONTAINER_CLASS)
            .count();
        match self.class_match {
            ClassMatch::Exact => extra == 0,
            ClassMatch::Tolerant => extra > 0,
        }
    }
}

impl Locator for ContainerLocator {
    fn name(&self) -> &'static str {
        match self.class_match {
            ClassMatch::Exact => "container-exact",
            ClassMatch::Tolerant => "container-tolerant",
        }
    }

    fn capture(&self, document: &Html) -> Option<String> {
        document
            .select(&CONTAINER_SELECTOR)
            .find(|el| el.value().attr("class").is_some_and(|c| self.accepts(c)))
            .and_then(|el| el.value().attr(DATA_ATTRIBUTE))
            .map(str::to_string)
    }
}
