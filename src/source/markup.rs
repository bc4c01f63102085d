//! Small `scraper` helpers shared by the adapters.

use scraper::{ElementRef, Selector};

use crate::error::ScrapeError;
use crate::normalize::clean_text;

pub fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(format!("{css}: {e}")))
}

/// All text below `el`, whitespace-collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

/// The next sibling that is an element, skipping text and comments.
pub fn next_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

/// The first non-blank text node following `el` at the same level.
pub fn next_text(el: ElementRef<'_>) -> Option<String> {
    el.next_siblings()
        .filter_map(|node| node.value().as_text().map(|t| clean_text(t)))
        .find(|t| !t.is_empty())
}
