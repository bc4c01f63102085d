//! Provider abstraction layer.
//!
//! This module defines the [`Provider`] trait, the shared defaults every
//! board inherits, and the item stream that turns discovered URLs into
//! [`NoticeItem`]s. Concrete adapters live in sub-modules, one per family of
//! notice-board software.
//!
//! ## For contributors — adding a new provider
//!
//! 1. Create a new file in this directory (e.g. `maggioli.rs`).
//! 2. Define a struct holding its options and any cross-page state, and
//!    implement [`Provider`] for it.
//! 3. Add `mod maggioli;` below and re-export the struct.
//! 4. Register a factory under the name used in the jobs CSV in
//!    [`crate::registry`].
//!
//! The item stream, the worker pool and the feed writer are all
//! provider-agnostic.

mod document;
mod halley;
mod http;
mod item;
mod label_value;
mod markup;
mod task;

pub use document::{Document, FieldValue, Link};
pub use halley::Halley;
pub use http::{resolve, Fetch, HttpFetcher, Page};
pub use item::{Category, CategoryKind, Enclosure, NoticeItem};
pub use label_value::{HeaderLayout, LabelValueBoard};
pub use task::{RegistryIndex, Task};

#[cfg(test)]
pub(crate) use http::fixtures::FixtureFetcher;
#[cfg(test)]
pub(crate) use task::tests as registry_fixtures;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::error::ScrapeError;
use crate::normalize::{self, DatePattern};

/// Candidate detail-page URLs, in index order. Finite and single-pass.
pub type UrlStream = std::vec::IntoIter<String>;

/// Settings every provider inherits unless it overrides
/// [`Provider::defaults`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDefaults {
    /// `strftime` layout for dates written into the feed (RFC 2822).
    pub output_format: &'static str,
    pub timezone: Tz,
    pub language: &'static str,
    pub feed_base_url: &'static str,
    pub docs_base_url: &'static str,
    pub specs_base_url: &'static str,
}

pub const DEFAULTS: ProviderDefaults = ProviderDefaults {
    output_format: "%a, %d %b %Y %H:%M:%S %z",
    timezone: chrono_tz::Europe::Rome,
    language: "it",
    feed_base_url: "http://feeds.ricostruzionetrasparente.it/albi_pretori/",
    docs_base_url: "http://albopop.it/",
    specs_base_url: "http://albopop.it/specs/",
};

impl ProviderDefaults {
    /// Category domain for `kind`, e.g. `http://albopop.it/specs/#item-category-uid`.
    pub fn category_domain(&self, kind: CategoryKind) -> String {
        format!("{}#{}", self.specs_base_url, kind.fragment())
    }

    pub fn format_timestamp(&self, dt: &DateTime<FixedOffset>) -> String {
        dt.format(self.output_format).to_string()
    }
}

/// Trait that every notice-board adapter implements.
///
/// A provider is created once per job, configured from the job's options
/// string, then driven through [`run`]: discovery first, then one
/// [`extract_item`](Provider::extract_item) call per URL.
///
/// ## Implementing a new provider
///
/// ```ignore
/// pub struct MyBoard { fetcher: Arc<dyn Fetch>, index_url: String }
///
/// impl Provider for MyBoard {
///     fn name(&self) -> &'static str { "MyBoard" }
///     fn date_pattern(&self) -> DatePattern { DatePattern::DD_MM_YYYY }
///
///     fn configure(mut self, options: &str) -> Result<Self, ScrapeError> {
///         self.index_url = options.trim().to_string();
///         Ok(self)
///     }
///
///     fn discover_urls(&mut self) -> UrlStream {
///         discovered(self.name(), &self.index_url, self.index())
///     }
///
///     fn extract_item(&mut self, url: &str) -> Result<Option<NoticeItem>, ScrapeError> {
///         // Fetch the page, build a Document, map it to a NoticeItem.
///         todo!()
///     }
/// }
/// ```
pub trait Provider: Send {
    /// Name used in the `provider` column of the jobs CSV.
    fn name(&self) -> &'static str;

    /// Layout of dates printed on this board.
    fn date_pattern(&self) -> DatePattern;

    /// Apply the job's raw options string. Consumes and returns the provider
    /// so construction and configuration chain.
    fn configure(self, options: &str) -> Result<Self, ScrapeError>
    where
        Self: Sized;

    fn defaults(&self) -> &ProviderDefaults {
        &DEFAULTS
    }

    /// Fetch the index page(s) and return candidate detail URLs.
    ///
    /// May record per-row data that [`extract_item`](Provider::extract_item)
    /// later merges with. Never fails: an unreachable index is logged and
    /// yields no URLs.
    fn discover_urls(&mut self) -> UrlStream;

    /// Scrape one detail page. `Ok(None)` means the board reports the notice
    /// as unavailable; errors mean the page could not be understood.
    fn extract_item(&mut self, url: &str) -> Result<Option<NoticeItem>, ScrapeError>;

    /// Parse a board date with this provider's pattern and timezone.
    fn parse_date(&self, raw: Option<&str>) -> Option<DateTime<FixedOffset>> {
        normalize::parse_date(raw, self.date_pattern(), self.defaults().timezone)
    }

    /// Parse a board date and print it in the feed's output format; empty
    /// when the date is unknown.
    fn format_date(&self, raw: Option<&str>) -> String {
        self.parse_date(raw)
            .map(|dt| self.defaults().format_timestamp(&dt))
            .unwrap_or_default()
    }
}

/// First of `labels` whose value parses as a date, in order of preference.
pub fn first_date<P: Provider + ?Sized>(
    provider: &P,
    doc: &Document,
    labels: &[&str],
) -> Option<DateTime<FixedOffset>> {
    labels
        .iter()
        .find_map(|label| provider.parse_date(doc.text(label)))
}

/// Turn the outcome of an index scan into a [`UrlStream`], logging a
/// warning and yielding nothing on failure.
pub fn discovered(
    provider: &str,
    index_url: &str,
    result: Result<Vec<String>, ScrapeError>,
) -> UrlStream {
    match result {
        Ok(urls) => {
            debug!(provider, index_url, count = urls.len(), "index scanned");
            urls.into_iter()
        }
        Err(e) => {
            warn!(provider, index_url, error = %e, "index page unavailable");
            Vec::new().into_iter()
        }
    }
}

// ---------------------------------------------------------------------------
// Item stream
// ---------------------------------------------------------------------------

/// Lazily extracts one item per URL, in URL order.
///
/// A URL whose extraction fails or reports the notice unavailable is logged
/// and skipped; it never ends the stream early.
pub struct ItemStream<'a, P: Provider + ?Sized, I> {
    provider: &'a mut P,
    urls: I,
}

impl<P, I> Iterator for ItemStream<'_, P, I>
where
    P: Provider + ?Sized,
    I: Iterator<Item = String>,
{
    type Item = NoticeItem;

    fn next(&mut self) -> Option<NoticeItem> {
        for url in self.urls.by_ref() {
            match self.provider.extract_item(&url) {
                Ok(Some(item)) => return Some(item),
                Ok(None) => {
                    debug!(provider = self.provider.name(), url = %url, "notice unavailable, dropped");
                }
                Err(e) => {
                    warn!(provider = self.provider.name(), url = %url, error = %e, "error scraping page");
                }
            }
        }
        None
    }
}

/// Extract items for `urls` with per-item fault isolation.
pub fn produce_items<P, I>(provider: &mut P, urls: I) -> ItemStream<'_, P, I::IntoIter>
where
    P: Provider + ?Sized,
    I: IntoIterator<Item = String>,
{
    ItemStream {
        provider,
        urls: urls.into_iter(),
    }
}

/// Discovery followed by extraction. Index side-state is fully populated
/// before the first detail page is fetched.
pub fn run<P: Provider + ?Sized>(provider: &mut P) -> ItemStream<'_, P, UrlStream> {
    let urls = provider.discover_urls();
    produce_items(provider, urls)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
