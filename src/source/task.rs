//! Static-table boards.
//!
//! The index page carries an HTML table inside `div.single_post`: the header
//! row names the columns, each body row is one notice keyed by its registry
//! number (`N.Registro`), and the row's anchors point at detail pages.
//!
//! [`Task`] builds items from the index row alone. The label/value adapters
//! in [`super::label_value`] reuse the same [`RegistryIndex`] and merge their
//! detail-page fields over it.
//!
//! * Date pattern: `D/M/YYYY`.
//! * Required fields: `Titolo` (or `Oggetto`) and one of `Esecutiva dal`,
//!   `Data di pubblicazione`, `Dal`.
//! * Attachments: none; the index row carries no sizes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

use super::http::{resolve, Fetch};
use super::markup::{element_text, selector};
use super::{discovered, first_date, CategoryKind, Document, NoticeItem, Provider, UrlStream};
use crate::error::ScrapeError;
use crate::normalize::{clean_label, DatePattern};

/// Column holding the registry number, e.g. `N. 123/2024`.
pub const REGISTRY_COLUMN: &str = "N.Registro";

/// Index rows keyed by registry number, plus which row linked each URL.
#[derive(Debug, Default)]
pub struct RegistryIndex {
    entries: HashMap<String, Document>,
    ids_by_url: HashMap<String, String>,
}

impl RegistryIndex {
    /// Parse an index page. Returns the detail URLs in table order (each
    /// once) together with the per-row documents.
    pub fn parse(html: &str, index_url: &str) -> Result<(Vec<String>, Self), ScrapeError> {
        let document = Html::parse_document(html);
        let table_sel = selector("div.single_post table")?;
        let tr_sel = selector("tr")?;
        let th_sel = selector("th")?;
        let td_sel = selector("td")?;
        let a_sel = selector("a[href]")?;

        let table = document
            .select(&table_sel)
            .next()
            .ok_or_else(|| ScrapeError::MissingMarkup("table in div.single_post".into()))?;

        let mut rows = table.select(&tr_sel);
        let headers: Vec<String> = rows
            .next()
            .map(|tr| tr.select(&th_sel).map(|th| clean_label(&element_text(th))).collect())
            .unwrap_or_default();
        if headers.is_empty() {
            return Err(ScrapeError::MissingMarkup("header row of index table".into()));
        }

        let mut index = Self::default();
        for tr in rows {
            let doc: Document = headers
                .iter()
                .cloned()
                .zip(tr.select(&td_sel).map(element_text))
                .collect();

            let Some(id) = doc.text(REGISTRY_COLUMN).map(registry_id) else {
                warn!(index_url, "index row without {REGISTRY_COLUMN}, skipped");
                continue;
            };

            for url in link_targets(tr, &a_sel, index_url) {
                index.ids_by_url.insert(url, id.clone());
            }
            index.entries.insert(id, doc);
        }

        let mut urls: Vec<String> = Vec::new();
        for url in link_targets(table, &a_sel, index_url) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }

        Ok((urls, index))
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.entries.get(id)
    }

    pub fn id_for_url(&self, url: &str) -> Option<&str> {
        self.ids_by_url.get(url).map(String::as_str)
    }

    /// Merge detail-page fields into the entry for `id`, creating it if the
    /// index never listed that number. Detail values win.
    pub fn merge(&mut self, id: &str, detail: Document) -> &Document {
        let entry = self.entries.entry(id.to_string()).or_default();
        entry.merge(detail);
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolved `href`s of the anchors below `el`. An href that does not resolve
/// is logged and skipped so one broken row cannot empty the index.
fn link_targets<'a>(
    el: ElementRef<'a>,
    a_sel: &'a Selector,
    index_url: &'a str,
) -> impl Iterator<Item = String> + 'a {
    el.select(a_sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(move |href| match resolve(index_url, href) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(index_url, href, error = %e, "unresolvable link, skipped");
                None
            }
        })
}

/// Registry number as stored in the index: literal `N.` prefix removed.
pub fn registry_id(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix("N.").unwrap_or(raw).trim().to_string()
}

/// Fetch and parse the index of a registry board.
pub(crate) fn load_index(
    fetcher: &dyn Fetch,
    index_url: &str,
) -> Result<(Vec<String>, RegistryIndex), ScrapeError> {
    let page = fetcher.get(index_url)?;
    if !page.is_success() {
        return Err(ScrapeError::Status {
            url: index_url.to_string(),
            status: page.status,
        });
    }
    info!(index_url, "scraping index");
    RegistryIndex::parse(&page.body, index_url)
}

pub(crate) fn parse_index_url(options: &str) -> Result<String, ScrapeError> {
    let index_url = options.trim();
    Url::parse(index_url)
        .map_err(|e| ScrapeError::InvalidOptions(format!("index URL '{index_url}': {e}")))?;
    Ok(index_url.to_string())
}

/// Typed view of a registry notice, whichever pages it was assembled from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RegistryRecord {
    pub id: String,
    pub title: String,
    pub kind: Option<String>,
    pub pub_date: DateTime<FixedOffset>,
    pub pub_start: Option<DateTime<FixedOffset>>,
    pub pub_end: Option<DateTime<FixedOffset>>,
}

impl RegistryRecord {
    pub fn from_document<P: Provider + ?Sized>(
        provider: &P,
        id: &str,
        doc: &Document,
    ) -> Result<Self, ScrapeError> {
        let title = doc
            .first_text(&["Titolo", "Oggetto"])
            .ok_or_else(|| ScrapeError::MissingField("Titolo".into()))?;
        let pub_date = first_date(provider, doc, &["Esecutiva dal", "Data di pubblicazione", "Dal"])
            .ok_or_else(|| ScrapeError::MissingField("Data di pubblicazione".into()))?;

        Ok(Self {
            id: id.to_string(),
            title: title.to_string(),
            kind: doc.text("Tipologia pubblicazione").map(str::to_string),
            pub_date,
            pub_start: first_date(provider, doc, &["Dal", "Data di pubblicazione", "Esecutiva dal"]),
            pub_end: provider.parse_date(doc.text("Al")),
        })
    }

    pub fn into_item<P: Provider + ?Sized>(
        self,
        provider: &P,
        url: &str,
        description: Option<String>,
    ) -> NoticeItem {
        let defaults = provider.defaults();
        let mut item = NoticeItem::new(self.title, url, self.pub_date);
        if let Some(description) = description {
            item = item.with_description(description);
        }

        item.push_category(defaults.category_domain(CategoryKind::Uid), self.id);
        if let Some(kind) = self.kind {
            item.push_category(defaults.category_domain(CategoryKind::Type), kind);
        }
        if let Some(start) = self.pub_start {
            item.push_category(
                defaults.category_domain(CategoryKind::PubStart),
                defaults.format_timestamp(&start),
            );
        }
        if let Some(end) = self.pub_end {
            item.push_category(
                defaults.category_domain(CategoryKind::PubEnd),
                defaults.format_timestamp(&end),
            );
        }
        item
    }
}

/// Static-table board whose items come from the index alone.
///
/// Options: the index page URL.
pub struct Task {
    fetcher: Arc<dyn Fetch>,
    index_url: String,
    index: RegistryIndex,
}

impl Task {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            index_url: String::new(),
            index: RegistryIndex::default(),
        }
    }
}

impl Provider for Task {
    fn name(&self) -> &'static str {
        "Task"
    }

    fn date_pattern(&self) -> DatePattern {
        DatePattern::D_M_YYYY
    }

    fn configure(mut self, options: &str) -> Result<Self, ScrapeError> {
        self.index_url = parse_index_url(options)?;
        Ok(self)
    }

    fn discover_urls(&mut self) -> UrlStream {
        let result = load_index(self.fetcher.as_ref(), &self.index_url).map(|(urls, index)| {
            self.index = index;
            urls
        });
        discovered(self.name(), &self.index_url, result)
    }

    fn extract_item(&mut self, url: &str) -> Result<Option<NoticeItem>, ScrapeError> {
        let id = self
            .index
            .id_for_url(url)
            .ok_or_else(|| ScrapeError::MissingRegistryId(url.to_string()))?;
        let doc = self
            .index
            .get(id)
            .ok_or_else(|| ScrapeError::MissingRegistryId(url.to_string()))?;

        let record = RegistryRecord::from_document(&*self, id, doc)?;
        Ok(Some(record.into_item(&*self, url, None)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
