//! Label/value boards.
//!
//! Discovery is the static-table index of [`super::task`]. Each detail page
//! then carries a free-text header containing the registry number
//! (`N. <token>`) and a block of label/value pairs. The pairs are merged over
//! the index row with the same number, detail values winning.
//!
//! Two header markups are in use:
//!
//! * [`HeaderLayout::MainHeader`] (`Task2`): `main#main header`, described by
//!   the `h1` text, the text following the `h1`, and the text following the
//!   `header`. Labels are `td.etichetta`, each value the next `td`.
//! * [`HeaderLayout::TitleBlock`] (`Task3`): `div.titolo-atto`, described by
//!   its `h2` and first `p`. Labels are `div.etichetta`, each value the next
//!   sibling element.
//!
//! Date pattern `D/MM/YYYY`. Required fields as for [`super::task`].
//! Attachments are `div.testoallegato` blocks; the size comes from a
//! `div.testokb` child when it holds a size token, else the default length.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

use super::http::{resolve, Fetch};
use super::markup::{element_text, next_element, next_text, selector};
use super::task::{load_index, parse_index_url, RegistryIndex, RegistryRecord};
use super::{discovered, Document, Enclosure, NoticeItem, Provider, UrlStream};
use crate::error::ScrapeError;
use crate::normalize::{clean_label, guess_mime_type, parse_byte_size, DatePattern};

static REGISTRY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"N\. ([^ ]+)").expect("registry number regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    MainHeader,
    TitleBlock,
}

impl HeaderLayout {
    fn provider_name(self) -> &'static str {
        match self {
            Self::MainHeader => "Task2",
            Self::TitleBlock => "Task3",
        }
    }

    fn label_selector(self) -> &'static str {
        match self {
            Self::MainHeader => "div.info td.etichetta",
            Self::TitleBlock => "div.info div.etichetta",
        }
    }

    /// Free-text description of the notice, built from the page header.
    fn description(self, page: &Html) -> Result<String, ScrapeError> {
        let parts = match self {
            Self::MainHeader => {
                let header = first(page, "main#main header")?;
                let h1 = first_in(header, "h1")?;
                vec![Some(element_text(h1)), next_text(h1), next_text(header)]
            }
            Self::TitleBlock => {
                let block = first(page, "div.titolo-atto")?;
                let h2 = first_in(block, "h2")?;
                let subtitle = block.select(&selector("p")?).next().map(element_text);
                vec![Some(element_text(h2)), subtitle]
            }
        };

        Ok(parts
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Label/value pairs of the detail block.
    fn fields(self, page: &Html) -> Result<Document, ScrapeError> {
        let labels: Vec<ElementRef<'_>> = page.select(&selector(self.label_selector())?).collect();
        if labels.is_empty() {
            return Err(ScrapeError::MissingMarkup(self.label_selector().into()));
        }

        Ok(labels
            .into_iter()
            .map(|label| {
                let value = next_element(label).map(element_text).unwrap_or_default();
                (clean_label(&element_text(label)), value)
            })
            .collect())
    }
}

fn first<'a>(page: &'a Html, css: &str) -> Result<ElementRef<'a>, ScrapeError> {
    page.select(&selector(css)?)
        .next()
        .ok_or_else(|| ScrapeError::MissingMarkup(css.to_string()))
}

fn first_in<'a>(el: ElementRef<'a>, css: &str) -> Result<ElementRef<'a>, ScrapeError> {
    el.select(&selector(css)?)
        .next()
        .ok_or_else(|| ScrapeError::MissingMarkup(css.to_string()))
}

/// Registry number embedded in a description such as `"Avviso N. 12/2024 del …"`.
pub fn extract_registry_id(description: &str) -> Result<String, ScrapeError> {
    REGISTRY_NUMBER
        .captures(description)
        .map(|caps| caps[1].trim().to_string())
        .ok_or_else(|| ScrapeError::MissingRegistryId(description.to_string()))
}

/// Attachments listed in `div.testoallegato` blocks, in page order.
///
/// A block without a usable link is skipped; the notice keeps its other
/// attachments.
fn attachments(page: &Html, page_url: &str) -> Result<Vec<Enclosure>, ScrapeError> {
    let block_sel = selector("div.testoallegato")?;
    let a_sel = selector("a[href]")?;
    let size_sel = selector("div.testokb")?;

    let mut enclosures = Vec::new();
    for block in page.select(&block_sel) {
        let Some(href) = block.select(&a_sel).next().and_then(|a| a.value().attr("href")) else {
            debug!(page_url, "attachment block without link, skipped");
            continue;
        };
        let url = match resolve(page_url, href) {
            Ok(url) => url,
            Err(e) => {
                warn!(page_url, href, error = %e, "unresolvable attachment link, skipped");
                continue;
            }
        };
        let length = block
            .select(&size_sel)
            .next()
            .map(|kb| parse_byte_size(&element_text(kb)))
            .unwrap_or(crate::normalize::DEFAULT_ENCLOSURE_LENGTH);

        enclosures.push(Enclosure {
            mime_type: guess_mime_type(&url),
            url,
            length,
        });
    }
    Ok(enclosures)
}

/// Registry board with label/value detail pages.
///
/// Options: the index page URL.
pub struct LabelValueBoard {
    fetcher: Arc<dyn Fetch>,
    layout: HeaderLayout,
    index_url: String,
    index: RegistryIndex,
}

impl LabelValueBoard {
    pub fn new(fetcher: Arc<dyn Fetch>, layout: HeaderLayout) -> Self {
        Self {
            fetcher,
            layout,
            index_url: String::new(),
            index: RegistryIndex::default(),
        }
    }
}

impl Provider for LabelValueBoard {
    fn name(&self) -> &'static str {
        self.layout.provider_name()
    }

    fn date_pattern(&self) -> DatePattern {
        DatePattern::D_MM_YYYY
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
        let page = self.fetcher.get(url)?;
        if !page.is_success() {
            info!(url, status = page.status, "detail page unavailable");
            return Ok(None);
        }
        debug!(url, "scraping detail page");

        let html = Html::parse_document(&page.body);
        let description = self.layout.description(&html)?;
        let id = extract_registry_id(&description)?;
        let fields = self.layout.fields(&html)?;
        let enclosures = attachments(&html, url)?;

        let merged = self.index.merge(&id, fields).clone();
        let record = RegistryRecord::from_document(&*self, &id, &merged)?;

        let mut item = record.into_item(&*self, url, Some(description));
        for enclosure in enclosures {
            item.push_enclosure(enclosure);
        }
        Ok(Some(item))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
