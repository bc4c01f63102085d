//! Halley notice boards (`halleyweb.com`).
//!
//! The index is a grid API answering with `<row id="…">` records; every id
//! names a detail page. Detail pages are one long run of `td` cells that
//! alternate label, value, label, value. A value cell holding anchors is an
//! attachment list.
//!
//! * Date pattern: `DD/MM/YYYY`.
//! * Required fields: `Oggetto Atto`, `Anno di Pubblicazione`,
//!   `Numero Pubblicazione`, and a date from `Data Atto` or
//!   `Data Inizio Pubblicazione`.
//! * Optional fields: `Tipo Atto`, `Data Fine Pubblicazione`, `Mittente`,
//!   `Documento` and `Allegati` (attachment lists).
//! * Attachments: the pages never state sizes, so every enclosure gets the
//!   default length. The MIME type is guessed from the link text, which is
//!   the file name.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use scraper::{ElementRef, Html};
use tracing::{debug, info};

use super::http::{resolve, Fetch};
use super::markup::{element_text, selector};
use super::{
    discovered, first_date, CategoryKind, Document, Enclosure, FieldValue, Link, NoticeItem,
    Provider, UrlStream,
};
use crate::error::ScrapeError;
use crate::normalize::{
    clean_label, clean_text, guess_mime_type, DatePattern, DEFAULT_ENCLOSURE_LENGTH,
};

const HOST: &str = "http://halleyweb.com";
const INDEX_PATH: &str = "mc_gridev_messi_datigrid.php";
const DETAIL_PATH: &str = "mc_gridev_dettaglio.php?id_pubbl=";

/// Text Halley prints instead of a notice that is no longer public.
const UNAVAILABLE_MARKER: &str = "non può essere visualizzato";

/// A Halley board.
///
/// Options: the municipality slug used in Halley URLs (e.g. `c042002`), or a
/// full base URL for boards hosted elsewhere.
pub struct Halley {
    fetcher: Arc<dyn Fetch>,
    base_url: String,
}

impl Halley {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            base_url: String::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn index_url(&self) -> String {
        format!("{}{INDEX_PATH}", self.base_url)
    }

    fn scan_index(&self) -> Result<Vec<String>, ScrapeError> {
        let index_url = self.index_url();
        let page = self.fetcher.get(&index_url)?;
        if !page.is_success() {
            return Err(ScrapeError::Status {
                url: index_url,
                status: page.status,
            });
        }
        info!(index_url, "scraping index");
        parse_index(&page.body, &self.base_url)
    }

    /// Label/value cells of a detail page, in page order.
    fn cells(&self, page: &Html) -> Result<Vec<FieldValue>, ScrapeError> {
        let td_sel = selector("td")?;
        let a_sel = selector("a")?;

        page.select(&td_sel)
            .map(|td| {
                let anchors: Vec<ElementRef<'_>> = td.select(&a_sel).collect();
                if anchors.is_empty() {
                    return Ok(FieldValue::Text(clean_label(&element_text(td))));
                }
                anchors
                    .into_iter()
                    .map(|a| {
                        Ok(Link {
                            content: element_text(a),
                            href: resolve(&self.base_url, &anchor_target(a))?,
                        })
                    })
                    .collect::<Result<Vec<_>, ScrapeError>>()
                    .map(FieldValue::Links)
            })
            .collect()
    }
}

/// Detail URLs for every `<row id>` of the grid response.
fn parse_index(body: &str, base_url: &str) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(body);
    let row_sel = selector("row[id]")?;

    Ok(document
        .select(&row_sel)
        .filter_map(|row| row.value().attr("id"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| format!("{base_url}{DETAIL_PATH}{id}"))
        .collect())
}

/// Where an anchor points: the first argument of a `window.open(…)` call in
/// its `onclick` when there is one, else its `href`, else nothing.
fn anchor_target(a: ElementRef<'_>) -> String {
    let el = a.value();
    el.attr("onclick")
        .and_then(window_open_target)
        .or_else(|| el.attr("href"))
        .map(clean_text)
        .unwrap_or_default()
}

/// `x.pdf` from `window.open('x.pdf', '_blank');`. Other handlers yield `None`.
fn window_open_target(onclick: &str) -> Option<&str> {
    let args = onclick.trim().strip_prefix("window.open(")?.trim_start();
    let quote = args.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let rest = &args[1..];
    let target = &rest[..rest.find(quote)?];
    (!target.trim().is_empty()).then_some(target)
}

/// Typed view of a Halley detail page.
#[derive(Debug, Clone, PartialEq)]
struct HalleyRecord {
    subject: String,
    year: String,
    number: String,
    act_type: Option<String>,
    unit: Option<String>,
    pub_date: DateTime<FixedOffset>,
    pub_start: Option<DateTime<FixedOffset>>,
    pub_end: Option<DateTime<FixedOffset>>,
    attachments: Vec<Link>,
}

impl HalleyRecord {
    fn from_document(provider: &Halley, doc: &Document) -> Result<Self, ScrapeError> {
        let subject = doc.require("Oggetto Atto")?.to_string();
        let year = doc.require("Anno di Pubblicazione")?.to_string();
        let number = doc.require("Numero Pubblicazione")?.to_string();
        let pub_date = first_date(provider, doc, &["Data Atto", "Data Inizio Pubblicazione"])
            .ok_or_else(|| ScrapeError::MissingField("Data Atto".into()))?;

        Ok(Self {
            subject,
            year,
            number,
            act_type: doc.text("Tipo Atto").map(str::to_string),
            unit: doc.text("Mittente").map(str::to_string),
            pub_date,
            pub_start: first_date(provider, doc, &["Data Inizio Pubblicazione", "Data Atto"]),
            pub_end: provider.parse_date(doc.text("Data Fine Pubblicazione")),
            attachments: doc
                .links("Documento")
                .iter()
                .chain(doc.links("Allegati"))
                .cloned()
                .collect(),
        })
    }

    fn into_item(self, provider: &Halley, url: &str) -> NoticeItem {
        let defaults = provider.defaults();
        let mut item = NoticeItem::new(self.subject, url, self.pub_date);

        item.push_category(
            defaults.category_domain(CategoryKind::Uid),
            format!("{}/{}", self.year, self.number),
        );
        if let Some(act_type) = self.act_type {
            item.push_category(defaults.category_domain(CategoryKind::Type), act_type);
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
        if let Some(unit) = self.unit {
            item.push_category(defaults.category_domain(CategoryKind::Unit), unit);
        }

        for link in self.attachments {
            item.push_enclosure(Enclosure {
                mime_type: guess_mime_type(&link.content),
                url: link.href,
                length: DEFAULT_ENCLOSURE_LENGTH,
            });
        }
        item
    }
}

impl Provider for Halley {
    fn name(&self) -> &'static str {
        "Halley"
    }

    fn date_pattern(&self) -> DatePattern {
        DatePattern::DD_MM_YYYY
    }

    fn configure(mut self, options: &str) -> Result<Self, ScrapeError> {
        let options = options.trim();
        if options.starts_with("http://") || options.starts_with("https://") {
            self.base_url = if options.ends_with('/') {
                options.to_string()
            } else {
                format!("{options}/")
            };
            return Ok(self);
        }

        let is_slug = options
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if options.is_empty() || !is_slug {
            return Err(ScrapeError::InvalidOptions(format!(
                "Halley expects a municipality slug, got '{options}'"
            )));
        }
        self.base_url = format!("{HOST}/{options}/mc/");
        Ok(self)
    }

    fn discover_urls(&mut self) -> UrlStream {
        discovered(self.name(), &self.index_url(), self.scan_index())
    }

    fn extract_item(&mut self, url: &str) -> Result<Option<NoticeItem>, ScrapeError> {
        let page = self.fetcher.get(url)?;
        if !page.is_success() || page.body.contains(UNAVAILABLE_MARKER) {
            info!(url, status = page.status, "detail page unavailable");
            return Ok(None);
        }
        debug!(url, "scraping detail page");

        let html = Html::parse_document(&page.body);
        let doc = Document::from_cells(self.cells(&html)?);
        let record = HalleyRecord::from_document(self, &doc)?;
        Ok(Some(record.into_item(self, url)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{run, FixtureFetcher};

    const BASE: &str = "http://halleyweb.com/c042002/mc/";

    const INDEX_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rows total_count="3">
  <row id="901"><cell>Delibera</cell></row>
  <row id=" 902 "><cell>Ordinanza</cell></row>
  <row id="903"><cell>Avviso</cell></row>
</rows>"#;

    fn detail(subject: &str, number: &str, extra: &str) -> String {
        format!(
            r#"<html><body><table>
<tr><td>Anno di Pubblicazione:</td><td>2024</td></tr>
<tr><td>Numero Pubblicazione:</td><td>{number}</td></tr>
<tr><td>Oggetto Atto:</td><td>{subject}</td></tr>
<tr><td>Data Atto:</td><td>05/03/2024</td></tr>
{extra}
</table></body></html>"#
        )
    }

    fn detail_url(id: &str) -> String {
        format!("{BASE}{DETAIL_PATH}{id}")
    }

    fn halley(fetcher: FixtureFetcher) -> Halley {
        Halley::new(Arc::new(fetcher)).configure("c042002").unwrap()
    }

    #[test]
    fn configure_builds_base_url() {
        let fetcher: Arc<dyn Fetch> = Arc::new(FixtureFetcher::new());
        let board = Halley::new(fetcher.clone()).configure(" c042002 ").unwrap();
        assert_eq!(board.base_url(), BASE);

        let board = Halley::new(fetcher.clone())
            .configure("https://albo.example.it/mc")
            .unwrap();
        assert_eq!(board.base_url(), "https://albo.example.it/mc/");

        assert!(matches!(
            Halley::new(fetcher).configure("c04 2002"),
            Err(ScrapeError::InvalidOptions(_))
        ));
    }

    #[test]
    fn index_rows_become_detail_urls() {
        let urls = parse_index(INDEX_XML, BASE).unwrap();
        assert_eq!(urls, [detail_url("901"), detail_url("902"), detail_url("903")]);
    }

    #[test]
    fn run_drops_missing_detail_page() {
        let fetcher = FixtureFetcher::new()
            .page(&format!("{BASE}{INDEX_PATH}"), INDEX_XML)
            .page(&detail_url("901"), &detail("Approvazione bilancio", "12", ""))
            .status(&detail_url("902"), 404)
            .page(&detail_url("903"), &detail("Avviso alluvione", "14", ""));
        let mut board = halley(fetcher);

        let items: Vec<NoticeItem> = run(&mut board).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Approvazione bilancio");
        assert_eq!(items[0].link, detail_url("901"));
        assert_eq!(items[1].title, "Avviso alluvione");
        assert!(items
            .iter()
            .all(|item| item.pub_date.format("%d/%m/%Y").to_string() == "05/03/2024"));
    }

    #[test]
    fn unavailable_marker_drops_item() {
        let fetcher = FixtureFetcher::new().page(
            &detail_url("901"),
            "<html><body>L'atto non può essere visualizzato</body></html>",
        );
        let mut board = halley(fetcher);
        assert!(board.extract_item(&detail_url("901")).unwrap().is_none());
    }

    #[test]
    fn unavailable_index_yields_no_urls() {
        let mut board = halley(FixtureFetcher::new());
        assert_eq!(board.discover_urls().count(), 0);
    }

    #[test]
    fn maps_categories_and_attachments() {
        let extra = r#"
<tr><td>Tipo Atto:</td><td>Delibera di Consiglio</td></tr>
<tr><td>Data Inizio Pubblicazione:</td><td>06/03/2024</td></tr>
<tr><td>Data Fine Pubblicazione:</td><td>21/03/2024</td></tr>
<tr><td>Mittente:</td><td>Ufficio  Ragioneria</td></tr>
<tr><td>Documento:</td><td><a href="mc_attachment.php?id=1">delibera.pdf</a></td></tr>
<tr><td>Allegati:</td><td>
  <a onclick="window.open('mc_attachment.php?id=2');">allegato_a.pdf</a>
  <a href="https://cdn.example.org/tabella.xlsx">tabella.xlsx</a>
</td></tr>"#;
        let fetcher = FixtureFetcher::new()
            .page(&detail_url("901"), &detail("Rendiconto 2023", "12", extra));
        let mut board = halley(fetcher);

        let item = board.extract_item(&detail_url("901")).unwrap().unwrap();

        let categories: Vec<(&str, &str)> = item
            .categories
            .iter()
            .map(|c| (c.domain.rsplit('#').next().unwrap(), c.value.as_str()))
            .collect();
        assert_eq!(
            categories,
            [
                ("item-category-uid", "2024/12"),
                ("item-category-type", "Delibera di Consiglio"),
                ("item-category-pubStart", "Wed, 06 Mar 2024 00:00:00 +0100"),
                ("item-category-pubEnd", "Thu, 21 Mar 2024 00:00:00 +0100"),
                ("item-category-unit", "Ufficio Ragioneria"),
            ]
        );
        // Publication date prefers the act date over the start of publication.
        assert_eq!(item.pub_date.format("%d/%m/%Y").to_string(), "05/03/2024");

        let urls: Vec<&str> = item.enclosures.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "http://halleyweb.com/c042002/mc/mc_attachment.php?id=1",
                "http://halleyweb.com/c042002/mc/mc_attachment.php?id=2",
                "https://cdn.example.org/tabella.xlsx",
            ]
        );
        assert!(item.enclosures.iter().all(|e| e.length == DEFAULT_ENCLOSURE_LENGTH));
        assert_eq!(item.enclosures[0].mime_type, "application/pdf");
    }

    fn first_anchor(html: &str) -> String {
        let page = Html::parse_fragment(html);
        let a = page.select(&selector("a").unwrap()).next().unwrap();
        anchor_target(a)
    }

    #[test]
    fn onclick_target_only_from_window_open() {
        assert_eq!(
            first_anchor(r##"<a href="#" onclick="window.open('mc_attachment.php?id=2','_blank');">a</a>"##),
            "mc_attachment.php?id=2"
        );
        assert_eq!(
            first_anchor(r#"<a onclick='window.open("doc.pdf")'>a</a>"#),
            "doc.pdf"
        );
        // Any other handler leaves the href in charge.
        assert_eq!(
            first_anchor(r#"<a href="files/atto.pdf" onclick="trackDownload(7);">a</a>"#),
            "files/atto.pdf"
        );
        assert_eq!(
            first_anchor(r#"<a href="files/atto.pdf" onclick="return false;">a</a>"#),
            "files/atto.pdf"
        );
        assert_eq!(
            first_anchor(r#"<a href="files/atto.pdf" onclick="window.open('')">a</a>"#),
            "files/atto.pdf"
        );
        assert_eq!(first_anchor(r#"<a onclick="trackDownload(7);">a</a>"#), "");
    }

    #[test]
    fn missing_subject_is_an_error() {
        let body = r#"<table><tr><td>Anno di Pubblicazione</td><td>2024</td></tr></table>"#;
        let fetcher = FixtureFetcher::new().page(&detail_url("901"), body);
        let mut board = halley(fetcher);

        assert!(matches!(
            board.extract_item(&detail_url("901")),
            Err(ScrapeError::MissingField(field)) if field == "Oggetto Atto"
        ));
    }
}
