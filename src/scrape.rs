//! Drives one provider through one job.
//!
//! Construct, configure, run. Nothing is retried: a job whose provider cannot
//! be built is reported to the caller, which logs it and moves on.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::registry::ProviderRegistry;
use crate::source::{self, Fetch, NoticeItem, ProviderDefaults};

/// Items produced by one job, with the defaults of the provider that
/// produced them.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub provider: &'static str,
    pub defaults: ProviderDefaults,
    pub items: Vec<NoticeItem>,
}

/// Like [`ScrapeOutcome`] but also keeps the discovered URLs, for dry runs.
#[derive(Debug, Clone)]
pub struct ScrapePreview {
    pub urls: Vec<String>,
    pub outcome: ScrapeOutcome,
}

/// Whether `err` means the job could not even start.
pub fn is_job_level(err: &ScrapeError) -> bool {
    matches!(
        err,
        ScrapeError::UnknownProvider(_) | ScrapeError::InvalidOptions(_)
    )
}

/// Run the provider named `provider` over `options` to completion.
///
/// Per-item failures never surface here; only failures to build the
/// provider do.
pub fn scrape(
    registry: &ProviderRegistry,
    fetcher: Arc<dyn Fetch>,
    provider: &str,
    options: &str,
) -> Result<ScrapeOutcome, ScrapeError> {
    let mut adapter = registry.create(provider, fetcher, options).inspect_err(|e| {
        warn!(provider, options, error = %e, "job skipped");
    })?;

    let items: Vec<NoticeItem> = source::run(adapter.as_mut()).collect();
    info!(provider = adapter.name(), options, items = items.len(), "job scraped");

    Ok(ScrapeOutcome {
        provider: adapter.name(),
        defaults: adapter.defaults().clone(),
        items,
    })
}

/// Same as [`scrape`] but collects the discovered URLs before extraction.
pub fn preview(
    registry: &ProviderRegistry,
    fetcher: Arc<dyn Fetch>,
    provider: &str,
    options: &str,
) -> Result<ScrapePreview, ScrapeError> {
    let mut adapter = registry.create(provider, fetcher, options)?;

    let urls: Vec<String> = adapter.discover_urls().collect();
    let items: Vec<NoticeItem> = source::produce_items(adapter.as_mut(), urls.clone()).collect();

    Ok(ScrapePreview {
        urls,
        outcome: ScrapeOutcome {
            provider: adapter.name(),
            defaults: adapter.defaults().clone(),
            items,
        },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::registry_fixtures::{INDEX_HTML, INDEX_URL};
    use crate::source::FixtureFetcher;

    const DETAIL_101: &str = r#"<html><body>
<main id="main"><header><h1>Avviso di gara</h1> pubblicato N. 101/2024 del 4/3/2024</header>
 ufficio tecnico</main>
<div class="info"><table>
  <tr><td class="etichetta">Titolo</td><td>Avviso di gara per lavori stradali</td></tr>
  <tr><td class="etichetta">Dal</td><td>5/03/2024</td></tr>
</table></div>
</body></html>"#;

    const DETAIL_103: &str = r#"<html><body>
<main id="main"><header><h1>Delibera di Giunta</h1> N. 103/2024</header></main>
<div class="info"><table>
  <tr><td class="etichetta">Dal</td><td>6/03/2024</td></tr>
</table></div>
<div class="testoallegato"><a href="/files/delibera.pdf">delibera.pdf</a><div class="testokb">12.3 MB</div></div>
</body></html>"#;

    fn board_fetcher() -> Arc<FixtureFetcher> {
        Arc::new(
            FixtureFetcher::new()
                .page(INDEX_URL, INDEX_HTML)
                .page("http://comune.example.it/albo/atto/101", DETAIL_101)
                .status("http://comune.example.it/albo/atto/102", 404)
                .page("http://comune.example.it/albo/atto/103", DETAIL_103),
        )
    }

    #[test]
    fn three_rows_one_missing_page_yield_two_items() {
        let registry = ProviderRegistry::default();
        let outcome = scrape(&registry, board_fetcher(), "Task2", INDEX_URL).unwrap();

        assert_eq!(outcome.provider, "Task2");
        assert_eq!(outcome.items.len(), 2);

        let first = &outcome.items[0];
        let second = &outcome.items[1];
        assert_eq!(first.link, "http://comune.example.it/albo/atto/101");
        assert_eq!(second.link, "http://comune.example.it/albo/atto/103");
        assert!(outcome.items.iter().all(|item| !item.title.is_empty()));

        // Detail page wins over the index row.
        assert_eq!(first.title, "Avviso di gara per lavori stradali");
        assert_eq!(first.pub_date.format("%d/%m/%Y").to_string(), "05/03/2024");

        assert_eq!(second.enclosures.len(), 1);
        assert_eq!(second.enclosures[0].url, "http://comune.example.it/files/delibera.pdf");
        assert_eq!(second.enclosures[0].length, 12_897_484);
        assert_eq!(second.enclosures[0].mime_type, "application/pdf");
    }

    #[test]
    fn unknown_provider_is_job_level() {
        let registry = ProviderRegistry::default();
        let err = scrape(&registry, board_fetcher(), "Nessuno", INDEX_URL).unwrap_err();

        assert!(is_job_level(&err));
        assert!(!is_job_level(&ScrapeError::MissingField("Titolo".into())));
    }

    #[test]
    fn unreachable_index_gives_an_empty_job() {
        let registry = ProviderRegistry::default();
        let fetcher = Arc::new(FixtureFetcher::new().status(INDEX_URL, 503));
        let outcome = scrape(&registry, fetcher, "Task", INDEX_URL).unwrap();

        assert!(outcome.items.is_empty());
        assert_eq!(outcome.defaults.language, "it");
    }

    #[test]
    fn preview_keeps_discovered_urls() {
        let registry = ProviderRegistry::default();
        let preview = preview(&registry, board_fetcher(), "Task", INDEX_URL).unwrap();

        assert_eq!(preview.urls.len(), 3);
        assert_eq!(preview.outcome.items.len(), 2);
    }
}
