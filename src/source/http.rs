//! HTTP access for providers.
//!
//! Providers only see the [`Fetch`] trait, so tests can hand them canned
//! pages instead of a live network client.

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::ScrapeError;

/// A fetched page: status code plus decoded body.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests on behalf of providers.
///
/// A non-success status is *not* an error here: it comes back as a [`Page`]
/// and each provider decides how soft the failure is.
pub trait Fetch: Send + Sync {
    fn get(&self, url: &str) -> Result<Page, ScrapeError>;
}

/// Blocking `reqwest` client shared by every job.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub const DEFAULT_USER_AGENT: &'static str =
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ScrapeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<Page, ScrapeError> {
        let response = self.client.get(url).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        debug!(url, status, bytes = body.len(), "fetched");
        Ok(Page { status, body })
    }
}

/// Resolve `href` against `base`. Absolute hrefs are returned as-is.
pub fn resolve(base: &str, href: &str) -> Result<String, ScrapeError> {
    Ok(Url::parse(base)?.join(href.trim())?.to_string())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory [`Fetch`] serving canned pages; unknown URLs answer 404.
    #[derive(Default)]
    pub struct FixtureFetcher {
        pages: HashMap<String, Page>,
        requests: Mutex<Vec<String>>,
    }

    impl FixtureFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                Page {
                    status: 200,
                    body: body.to_string(),
                },
            );
            self
        }

        pub fn status(mut self, url: &str, status: u16) -> Self {
            self.pages.insert(
                url.to_string(),
                Page {
                    status,
                    body: String::new(),
                },
            );
            self
        }

        /// URLs requested so far, in order.
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    impl Fetch for FixtureFetcher {
        fn get(&self, url: &str) -> Result<Page, ScrapeError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(url.to_string());
            }
            Ok(self.pages.get(url).cloned().unwrap_or(Page {
                status: 404,
                body: String::new(),
            }))
        }
    }
}
