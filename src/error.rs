//! Error taxonomy shared by every provider and the outer job layer.
//!
//! Adapters return [`ScrapeError`] from fallible steps; the item stream and
//! the orchestrator decide whether an error drops one item or skips a job.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Transport-level failure (DNS, connect, timeout, body decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    /// A link or base URL could not be resolved.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The page does not contain the markup the adapter relies on.
    #[error("expected markup not found: {0}")]
    MissingMarkup(String),

    /// A field required to build an item is absent or empty.
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// The registry identifier could not be extracted from the description.
    #[error("no registry number in '{0}'")]
    MissingRegistryId(String),

    /// The per-job options string is not usable by the adapter.
    #[error("invalid provider options: {0}")]
    InvalidOptions(String),

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("invalid CSS selector '{0}'")]
    Selector(String),

    /// The jobs file lacks a required column.
    #[error("jobs file has no '{0}' column")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RSS error: {0}")]
    Rss(#[from] rss::Error),
}
