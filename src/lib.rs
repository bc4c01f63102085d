//! albopop-feeds: one RSS feed per municipal notice board.
//!
//! * **`source/`**: the [`Provider`](source::Provider) trait, the record
//!   model, the HTTP seam and one adapter per family of board software.
//! * **`normalize`**: whitespace, dates, byte sizes and MIME types.
//! * **`registry`**: provider lookup by name.
//! * **`scrape`**: drives one provider through one job.
//! * **`config`**: the jobs CSV.
//! * **`feed`**: RSS assembly and output.
//! * **`pool`**: worker threads over jobs.

pub mod config;
pub mod error;
pub mod feed;
pub mod normalize;
pub mod pool;
pub mod registry;
pub mod scrape;
pub mod source;

pub use error::ScrapeError;
