//! Jobs file.
//!
//! One CSV row per feed. The columns `provider`, `options`, `feed_name`,
//! `webmaster` and `docs` are required; every `channel-category-*` column
//! becomes a feed-level category, in column order, when its cell is not
//! empty.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::ScrapeError;

/// Prefix of the columns that become feed-level categories.
pub const CATEGORY_PREFIX: &str = "channel-category-";

const REQUIRED: [&str; 5] = ["provider", "options", "feed_name", "webmaster", "docs"];

/// One configured feed.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub provider: String,
    pub options: String,
    pub feed_name: String,
    pub webmaster: String,
    pub docs: String,
    /// `(column name, value)` for each non-empty `channel-category-*` cell.
    pub channel_categories: Vec<(String, String)>,
}

impl JobRow {
    /// Value of the `channel-category-<suffix>` column, if set.
    pub fn category(&self, suffix: &str) -> Option<&str> {
        self.channel_categories
            .iter()
            .find(|(column, _)| column.strip_prefix(CATEGORY_PREFIX) == Some(suffix))
            .map(|(_, value)| value.as_str())
    }

    /// File stem of the output feed: `feed_name` up to its first `.`.
    pub fn feed_stem(&self) -> &str {
        self.feed_name.split('.').next().unwrap_or_default()
    }
}

/// Read every job from the CSV file at `path`.
pub fn read_jobs(path: &Path) -> Result<Vec<JobRow>, ScrapeError> {
    parse_jobs(File::open(path)?)
}

pub fn parse_jobs<R: Read>(reader: R) -> Result<Vec<JobRow>, ScrapeError> {
    let mut csv = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = csv.headers()?.clone();

    let columns: Vec<usize> = REQUIRED
        .iter()
        .map(|name| column(&headers, name))
        .collect::<Result<_, _>>()?;
    let categories: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| name.starts_with(CATEGORY_PREFIX))
        .map(|(i, name)| (i, name.to_string()))
        .collect();

    let mut jobs = Vec::new();
    for record in csv.records() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or_default().to_string();

        jobs.push(JobRow {
            provider: cell(columns[0]),
            options: cell(columns[1]),
            feed_name: cell(columns[2]),
            webmaster: cell(columns[3]),
            docs: cell(columns[4]),
            channel_categories: categories
                .iter()
                .map(|(i, name)| (name.clone(), cell(*i)))
                .filter(|(_, value)| !value.is_empty())
                .collect(),
        });
    }
    Ok(jobs)
}

fn column(headers: &StringRecord, name: &str) -> Result<usize, ScrapeError> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| ScrapeError::MissingColumn(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOBS: &str = "\
provider,options,feed_name,webmaster,docs,channel-category-type,channel-category-name,channel-category-region
Halley,c_a001,albo_comune_a.xml,webmaster@example.org,Comune-A,Comune,Comune di A,Lazio
Task2, http://comune.example.it/albo/ ,albo_b,webmaster@example.org,comune-b,Comune,Comune di B,
";

    #[test]
    fn reads_rows_and_categories_in_column_order() {
        let jobs = parse_jobs(JOBS.as_bytes()).unwrap();
        assert_eq!(jobs.len(), 2);

        let a = &jobs[0];
        assert_eq!(a.provider, "Halley");
        assert_eq!(a.feed_stem(), "albo_comune_a");
        assert_eq!(
            a.channel_categories,
            [
                ("channel-category-type".to_string(), "Comune".to_string()),
                ("channel-category-name".to_string(), "Comune di A".to_string()),
                ("channel-category-region".to_string(), "Lazio".to_string()),
            ]
        );
        assert_eq!(a.category("name"), Some("Comune di A"));

        let b = &jobs[1];
        assert_eq!(b.options, "http://comune.example.it/albo/");
        assert_eq!(b.feed_stem(), "albo_b");
        assert_eq!(b.channel_categories.len(), 2, "empty cells are not categories");
        assert_eq!(b.category("region"), None);
    }

    #[test]
    fn missing_column_is_reported() {
        let err = parse_jobs("provider,options,feed_name\nTask,x,y\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ScrapeError::MissingColumn(name) if name == "webmaster"));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.csv");
        std::fs::write(&path, JOBS).unwrap();

        assert_eq!(read_jobs(&path).unwrap().len(), 2);
        assert!(matches!(
            read_jobs(&dir.path().join("missing.csv")),
            Err(ScrapeError::Io(_))
        ));
    }
}
