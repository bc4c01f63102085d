//! RSS 2.0 feed assembly and output.
//!
//! Channel metadata comes from the job row and the provider's defaults; the
//! items come from the scrape. The first attachment of a notice is its RSS
//! `<enclosure>`, and every attachment is also listed as a Media RSS
//! `<media:content>` element since RSS allows a single enclosure per item.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, FixedOffset};
use rss::extension::{Extension, ExtensionMap};
use rss::{Channel, Guid, Item};
use tracing::info;

use crate::config::JobRow;
use crate::error::ScrapeError;
use crate::source::{NoticeItem, ProviderDefaults};

pub const MEDIA_NAMESPACE: &str = "http://search.yahoo.com/mrss/";

/// Build the channel for one job. `now` is the run's start time.
pub fn build_channel(
    job: &JobRow,
    defaults: &ProviderDefaults,
    items: &[NoticeItem],
    now: DateTime<FixedOffset>,
) -> Channel {
    let kind = job.category("type").unwrap_or_default();
    let name = job.category("name").unwrap_or_default();

    let mut channel = Channel::default();
    channel.set_title(format!("AlboPOP - {kind} - {name}"));
    channel.set_link(format!("{}{}", defaults.feed_base_url, job.feed_name));
    channel.set_description(format!(
        "*non ufficiale* RSS feed dell'Albo Pretorio del {name}"
    ));
    channel.set_language(defaults.language.to_string());
    channel.set_pub_date(defaults.format_timestamp(&now));
    channel.set_webmaster(job.webmaster.clone());
    channel.set_docs(format!("{}{}", defaults.docs_base_url, job.docs.to_lowercase()));
    channel.set_copyright(format!("Copyright {} {name}", now.year()));
    channel.set_categories(
        job.channel_categories
            .iter()
            .map(|(column, value)| category(format!("{}#{column}", defaults.specs_base_url), value))
            .collect::<Vec<_>>(),
    );
    channel.set_namespaces(BTreeMap::from([(
        "media".to_string(),
        MEDIA_NAMESPACE.to_string(),
    )]));
    channel.set_items(
        items
            .iter()
            .map(|item| rss_item(item, defaults))
            .collect::<Vec<_>>(),
    );
    channel
}

fn category(domain: String, value: &str) -> rss::Category {
    let mut category = rss::Category::default();
    category.set_name(value);
    category.set_domain(domain);
    category
}

fn rss_item(notice: &NoticeItem, defaults: &ProviderDefaults) -> Item {
    let mut item = Item::default();
    item.set_title(notice.title.clone());
    item.set_link(notice.link.clone());
    item.set_description(notice.description.clone());
    item.set_pub_date(defaults.format_timestamp(&notice.pub_date));

    let mut guid = Guid::default();
    guid.set_value(notice.guid.clone());
    guid.set_permalink(true);
    item.set_guid(guid);

    item.set_categories(
        notice
            .categories
            .iter()
            .map(|c| category(c.domain.clone(), &c.value))
            .collect::<Vec<_>>(),
    );

    if let Some(first) = notice.enclosures.first() {
        let mut enclosure = rss::Enclosure::default();
        enclosure.set_url(first.url.clone());
        enclosure.set_length(first.length.to_string());
        enclosure.set_mime_type(first.mime_type.clone());
        item.set_enclosure(enclosure);
    }

    if !notice.enclosures.is_empty() {
        let contents: Vec<Extension> = notice
            .enclosures
            .iter()
            .map(|e| {
                let mut ext = Extension::default();
                ext.set_name("media:content");
                ext.attrs = BTreeMap::from([
                    ("url".to_string(), e.url.clone()),
                    ("fileSize".to_string(), e.length.to_string()),
                    ("type".to_string(), e.mime_type.clone()),
                ]);
                ext
            })
            .collect();
        let mut extensions = ExtensionMap::new();
        extensions.insert(
            "media".to_string(),
            BTreeMap::from([("content".to_string(), contents)]),
        );
        item.set_extensions(extensions);
    }

    item
}

/// Path of the feed file for `job` under `dir`.
pub fn feed_path(dir: &Path, job: &JobRow) -> PathBuf {
    dir.join(format!("{}.xml", job.feed_stem()))
}

/// Write `channel` to `<dir>/<feed stem>.xml`, replacing any previous run.
pub fn write_feed(dir: &Path, job: &JobRow, channel: &Channel) -> Result<PathBuf, ScrapeError> {
    let path = feed_path(dir, job);
    write_channel(channel, File::create(&path)?)?;
    info!(path = %path.display(), items = channel.items().len(), "feed written");
    Ok(path)
}

/// Serialize `channel` into `sink` through a buffer, surfacing flush errors.
pub fn write_channel<W: Write>(channel: &Channel, sink: W) -> Result<(), ScrapeError> {
    let mut writer = channel.pretty_write_to(BufWriter::new(sink), b' ', 2)?;
    writer.flush()?;
    Ok(())
}
