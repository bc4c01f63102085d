//! The canonical output record every provider produces.
//!
//! `NoticeItem` is one public notice, normalised from whatever page layout a
//! board uses. The feed assembler turns each one into an RSS `<item>`.
//!
//! ## For contributors
//!
//! Adapters never emit an item without a title and a publication date:
//! resolve both before calling [`NoticeItem::new`] and return
//! [`ScrapeError::MissingField`](crate::error::ScrapeError::MissingField)
//! when a board leaves them out.

use chrono::{DateTime, FixedOffset};

/// Category kinds attached to every notice, named after the fragment they
/// use under the specs base URL (`…/specs/#item-category-uid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind {
    /// Registry number or `year/number` pair, unique per board.
    Uid,
    /// Kind of act (deliberation, decree, tender notice, …).
    Type,
    /// First day of publication.
    PubStart,
    /// Last day of publication.
    PubEnd,
    /// Issuing office.
    Unit,
}

impl CategoryKind {
    pub fn fragment(self) -> &'static str {
        match self {
            Self::Uid => "item-category-uid",
            Self::Type => "item-category-type",
            Self::PubStart => "item-category-pubStart",
            Self::PubEnd => "item-category-pubEnd",
            Self::Unit => "item-category-unit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub domain: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub length: u64,
    pub mime_type: String,
}

/// A single notice, ready for the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeItem {
    /// Subject of the act.
    pub title: String,

    /// Detail page URL.
    pub link: String,

    pub description: String,

    /// Publication instant, anchored to the board's timezone.
    pub pub_date: DateTime<FixedOffset>,

    /// Stable identifier; always equal to `link`.
    pub guid: String,

    /// `(domain, value)` pairs in insertion order, without duplicates.
    pub categories: Vec<Category>,

    /// Attachments in page order.
    pub enclosures: Vec<Enclosure>,
}

impl NoticeItem {
    /// Create an item whose description defaults to the title.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        pub_date: DateTime<FixedOffset>,
    ) -> Self {
        let title = title.into();
        let link = link.into();
        Self {
            description: title.clone(),
            guid: link.clone(),
            title,
            link,
            pub_date,
            categories: Vec::new(),
            enclosures: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a category unless its value is blank or the same pair is
    /// already present.
    pub fn push_category(&mut self, domain: impl Into<String>, value: impl Into<String>) {
        let category = Category {
            domain: domain.into(),
            value: value.into(),
        };
        if category.value.trim().is_empty() || self.categories.contains(&category) {
            return;
        }
        self.categories.push(category);
    }

    pub fn push_enclosure(&mut self, enclosure: Enclosure) {
        self.enclosures.push(enclosure);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
