//! The intermediate record an adapter assembles while scraping.
//!
//! A [`Document`] maps a field label, as printed on the board, to either a
//! text value or a list of links (attachments). It may be built from an
//! index row, a detail page, or both merged under one registry number.

use std::collections::HashMap;

use crate::error::ScrapeError;

/// An anchor found on a page: its visible text and resolved target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub content: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Links(Vec<Link>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    fields: HashMap<String, FieldValue>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from `(label, value)` cells taken pairwise in page
    /// order. A pair whose label cell holds links instead of text cannot
    /// name a field and is skipped, as is a trailing unpaired cell.
    pub fn from_cells(cells: Vec<FieldValue>) -> Self {
        let mut doc = Self::new();
        let mut cells = cells.into_iter();
        while let (Some(label), Some(value)) = (cells.next(), cells.next()) {
            if let FieldValue::Text(label) = label {
                doc.fields.insert(label, value);
            }
        }
        doc
    }

    pub fn insert_text(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.fields
            .insert(label.into(), FieldValue::Text(value.into()));
    }

    pub fn insert_links(&mut self, label: impl Into<String>, links: Vec<Link>) {
        self.fields.insert(label.into(), FieldValue::Links(links));
    }

    pub fn get(&self, label: &str) -> Option<&FieldValue> {
        self.fields.get(label)
    }

    /// Text value of `label`, if present and not blank.
    pub fn text(&self, label: &str) -> Option<&str> {
        match self.fields.get(label) {
            Some(FieldValue::Text(value)) if !value.trim().is_empty() => Some(value),
            _ => None,
        }
    }

    /// First non-blank text value among `labels`, in order of preference.
    pub fn first_text(&self, labels: &[&str]) -> Option<&str> {
        labels.iter().find_map(|label| self.text(label))
    }

    /// Text value of `label`, or [`ScrapeError::MissingField`].
    pub fn require(&self, label: &str) -> Result<&str, ScrapeError> {
        self.text(label)
            .ok_or_else(|| ScrapeError::MissingField(label.to_string()))
    }

    /// Links stored under a multivalued field. Absent or single-text fields
    /// read as an empty list.
    pub fn links(&self, label: &str) -> &[Link] {
        match self.fields.get(label) {
            Some(FieldValue::Links(links)) => links,
            _ => &[],
        }
    }

    /// Fold `other` into `self`. Fields present in both take `other`'s value,
    /// so merging detail data into an index record makes the detail page
    /// authoritative.
    pub fn merge(&mut self, other: Document) {
        self.fields.extend(other.fields);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut doc = Self::new();
        for (label, value) in iter {
            doc.insert_text(label, value);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn link(content: &str) -> Link {
        Link {
            content: content.to_string(),
            href: format!("http://example.org/{content}"),
        }
    }

    #[test]
    fn pairs_consecutive_cells() {
        let doc = Document::from_cells(vec![
            text("Oggetto Atto"),
            text("Approvazione bilancio"),
            text("Allegati"),
            FieldValue::Links(vec![link("a.pdf"), link("b.pdf")]),
            text("orfano"),
        ]);

        assert_eq!(doc.len(), 2);
        assert_eq!(doc.text("Oggetto Atto"), Some("Approvazione bilancio"));
        assert_eq!(doc.links("Allegati").len(), 2);
        assert!(doc.get("orfano").is_none());
    }

    #[test]
    fn links_default_to_empty_when_absent_or_singular() {
        let mut doc = Document::new();
        doc.insert_text("Documento", "nessuno");
        assert!(doc.links("Documento").is_empty());
        assert!(doc.links("Allegati").is_empty());
    }

    #[test]
    fn blank_text_counts_as_missing() {
        let mut doc = Document::new();
        doc.insert_text("Titolo", "   ");
        assert!(doc.text("Titolo").is_none());
        assert!(matches!(
            doc.require("Titolo"),
            Err(ScrapeError::MissingField(field)) if field == "Titolo"
        ));
    }

    #[test]
    fn first_text_respects_preference_order() {
        let doc: Document = [
            ("Dal".to_string(), "01/02/2024".to_string()),
            ("Esecutiva dal".to_string(), "03/02/2024".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            doc.first_text(&["Esecutiva dal", "Dal"]),
            Some("03/02/2024")
        );
        assert_eq!(doc.first_text(&["Al", "Dal"]), Some("01/02/2024"));
        assert_eq!(doc.first_text(&["Al"]), None);
    }

    #[test]
    fn merge_prefers_later_values() {
        let mut index: Document = [
            ("N.Registro".to_string(), "123".to_string()),
            ("Titolo".to_string(), "from index".to_string()),
            ("Dal".to_string(), "01/02/2024".to_string()),
        ]
        .into_iter()
        .collect();
        let detail: Document = [
            ("Titolo".to_string(), "from detail".to_string()),
            ("Al".to_string(), "15/02/2024".to_string()),
        ]
        .into_iter()
        .collect();

        index.merge(detail);

        assert_eq!(index.text("Titolo"), Some("from detail"));
        assert_eq!(index.text("Dal"), Some("01/02/2024"));
        assert_eq!(index.text("Al"), Some("15/02/2024"));
        assert_eq!(index.len(), 4);
    }
}
