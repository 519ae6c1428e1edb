//! Reading order across a batch of annotations.
//!
//! Annotations are grouped by document, then ranked by the strongest
//! position signal each one carries: the Zotero sort index, then the page
//! label, then nothing. The annotation timestamp breaks remaining ties.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};

use crate::model::SourceAnnotation;
use crate::page_label::parse_page_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RankTier {
    SortIndex = 0,
    PageLabel = 1,
    Unplaced = 2,
}

#[derive(Debug, Clone)]
pub struct ReadingOrderKey<'a> {
    pub document: &'a str,
    pub tier: RankTier,
    pub position: i64,
    pub annotated_at: &'a str,
}

impl<'a> ReadingOrderKey<'a> {
    pub fn of(annotation: &'a SourceAnnotation) -> Self {
        let (tier, position) = match (annotation.sort_index, annotation.page_label()) {
            (Some(index), _) => (RankTier::SortIndex, index),
            (None, Some(label)) => (RankTier::PageLabel, parse_page_label(label).value),
            (None, None) => (RankTier::Unplaced, 0),
        };
        Self {
            document: &annotation.parent_document_key,
            tier,
            position,
            annotated_at: &annotation.annotated_at,
        }
    }
}

impl Ord for ReadingOrderKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.document
            .cmp(other.document)
            .then(self.tier.cmp(&other.tier))
            .then(self.position.cmp(&other.position))
            .then_with(|| compare_timestamps(self.annotated_at, other.annotated_at))
    }
}

impl PartialEq for ReadingOrderKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReadingOrderKey<'_> {}

impl PartialOrd for ReadingOrderKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// RFC 3339 timestamps compare as instants and sort after unparseable ones;
/// the raw text settles the rest.
fn compare_timestamps(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| DateTime::<FixedOffset>::parse_from_rfc3339(s.trim()).ok();
    parse(a).cmp(&parse(b)).then_with(|| a.cmp(b))
}

/// Stable: annotations with identical keys keep their input order.
pub fn sort_reading_order(annotations: &mut [SourceAnnotation]) {
    annotations.sort_by(|a, b| ReadingOrderKey::of(a).cmp(&ReadingOrderKey::of(b)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: &str, doc: &str) -> SourceAnnotation {
        SourceAnnotation {
            key: key.to_string(),
            text: format!("text of {}", key),
            parent_document_key: doc.to_string(),
            annotated_at: "2024-01-01T00:00:00Z".to_string(),
            ..Default::default()
        }
    }

    fn keys(annotations: &[SourceAnnotation]) -> Vec<&str> {
        annotations.iter().map(|a| a.key.as_str()).collect()
    }

    #[test]
    fn test_documents_stay_contiguous() {
        let mut batch = vec![
            item("b1", "DOC_B"),
            item("a1", "DOC_A"),
            item("b2", "DOC_B"),
            item("a2", "DOC_A"),
            item("none", ""),
        ];
        sort_reading_order(&mut batch);
        assert_eq!(keys(&batch), vec!["none", "a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn test_tiers_within_document() {
        let mut dated = item("dated", "DOC");
        dated.annotated_at = "2020-01-01T00:00:00Z".to_string();
        let mut paged = item("paged", "DOC");
        paged.page_label = Some("3".to_string());
        let mut indexed = item("indexed", "DOC");
        indexed.sort_index = Some(900_000);

        let mut batch = vec![dated, paged, indexed];
        sort_reading_order(&mut batch);
        assert_eq!(keys(&batch), vec!["indexed", "paged", "dated"]);
    }

    #[test]
    fn test_roman_pages_precede_body_pages() {
        let mut body = item("body", "DOC");
        body.page_label = Some("1".to_string());
        let mut preface = item("preface", "DOC");
        preface.page_label = Some("xii".to_string());
        let mut foreword = item("foreword", "DOC");
        foreword.page_label = Some("ii".to_string());

        let mut batch = vec![body, preface, foreword];
        sort_reading_order(&mut batch);
        // -12 < -2 < 1
        assert_eq!(keys(&batch), vec!["preface", "foreword", "body"]);
    }

    #[test]
    fn test_sort_index_order() {
        let mut late = item("late", "DOC");
        late.sort_index = Some(30_000_100);
        let mut early = item("early", "DOC");
        early.sort_index = Some(10_000_200);

        let mut batch = vec![late, early];
        sort_reading_order(&mut batch);
        assert_eq!(keys(&batch), vec!["early", "late"]);
    }

    #[test]
    fn test_timestamp_breaks_ties() {
        let mut utc = item("utc", "DOC");
        utc.annotated_at = "2024-05-01T11:00:00Z".to_string();
        let mut offset = item("offset", "DOC");
        offset.annotated_at = "2024-05-01T12:00:00+02:00".to_string();

        // 12:00+02:00 is 10:00Z
        let mut batch = vec![utc, offset];
        sort_reading_order(&mut batch);
        assert_eq!(keys(&batch), vec!["offset", "utc"]);
    }

    #[test]
    fn test_identical_keys_keep_input_order() {
        let mut batch = vec![item("x", "DOC"), item("y", "DOC"), item("z", "DOC")];
        sort_reading_order(&mut batch);
        assert_eq!(keys(&batch), vec!["x", "y", "z"]);
    }
}
