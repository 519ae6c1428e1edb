use serde::{Deserialize, Serialize};

/// One Zotero annotation or note, flattened with the metadata of the
/// document it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAnnotation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub version: u64,
    pub text: String,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub authors: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub document_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_index: Option<i64>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub page_label: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub attachment_reference: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub annotation_reference: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub annotated_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_document_key: String,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub color: Option<String>,
}

impl SourceAnnotation {
    /// Page label with surrounding whitespace removed, or `None` when blank.
    pub fn page_label(&self) -> Option<&str> {
        non_blank(&self.page_label)
    }

    pub fn comment(&self) -> Option<&str> {
        non_blank(&self.comment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Articles,
    Books,
    Tweets,
    Podcasts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    #[default]
    Order,
    Page,
}

/// A highlight in the shape the Readwise `/highlights/` endpoint accepts.
///
/// Only non-empty fields are serialized; `location` is `None` whenever no
/// usable ordering signal exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedHighlight {
    pub text: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<i64>,
    pub location_type: LocationType,
    #[serde(skip_serializing_if = "is_blank")]
    pub highlighted_at: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub highlight_url: Option<String>,
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn is_blank(value: &Option<String>) -> bool {
    non_blank(value).is_none()
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}
