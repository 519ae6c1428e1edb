//! Zotero Web API v3 client.
//!
//! Fetches annotations and notes, resolves each one's parent document
//! (annotation → attachment → document) and flattens the result into
//! [`SourceAnnotation`] records.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::ZoteroError;
use crate::model::SourceAnnotation;

pub const DEFAULT_BASE_URL: &str = "https://api.zotero.org";
pub const PAGE_SIZE: usize = 100;

/// Highlight colours offered by the Zotero PDF reader.
pub const ANNOTATION_COLORS: [&str; 8] = [
    "#ffd400", "#ff6666", "#5fb236", "#2ea8e5", "#a28ae5", "#e56eee", "#f19837", "#aaaaaa",
];

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid html tag pattern"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    #[default]
    User,
    Group,
}

impl LibraryType {
    fn path_prefix(&self) -> &'static str {
        match self {
            LibraryType::User => "users",
            LibraryType::Group => "groups",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoteroQuery {
    pub include_annotations: bool,
    pub include_notes: bool,
    pub filter_colors: Vec<String>,
    pub since: u64,
}

impl ZoteroQuery {
    /// `itemType` search expression, or `None` when nothing is requested.
    pub fn item_types(&self) -> Option<String> {
        match (self.include_annotations, self.include_notes) {
            (true, true) => Some("annotation || note".to_string()),
            (true, false) => Some("annotation".to_string()),
            (false, true) => Some("note".to_string()),
            (false, false) => None,
        }
    }

    fn accepts(&self, item: &ZoteroItem) -> bool {
        match item.data.item_type.as_str() {
            "annotation" if self.include_annotations => {
                self.filter_colors.is_empty()
                    || item.data.annotation_color.as_ref().is_some_and(|color| {
                        self.filter_colors
                            .iter()
                            .any(|c| c.eq_ignore_ascii_case(color))
                    })
            }
            "note" => self.include_notes,
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct ZoteroBatch {
    pub annotations: Vec<SourceAnnotation>,
    pub library_version: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoteroItem {
    pub key: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub links: ItemLinks,
    pub data: ItemData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemLinks {
    #[serde(rename = "self")]
    pub self_link: Option<Link>,
    pub alternate: Option<Link>,
    pub up: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemData {
    pub item_type: String,
    pub parent_item: Option<String>,
    pub title: Option<String>,
    pub creators: Vec<Creator>,
    pub url: Option<String>,
    pub annotation_type: Option<String>,
    pub annotation_text: Option<String>,
    pub annotation_comment: Option<String>,
    pub annotation_color: Option<String>,
    pub annotation_page_label: Option<String>,
    pub annotation_sort_index: Option<String>,
    pub note: Option<String>,
    pub tags: Vec<Tag>,
    pub date_added: Option<String>,
    pub date_modified: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Creator {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
}

impl Creator {
    fn display_name(&self) -> Option<String> {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return Some(name.trim().to_string());
        }
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!full.is_empty()).then_some(full)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub tag: String,
}

pub struct ZoteroClient {
    http: reqwest::Client,
    api_key: String,
    library_id: String,
    library_type: LibraryType,
    base_url: String,
}

impl ZoteroClient {
    pub fn new(api_key: &str, library_id: &str, library_type: LibraryType) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            library_id: library_id.to_string(),
            library_type,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn items_url(&self) -> String {
        format!(
            "{}/{}/{}/items",
            self.base_url,
            self.library_type.path_prefix(),
            self.library_id
        )
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header("Zotero-API-Key", &self.api_key)
            .header("Zotero-API-Version", "3")
    }

    pub async fn fetch_annotations(&self, query: &ZoteroQuery) -> Result<ZoteroBatch, ZoteroError> {
        let Some(item_types) = query.item_types() else {
            tracing::info!("neither annotations nor notes requested, nothing to fetch");
            return Ok(ZoteroBatch {
                annotations: Vec::new(),
                library_version: query.since,
            });
        };

        let (items, library_version) = self.fetch_items(&item_types, query.since).await?;
        tracing::info!(
            count = items.len(),
            library_version,
            "fetched Zotero items"
        );

        let mut parents = HashMap::new();
        let mut annotations = Vec::new();
        for item in items.iter().filter(|item| query.accepts(item)) {
            let document = self.resolve_document(item, &mut parents).await?;
            annotations.push(to_source_annotation(item, document.as_ref()));
        }

        Ok(ZoteroBatch {
            annotations,
            library_version,
        })
    }

    async fn fetch_items(
        &self,
        item_types: &str,
        since: u64,
    ) -> Result<(Vec<ZoteroItem>, u64), ZoteroError> {
        let url = self.items_url();
        let mut items = Vec::new();
        let mut library_version = since;
        let mut start = 0usize;

        loop {
            let mut params = vec![
                ("itemType", item_types.to_string()),
                ("limit", PAGE_SIZE.to_string()),
                ("start", start.to_string()),
            ];
            if since > 0 {
                params.push(("since", since.to_string()));
            }

            let response = self.get(&url).query(&params).send().await?;
            if !response.status().is_success() {
                return Err(ZoteroError::Request {
                    status: response.status().as_u16(),
                    url,
                });
            }

            let total = header_u64(&response, "Total-Results");
            if let Some(version) = header_u64(&response, "Last-Modified-Version") {
                library_version = version;
            }

            let body = response.text().await?;
            let page: Vec<ZoteroItem> = serde_json::from_str(&body)
                .map_err(|e| ZoteroError::InvalidResponse(format!("items page: {}", e)))?;

            let received = page.len();
            items.extend(page);
            start += received;
            tracing::debug!(start, received, ?total, "fetched Zotero page");

            if received < PAGE_SIZE || total.is_some_and(|t| start as u64 >= t) {
                break;
            }
        }

        Ok((items, library_version))
    }

    /// `Ok(None)` when the item no longer exists.
    pub async fn fetch_item(&self, key: &str) -> Result<Option<ZoteroItem>, ZoteroError> {
        let url = format!("{}/{}", self.items_url(), key);
        let response = self.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!(key, "Zotero parent item not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ZoteroError::Request {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| ZoteroError::InvalidResponse(format!("item {}: {}", key, e)))
    }

    async fn cached_item(
        &self,
        key: &str,
        cache: &mut HashMap<String, Option<ZoteroItem>>,
    ) -> Result<Option<ZoteroItem>, ZoteroError> {
        if let Some(item) = cache.get(key) {
            return Ok(item.clone());
        }
        let item = self.fetch_item(key).await?;
        cache.insert(key.to_string(), item.clone());
        Ok(item)
    }

    /// Top-level document an annotation or note belongs to. A standalone
    /// attachment is its own document.
    async fn resolve_document(
        &self,
        item: &ZoteroItem,
        cache: &mut HashMap<String, Option<ZoteroItem>>,
    ) -> Result<Option<ZoteroItem>, ZoteroError> {
        let Some(parent_key) = item.data.parent_item.as_deref() else {
            return Ok(None);
        };
        let Some(parent) = self.cached_item(parent_key, cache).await? else {
            return Ok(None);
        };
        if item.data.item_type == "note" {
            return Ok(Some(parent));
        }

        let mut seen = HashSet::from([item.key.clone()]);
        let mut current = parent;
        while let Some(next_key) = current.data.parent_item.clone() {
            if !seen.insert(current.key.clone()) {
                break;
            }
            match self.cached_item(&next_key, cache).await? {
                Some(next) => current = next,
                None => break,
            }
        }
        Ok(Some(current))
    }
}

fn header_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// `"00001|000123|00456"` → `100012300456`. The groups are fixed width, so
/// the concatenation preserves Zotero's reading order.
pub fn parse_sort_index(raw: &str) -> Option<i64> {
    let digits: String = raw.split('|').map(str::trim).collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn strip_html(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn format_creators(creators: &[Creator]) -> Option<String> {
    let names: Vec<String> = creators.iter().filter_map(Creator::display_name).collect();
    (!names.is_empty()).then(|| names.join(", "))
}

pub fn to_source_annotation(item: &ZoteroItem, document: Option<&ZoteroItem>) -> SourceAnnotation {
    let data = &item.data;
    let is_note = data.item_type == "note";

    let text = if is_note {
        strip_html(data.note.as_deref().unwrap_or_default())
    } else {
        data.annotation_text.clone().unwrap_or_default()
    };

    let parent_document_key = document
        .map(|d| d.key.clone())
        .or_else(|| data.parent_item.clone())
        .unwrap_or_else(|| item.key.clone());

    let annotation_reference = item
        .links
        .self_link
        .as_ref()
        .or(item.links.alternate.as_ref())
        .map(|l| l.href.clone());

    SourceAnnotation {
        key: item.key.clone(),
        version: item.version,
        text,
        title: document.and_then(|d| non_empty(d.data.title.as_deref())),
        authors: document.and_then(|d| format_creators(&d.data.creators)),
        comment: non_empty(data.annotation_comment.as_deref()),
        tags: data.tags.iter().map(|t| t.tag.clone()).collect(),
        document_type: document
            .map(|d| d.data.item_type.clone())
            .unwrap_or_default(),
        sort_index: data.annotation_sort_index.as_deref().and_then(parse_sort_index),
        page_label: non_empty(data.annotation_page_label.as_deref()),
        attachment_reference: if is_note {
            None
        } else {
            item.links.up.as_ref().map(|l| l.href.clone())
        },
        annotation_reference,
        annotated_at: data
            .date_modified
            .clone()
            .or_else(|| data.date_added.clone())
            .unwrap_or_default(),
        parent_document_key,
        source_url: document.and_then(|d| {
            non_empty(d.data.url.as_deref())
                .or_else(|| d.links.alternate.as_ref().map(|l| l.href.clone()))
        }),
        color: non_empty(data.annotation_color.as_deref()),
    }
}
