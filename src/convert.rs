use crate::error::ConversionError;
use crate::model::{Category, LocationType, NormalizedHighlight, SourceAnnotation, non_blank};
use crate::page_label::parse_page_label;

/// URL scheme the Zotero desktop client registers for deep links.
pub const DEEP_LINK_SCHEME: &str = "zotero";

/// Turns a Zotero tag into a Readwise inline-tag token body.
pub fn sanitize_tag(tag: &str) -> String {
    tag.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

pub fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| sanitize_tag(&t.to_lowercase()))
        .filter(|t| !t.is_empty())
        .map(|t| format!(".{}", t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tag tokens on the first line, the comment below them.
pub fn format_note(tags: &[String], comment: Option<&str>) -> Option<String> {
    let tags = format_tags(tags);
    match (tags.is_empty(), comment) {
        (true, None) => None,
        (true, Some(comment)) => Some(comment.to_string()),
        (false, None) => Some(tags),
        (false, Some(comment)) => Some(format!("{}\n{}", tags, comment)),
    }
}

pub fn category_for(document_type: &str) -> Category {
    if document_type == "book" {
        Category::Books
    } else {
        Category::Articles
    }
}

/// A source sort index wins over the page label. Zero is never a location:
/// a zero sort index or a label that parses to zero yields none at all.
pub fn assign_location(
    sort_index: Option<i64>,
    page_label: Option<&str>,
) -> (Option<i64>, LocationType) {
    if let Some(index) = sort_index {
        if index == 0 {
            return (None, LocationType::default());
        }
        return (Some(index), LocationType::Order);
    }
    if let Some(label) = page_label {
        let parsed = parse_page_label(label);
        if parsed.is_usable() {
            return (Some(parsed.value), LocationType::Page);
        }
    }
    (None, LocationType::default())
}

/// Last path segment of an API or web link, e.g. the item key in
/// `https://api.zotero.org/users/1/items/ABCD1234`.
pub fn reference_id(reference: &str) -> Result<&str, ConversionError> {
    let path = reference.split(['?', '#']).next().unwrap_or_default();
    match path.rsplit('/').next() {
        Some(id) if !id.trim().is_empty() => Ok(id.trim()),
        _ => Err(ConversionError::MalformedReference(reference.to_string())),
    }
}

/// `zotero://open-pdf/...` link for annotations attached to a PDF, otherwise
/// the annotation's own reference.
pub fn highlight_url(annotation: &SourceAnnotation) -> Result<Option<String>, ConversionError> {
    let Some(attachment) = non_blank(&annotation.attachment_reference) else {
        return Ok(non_blank(&annotation.annotation_reference).map(str::to_string));
    };
    let attachment_id = reference_id(attachment)?;

    let page = match annotation.page_label() {
        Some(label) => {
            let parsed = parse_page_label(label);
            if parsed.is_roman {
                parsed.page_number().max(1).to_string()
            } else {
                label.to_string()
            }
        }
        None => "1".to_string(),
    };

    let mut link = format!(
        "{}://open-pdf/library/items/{}?page={}",
        DEEP_LINK_SCHEME,
        attachment_id,
        urlencoding::encode(&page)
    );
    if let Some(reference) = non_blank(&annotation.annotation_reference) {
        link.push_str("&annotation=");
        link.push_str(reference_id(reference)?);
    }
    Ok(Some(link))
}

pub fn convert_annotation(
    annotation: &SourceAnnotation,
) -> Result<NormalizedHighlight, ConversionError> {
    if annotation.text.trim().is_empty() {
        return Err(ConversionError::MissingField("text"));
    }

    let (location, location_type) =
        assign_location(annotation.sort_index, annotation.page_label());

    Ok(NormalizedHighlight {
        text: annotation.text.clone(),
        title: annotation.title.clone(),
        author: annotation.authors.clone(),
        note: format_note(&annotation.tags, annotation.comment()),
        category: Some(category_for(&annotation.document_type)),
        location,
        location_type,
        highlighted_at: Some(annotation.annotated_at.clone()),
        source_url: annotation.source_url.clone(),
        highlight_url: highlight_url(annotation)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation() -> SourceAnnotation {
        SourceAnnotation {
            key: "ANNOT042".to_string(),
            version: 7,
            text: "The map is not the territory.".to_string(),
            title: Some("Science and Sanity".to_string()),
            authors: Some("Alfred Korzybski".to_string()),
            document_type: "journalArticle".to_string(),
            annotated_at: "2024-03-01T10:00:00Z".to_string(),
            parent_document_key: "DOC1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_tag() {
        assert_eq!(sanitize_tag("machine learning"), "machine_learning");
        assert_eq!(sanitize_tag("  to   read "), "to_read");
        assert_eq!(sanitize_tag("c++/rust!"), "crust");
        assert_eq!(sanitize_tag("follow-up"), "follow-up");
        assert_eq!(sanitize_tag("#?"), "");
    }

    #[test]
    fn test_format_note() {
        let tags = vec!["Philosophy".to_string(), "Deep Work".to_string()];
        assert_eq!(
            format_note(&tags, Some("revisit")),
            Some(".philosophy .deep_work\nrevisit".to_string())
        );
        assert_eq!(
            format_note(&tags, None),
            Some(".philosophy .deep_work".to_string())
        );
        assert_eq!(format_note(&[], Some("only")), Some("only".to_string()));
        assert_eq!(format_note(&[], None), None);
        assert_eq!(format_note(&["!!".to_string()], None), None);
    }

    #[test]
    fn test_category() {
        assert_eq!(category_for("book"), Category::Books);
        assert_eq!(category_for("journalArticle"), Category::Articles);
        assert_eq!(category_for(""), Category::Articles);
    }

    #[test]
    fn test_sort_index_wins_over_page_label() {
        assert_eq!(
            assign_location(Some(120), Some("iv")),
            (Some(120), LocationType::Order)
        );
    }

    #[test]
    fn test_zero_sort_index_has_no_location() {
        assert_eq!(assign_location(Some(0), Some("1")), (None, LocationType::Order));

        let mut a = annotation();
        a.sort_index = Some(0);
        let value = serde_json::to_value(convert_annotation(&a).unwrap()).unwrap();
        assert!(value.get("location").is_none());
        assert_eq!(value["location_type"], "order");
    }

    #[test]
    fn test_location_from_page_label() {
        assert_eq!(
            assign_location(None, Some("iv")),
            (Some(-4), LocationType::Page)
        );
        assert_eq!(
            assign_location(None, Some("pp. 23-24")),
            (Some(23), LocationType::Page)
        );
        assert_eq!(assign_location(None, Some("0")), (None, LocationType::Order));
        assert_eq!(assign_location(None, None), (None, LocationType::Order));
    }

    #[test]
    fn test_reference_id() {
        assert_eq!(
            reference_id("https://api.zotero.org/users/1/items/999"),
            Ok("999")
        );
        assert_eq!(reference_id("https://x/items/ABC?format=json"), Ok("ABC"));
        assert_eq!(reference_id("KEY"), Ok("KEY"));
        assert!(matches!(
            reference_id("https://x/items/ABC/"),
            Err(ConversionError::MalformedReference(_))
        ));
    }

    #[test]
    fn test_roman_page_deep_link_uses_absolute_value() {
        let mut a = annotation();
        a.attachment_reference = Some("https://api.zotero.org/users/1/items/999".to_string());
        a.annotation_reference = Some("https://api.zotero.org/users/1/items/42".to_string());
        a.page_label = Some("iv".to_string());

        let link = highlight_url(&a).unwrap().unwrap();
        assert_eq!(link, "zotero://open-pdf/library/items/999?page=4&annotation=42");
        assert!(link.ends_with("page=4&annotation=42"));
    }

    #[test]
    fn test_deep_link_page_defaults() {
        let mut a = annotation();
        a.attachment_reference = Some("https://api.zotero.org/users/1/items/ATT".to_string());
        a.annotation_reference = Some("https://api.zotero.org/users/1/items/ANN".to_string());
        assert_eq!(
            highlight_url(&a).unwrap().as_deref(),
            Some("zotero://open-pdf/library/items/ATT?page=1&annotation=ANN")
        );

        a.page_label = Some("pp. 23-24".to_string());
        assert_eq!(
            highlight_url(&a).unwrap().as_deref(),
            Some("zotero://open-pdf/library/items/ATT?page=pp.%2023-24&annotation=ANN")
        );
    }

    #[test]
    fn test_link_falls_back_to_annotation_reference() {
        let mut a = annotation();
        a.annotation_reference = Some("https://www.zotero.org/u/items/ANN".to_string());
        assert_eq!(
            highlight_url(&a).unwrap().as_deref(),
            Some("https://www.zotero.org/u/items/ANN")
        );
        a.annotation_reference = None;
        assert_eq!(highlight_url(&a).unwrap(), None);
    }

    #[test]
    fn test_end_to_end_roman_article() {
        let mut a = annotation();
        a.page_label = Some("iv".to_string());
        let highlight = convert_annotation(&a).unwrap();
        assert_eq!(highlight.location, Some(-4));
        assert_eq!(highlight.location_type, LocationType::Page);
        assert_eq!(highlight.category, Some(Category::Articles));
        assert_eq!(highlight.author.as_deref(), Some("Alfred Korzybski"));
        assert_eq!(highlight.highlighted_at.as_deref(), Some("2024-03-01T10:00:00Z"));
    }

    #[test]
    fn test_conversion_is_idempotent() {
        let mut a = annotation();
        a.tags = vec!["Epistemology".to_string()];
        a.comment = Some("compare with Bateson".to_string());
        a.page_label = Some("12".to_string());
        a.attachment_reference = Some("https://api.zotero.org/users/1/items/ATT".to_string());
        assert_eq!(convert_annotation(&a), convert_annotation(&a));
    }

    #[test]
    fn test_missing_text_fails() {
        let mut a = annotation();
        a.text = "  ".to_string();
        assert_eq!(
            convert_annotation(&a),
            Err(ConversionError::MissingField("text"))
        );
    }

    #[test]
    fn test_malformed_attachment_reference_fails() {
        let mut a = annotation();
        a.attachment_reference = Some("https://api.zotero.org/users/1/items/".to_string());
        assert!(matches!(
            convert_annotation(&a),
            Err(ConversionError::MalformedReference(_))
        ));
    }
}
