//! Classification of free-form Zotero page labels.
//!
//! A label becomes a single signed integer usable as a Readwise `location`.
//! Roman numerals (front matter) are negated so they sort before body pages
//! when locations are compared as plain integers.

use std::sync::LazyLock;

use regex::Regex;

/// Largest value still accepted as a front-matter Roman numeral.
pub const MAX_ROMAN_PAGE: i64 = 100;

static ROMAN_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([ivxlcdm]+)\b").expect("valid roman word pattern"));

// ASCII digits only, matching what `str::parse::<i64>` accepts.
static DIGIT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9]+)\b").expect("valid digit word pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLabel {
    pub value: i64,
    pub is_roman: bool,
    pub original: String,
}

impl PageLabel {
    fn new(value: i64, is_roman: bool, original: &str) -> Self {
        Self {
            value,
            is_roman,
            original: original.to_string(),
        }
    }

    /// Zero never carries ordering information, whichever rule produced it.
    pub fn is_usable(&self) -> bool {
        self.value != 0
    }

    /// Human page number, i.e. the Roman value without the sort negation.
    pub fn page_number(&self) -> i64 {
        self.value.abs()
    }
}

/// Classifies a page label. A number too large for `i64` is not a page and
/// parses to 0, like any other label without an ordering signal.
pub fn parse_page_label(label: &str) -> PageLabel {
    let cleaned = label.trim();
    if cleaned.is_empty() {
        return PageLabel::new(0, false, "");
    }

    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        return PageLabel::new(cleaned.parse().unwrap_or(0), false, cleaned);
    }

    if let Some(value) = roman_page(cleaned) {
        return PageLabel::new(-value, true, cleaned);
    }

    // Only the first roman-looking word is considered, e.g. "mix 12" is a page 12.
    if let Some(word) = ROMAN_WORD.captures(cleaned).and_then(|c| c.get(1)) {
        if let Some(value) = roman_page(word.as_str()) {
            return PageLabel::new(-value, true, cleaned);
        }
    }

    if let Some(digits) = DIGIT_WORD.captures(cleaned).and_then(|c| c.get(1)) {
        return PageLabel::new(digits.as_str().parse().unwrap_or(0), false, cleaned);
    }

    PageLabel::new(0, false, cleaned)
}

/// Decodes subtractive Roman notation right to left. Returns 0 when any
/// character is not a Roman digit; canonical form is not enforced.
pub fn roman_to_int(roman: &str) -> i64 {
    let mut total = 0;
    let mut previous = 0;

    for c in roman.trim().chars().rev() {
        let value = match c.to_ascii_uppercase() {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            'D' => 500,
            'M' => 1000,
            _ => return 0,
        };
        if value < previous {
            total -= value;
        } else {
            total += value;
        }
        previous = value;
    }

    total
}

pub fn is_roman_numeral(text: &str) -> bool {
    roman_page(text).is_some()
}

fn roman_page(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let value = roman_to_int(text);
    (1..=MAX_ROMAN_PAGE).contains(&value).then_some(value)
}
