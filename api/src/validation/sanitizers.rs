//! Input sanitization functions
//!
//! Clean and normalize memo fields before validation and storage.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pattern to match HTML tags; bare `<` and `>` are left alone
    static ref HTML_TAG_PATTERN: Regex = Regex::new(r"</?[A-Za-z][^>]*>").unwrap();

    /// Pattern to match multiple whitespace characters
    static ref MULTI_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    /// Pattern to match control characters (except newline and tab)
    static ref CONTROL_CHARS: Regex = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap();
}

/// Normalize whitespace: collapse multiple spaces/newlines into single space
pub fn normalize_whitespace(value: &str) -> String {
    MULTI_WHITESPACE.replace_all(value.trim(), " ").to_string()
}

/// Strip all HTML tags from a string
pub fn strip_html(value: &str) -> String {
    HTML_TAG_PATTERN.replace_all(value, "").to_string()
}

/// Remove control characters from a string
pub fn remove_control_chars(value: &str) -> String {
    CONTROL_CHARS.replace_all(value, "").to_string()
}

/// Sanitize a memo title: single line, no markup
pub fn sanitize_title(title: &str) -> String {
    let no_control = remove_control_chars(title);
    let no_html = strip_html(&no_control);
    normalize_whitespace(&no_html)
}

/// Sanitize memo content: keep line structure, drop control chars and markup
pub fn sanitize_content(content: &str) -> String {
    let no_control = remove_control_chars(content.trim());
    strip_html(&no_control)
}

/// Sanitize an optional category; blank categories become None
pub fn sanitize_category_optional(category: &mut Option<String>) {
    if let Some(ref mut c) = category {
        *c = normalize_whitespace(&strip_html(c)).to_lowercase();
        if c.is_empty() {
            *category = None;
        }
    }
}
