//! Field validators for memo request bodies
//!
//! Reusable checks shared by the `Validatable` impls in `requests`.

use lazy_static::lazy_static;
use regex::Regex;

pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 5;

lazy_static! {
    /// HTML tag detection pattern; a tag name must follow `<` or `</`
    static ref HTML_TAG_REGEX: Regex = Regex::new(r"</?[A-Za-z][^>]*>").unwrap();

    /// Categories are short labels: letters, digits, spaces, '-' and '_'
    static ref CATEGORY_REGEX: Regex = Regex::new(r"^[\p{L}\p{N} _-]+$").unwrap();
}

/// Validate that a string is not empty after trimming
pub fn validate_required(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field_name));
    }
    Ok(())
}

/// Validate string length within bounds, counted in characters
pub fn validate_length(value: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len < min {
        return Err(format!("must be at least {} characters", min));
    }
    if len > max {
        return Err(format!("must be at most {} characters", max));
    }
    Ok(())
}

/// Validate that a string contains no HTML tags
pub fn validate_no_html(value: &str) -> Result<(), String> {
    if HTML_TAG_REGEX.is_match(value) {
        return Err("HTML tags are not allowed".to_string());
    }
    Ok(())
}

/// Validate a category label
pub fn validate_category(category: &str, max_length: usize) -> Result<(), String> {
    validate_length(category, 1, max_length)?;
    if !CATEGORY_REGEX.is_match(category) {
        return Err(
            "may only contain letters, digits, spaces, '-' and '_'".to_string(),
        );
    }
    Ok(())
}

/// Validate optional category (only validates if Some)
pub fn validate_category_optional(category: &Option<String>, max_length: usize) -> Result<(), String> {
    match category {
        Some(c) => validate_category(c, max_length),
        None => Ok(()),
    }
}

pub fn validate_priority(priority: i32) -> Result<(), String> {
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(format!(
            "must be between {} and {}",
            MIN_PRIORITY, MAX_PRIORITY
        ));
    }
    Ok(())
}
