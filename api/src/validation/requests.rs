//! `Validatable` implementations for memo request bodies

use shared::{CreateMemoRequest, UpdateMemoRequest};

use super::extractors::{FieldError, Validatable, ValidationBuilder};
use super::sanitizers::{sanitize_category_optional, sanitize_content, sanitize_title};
use super::validators::{
    validate_category_optional, validate_length, validate_no_html, validate_priority,
    validate_required,
};

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_CONTENT_LENGTH: usize = 10_000;
pub const MAX_CATEGORY_LENGTH: usize = 50;

impl Validatable for CreateMemoRequest {
    fn sanitize(&mut self) {
        self.title = sanitize_title(&self.title);
        self.content = sanitize_content(&self.content);
        sanitize_category_optional(&mut self.category);
    }

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut builder = ValidationBuilder::new();
        builder
            .check("title", || validate_required(&self.title, "title"))
            .check("title", || validate_length(&self.title, 1, MAX_TITLE_LENGTH))
            .check("content", || validate_length(&self.content, 0, MAX_CONTENT_LENGTH))
            .check("content", || validate_no_html(&self.content))
            .check("category", || {
                validate_category_optional(&self.category, MAX_CATEGORY_LENGTH)
            })
            .check("priority", || validate_priority(self.priority));
        builder.build()
    }
}

impl Validatable for UpdateMemoRequest {
    fn sanitize(&mut self) {
        if let Some(ref mut title) = self.title {
            *title = sanitize_title(title);
        }
        if let Some(ref mut content) = self.content {
            *content = sanitize_content(content);
        }
        sanitize_category_optional(&mut self.category);
    }

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut builder = ValidationBuilder::new();

        builder.check_condition(
            self.title.is_none()
                && self.content.is_none()
                && self.category.is_none()
                && self.priority.is_none()
                && self.status.is_none(),
            "body",
            "at least one field must be provided",
        );

        if let Some(ref title) = self.title {
            builder.check("title", || validate_length(title, 1, MAX_TITLE_LENGTH));
        }
        if let Some(ref content) = self.content {
            builder
                .check("content", || validate_length(content, 0, MAX_CONTENT_LENGTH))
                .check("content", || validate_no_html(content));
        }
        builder.check("category", || {
            validate_category_optional(&self.category, MAX_CATEGORY_LENGTH)
        });
        if let Some(priority) = self.priority {
            builder.check("priority", || validate_priority(priority));
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MemoStatus;

    fn create_request(title: &str) -> CreateMemoRequest {
        CreateMemoRequest {
            title: title.to_string(),
            content: "body".to_string(),
            category: Some("  Work ".to_string()),
            priority: 3,
            status: MemoStatus::Pending,
        }
    }

    #[test]
    fn create_request_is_sanitized_then_valid() {
        let mut req = create_request("  Plan   <em>sprint</em> ");
        req.sanitize();
        assert_eq!(req.title, "Plan sprint");
        assert_eq!(req.category.as_deref(), Some("work"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn comparisons_in_content_survive_sanitizing() {
        let mut req = create_request("Thresholds");
        req.content = "alert when a < b and c > d".to_string();
        req.sanitize();
        assert_eq!(req.content, "alert when a < b and c > d");
        assert!(req.validate().is_ok());

        let mut req = create_request("Markup");
        req.content = "keep <i>this</i> text".to_string();
        req.sanitize();
        assert_eq!(req.content, "keep this text");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_request_collects_every_failure() {
        let mut req = create_request("   ");
        req.priority = 9;
        req.category = Some("bad;category".to_string());
        req.sanitize();

        let errors = req.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"title"));
        assert!(fields.contains(&"priority"));
        assert!(fields.contains(&"category"));
    }

    #[test]
    fn create_request_rejects_oversized_title() {
        let mut req = create_request(&"t".repeat(MAX_TITLE_LENGTH + 1));
        req.sanitize();
        let errors = req.validate().unwrap_err();
        assert_eq!(errors[0].field, "title");
    }

    #[test]
    fn update_request_requires_some_field() {
        let req = UpdateMemoRequest::default();
        let errors = req.validate().unwrap_err();
        assert_eq!(errors[0].field, "body");
    }

    #[test]
    fn update_request_validates_present_fields_only() {
        let mut req = UpdateMemoRequest {
            status: Some(MemoStatus::Completed),
            ..Default::default()
        };
        req.sanitize();
        assert!(req.validate().is_ok());

        let req = UpdateMemoRequest {
            priority: Some(0),
            ..Default::default()
        };
        let errors = req.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "priority");
    }
}
