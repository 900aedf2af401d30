//! Input Validation Module
//!
//! Everything that decides whether request input may reach the data layer.
//!
//! 1. **Query** - `QueryValidator`, the guard for search text, pagination
//!    bounds and sort directives, plus LIKE-pattern escaping
//! 2. **Extractors** - `ValidatedJson<T>` and the 400 error body
//! 3. **Validators** / **Sanitizers** - field checks and cleanup for memo bodies
//!
//! Validation failures render as:
//!
//! ```json
//! {
//!   "error": "ValidationError",
//!   "message": "Validation failed for field 'order_by'",
//!   "errors": [{"field": "order_by", "message": "invalid column for ordering: password"}],
//!   "code": 400,
//!   "timestamp": "2026-02-20T10:30:00Z",
//!   "correlation_id": "uuid-here"
//! }
//! ```

pub mod extractors;
pub mod query;
pub mod requests;
pub mod sanitizers;
pub mod validators;

pub use extractors::{FieldError, Validatable, ValidatedJson, ValidationBuilder, ValidationError};
pub use query::{
    escape_for_like, OrderBy, QueryValidationError, QueryValidator, SortDirection, MAX_LIMIT,
    MAX_OFFSET, MAX_SEARCH_QUERY_CHARS, ORDERABLE_COLUMNS,
};
