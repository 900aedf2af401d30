//! Query parameter guard for the memo data layer
//!
//! Decides whether free-text search input, pagination bounds and sort
//! directives are safe to hand to a parameterized query, and offers a
//! lossy normalizer plus a LIKE-pattern escaper for best-effort search.
//!
//! This is a cheap early-rejection layer in front of bound parameters. It
//! does not replace them.

use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;

/// Maximum search query length, in code points
pub const MAX_SEARCH_QUERY_CHARS: usize = 500;

pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 1000;
pub const MAX_OFFSET: i64 = 100_000;

/// Columns a caller may sort by
pub const ORDERABLE_COLUMNS: [&str; 8] = [
    "id",
    "title",
    "content",
    "category",
    "priority",
    "status",
    "created_at",
    "updated_at",
];

/// Named rejection rules, checked in order. All are case-insensitive.
const REJECTION_RULES: &[(&str, &str)] = &[
    (
        "sql_keyword",
        r"(?i)(^|\s)(union|select|insert|update|delete|drop|create|alter|exec|execute|declare|grant|revoke|truncate|show|describe)\s",
    ),
    ("sql_metacharacter", r#"(--|/\*|\*/|;|'|"|\||&|\+|<|>|=|\(|\))"#),
    (
        "script_injection",
        r"(?i)(script|javascript|vbscript|onload|onerror|alert|document|window|eval|expression)",
    ),
    (
        "db_internal",
        r"(?i)(xp_|sp_|sys\.|information_schema|pg_|mysql\.)",
    ),
];

/// Anything outside ASCII alphanumerics, whitespace, Hiragana, Katakana and CJK ideographs
const DISALLOWED_SEARCH_CHARS: &str =
    r"[^a-zA-Z0-9\s\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}]";

const WHITESPACE_RUN: &str = r"\s+";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryValidationError {
    #[error("search query is too long (max 500 characters)")]
    QueryTooLong,
    #[error("dangerous pattern detected in search query")]
    DangerousPattern,
    #[error("limit must be positive")]
    LimitTooSmall,
    #[error("limit is too large (max 1000)")]
    LimitTooLarge,
    #[error("offset must be non-negative")]
    OffsetNegative,
    #[error("offset is too large (max 100000)")]
    OffsetTooLarge,
    #[error("invalid order by format")]
    InvalidOrderFormat,
    #[error("invalid column for ordering: {0}")]
    InvalidOrderColumn(String),
    #[error("invalid order direction: {0}")]
    InvalidOrderDirection(String),
}

impl QueryValidationError {
    /// Stable identifier, used as a metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueryTooLong => "query_too_long",
            Self::DangerousPattern => "dangerous_pattern",
            Self::LimitTooSmall => "limit_too_small",
            Self::LimitTooLarge => "limit_too_large",
            Self::OffsetNegative => "offset_negative",
            Self::OffsetTooLarge => "offset_too_large",
            Self::InvalidOrderFormat => "order_format",
            Self::InvalidOrderColumn(_) => "order_column",
            Self::InvalidOrderDirection(_) => "order_direction",
        }
    }

    /// The request parameter the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            Self::QueryTooLong | Self::DangerousPattern => "q",
            Self::LimitTooSmall | Self::LimitTooLarge => "limit",
            Self::OffsetNegative | Self::OffsetTooLarge => "offset",
            Self::InvalidOrderFormat
            | Self::InvalidOrderColumn(_)
            | Self::InvalidOrderDirection(_) => "order_by",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A sort directive that passed the column whitelist.
///
/// `column` always borrows from [`ORDERABLE_COLUMNS`], never from caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub direction: Option<SortDirection>,
}

/// Compiled rejection patterns and whitelists.
///
/// Build one per process and share it; every method takes `&self` and
/// nothing is mutated after construction.
#[derive(Debug)]
pub struct QueryValidator {
    rules: Vec<(&'static str, Regex)>,
    disallowed_chars: Regex,
    whitespace_run: Regex,
    orderable_columns: HashSet<&'static str>,
}

impl QueryValidator {
    pub fn new() -> Result<Self, regex::Error> {
        let rules = REJECTION_RULES
            .iter()
            .map(|(name, pattern)| Regex::new(pattern).map(|re| (*name, re)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules,
            disallowed_chars: Regex::new(DISALLOWED_SEARCH_CHARS)?,
            whitespace_run: Regex::new(WHITESPACE_RUN)?,
            orderable_columns: ORDERABLE_COLUMNS.iter().copied().collect(),
        })
    }

    /// Names of the loaded rejection rules, in evaluation order
    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|(name, _)| *name)
    }

    /// Reject over-long or obviously hostile free text. Empty input is accepted.
    pub fn validate_search_query(&self, query: &str) -> Result<(), QueryValidationError> {
        if query.is_empty() {
            return Ok(());
        }

        if query.chars().count() > MAX_SEARCH_QUERY_CHARS {
            return Err(QueryValidationError::QueryTooLong);
        }

        if self.rules.iter().any(|(_, re)| re.is_match(query)) {
            return Err(QueryValidationError::DangerousPattern);
        }

        Ok(())
    }

    /// Lossy normalization: keep only permitted character classes and collapse whitespace.
    ///
    /// Never fails. Not a substitute for [`Self::validate_search_query`].
    pub fn sanitize_search_query(&self, query: &str) -> String {
        let filtered = self.disallowed_chars.replace_all(query.trim(), "");
        let collapsed = self.whitespace_run.replace_all(&filtered, " ");
        collapsed.trim().to_string()
    }

    pub fn validate_limit_offset(&self, limit: i64, offset: i64) -> Result<(), QueryValidationError> {
        if limit < MIN_LIMIT {
            return Err(QueryValidationError::LimitTooSmall);
        }
        if limit > MAX_LIMIT {
            return Err(QueryValidationError::LimitTooLarge);
        }
        if offset < 0 {
            return Err(QueryValidationError::OffsetNegative);
        }
        if offset > MAX_OFFSET {
            return Err(QueryValidationError::OffsetTooLarge);
        }
        Ok(())
    }

    pub fn validate_order_by(&self, order_by: &str) -> Result<(), QueryValidationError> {
        self.parse_order_by(order_by).map(|_| ())
    }

    /// Validate a sort directive and resolve it to a whitelisted column.
    ///
    /// Returns `Ok(None)` for an empty directive.
    pub fn parse_order_by(&self, order_by: &str) -> Result<Option<OrderBy>, QueryValidationError> {
        if order_by.is_empty() {
            return Ok(None);
        }

        let tokens: Vec<String> = order_by
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        if tokens.is_empty() || tokens.len() > 2 {
            return Err(QueryValidationError::InvalidOrderFormat);
        }

        let column = self
            .orderable_columns
            .get(tokens[0].as_str())
            .copied()
            .ok_or_else(|| QueryValidationError::InvalidOrderColumn(tokens[0].clone()))?;

        let direction = match tokens.get(1).map(String::as_str) {
            None => None,
            Some("asc") => Some(SortDirection::Asc),
            Some("desc") => Some(SortDirection::Desc),
            Some(other) => {
                return Err(QueryValidationError::InvalidOrderDirection(other.to_string()))
            }
        };

        Ok(Some(OrderBy { column, direction }))
    }

    pub fn escape_for_like(&self, pattern: &str) -> String {
        escape_for_like(pattern)
    }
}

/// Escape `\`, `%` and `_` for use in a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_for_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '%' => escaped.push_str("\\%"),
            '_' => escaped.push_str("\\_"),
            _ => escaped.push(c),
        }
    }
    escaped
}
