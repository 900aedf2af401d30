use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════
// MEMO TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// A memo as stored in the `memos` table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Memo {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub priority: i32,
    pub status: MemoStatus,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Workflow state of a memo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "memo_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl std::fmt::Display for MemoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoStatus::Pending => write!(f, "pending"),
            MemoStatus::InProgress => write!(f, "in_progress"),
            MemoStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Request body for POST /api/memos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMemoRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub status: MemoStatus,
}

/// Request body for PUT /api/memos/:id. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMemoRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub priority: Option<i32>,
    pub status: Option<MemoStatus>,
}

fn default_priority() -> i32 {
    3
}

// ═══════════════════════════════════════════════════════════════════════════
// QUERY PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════

/// Query params for GET /api/memos
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoListParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub status: Option<MemoStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order_by: Option<String>,
}

/// Query params for GET /api/memos/search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoSearchParams {
    pub keyword: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Limit/offset page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        Self {
            items,
            total,
            limit,
            offset,
        }
    }

    pub fn empty(limit: i64, offset: i64) -> Self {
        Self::new(Vec::new(), 0, limit, offset)
    }
}
