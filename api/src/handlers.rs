use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::{json, Value};
use shared::{
    CreateMemoRequest, Memo, MemoListParams, MemoSearchParams, MemoStatus, PaginatedResponse,
    UpdateMemoRequest,
};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    auth_middleware::AuthContext,
    error::{ApiError, ApiResult},
    metrics,
    state::AppState,
    validation::{
        escape_for_like, requests::MAX_CATEGORY_LENGTH, validators::validate_category, OrderBy,
        QueryValidator, SortDirection, ValidatedJson, ValidationError,
    },
};

pub const DEFAULT_LIMIT: i64 = 20;
pub const DEFAULT_ORDER_BY: &str = "created_at desc";

fn map_query_rejection(err: QueryRejection) -> ApiError {
    ApiError::bad_request("InvalidQuery", format!("Invalid query parameters: {}", err.body_text()))
}

fn map_path_rejection(err: PathRejection) -> ApiError {
    ApiError::bad_request("InvalidPath", format!("Invalid path parameter: {}", err.body_text()))
}

fn memo_not_found(id: Uuid) -> ApiError {
    ApiError::not_found("MemoNotFound", format!("No memo found with ID: {}", id))
}

/// A list request whose every part has passed validation.
///
/// `search` is already LIKE-escaped and wrapped in `%`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<MemoStatus>,
    pub order: OrderBy,
    pub limit: i64,
    pub offset: i64,
}

impl ListQuery {
    /// Validate raw list parameters. Nothing here touches the database.
    pub fn from_params(
        validator: &QueryValidator,
        params: &MemoListParams,
    ) -> Result<Self, ValidationError> {
        let search = match params.q.as_deref() {
            Some(q) => {
                validator.validate_search_query(q)?;
                reject_control_chars(q)?;
                contains_pattern(q.trim())
            }
            None => None,
        };

        let (limit, offset) = pagination(validator, params.limit, params.offset)?;
        let order = resolve_order(validator, params.order_by.as_deref())?;

        let category = match params.category.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => {
                validate_category(c, MAX_CATEGORY_LENGTH)
                    .map_err(|msg| ValidationError::single("category", msg))?;
                Some(c.to_lowercase())
            }
            _ => None,
        };

        Ok(Self {
            search,
            category,
            status: params.status,
            order,
            limit,
            offset,
        })
    }

    /// Best-effort keyword search: the keyword is normalized instead of rejected.
    ///
    /// Returns `Ok(None)` when nothing searchable survives normalization.
    pub fn from_search(
        validator: &QueryValidator,
        params: &MemoSearchParams,
    ) -> Result<Option<Self>, ValidationError> {
        let (limit, offset) = pagination(validator, params.limit, params.offset)?;
        let keyword = validator.sanitize_search_query(params.keyword.as_deref().unwrap_or(""));

        let Some(search) = contains_pattern(&keyword) else {
            return Ok(None);
        };

        Ok(Some(Self {
            search: Some(search),
            category: None,
            status: None,
            order: default_order(),
            limit,
            offset,
        }))
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" WHERE 1=1");

        if let Some(ref pattern) = self.search {
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR content ILIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\')");
        }

        if let Some(ref category) = self.category {
            qb.push(" AND category = ").push_bind(category.clone());
        }

        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status);
        }
    }

    pub fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM memos");
        self.push_filters(&mut qb);
        qb
    }

    pub fn select_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT * FROM memos");
        self.push_filters(&mut qb);

        // column comes from the whitelist, never from the request
        let direction = self.order.direction.unwrap_or(SortDirection::Asc);
        qb.push(" ORDER BY ")
            .push(self.order.column)
            .push(" ")
            .push(direction.as_sql());

        qb.push(" LIMIT ")
            .push_bind(self.limit)
            .push(" OFFSET ")
            .push_bind(self.offset);
        qb
    }
}

/// Postgres text cannot hold NUL, and other control characters have no place in a search term
fn reject_control_chars(q: &str) -> Result<(), ValidationError> {
    if q.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        metrics::VALIDATION_REJECTIONS
            .with_label_values(&["control_character"])
            .inc();
        return Err(ValidationError::single(
            "q",
            "search query must not contain control characters",
        ));
    }
    Ok(())
}

fn contains_pattern(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(format!("%{}%", escape_for_like(text)))
    }
}

fn pagination(
    validator: &QueryValidator,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<(i64, i64), ValidationError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    let offset = offset.unwrap_or(0);
    validator.validate_limit_offset(limit, offset)?;
    Ok((limit, offset))
}

fn resolve_order(
    validator: &QueryValidator,
    order_by: Option<&str>,
) -> Result<OrderBy, ValidationError> {
    let order = validator.parse_order_by(order_by.unwrap_or(DEFAULT_ORDER_BY))?;
    Ok(order.unwrap_or_else(default_order))
}

fn default_order() -> OrderBy {
    OrderBy {
        column: "created_at",
        direction: Some(SortDirection::Desc),
    }
}

async fn fetch_page(state: &AppState, query: &ListQuery) -> ApiResult<PaginatedResponse<Memo>> {
    let total: i64 = query
        .count_query()
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(|err| ApiError::database("count memos", err))?;

    let items: Vec<Memo> = query
        .select_query()
        .build_query_as()
        .fetch_all(&state.db)
        .await
        .map_err(|err| ApiError::database("list memos", err))?;

    Ok(PaginatedResponse::new(items, total, query.limit, query.offset))
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let uptime = state.started_at.elapsed().as_secs();
    let now = chrono::Utc::now().to_rfc3339();

    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    let (status, label) = if db_ok {
        tracing::debug!(uptime_secs = uptime, "health check passed");
        (StatusCode::OK, "ok")
    } else {
        tracing::warn!(uptime_secs = uptime, "health check degraded, db unreachable");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": now,
            "uptime_secs": uptime
        })),
    )
}

pub async fn list_memos(
    State(state): State<AppState>,
    params: Result<Query<MemoListParams>, QueryRejection>,
) -> ApiResult<Json<PaginatedResponse<Memo>>> {
    let Query(params) = params.map_err(map_query_rejection)?;

    let query = ListQuery::from_params(&state.validator, &params).map_err(|err| {
        tracing::debug!(errors = ?err.errors, "rejected memo list parameters");
        err
    })?;

    fetch_page(&state, &query).await.map(Json)
}

pub async fn search_memos(
    State(state): State<AppState>,
    params: Result<Query<MemoSearchParams>, QueryRejection>,
) -> ApiResult<Json<PaginatedResponse<Memo>>> {
    let Query(params) = params.map_err(map_query_rejection)?;

    match ListQuery::from_search(&state.validator, &params)? {
        Some(query) => fetch_page(&state, &query).await.map(Json),
        None => {
            let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
            let offset = params.offset.unwrap_or(0);
            Ok(Json(PaginatedResponse::empty(limit, offset)))
        }
    }
}

pub async fn get_memo(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Memo>> {
    let Path(id) = id.map_err(map_path_rejection)?;

    let memo: Memo = sqlx::query_as("SELECT * FROM memos WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(|err| ApiError::database("get memo", err))?
        .ok_or_else(|| memo_not_found(id))?;

    Ok(Json(memo))
}

pub async fn create_memo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateMemoRequest>,
) -> ApiResult<(StatusCode, Json<Memo>)> {
    let memo: Memo = sqlx::query_as(
        "INSERT INTO memos (title, content, category, priority, status, author)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(&req.title)
    .bind(&req.content)
    .bind(&req.category)
    .bind(req.priority)
    .bind(req.status)
    .bind(&auth.user_id)
    .fetch_one(&state.db)
    .await
    .map_err(|err| ApiError::database("create memo", err))?;

    metrics::MEMOS_CREATED.inc();
    tracing::info!(memo_id = %memo.id, author = %auth.user_id, "memo created");

    Ok((StatusCode::CREATED, Json(memo)))
}

/// Fail unless `user_id` authored the memo
async fn ensure_author(state: &AppState, id: Uuid, user_id: &str) -> ApiResult<()> {
    let author: String = sqlx::query_scalar("SELECT author FROM memos WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(|err| ApiError::database("load memo author", err))?
        .ok_or_else(|| memo_not_found(id))?;

    if author != user_id {
        tracing::warn!(memo_id = %id, user = %user_id, "memo modification by non-author refused");
        return Err(ApiError::forbidden("Only the author may modify this memo"));
    }
    Ok(())
}

pub async fn update_memo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(req): ValidatedJson<UpdateMemoRequest>,
) -> ApiResult<Json<Memo>> {
    let Path(id) = id.map_err(map_path_rejection)?;
    ensure_author(&state, id, &auth.user_id).await?;

    let memo: Memo = sqlx::query_as(
        "UPDATE memos SET
             title = COALESCE($1, title),
             content = COALESCE($2, content),
             category = COALESCE($3, category),
             priority = COALESCE($4, priority),
             status = COALESCE($5, status),
             updated_at = NOW()
         WHERE id = $6
         RETURNING *",
    )
    .bind(&req.title)
    .bind(&req.content)
    .bind(&req.category)
    .bind(req.priority)
    .bind(req.status)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|err| ApiError::database("update memo", err))?
    .ok_or_else(|| memo_not_found(id))?;

    metrics::MEMOS_UPDATED.inc();
    tracing::info!(memo_id = %id, "memo updated");

    Ok(Json(memo))
}

pub async fn delete_memo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id.map_err(map_path_rejection)?;
    ensure_author(&state, id, &auth.user_id).await?;

    let result = sqlx::query("DELETE FROM memos WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|err| ApiError::database("delete memo", err))?;

    if result.rows_affected() == 0 {
        return Err(memo_not_found(id));
    }

    metrics::MEMOS_DELETED.inc();
    tracing::info!(memo_id = %id, "memo deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn route_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": "Route not found"})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> QueryValidator {
        QueryValidator::new().unwrap()
    }

    fn list_params(q: Option<&str>, order_by: Option<&str>) -> MemoListParams {
        MemoListParams {
            q: q.map(str::to_string),
            order_by: order_by.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn list_defaults() {
        let query = ListQuery::from_params(&validator(), &MemoListParams::default()).unwrap();
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert_eq!(query.offset, 0);
        assert_eq!(query.order, default_order());
        assert_eq!(query.search, None);
    }

    #[test]
    fn empty_order_by_falls_back_to_default() {
        let query = ListQuery::from_params(&validator(), &list_params(None, Some(""))).unwrap();
        assert_eq!(query.order, default_order());
    }

    #[test]
    fn search_text_is_escaped_and_never_inlined() {
        let query =
            ListQuery::from_params(&validator(), &list_params(Some(" 100% done_ish "), None))
                .unwrap();
        assert_eq!(query.search.as_deref(), Some("%100\\% done\\_ish%"));

        let sql = query.select_query().sql().to_string();
        assert!(!sql.contains("done"));
        assert!(sql.contains("title ILIKE $1 ESCAPE '\\' OR content ILIKE $2 ESCAPE '\\'"));
        assert!(sql.ends_with("ORDER BY created_at DESC LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn hostile_search_is_rejected() {
        let err = ListQuery::from_params(&validator(), &list_params(Some("x' OR 1=1 --"), None))
            .unwrap_err();
        assert_eq!(err.errors[0].field, "q");
    }

    #[test]
    fn control_characters_in_search_are_rejected() {
        for q in ["a\0b", "bell\x07", "\x1b[31m"] {
            let err = ListQuery::from_params(&validator(), &list_params(Some(q), None)).unwrap_err();
            assert_eq!(err.errors.len(), 1);
            assert_eq!(err.errors[0].field, "q");
            assert_eq!(
                err.errors[0].message,
                "search query must not contain control characters"
            );
        }

        let query =
            ListQuery::from_params(&validator(), &list_params(Some("two\twords\n"), None))
                .unwrap();
        assert_eq!(query.search.as_deref(), Some("%two\twords%"));
    }

    #[test]
    fn order_by_uses_whitelisted_column() {
        let query =
            ListQuery::from_params(&validator(), &list_params(None, Some("PRIORITY"))).unwrap();
        let sql = query.select_query().sql().to_string();
        assert!(sql.contains("ORDER BY priority ASC"));

        let err = ListQuery::from_params(&validator(), &list_params(None, Some("author desc")))
            .unwrap_err();
        assert_eq!(err.errors[0].field, "order_by");
        assert_eq!(err.errors[0].message, "invalid column for ordering: author");
    }

    #[test]
    fn pagination_bounds_are_enforced() {
        let params = MemoListParams {
            limit: Some(5000),
            ..Default::default()
        };
        let err = ListQuery::from_params(&validator(), &params).unwrap_err();
        assert_eq!(err.errors[0].field, "limit");

        let params = MemoListParams {
            offset: Some(-1),
            ..Default::default()
        };
        let err = ListQuery::from_params(&validator(), &params).unwrap_err();
        assert_eq!(err.errors[0].field, "offset");
    }

    #[test]
    fn filters_are_bound() {
        let params = MemoListParams {
            category: Some(" Work ".into()),
            status: Some(MemoStatus::Completed),
            ..Default::default()
        };
        let query = ListQuery::from_params(&validator(), &params).unwrap();
        assert_eq!(query.category.as_deref(), Some("work"));

        let sql = query.count_query().sql().to_string();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM memos WHERE 1=1 AND category = $1 AND status = $2"
        );
    }

    #[test]
    fn bad_category_is_rejected() {
        let params = MemoListParams {
            category: Some("work'; --".into()),
            ..Default::default()
        };
        let err = ListQuery::from_params(&validator(), &params).unwrap_err();
        assert_eq!(err.errors[0].field, "category");
    }

    #[test]
    fn keyword_search_normalizes_instead_of_rejecting() {
        let params = MemoSearchParams {
            keyword: Some("  <b>budget</b>   2024; ".into()),
            ..Default::default()
        };
        let query = ListQuery::from_search(&validator(), &params).unwrap().unwrap();
        assert_eq!(query.search.as_deref(), Some("%bbudgetb 2024%"));
    }

    #[test]
    fn keyword_search_with_nothing_left_is_empty() {
        let params = MemoSearchParams {
            keyword: Some("';--".into()),
            ..Default::default()
        };
        assert!(ListQuery::from_search(&validator(), &params).unwrap().is_none());

        let params = MemoSearchParams {
            keyword: Some("ok".into()),
            limit: Some(0),
            ..Default::default()
        };
        assert!(ListQuery::from_search(&validator(), &params).is_err());
    }
}
