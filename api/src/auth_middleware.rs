use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::{AuthError, AuthManager};
use crate::metrics;
use crate::state::AppState;

/// Identity of the caller, inserted into request extensions on success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
    message: &'static str,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let claims = match AuthManager::bearer_token(header).and_then(|t| state.auth.validate_jwt(t)) {
        Ok(claims) => claims,
        Err(err) => return unauthorized(err),
    };

    request.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
    });

    next.run(request).await
}

fn unauthorized(err: AuthError) -> Response {
    metrics::AUTH_FAILURES.with_label_values(&[err.reason()]).inc();
    tracing::debug!(reason = err.reason(), "rejected unauthenticated request");
    (
        StatusCode::UNAUTHORIZED,
        Json(AuthErrorBody {
            error: "Unauthorized",
            message: err.reason(),
        }),
    )
        .into_response()
}
