use prometheus::Registry;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthManager;
use crate::validation::QueryValidator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub started_at: Instant,
    pub registry: Registry,
    pub validator: Arc<QueryValidator>,
    pub auth: Arc<AuthManager>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        registry: Registry,
        validator: QueryValidator,
        auth: AuthManager,
    ) -> Self {
        Self {
            db,
            started_at: Instant::now(),
            registry,
            validator: Arc::new(validator),
            auth: Arc::new(auth),
        }
    }
}
