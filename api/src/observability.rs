use std::time::Instant;

use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use prometheus::Registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::metrics;

const DEFAULT_LOG_FILTER: &str = "memo_api=debug,tower_http=debug";

pub struct Observability {
    pub registry: Registry,
}

impl Observability {
    pub fn init(log_format: LogFormat) -> Result<Self> {
        let registry = Registry::new_custom(Some("memo".into()), None)?;
        metrics::register_all(&registry)?;

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

        match log_format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?,
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()?,
        }

        tracing::info!(?log_format, "Observability stack initialized");
        Ok(Self { registry })
    }
}

/// Logs every request and records HTTP metrics, labelled by route template
pub async fn request_logger(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let start = Instant::now();

    metrics::HTTP_IN_FLIGHT.inc();
    let response = next.run(req).await;
    metrics::HTTP_IN_FLIGHT.dec();

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    metrics::observe_http(method.as_str(), &path, status, elapsed.as_secs_f64());

    if response.status().is_server_error() {
        tracing::error!(%method, %path, status, elapsed_ms = elapsed.as_millis() as u64, "request failed");
    } else {
        tracing::info!(%method, %path, status, elapsed_ms = elapsed.as_millis() as u64, "request completed");
    }

    response
}
