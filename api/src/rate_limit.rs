//! Fixed-window rate limiting keyed by client IP and traffic class.

use std::{
    collections::HashMap,
    env,
    net::{IpAddr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{connect_info::ConnectInfo, State},
    http::{header::RETRY_AFTER, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::parse_or_default;
use crate::metrics;

const DEFAULT_READ_LIMIT: u32 = 100;
const DEFAULT_WRITE_LIMIT: u32 = 20;
const DEFAULT_WINDOW_SECONDS: u64 = 60;

const HEADER_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TrafficClass {
    Read,
    Write,
}

impl TrafficClass {
    fn of(method: &Method) -> Self {
        match *method {
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE => TrafficClass::Write,
            _ => TrafficClass::Read,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub read_limit: u32,
    pub write_limit: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let read_limit = parse_or_default(
            "RATE_LIMIT_READ_PER_WINDOW",
            env::var("RATE_LIMIT_READ_PER_WINDOW").ok(),
            DEFAULT_READ_LIMIT,
        );
        let write_limit = parse_or_default(
            "RATE_LIMIT_WRITE_PER_WINDOW",
            env::var("RATE_LIMIT_WRITE_PER_WINDOW").ok(),
            DEFAULT_WRITE_LIMIT,
        );
        let window_seconds = parse_or_default(
            "RATE_LIMIT_WINDOW_SECONDS",
            env::var("RATE_LIMIT_WINDOW_SECONDS").ok(),
            DEFAULT_WINDOW_SECONDS,
        );

        tracing::info!(read_limit, write_limit, window_seconds, "Rate limiter configured");

        Self {
            read_limit,
            write_limit,
            window: Duration::from_secs(window_seconds),
        }
    }

    fn limit_for(&self, class: TrafficClass) -> u32 {
        match class {
            TrafficClass::Read => self.read_limit,
            TrafficClass::Write => self.write_limit,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_limit: DEFAULT_READ_LIMIT,
            write_limit: DEFAULT_WRITE_LIMIT,
            window: Duration::from_secs(DEFAULT_WINDOW_SECONDS),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<RateLimitConfig>,
    windows: Arc<Mutex<HashMap<(String, TrafficClass), Window>>>,
}

struct Window {
    started: Instant,
    count: u32,
}

struct Decision {
    allowed: bool,
    limit: u32,
    remaining: u32,
    reset_seconds: u64,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config: Arc::new(config),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_env() -> Self {
        Self::new(RateLimitConfig::from_env())
    }

    fn check(&self, client: String, class: TrafficClass, now: Instant) -> Decision {
        let limit = self.config.limit_for(class);
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let window = windows.entry((client, class)).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.config.window {
            window.started = now;
            window.count = 0;
        }

        let left_in_window = self
            .config
            .window
            .saturating_sub(now.duration_since(window.started));
        let reset_seconds = ceil_seconds(left_in_window).max(1);

        if window.count >= limit {
            return Decision {
                allowed: false,
                limit,
                remaining: 0,
                reset_seconds,
            };
        }

        window.count += 1;
        Decision {
            allowed: true,
            limit,
            remaining: limit - window.count,
            reset_seconds,
        }
    }

    /// Drop windows that have fully elapsed
    pub fn prune(&self) {
        let now = Instant::now();
        let window = self.config.window;
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.retain(|_, w| now.duration_since(w.started) < window);
    }

    /// Periodically prune idle windows so the map doesn't grow with every client seen
    pub fn spawn_pruner(&self) {
        let state = self.clone();
        let period = self.config.window;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                state.prune();
            }
        });
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_ip(&request);
    let class = TrafficClass::of(request.method());
    let decision = limiter.check(client.clone(), class, Instant::now());

    if !decision.allowed {
        metrics::RATE_LIMITED_TOTAL.inc();
        tracing::warn!(client = %client, ?class, "rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "RateLimited", "message": "rate limit exceeded" })),
        )
            .into_response();
        set_headers(&mut response, &decision);
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(decision.reset_seconds));
        return response;
    }

    let mut response = next.run(request).await;
    set_headers(&mut response, &decision);
    response
}

fn set_headers(response: &mut Response, decision: &Decision) {
    let headers = response.headers_mut();
    headers.insert(HEADER_RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(HEADER_RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(HEADER_RATE_LIMIT_RESET, HeaderValue::from(decision.reset_seconds));
}

fn client_ip<B>(request: &Request<B>) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.split(',').map(str::trim).find_map(parse_ip));
    let real_ip = || {
        request
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_ip)
    };
    let peer = || {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip())
    };

    forwarded
        .or_else(real_ip)
        .or_else(peer)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

fn ceil_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
