use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use url::form_urlencoded;

use crate::aggregator::{aggregate, AggregateError};
use crate::config::{Config, MAX_LIMIT, MIN_LIMIT};
use crate::fetcher::Fetcher;
use crate::normalize::Article;
use crate::registry::{FeedRegistry, RegisteredFeed};

pub struct AppState {
    pub config: Config,
    pub registry: FeedRegistry,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = FeedRegistry::new(&config.feeds);
        Self { config, registry }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/api/news", get(news))
        .route("/api/news/all", get(all_news))
        .route("/api/feeds", get(feeds))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        // A literal wildcard cannot be combined with credentials.
        warn!("ALLOWED_ORIGINS contains '*', mirroring the request origin instead");
        AllowOrigin::mirror_request()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("At least one feed URL is required")]
    MissingUrl,
    #[error("URL not allowed: {0}")]
    DisallowedUrl(String),
    #[error("limit must be an integer between 1 and 100, got '{0}'")]
    InvalidLimit(String),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::MissingUrl | AppError::DisallowedUrl(_) | AppError::InvalidLimit(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Aggregate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Aggregation failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Query parameters accepted by the news endpoints.
///
/// Parsed from the raw query string because `url` and `urls` may repeat.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NewsQuery {
    pub urls: Vec<String>,
    pub limit: Option<String>,
}

impl NewsQuery {
    pub fn parse(query: &str) -> Self {
        let mut parsed = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "url" | "urls" | "urls[]" => parsed.urls.push(value.into_owned()),
                "limit" => parsed.limit = Some(value.into_owned()),
                _ => {}
            }
        }
        parsed
    }

    /// The validated limit, if one was given.
    pub fn limit(&self) -> Result<Option<usize>, AppError> {
        let Some(raw) = self.limit.as_deref() else {
            return Ok(None);
        };
        match raw.trim().parse::<usize>() {
            Ok(limit) if (MIN_LIMIT..=MAX_LIMIT).contains(&limit) => Ok(Some(limit)),
            _ => Err(AppError::InvalidLimit(raw.to_string())),
        }
    }

    /// Map every requested URL onto its registry entry. A single unknown URL
    /// rejects the whole request.
    pub fn resolve_urls(&self, registry: &FeedRegistry) -> Result<Vec<String>, AppError> {
        let requested: Vec<&str> = self
            .urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .collect();

        if requested.is_empty() {
            return Err(AppError::MissingUrl);
        }

        requested
            .into_iter()
            .map(|raw| {
                registry
                    .resolve(raw)
                    .map(|feed| feed.url.clone())
                    .ok_or_else(|| AppError::DisallowedUrl(raw.to_string()))
            })
            .collect()
    }
}

async fn run_aggregation(
    state: &AppState,
    urls: &[String],
    limit: Option<usize>,
) -> Result<Vec<Article>, AppError> {
    // Scoped to this request; dropped with it on every path.
    let fetcher = Fetcher::new(state.config.request_timeout()).map_err(AggregateError::from)?;
    Ok(aggregate(&fetcher, urls, limit).await?)
}

// Route handlers
pub async fn news(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<Article>>, AppError> {
    let query = NewsQuery::parse(query.as_deref().unwrap_or_default());
    let urls = query.resolve_urls(&state.registry)?;
    let limit = query.limit()?.unwrap_or(state.config.default_limit);

    let articles = run_aggregation(&state, &urls, Some(limit)).await?;
    Ok(Json(articles))
}

pub async fn all_news(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<Article>>, AppError> {
    let query = NewsQuery::parse(query.as_deref().unwrap_or_default());
    let limit = query.limit()?;

    let articles = run_aggregation(&state, &state.registry.urls(), limit).await?;
    Ok(Json(articles))
}

pub async fn feeds(State(state): State<Arc<AppState>>) -> Json<Vec<RegisteredFeed>> {
    Json(state.registry.feeds().to_vec())
}

pub async fn health() -> &'static str {
    "OK"
}
