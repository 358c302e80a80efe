use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::models::{Feed, FeedDetail, FeedError};
use crate::usecases::FeedService;

pub struct AppState {
    pub feeds: FeedService,
    pub policy: ResponsePolicy,
}

/// What `GET /feed/:id` answers when the id is unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFeed {
    /// 200 with a JSON `null` body
    #[default]
    Null,
    /// 404 with a detail message
    NotFound,
}

/// Maps use-case outcomes to HTTP statuses.
///
/// The defaults reproduce the historical API: unknown ids are a 200 `null`,
/// create failures are 400 and anything else on create is 404.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResponsePolicy {
    pub missing_feed: MissingFeed,
    #[serde(deserialize_with = "deserialize_status")]
    pub create_error_status: StatusCode,
    #[serde(deserialize_with = "deserialize_status")]
    pub unexpected_error_status: StatusCode,
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self {
            missing_feed: MissingFeed::Null,
            create_error_status: StatusCode::BAD_REQUEST,
            unexpected_error_status: StatusCode::NOT_FOUND,
        }
    }
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: Deserializer<'de>,
{
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(serde::de::Error::custom)
}

impl ResponsePolicy {
    /// Status for a failed create.
    pub fn create_failure(&self, err: FeedError) -> ApiError {
        let status = match err {
            FeedError::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            FeedError::Create(_) => self.create_error_status,
            _ => self.unexpected_error_status,
        };
        ApiError::new(status, err.to_string())
    }

    /// Response for a lookup that may have found nothing.
    pub fn lookup(&self, feed_id: i64, feed: Option<FeedDetail>) -> Response {
        match (feed, self.missing_feed) {
            (Some(feed), _) => Json(Some(feed)).into_response(),
            (None, MissingFeed::Null) => Json(None::<FeedDetail>).into_response(),
            (None, MissingFeed::NotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, format!("Feed {} not found", feed_id))
                    .into_response()
            }
        }
    }
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub feeds: Vec<FeedDetail>,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// JSON error with a `detail` message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

// Read-side failures are server errors
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        warn!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/feeds", get(read_feeds))
        .route("/feed/:id", get(read_feed_by_id))
        .route("/feed/", post(create_feed))
        .route("/feed", post(create_feed))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let feeds = state.feeds.read_feeds().await?;
    Ok(HtmlTemplate(IndexTemplate { feeds }))
}

pub async fn read_feeds(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FeedDetail>>, AppError> {
    let feeds = state.feeds.read_feeds().await?;
    Ok(Json(feeds))
}

pub async fn read_feed_by_id(
    State(state): State<Arc<AppState>>,
    Path(feed_id): Path<i64>,
) -> Result<Response, AppError> {
    let feed = state.feeds.read_feed_by_id(feed_id).await?;
    Ok(state.policy.lookup(feed_id, feed))
}

pub async fn create_feed(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Feed>, JsonRejection>,
) -> Result<Json<FeedDetail>, ApiError> {
    let Json(feed) =
        payload.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;

    feed.validate().map_err(|err| state.policy.create_failure(err))?;

    state
        .feeds
        .create_new_feed_and_read_feed_by_id(feed)
        .await
        .map(Json)
        .map_err(|err| {
            warn!("Failed to create feed: {}", err);
            state.policy.create_failure(err)
        })
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
