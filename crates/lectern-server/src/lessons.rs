//! Lesson backend client.
//!
//! Lessons, with their ordered content blocks, are owned by the training
//! platform's REST backend. The server only reads them to render previews.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use lectern_core::{BlockList, ContentBlock};

/// Default lesson backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3556/api";

/// Lesson source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LessonSourceError {
    /// The backend has no such lesson.
    #[error("lesson not found: {0}")]
    NotFound(String),

    /// The backend answered with an unexpected status.
    #[error("lesson backend responded with {0}")]
    Backend(u16),

    /// The backend could not be reached.
    #[error("lesson backend unreachable: {0}")]
    Transport(String),

    /// The backend response was not a lesson.
    #[error("invalid lesson payload: {0}")]
    Decode(String),

    /// The client is misconfigured.
    #[error("invalid lesson backend configuration: {0}")]
    Config(String),
}

/// Result type for lesson lookups.
pub type Result<T> = std::result::Result<T, LessonSourceError>;

/// Publication state of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonStatus {
    Draft,
    Published,
}

/// Lesson record as stored by the backend.
///
/// Only the fields needed for rendering are modeled; the rest of the
/// backend record is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<LessonStatus>,
    #[serde(default)]
    pub theme_id: Option<String>,
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Lesson {
    /// Returns the lesson's blocks with `order` normalized.
    pub fn blocks(&self) -> BlockList {
        BlockList::from_stored(self.content_blocks.clone())
    }
}

/// Read access to lessons.
#[async_trait]
pub trait LessonSource: Send + Sync {
    /// Fetches one lesson by id.
    async fn lesson(&self, id: &str) -> Result<Lesson>;

    /// Fetches all lessons of a theme.
    async fn lessons_by_theme(&self, theme_id: &str) -> Result<Vec<Lesson>>;
}

/// Lesson source backed by the REST backend.
#[derive(Debug, Clone)]
pub struct HttpLessonSource {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpLessonSource {
    /// Creates a client for the backend at `base_url`.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| LessonSourceError::Config(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(LessonSourceError::Config(format!(
                "{} cannot be a base URL",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LessonSourceError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Returns the backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LessonSourceError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, id: &str) -> Result<T> {
        debug!(url = %url, "Fetching from lesson backend");

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LessonSourceError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| LessonSourceError::Decode(e.to_string())),
            StatusCode::NOT_FOUND => Err(LessonSourceError::NotFound(id.to_string())),
            status => Err(LessonSourceError::Backend(status.as_u16())),
        }
    }
}

#[async_trait]
impl LessonSource for HttpLessonSource {
    async fn lesson(&self, id: &str) -> Result<Lesson> {
        let url = self.endpoint(&["lessons", id])?;
        self.get_json(url, id).await
    }

    async fn lessons_by_theme(&self, theme_id: &str) -> Result<Vec<Lesson>> {
        let url = self.endpoint(&["lessons", "theme", theme_id])?;
        self.get_json(url, theme_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use lectern_core::BlockKind;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use tokio_test::assert_ok;

    fn lesson_json(id: &str) -> Value {
        json!({
            "_id": id,
            "title": "Safety induction",
            "slug": "safety-induction",
            "description": "",
            "type": "READING",
            "status": "PUBLISHED",
            "themeId": "t1",
            "contentBlocks": [
                { "type": "IFRAME", "order": 3, "iframeSrc": "https://res.cloudinary.com/demo/raw/upload/a.html" },
                { "type": "TEXT", "order": 1, "content": "<p>Welcome</p>" }
            ],
            "resources": [],
            "createdAt": "2025-01-10T09:00:00.000Z",
            "updatedAt": "2025-01-11T09:00:00.000Z"
        })
    }

    async fn spawn_backend() -> SocketAddr {
        let router = Router::new()
            .route(
                "/api/lessons/{id}",
                get(|Path(id): Path<String>, headers: HeaderMap| async move {
                    if headers.get("authorization").and_then(|v| v.to_str().ok())
                        != Some("Bearer secret")
                    {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    match id.as_str() {
                        "missing" => Err(StatusCode::NOT_FOUND),
                        "broken" => Err(StatusCode::INTERNAL_SERVER_ERROR),
                        "garbage" => Ok(Json(json!({ "unexpected": true }))),
                        _ => Ok(Json(lesson_json(&id))),
                    }
                }),
            )
            .route(
                "/api/lessons/theme/{theme_id}",
                get(|Path(theme_id): Path<String>| async move {
                    Json(json!([lesson_json(&format!("{}-1", theme_id))]))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn source(addr: SocketAddr, token: Option<&str>) -> HttpLessonSource {
        HttpLessonSource::new(
            &format!("http://{}/api", addr),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_lesson_by_id() {
        let addr = spawn_backend().await;
        let lesson = assert_ok!(source(addr, Some("secret")).lesson("abc").await);

        assert_eq!(lesson.id, "abc");
        assert_eq!(lesson.status, Some(LessonStatus::Published));
        assert_eq!(lesson.theme_id.as_deref(), Some("t1"));
        assert!(lesson.created_at.is_some());

        let blocks = lesson.blocks();
        assert!(blocks.is_normalized());
        assert_eq!(blocks.get(0).map(|b| b.kind), Some(BlockKind::Text));
        assert_eq!(blocks.get(1).map(|b| b.kind), Some(BlockKind::Iframe));
    }

    #[tokio::test]
    async fn fetches_lessons_by_theme() {
        let addr = spawn_backend().await;
        let lessons = assert_ok!(source(addr, None).lessons_by_theme("t9").await);
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].id, "t9-1");
    }

    #[tokio::test]
    async fn maps_backend_failures() {
        let addr = spawn_backend().await;
        let with_token = source(addr, Some("secret"));

        assert_eq!(
            with_token.lesson("missing").await.unwrap_err(),
            LessonSourceError::NotFound("missing".to_string())
        );
        assert_eq!(
            with_token.lesson("broken").await.unwrap_err(),
            LessonSourceError::Backend(500)
        );
        assert!(matches!(
            with_token.lesson("garbage").await,
            Err(LessonSourceError::Decode(_))
        ));
        assert_eq!(
            source(addr, None).lesson("abc").await.unwrap_err(),
            LessonSourceError::Backend(401)
        );
    }

    #[test]
    fn endpoint_escapes_ids() {
        let source =
            HttpLessonSource::new("http://localhost:3556/api/", None, Duration::from_secs(1))
                .unwrap();
        let url = source.endpoint(&["lessons", "a/b?c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3556/api/lessons/a%2Fb%3Fc");
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            HttpLessonSource::new("not a url", None, Duration::from_secs(1)),
            Err(LessonSourceError::Config(_))
        ));
        assert!(matches!(
            HttpLessonSource::new("mailto:x@y", None, Duration::from_secs(1)),
            Err(LessonSourceError::Config(_))
        ));
    }
}
