//! API route handlers.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::{
    CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_SECURITY_POLICY, CONTENT_TYPE,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::models::{LessonRenderResponse, ProxyQuery, RenderRequest, RenderResponse};
use crate::state::AppState;

/// Header reporting how a proxied document was obtained.
pub const PROXY_CACHE_HEADER: &str = "x-proxy-cache";

/// GET /api/iframe-proxy - Serve an allowlisted legacy document.
pub async fn iframe_proxy(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response> {
    let query = ProxyQuery::parse(raw.as_deref());
    let document = state
        .proxy
        .serve(query.url.as_deref(), query.bypass())
        .await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .header(CONTENT_DISPOSITION, "inline")
        .header(X_CONTENT_TYPE_OPTIONS, "nosniff")
        .header(X_FRAME_OPTIONS, "SAMEORIGIN")
        .header(CONTENT_SECURITY_POLICY, "frame-ancestors 'self'")
        .header(CACHE_CONTROL, "public, max-age=300, stale-while-revalidate=60")
        .header(PROXY_CACHE_HEADER, document.cache_status.as_str())
        .body(Body::from(document.html.to_string()))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// POST /api/render - Render a block list.
pub async fn render_blocks(
    State(state): State<AppState>,
    body: std::result::Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Json<RenderResponse>> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    debug!(blocks = req.blocks.len(), "Rendering blocks");

    Ok(Json(RenderResponse {
        blocks: state.renderer.render(&req.blocks),
        html: state.renderer.render_html(&req.blocks),
    }))
}

/// GET /api/lessons/{id}/render - Render a lesson stored in the backend.
pub async fn render_lesson(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LessonRenderResponse>> {
    let lesson = state.lessons.lesson(&id).await?;
    let blocks = lesson.blocks();

    debug!(lesson = %lesson.id, blocks = blocks.len(), "Rendering lesson");

    Ok(Json(LessonRenderResponse {
        blocks: state.renderer.render(blocks.blocks()),
        html: state.renderer.render_html(blocks.blocks()),
        lesson_id: lesson.id,
        title: lesson.title,
    }))
}
