//! API request and response models.

use lectern_core::{ContentBlock, RenderedBlock};
use serde::{Deserialize, Serialize};

/// Query parameters for GET /api/iframe-proxy.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProxyQuery {
    /// Absolute URL of the document to proxy.
    pub url: Option<String>,
    /// `1` skips the cache lookup.
    pub nocache: Option<String>,
}

impl ProxyQuery {
    /// Parses a raw query string. The first occurrence of a key wins and
    /// unknown keys are ignored.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "url" => &mut query.url,
                "nocache" => &mut query.nocache,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }

    /// Returns true if the caller asked to bypass the cache.
    pub fn bypass(&self) -> bool {
        self.nocache.as_deref() == Some("1")
    }
}

/// Request body for POST /api/render.
#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    /// Blocks in storage form.
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

/// Response body for POST /api/render.
#[derive(Debug, Serialize)]
pub struct RenderResponse {
    /// Rendered blocks in display order.
    pub blocks: Vec<RenderedBlock>,
    /// Combined HTML fragment.
    pub html: String,
}

/// Response body for GET /api/lessons/{id}/render.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRenderResponse {
    pub lesson_id: String,
    pub title: String,
    pub blocks: Vec<RenderedBlock>,
    pub html: String,
}
