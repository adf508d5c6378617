//! HTML upload contract.
//!
//! The asset store accepts an HTML document and returns a publicly fetchable
//! URL, which becomes an IFRAME block's source. Only the parts of that
//! exchange the block model depends on live here.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Largest HTML document the asset store accepts (10 MiB).
pub const MAX_HTML_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Extensions accepted for HTML uploads.
pub const HTML_EXTENSIONS: &[&str] = &[".html", ".htm"];

/// Upload validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// File is larger than [`MAX_HTML_UPLOAD_BYTES`].
    #[error("file exceeds 10MB ({0} bytes)")]
    TooLarge(u64),

    /// File does not have an HTML extension.
    #[error("only .html or .htm files are allowed: {0}")]
    NotHtml(String),
}

/// Result type for upload validation.
pub type Result<T> = std::result::Result<T, UploadError>;

/// Asset store response for an uploaded HTML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlUploadResult {
    /// Public URL of the uploaded document.
    pub url: String,
    /// Asset store identifier.
    pub public_id: String,
    /// Stored size in bytes.
    pub bytes: u64,
    /// File name as uploaded.
    pub original_name: String,
}

/// Checks a file before it is sent to the asset store.
pub fn validate_html_upload(file_name: &str, size: u64) -> Result<()> {
    if size > MAX_HTML_UPLOAD_BYTES {
        return Err(UploadError::TooLarge(size));
    }
    let lower = file_name.to_ascii_lowercase();
    if !HTML_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Err(UploadError::NotHtml(file_name.to_string()));
    }
    Ok(())
}

/// Returns the last path segment of a URL, if any.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .next_back()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Formats a byte count as `B`, `KB` or `MB` with at most one decimal.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["B", "KB", "MB"];
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.1}", value);
    let trimmed = formatted.strip_suffix(".0").unwrap_or(&formatted);
    format!("{} {}", trimmed, UNITS[unit])
}
