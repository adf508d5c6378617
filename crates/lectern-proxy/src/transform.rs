//! Document transform.
//!
//! Makes a legacy document render correctly when re-served from the proxy:
//!
//! 1. a `<base>` tag pointing at the source document's directory, so
//!    relative resources keep resolving against the asset store
//! 2. a responsive viewport meta tag
//! 3. an error guard that swallows "is not defined" errors raised by calls
//!    into a host page the document no longer has
//!
//! Each step is skipped when its tag is already present, so the transform
//! is idempotent. Anchors are found with regexes and a missing `<head>` is
//! synthesized; the transform has no failure modes.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use lectern_core::render::escape_html;

/// Viewport meta tag.
pub const VIEWPORT_META: &str =
    r#"<meta name="viewport" content="width=device-width, initial-scale=1.0">"#;

/// Attribute marking the injected error guard.
pub const ERROR_GUARD_MARKER: &str = "data-legacy-guard";

/// Global error handler suppressing missing-function errors.
pub const ERROR_GUARD_SCRIPT: &str = r#"<script data-legacy-guard>
window.onerror = function (msg) {
  if (typeof msg === 'string' && msg.includes('is not defined')) {
    console.warn('[legacy]', msg);
    return true;
  }
  return false;
};
</script>"#;

// `<head>` or `<head ...>`, never `<header>`
static HEAD_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("valid regex"));

static HEAD_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</head\s*>").expect("valid regex"));

static BASE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<base[\s/>]").expect("valid regex"));

static VIEWPORT_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s[^>]*name\s*=\s*["']?viewport["'\s/>]"#).expect("valid regex")
});

/// Returns the directory of a document URL: origin plus path up to the last `/`.
///
/// ```
/// use lectern_proxy::transform::base_href;
/// use url::Url;
///
/// let url = Url::parse("https://host/a/b/c.html?x=1").unwrap();
/// assert_eq!(base_href(&url), "https://host/a/b/");
/// ```
pub fn base_href(url: &Url) -> String {
    let path = url.path();
    let dir = path.rfind('/').map(|i| &path[..=i]).unwrap_or("/");
    format!("{}{}", url.origin().ascii_serialization(), dir)
}

/// Transforms a raw document for embedding.
///
/// Empty input is returned unchanged.
pub fn transform(raw: &str, base_href: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut html = raw.to_string();

    if !BASE_TAG.is_match(&html) {
        let tag = format!(r#"<base href="{}">"#, escape_html(base_href));
        html = insert_after_head_open(&html, &tag);
    }

    if !VIEWPORT_TAG.is_match(&html) {
        html = insert_after_head_open(&html, VIEWPORT_META);
    }

    if !html.contains(ERROR_GUARD_MARKER) {
        html = insert_before_head_close(&html, ERROR_GUARD_SCRIPT);
    }

    html
}

fn insert_after_head_open(html: &str, tag: &str) -> String {
    match HEAD_OPEN.find(html) {
        Some(m) => format!("{}\n    {}{}", &html[..m.end()], tag, &html[m.end()..]),
        None => format!("<head>{}</head>\n{}", tag, html),
    }
}

fn insert_before_head_close(html: &str, tag: &str) -> String {
    match HEAD_CLOSE.find(html) {
        Some(m) => format!("{}{}\n{}", &html[..m.start()], tag, &html[m.start()..]),
        None => format!("{}\n{}", tag, html),
    }
}
