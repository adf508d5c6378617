//! Block rendering.
//!
//! Maps each content block to a concrete embed, walking the list strictly by
//! ascending `order`. Blocks missing the field their type requires render
//! nothing, and so do link-bearing blocks whose URL is not `http`/`https`. IFRAME blocks whose source passes the [`Allowlist`] are routed
//! through the iframe proxy so legacy documents are re-served from our own
//! origin.
//!
//! ## Flow
//!
//! ```text
//! [ContentBlock] → sort by order → per block:
//!     required field present? ── no ──→ skipped
//!            │ yes
//!            ▼
//!     narrow settings → Embed (TEXT, CODE, IMAGE, FILE, VIDEO, IFRAME, QUIZ)
//!                                                       │
//!                                    allowlisted src? → proxy URL
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::allowlist::Allowlist;
use crate::blocks::{BlockKind, ContentBlock};
use crate::settings::{FrameSettings, TypedSettings, DEFAULT_FRAME_HEIGHT};
use crate::upload::file_name_from_url;
use crate::video::embed_url;

/// Default path of the iframe proxy endpoint.
pub const DEFAULT_PROXY_ENDPOINT: &str = "/api/iframe-proxy";

/// Sandbox granted to proxied legacy documents.
///
/// Legacy documents need scripts, same-origin storage, forms, popups, modal
/// dialogs and downloads to work at all. Because proxied documents are served
/// from our own origin, this grant is only as safe as the allowlist that
/// admits them.
pub const FRAME_SANDBOX: &str = "allow-scripts allow-same-origin allow-forms allow-popups \
allow-popups-to-escape-sandbox allow-modals allow-downloads allow-top-navigation-by-user-activation";

/// Sandbox granted to frames outside the allowlist.
pub const RESTRICTED_FRAME_SANDBOX: &str = "allow-scripts allow-forms allow-popups";

/// Feature policy for embedded video players.
pub const PLAYER_ALLOW: &str =
    "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture";

/// Notice shown in place of quiz blocks.
pub const QUIZ_NOTICE: &str = "Interactive quiz - it will appear here once configured";

/// Notice shown for a lesson without blocks.
pub const EMPTY_LESSON_NOTICE: &str = "This lesson has no content yet";

/// A renderable embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Embed {
    /// Trusted rich markup, emitted as-is.
    Text { html: String },
    /// Verbatim code in a fixed-width block.
    Code {
        code: String,
        language: Option<String>,
    },
    Image {
        src: String,
        caption: Option<String>,
    },
    /// Download affordance.
    File {
        href: String,
        file_name: String,
        file_size: String,
    },
    /// Embeddable player of a known video host.
    VideoPlayer {
        src: String,
        allow_full_screen: bool,
    },
    /// Direct media element.
    VideoFile { src: String, auto_play: bool },
    Frame {
        src: String,
        proxied: bool,
        height: String,
        allow_full_screen: bool,
        sandbox: String,
    },
    QuizPlaceholder { notice: String },
}

/// A rendered block with its source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedBlock {
    pub order: u32,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub embed: Embed,
}

/// Maps content blocks to embeds.
#[derive(Debug, Clone)]
pub struct BlockRenderer {
    allowlist: Arc<Allowlist>,
    proxy_endpoint: String,
}

impl Default for BlockRenderer {
    fn default() -> Self {
        Self::new(Arc::new(Allowlist::default()))
    }
}

impl BlockRenderer {
    /// Creates a renderer routing allowlisted frames to the default proxy endpoint.
    pub fn new(allowlist: Arc<Allowlist>) -> Self {
        Self {
            allowlist,
            proxy_endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
        }
    }

    /// Sets the proxy endpoint path or URL.
    pub fn with_proxy_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.proxy_endpoint = endpoint.into();
        self
    }

    /// Returns the allowlist used for frame routing.
    pub fn allowlist(&self) -> &Allowlist {
        &self.allowlist
    }

    /// Renders blocks in ascending `order`, skipping incomplete ones.
    ///
    /// Sorting is stable, so blocks sharing an `order` keep list sequence.
    pub fn render(&self, blocks: &[ContentBlock]) -> Vec<RenderedBlock> {
        let mut sorted: Vec<&ContentBlock> = blocks.iter().collect();
        sorted.sort_by_key(|b| b.order);

        sorted
            .into_iter()
            .filter_map(|block| {
                let embed = self.render_block(block)?;
                Some(RenderedBlock {
                    order: block.order,
                    kind: block.kind,
                    embed,
                })
            })
            .collect()
    }

    /// Renders blocks to a single HTML fragment.
    pub fn render_html(&self, blocks: &[ContentBlock]) -> String {
        if blocks.is_empty() {
            return format!("<p class=\"lesson-empty\">{}</p>", EMPTY_LESSON_NOTICE);
        }

        self.render(blocks)
            .iter()
            .map(|rendered| {
                format!(
                    "<div class=\"content-block\" data-type=\"{}\">{}</div>",
                    rendered.kind,
                    rendered.embed.to_html()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Renders one block, or `None` if its required field is absent.
    pub fn render_block(&self, block: &ContentBlock) -> Option<Embed> {
        if block.kind == BlockKind::Quiz {
            return Some(Embed::QuizPlaceholder {
                notice: QUIZ_NOTICE.to_string(),
            });
        }

        let Some(field) = block.required_field() else {
            debug!(kind = %block.kind, order = block.order, "Skipping block without payload");
            return None;
        };
        let field = field.trim();

        let links_out = block.kind.uses_media_url() || block.kind == BlockKind::Iframe;
        if links_out && !is_web_url(field) {
            debug!(kind = %block.kind, order = block.order, "Skipping block with non-web URL");
            return None;
        }

        let embed = match TypedSettings::narrow_or_default(block.kind, &block.settings) {
            TypedSettings::Text => Embed::Text {
                html: field.to_string(),
            },
            TypedSettings::Code(settings) => Embed::Code {
                code: block.content.clone().unwrap_or_default(),
                language: settings.language.filter(|l| !l.trim().is_empty()),
            },
            TypedSettings::Image(settings) => Embed::Image {
                src: field.to_string(),
                caption: settings.caption.filter(|c| !c.trim().is_empty()),
            },
            TypedSettings::File(settings) => Embed::File {
                href: field.to_string(),
                file_name: settings
                    .file_name
                    .filter(|n| !n.trim().is_empty())
                    .or_else(|| file_name_from_url(field))
                    .unwrap_or_else(|| "Downloadable file".to_string()),
                file_size: settings
                    .file_size
                    .map(|s| s.label())
                    .unwrap_or_else(|| "Download".to_string()),
            },
            TypedSettings::Video(settings) => match embed_url(field) {
                Some(src) => Embed::VideoPlayer {
                    src,
                    allow_full_screen: settings.allow_full_screen,
                },
                None => Embed::VideoFile {
                    src: field.to_string(),
                    auto_play: settings.auto_play,
                },
            },
            TypedSettings::Frame(settings) => self.frame(field, settings),
            TypedSettings::Quiz => Embed::QuizPlaceholder {
                notice: QUIZ_NOTICE.to_string(),
            },
        };

        Some(embed)
    }

    /// Returns the effective frame source for an IFRAME block source.
    pub fn resolve_frame_src(&self, src: &str) -> (String, bool) {
        if self.allowlist.is_proxyable(src) {
            (proxy_url(&self.proxy_endpoint, src), true)
        } else {
            (src.to_string(), false)
        }
    }

    fn frame(&self, src: &str, settings: FrameSettings) -> Embed {
        let (src, proxied) = self.resolve_frame_src(src);
        let height = css_length(&settings.height)
            .unwrap_or(DEFAULT_FRAME_HEIGHT)
            .to_string();

        let sandbox = if proxied {
            FRAME_SANDBOX
        } else {
            RESTRICTED_FRAME_SANDBOX
        };

        Embed::Frame {
            src,
            proxied,
            height,
            allow_full_screen: settings.allow_full_screen,
            sandbox: sandbox.to_string(),
        }
    }
}

impl Embed {
    /// Renders the embed as an HTML fragment.
    pub fn to_html(&self) -> String {
        match self {
            Embed::Text { html } => format!("<div class=\"prose\">{}</div>", html),
            Embed::Code { code, language } => {
                let label = language
                    .as_deref()
                    .map(|l| format!("<span class=\"code-language\">{}</span>", escape_html(l)))
                    .unwrap_or_default();
                format!("{}<pre><code>{}</code></pre>", label, escape_html(code))
            }
            Embed::Image { src, caption } => {
                let alt = caption.as_deref().unwrap_or("Lesson image");
                let figcaption = caption
                    .as_deref()
                    .map(|c| format!("<figcaption>{}</figcaption>", escape_html(c)))
                    .unwrap_or_default();
                format!(
                    "<figure><img src=\"{}\" alt=\"{}\">{}</figure>",
                    escape_html(src),
                    escape_html(alt),
                    figcaption
                )
            }
            Embed::File {
                href,
                file_name,
                file_size,
            } => format!(
                "<a class=\"file-download\" href=\"{}\" download target=\"_blank\" rel=\"noopener noreferrer\">\
                 <span class=\"file-name\">{}</span><span class=\"file-size\">{}</span></a>",
                escape_html(href),
                escape_html(file_name),
                escape_html(file_size)
            ),
            Embed::VideoPlayer {
                src,
                allow_full_screen,
            } => format!(
                "<iframe class=\"video-player\" src=\"{}\" allow=\"{}\"{}></iframe>",
                escape_html(src),
                PLAYER_ALLOW,
                if *allow_full_screen { " allowfullscreen" } else { "" }
            ),
            Embed::VideoFile { src, auto_play } => format!(
                "<video src=\"{}\" controls{}></video>",
                escape_html(src),
                if *auto_play { " autoplay" } else { "" }
            ),
            Embed::Frame {
                src,
                height,
                allow_full_screen,
                sandbox,
                ..
            } => {
                let src = escape_html(src);
                format!(
                    "<iframe src=\"{src}\" style=\"min-height:{height};height:{height}\" sandbox=\"{}\"{}></iframe>\
                     <a class=\"frame-open\" href=\"{src}\" target=\"_blank\" rel=\"noopener noreferrer\">Open in new tab</a>",
                    escape_html(sandbox),
                    if *allow_full_screen { " allowfullscreen" } else { "" },
                    height = escape_html(height),
                )
            }
            Embed::QuizPlaceholder { notice } => {
                format!("<div class=\"quiz-placeholder\">{}</div>", escape_html(notice))
            }
        }
    }
}

/// Builds the proxy URL for a document source.
pub fn proxy_url(endpoint: &str, src: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(src.trim().as_bytes()).collect();
    format!("{}?url={}", endpoint, encoded)
}

/// Returns true if `src` is an absolute `http` or `https` URL.
fn is_web_url(src: &str) -> bool {
    Url::parse(src)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Escapes text for HTML element content and quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Accepts a plain CSS length such as `800px`, `75vh` or `100%`.
fn css_length(value: &str) -> Option<&str> {
    const UNITS: &[&str] = &["px", "vh", "%", "rem", "em"];
    let value = value.trim();
    let unit = UNITS.iter().find(|u| value.ends_with(*u))?;
    let number = &value[..value.len() - unit.len()];
    let valid = !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit() || c == '.')
        && number.chars().filter(|c| *c == '.').count() <= 1;
    valid.then_some(value)
}
