//! Video host detection.
//!
//! Watch-page URLs from known video hosts cannot be played by a `<video>`
//! element; they are rewritten to the host's embeddable player URL instead.

use url::Url;

/// Known video hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoHost {
    YouTube,
    Vimeo,
}

impl VideoHost {
    /// Detects the video host of a URL.
    pub fn detect(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        match host {
            "youtube.com" | "m.youtube.com" | "youtube-nocookie.com" | "youtu.be" => {
                Some(VideoHost::YouTube)
            }
            "vimeo.com" | "player.vimeo.com" => Some(VideoHost::Vimeo),
            _ => None,
        }
    }

    /// Returns the host's display name.
    pub fn name(&self) -> &'static str {
        match self {
            VideoHost::YouTube => "YouTube",
            VideoHost::Vimeo => "Vimeo",
        }
    }
}

/// Rewrites a known video-host URL to its embeddable player form.
///
/// Returns `None` when the URL is not from a known host or the video id
/// cannot be found, in which case the caller renders a direct media element.
///
/// ```
/// use lectern_core::video::embed_url;
///
/// assert_eq!(
///     embed_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
///     Some("https://www.youtube.com/embed/dQw4w9WgXcQ")
/// );
/// assert_eq!(
///     embed_url("https://vimeo.com/76979871").as_deref(),
///     Some("https://player.vimeo.com/video/76979871")
/// );
/// assert_eq!(embed_url("https://cdn.example.com/intro.mp4"), None);
/// ```
pub fn embed_url(media_url: &str) -> Option<String> {
    let url = Url::parse(media_url.trim()).ok()?;
    match VideoHost::detect(&url)? {
        VideoHost::YouTube => {
            youtube_id(&url).map(|id| format!("https://www.youtube.com/embed/{}", id))
        }
        VideoHost::Vimeo => vimeo_id(&url).map(|id| format!("https://player.vimeo.com/video/{}", id)),
    }
}

fn youtube_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let first = segments.next();

    let id = if url.host_str()?.eq_ignore_ascii_case("youtu.be") {
        first.map(str::to_string)
    } else {
        match first {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("embed") | Some("shorts") | Some("live") => segments.next().map(str::to_string),
            _ => None,
        }
    };

    id.filter(|id| is_video_id(id))
}

fn vimeo_id(url: &Url) -> Option<String> {
    // vimeo.com/{id} or player.vimeo.com/video/{id}; channel paths end in the id
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .find(|s| s.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

fn is_video_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
