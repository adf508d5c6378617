//! Lectern Core - Content blocks, proxy allowlist, and block rendering.
//!
//! This crate holds the domain model shared by the iframe proxy and the
//! lesson API: the ordered block list an editor manipulates, the allowlist
//! deciding which external documents may be proxied, and the renderer that
//! turns blocks into embeds.

pub mod allowlist;
pub mod blocks;
pub mod render;
pub mod settings;
pub mod upload;
pub mod video;

pub use allowlist::{Allowlist, AllowlistError, DEFAULT_ALLOWED_HOST, DEFAULT_PATH_MARKER};
pub use blocks::{BlockError, BlockKind, BlockList, ContentBlock};
pub use render::{BlockRenderer, Embed, RenderedBlock, DEFAULT_PROXY_ENDPOINT, FRAME_SANDBOX};
pub use settings::{SettingsBag, SettingsError, TypedSettings};
pub use upload::{HtmlUploadResult, UploadError};
