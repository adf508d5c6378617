//! Per-type block settings.
//!
//! Blocks store their settings as an open JSON object. Before rendering, the
//! object is narrowed into the record owned by the block's type, so a typo in
//! a key never silently changes behavior: wrong-typed values are errors and
//! unrecognized keys are reported.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::blocks::BlockKind;
use crate::upload::format_bytes;

/// Storage form of block settings.
pub type SettingsBag = Map<String, Value>;

/// Default IFRAME height.
pub const DEFAULT_FRAME_HEIGHT: &str = "800px";

/// Settings narrowing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// A recognized key holds a value of the wrong type.
    #[error("invalid {kind} settings: {message}")]
    InvalidValue { kind: BlockKind, message: String },
}

/// Result type for settings narrowing.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// CODE settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSettings {
    /// Display label only; no highlighting is applied.
    pub language: Option<String>,
}

/// IMAGE settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSettings {
    pub caption: Option<String>,
}

/// FILE settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSettings {
    pub file_name: Option<String>,
    pub file_size: Option<FileSize>,
}

/// File size, stored either as a display label or a byte count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileSize {
    Bytes(u64),
    Label(String),
}

impl FileSize {
    /// Returns the human-readable label.
    pub fn label(&self) -> String {
        match self {
            FileSize::Bytes(n) => format_bytes(*n),
            FileSize::Label(s) => s.clone(),
        }
    }
}

/// VIDEO settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSettings {
    pub auto_play: bool,
    pub allow_full_screen: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            auto_play: false,
            allow_full_screen: true,
        }
    }
}

/// IFRAME settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameSettings {
    /// CSS height of the frame.
    pub height: String,
    pub allow_full_screen: bool,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            height: DEFAULT_FRAME_HEIGHT.to_string(),
            allow_full_screen: true,
        }
    }
}

/// Settings narrowed to a block type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedSettings {
    Text,
    Code(CodeSettings),
    Image(ImageSettings),
    File(FileSettings),
    Video(VideoSettings),
    Frame(FrameSettings),
    Quiz,
}

impl TypedSettings {
    /// Returns the default settings for a block kind.
    pub fn defaults(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Text => TypedSettings::Text,
            BlockKind::Code => TypedSettings::Code(CodeSettings::default()),
            BlockKind::Image => TypedSettings::Image(ImageSettings::default()),
            BlockKind::File => TypedSettings::File(FileSettings::default()),
            BlockKind::Video => TypedSettings::Video(VideoSettings::default()),
            BlockKind::Iframe => TypedSettings::Frame(FrameSettings::default()),
            BlockKind::Quiz => TypedSettings::Quiz,
        }
    }

    /// Narrows a settings bag into the record for `kind`.
    ///
    /// Unrecognized keys are logged and ignored.
    pub fn narrow(kind: BlockKind, bag: &SettingsBag) -> Result<Self> {
        let unknown = unknown_keys(kind, bag);
        if !unknown.is_empty() {
            warn!(kind = %kind, keys = ?unknown, "Ignoring unrecognized block settings");
        }

        Ok(match kind {
            BlockKind::Text => TypedSettings::Text,
            BlockKind::Quiz => TypedSettings::Quiz,
            BlockKind::Code => TypedSettings::Code(parse(kind, bag)?),
            BlockKind::Image => TypedSettings::Image(parse(kind, bag)?),
            BlockKind::File => TypedSettings::File(parse(kind, bag)?),
            BlockKind::Video => TypedSettings::Video(parse(kind, bag)?),
            BlockKind::Iframe => TypedSettings::Frame(parse(kind, bag)?),
        })
    }

    /// Narrows a settings bag, falling back to defaults on invalid values.
    pub fn narrow_or_default(kind: BlockKind, bag: &SettingsBag) -> Self {
        Self::narrow(kind, bag).unwrap_or_else(|e| {
            warn!(error = %e, "Using default block settings");
            Self::defaults(kind)
        })
    }
}

/// Keys each block kind recognizes.
pub fn recognized_keys(kind: BlockKind) -> &'static [&'static str] {
    match kind {
        BlockKind::Text | BlockKind::Quiz => &[],
        BlockKind::Code => &["language"],
        BlockKind::Image => &["caption"],
        BlockKind::File => &["fileName", "fileSize"],
        BlockKind::Video => &["autoPlay", "allowFullScreen"],
        BlockKind::Iframe => &["height", "allowFullScreen"],
    }
}

/// Returns the keys in `bag` that `kind` does not recognize.
pub fn unknown_keys(kind: BlockKind, bag: &SettingsBag) -> Vec<String> {
    let known = recognized_keys(kind);
    bag.keys()
        .filter(|k| !known.contains(&k.as_str()))
        .cloned()
        .collect()
}

fn parse<T: DeserializeOwned>(kind: BlockKind, bag: &SettingsBag) -> Result<T> {
    // Null means "unset" in the editor, so drop it before typing
    let known = recognized_keys(kind);
    let filtered: SettingsBag = bag
        .iter()
        .filter(|(k, v)| known.contains(&k.as_str()) && !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    serde_json::from_value(Value::Object(filtered)).map_err(|e| SettingsError::InvalidValue {
        kind,
        message: e.to_string(),
    })
}
