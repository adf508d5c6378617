//! Lesson content blocks.
//!
//! A lesson's content is an ordered list of typed blocks. The list owns the
//! `order` invariant: after every mutation the blocks carry `order` values
//! exactly `0..n-1` in list sequence, with no gaps and no duplicates.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::settings::SettingsBag;
use crate::upload::HtmlUploadResult;

/// Block editing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    /// Index does not address an existing block.
    #[error("block index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Reorder input is not a permutation of the current indices.
    #[error("invalid block order: {0}")]
    InvalidPermutation(String),

    /// Operation requires a different block type.
    #[error("block {index} is {actual}, expected {expected}")]
    WrongKind {
        index: usize,
        expected: BlockKind,
        actual: BlockKind,
    },
}

/// Result type for block operations.
pub type Result<T> = std::result::Result<T, BlockError>;

/// Closed set of block types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockKind {
    Text,
    Video,
    Iframe,
    File,
    Quiz,
    Code,
    Image,
}

impl BlockKind {
    /// All block kinds, in editor menu order.
    pub const ALL: [BlockKind; 7] = [
        BlockKind::Text,
        BlockKind::Video,
        BlockKind::Iframe,
        BlockKind::File,
        BlockKind::Quiz,
        BlockKind::Code,
        BlockKind::Image,
    ];

    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "TEXT",
            BlockKind::Video => "VIDEO",
            BlockKind::Iframe => "IFRAME",
            BlockKind::File => "FILE",
            BlockKind::Quiz => "QUIZ",
            BlockKind::Code => "CODE",
            BlockKind::Image => "IMAGE",
        }
    }

    /// Parses a kind from its wire name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Returns true if blocks of this kind use the `content` field.
    pub fn uses_content(&self) -> bool {
        matches!(self, BlockKind::Text | BlockKind::Code)
    }

    /// Returns true if blocks of this kind use the `mediaUrl` field.
    pub fn uses_media_url(&self) -> bool {
        matches!(self, BlockKind::Video | BlockKind::Image | BlockKind::File)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed unit of lesson content, in its storage form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iframe_src: Option<String>,
    #[serde(default)]
    pub settings: SettingsBag,
}

impl ContentBlock {
    /// Creates an empty block of the given kind with editor defaults.
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            order: 0,
            content: kind.uses_content().then(String::new),
            media_url: None,
            iframe_src: (kind == BlockKind::Iframe).then(String::new),
            settings: SettingsBag::new(),
        }
    }

    /// Creates a TEXT block.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(BlockKind::Text).with_content(content)
    }

    /// Creates a CODE block.
    pub fn code(content: impl Into<String>) -> Self {
        Self::new(BlockKind::Code).with_content(content)
    }

    /// Creates an IFRAME block.
    pub fn iframe(src: impl Into<String>) -> Self {
        let mut block = Self::new(BlockKind::Iframe);
        block.iframe_src = Some(src.into());
        block
    }

    /// Creates a media block (VIDEO, IMAGE or FILE).
    pub fn media(kind: BlockKind, url: impl Into<String>) -> Self {
        let mut block = Self::new(kind);
        block.media_url = Some(url.into());
        block
    }

    /// Sets the content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets a settings key.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Sets the stored order.
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    /// Returns the field this block's kind requires, if present and non-empty.
    ///
    /// QUIZ blocks carry no inline payload and always yield `None`.
    pub fn required_field(&self) -> Option<&str> {
        let field = match self.kind {
            BlockKind::Text | BlockKind::Code => self.content.as_deref(),
            BlockKind::Video | BlockKind::Image | BlockKind::File => self.media_url.as_deref(),
            BlockKind::Iframe => self.iframe_src.as_deref(),
            BlockKind::Quiz => None,
        };
        field.filter(|s| !s.trim().is_empty())
    }
}

/// Ordered block list of one lesson.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ContentBlock>", into = "Vec<ContentBlock>")]
pub struct BlockList {
    blocks: Vec<ContentBlock>,
}

impl BlockList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from stored blocks whose `order` may be inconsistent.
    ///
    /// Blocks are stably sorted by their stored `order` and renumbered, so
    /// duplicates keep their storage sequence and gaps close up.
    pub fn from_stored(mut blocks: Vec<ContentBlock>) -> Self {
        blocks.sort_by_key(|b| b.order);
        let mut list = Self { blocks };
        list.renormalize();
        list
    }

    /// Returns the blocks in order.
    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// Consumes the list, returning the blocks.
    pub fn into_blocks(self) -> Vec<ContentBlock> {
        self.blocks
    }

    /// Returns the block at `index`.
    pub fn get(&self, index: usize) -> Option<&ContentBlock> {
        self.blocks.get(index)
    }

    /// Returns the number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if the list has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns true if `order` values are exactly `0..n-1` in sequence.
    pub fn is_normalized(&self) -> bool {
        self.blocks
            .iter()
            .enumerate()
            .all(|(i, b)| b.order as usize == i)
    }

    /// Appends a new empty block of `kind` and returns its index.
    pub fn append(&mut self, kind: BlockKind) -> usize {
        self.push(ContentBlock::new(kind))
    }

    /// Appends an existing block and returns its index.
    pub fn push(&mut self, mut block: ContentBlock) -> usize {
        let index = self.blocks.len();
        block.order = index as u32;
        self.blocks.push(block);
        index
    }

    /// Replaces the block at `index`, keeping its position.
    pub fn replace(&mut self, index: usize, block: ContentBlock) -> Result<()> {
        *self.get_mut(index)? = block;
        self.renormalize();
        Ok(())
    }

    /// Sets the `content` field of the block at `index`.
    pub fn set_content(&mut self, index: usize, content: impl Into<String>) -> Result<()> {
        self.get_mut(index)?.content = Some(content.into());
        Ok(())
    }

    /// Sets the `mediaUrl` field of the block at `index`.
    pub fn set_media_url(&mut self, index: usize, url: impl Into<String>) -> Result<()> {
        self.get_mut(index)?.media_url = Some(url.into());
        Ok(())
    }

    /// Sets the `iframeSrc` field of the block at `index`.
    pub fn set_iframe_src(&mut self, index: usize, src: impl Into<String>) -> Result<()> {
        self.get_mut(index)?.iframe_src = Some(src.into());
        Ok(())
    }

    /// Sets one settings key of the block at `index`. `Value::Null` removes it.
    pub fn set_setting(&mut self, index: usize, key: &str, value: Value) -> Result<()> {
        let settings = &mut self.get_mut(index)?.settings;
        if value.is_null() {
            settings.remove(key);
        } else {
            settings.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Points an IFRAME block at an uploaded HTML document.
    pub fn attach_upload(&mut self, index: usize, upload: &HtmlUploadResult) -> Result<()> {
        let block = self.get_iframe_mut(index)?;
        block.iframe_src = Some(upload.url.clone());
        Ok(())
    }

    /// Clears an IFRAME block's source after its document was deleted.
    pub fn detach_upload(&mut self, index: usize) -> Result<()> {
        let block = self.get_iframe_mut(index)?;
        block.iframe_src = Some(String::new());
        Ok(())
    }

    /// Removes and returns the block at `index`.
    pub fn remove(&mut self, index: usize) -> Result<ContentBlock> {
        self.check_index(index)?;
        let removed = self.blocks.remove(index);
        self.renormalize();
        Ok(removed)
    }

    /// Swaps the block at `index` with its predecessor. No-op for the first block.
    pub fn move_up(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index > 0 {
            self.blocks.swap(index - 1, index);
            self.renormalize();
        }
        Ok(())
    }

    /// Swaps the block at `index` with its successor. No-op for the last block.
    pub fn move_down(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index + 1 < self.blocks.len() {
            self.blocks.swap(index, index + 1);
            self.renormalize();
        }
        Ok(())
    }

    /// Rearranges blocks so that position `i` holds the block previously at
    /// `new_order[i]`.
    pub fn reorder(&mut self, new_order: &[usize]) -> Result<()> {
        let len = self.blocks.len();
        if new_order.len() != len {
            return Err(BlockError::InvalidPermutation(format!(
                "expected {} indices, got {}",
                len,
                new_order.len()
            )));
        }

        let mut seen = vec![false; len];
        for &i in new_order {
            match seen.get_mut(i) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(BlockError::InvalidPermutation(format!("duplicate index {}", i)))
                }
                None => return Err(BlockError::IndexOutOfRange { index: i, len }),
            }
        }

        let mut old: Vec<Option<ContentBlock>> = self.blocks.drain(..).map(Some).collect();
        self.blocks = new_order
            .iter()
            .filter_map(|&i| old.get_mut(i).and_then(Option::take))
            .collect();
        self.renormalize();
        Ok(())
    }

    /// Rewrites every block's `order` to its list position.
    pub fn renormalize(&mut self) {
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.order = i as u32;
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.blocks.len() {
            Ok(())
        } else {
            Err(BlockError::IndexOutOfRange {
                index,
                len: self.blocks.len(),
            })
        }
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut ContentBlock> {
        let len = self.blocks.len();
        self.blocks
            .get_mut(index)
            .ok_or(BlockError::IndexOutOfRange { index, len })
    }

    fn get_iframe_mut(&mut self, index: usize) -> Result<&mut ContentBlock> {
        let block = self.get_mut(index)?;
        if block.kind != BlockKind::Iframe {
            return Err(BlockError::WrongKind {
                index,
                expected: BlockKind::Iframe,
                actual: block.kind,
            });
        }
        Ok(block)
    }
}

impl From<Vec<ContentBlock>> for BlockList {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::from_stored(blocks)
    }
}

impl From<BlockList> for Vec<ContentBlock> {
    fn from(list: BlockList) -> Self {
        list.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn five_blocks() -> BlockList {
        let mut list = BlockList::new();
        for i in 0..5 {
            list.push(ContentBlock::text(format!("block {}", i)));
        }
        list
    }

    fn contents(list: &BlockList) -> Vec<String> {
        list.blocks()
            .iter()
            .map(|b| b.content.clone().unwrap_or_default())
            .collect()
    }

    fn orders(list: &BlockList) -> Vec<u32> {
        list.blocks().iter().map(|b| b.order).collect()
    }

    // ==================== BlockKind Tests ====================

    #[test]
    fn kind_round_trips_wire_names() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(BlockKind::parse("iframe"), Some(BlockKind::Iframe));
        assert_eq!(BlockKind::parse("widget"), None);
    }

    #[test]
    fn kind_serializes_uppercase() {
        assert_eq!(serde_json::to_value(BlockKind::Iframe).unwrap(), json!("IFRAME"));
    }

    // ==================== ContentBlock Tests ====================

    #[test]
    fn new_block_defaults_match_kind() {
        assert_eq!(ContentBlock::new(BlockKind::Text).content, Some(String::new()));
        assert_eq!(ContentBlock::new(BlockKind::Code).content, Some(String::new()));
        assert_eq!(ContentBlock::new(BlockKind::Iframe).iframe_src, Some(String::new()));
        assert_eq!(ContentBlock::new(BlockKind::Video).content, None);
        assert!(ContentBlock::new(BlockKind::Quiz).settings.is_empty());
    }

    #[test]
    fn required_field_treats_empty_as_absent() {
        assert_eq!(ContentBlock::iframe("").required_field(), None);
        assert_eq!(ContentBlock::text("  ").required_field(), None);
        assert_eq!(ContentBlock::text("<p>x</p>").required_field(), Some("<p>x</p>"));
        assert_eq!(ContentBlock::new(BlockKind::Quiz).required_field(), None);
    }

    #[test]
    fn block_deserializes_from_backend_json() {
        let block: ContentBlock = serde_json::from_value(json!({
            "type": "IFRAME",
            "order": 3,
            "iframeSrc": "https://res.cloudinary.com/x/raw/upload/y.html",
            "settings": { "height": "600px" }
        }))
        .unwrap();

        assert_eq!(block.kind, BlockKind::Iframe);
        assert_eq!(block.order, 3);
        assert_eq!(block.settings["height"], json!("600px"));
        assert!(block.content.is_none());
    }

    #[test]
    fn block_serializes_camel_case_and_skips_absent_fields() {
        let block = ContentBlock::media(BlockKind::Image, "https://cdn.example.com/a.png");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], json!("IMAGE"));
        assert_eq!(value["mediaUrl"], json!("https://cdn.example.com/a.png"));
        assert!(value.get("content").is_none());
        assert!(value.get("iframeSrc").is_none());
    }

    // ==================== Append / Edit Tests ====================

    #[test]
    fn append_assigns_next_order() {
        let mut list = BlockList::new();
        assert_eq!(list.append(BlockKind::Text), 0);
        assert_eq!(list.append(BlockKind::Video), 1);
        assert_eq!(list.append(BlockKind::Quiz), 2);
        assert_eq!(orders(&list), vec![0, 1, 2]);
    }

    #[test]
    fn push_overrides_incoming_order() {
        let mut list = BlockList::new();
        list.push(ContentBlock::text("a").with_order(9));
        assert_eq!(orders(&list), vec![0]);
    }

    #[test]
    fn field_and_setting_edits() {
        let mut list = BlockList::new();
        let i = list.append(BlockKind::Video);
        list.set_media_url(i, "https://vimeo.com/1").unwrap();
        list.set_setting(i, "autoPlay", json!(true)).unwrap();
        assert_eq!(list.get(i).unwrap().settings["autoPlay"], json!(true));

        list.set_setting(i, "autoPlay", Value::Null).unwrap();
        assert!(list.get(i).unwrap().settings.get("autoPlay").is_none());
    }

    #[test]
    fn replace_keeps_position_order() {
        let mut list = five_blocks();
        list.replace(2, ContentBlock::code("fn main() {}").with_order(40))
            .unwrap();
        assert_eq!(list.get(2).unwrap().kind, BlockKind::Code);
        assert_eq!(orders(&list), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn edits_out_of_range_fail() {
        let mut list = five_blocks();
        assert_eq!(
            list.set_content(5, "x"),
            Err(BlockError::IndexOutOfRange { index: 5, len: 5 })
        );
    }

    // ==================== Delete / Move Tests ====================

    #[test]
    fn delete_renormalizes_order() {
        let mut list = five_blocks();
        let removed = list.remove(2).unwrap();

        assert_eq!(removed.content.as_deref(), Some("block 2"));
        assert_eq!(list.len(), 4);
        assert_eq!(orders(&list), vec![0, 1, 2, 3]);
        assert_eq!(contents(&list), vec!["block 0", "block 1", "block 3", "block 4"]);
    }

    #[test]
    fn delete_last_remaining_block() {
        let mut list = BlockList::new();
        list.append(BlockKind::Quiz);
        list.remove(0).unwrap();
        assert!(list.is_empty());
        assert!(list.remove(0).is_err());
    }

    #[test]
    fn move_up_and_down_swap_neighbours() {
        let mut list = five_blocks();
        list.move_up(3).unwrap();
        assert_eq!(contents(&list)[2..4], ["block 3", "block 2"]);
        list.move_down(0).unwrap();
        assert_eq!(contents(&list)[0..2], ["block 1", "block 0"]);
        assert!(list.is_normalized());
    }

    #[test]
    fn move_at_edges_is_noop() {
        let mut list = five_blocks();
        list.move_up(0).unwrap();
        list.move_down(4).unwrap();
        assert_eq!(list, five_blocks());
    }

    // ==================== Reorder Tests ====================

    #[test]
    fn reorder_applies_permutation() {
        let mut list = five_blocks();
        list.reorder(&[4, 0, 1, 2, 3]).unwrap();
        assert_eq!(
            contents(&list),
            vec!["block 4", "block 0", "block 1", "block 2", "block 3"]
        );
        assert_eq!(orders(&list), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn reorder_rejects_non_permutations() {
        let mut list = five_blocks();
        assert!(matches!(
            list.reorder(&[0, 1, 2]),
            Err(BlockError::InvalidPermutation(_))
        ));
        assert!(matches!(
            list.reorder(&[0, 1, 1, 2, 3]),
            Err(BlockError::InvalidPermutation(_))
        ));
        assert!(matches!(
            list.reorder(&[0, 1, 2, 3, 7]),
            Err(BlockError::IndexOutOfRange { index: 7, len: 5 })
        ));
        // Failed reorders leave the list untouched
        assert_eq!(list, five_blocks());
    }

    // ==================== Stored Order Tests ====================

    #[test]
    fn from_stored_sorts_and_closes_gaps() {
        let list = BlockList::from_stored(vec![
            ContentBlock::text("c").with_order(7),
            ContentBlock::text("a").with_order(0),
            ContentBlock::text("b").with_order(3),
        ]);
        assert_eq!(contents(&list), vec!["a", "b", "c"]);
        assert_eq!(orders(&list), vec![0, 1, 2]);
    }

    #[test]
    fn from_stored_keeps_storage_sequence_for_duplicates() {
        let list = BlockList::from_stored(vec![
            ContentBlock::text("first").with_order(1),
            ContentBlock::text("second").with_order(1),
            ContentBlock::text("zero").with_order(0),
        ]);
        assert_eq!(contents(&list), vec!["zero", "first", "second"]);
        assert!(list.is_normalized());
    }

    #[test]
    fn list_deserializes_with_normalized_order() {
        let list: BlockList = serde_json::from_value(json!([
            { "type": "TEXT", "order": 7, "content": "late" },
            { "type": "TEXT", "order": 0, "content": "early" },
            { "type": "QUIZ", "order": 0 }
        ]))
        .unwrap();

        assert!(list.is_normalized());
        assert_eq!(orders(&list), vec![0, 1, 2]);
        assert_eq!(list.get(0).and_then(|b| b.content.as_deref()), Some("early"));
        assert_eq!(list.get(1).map(|b| b.kind), Some(BlockKind::Quiz));
        assert_eq!(list.get(2).and_then(|b| b.content.as_deref()), Some("late"));
    }

    #[test]
    fn list_serializes_as_plain_array() {
        let mut list = BlockList::new();
        list.append(BlockKind::Quiz);
        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value, json!([{ "type": "QUIZ", "order": 0, "settings": {} }]));
    }

    // ==================== Upload Tests ====================

    #[test]
    fn attach_and_detach_upload() {
        let mut list = BlockList::new();
        let i = list.append(BlockKind::Iframe);
        let upload = HtmlUploadResult {
            url: "https://res.cloudinary.com/demo/raw/upload/lesson.html".to_string(),
            public_id: "lesson".to_string(),
            bytes: 2048,
            original_name: "lesson.html".to_string(),
        };

        list.attach_upload(i, &upload).unwrap();
        assert_eq!(list.get(i).unwrap().iframe_src.as_deref(), Some(upload.url.as_str()));

        list.detach_upload(i).unwrap();
        assert_eq!(list.get(i).unwrap().required_field(), None);
    }

    #[test]
    fn attach_upload_requires_iframe_block() {
        let mut list = BlockList::new();
        let i = list.append(BlockKind::Text);
        let upload = HtmlUploadResult {
            url: "https://res.cloudinary.com/demo/raw/upload/lesson.html".to_string(),
            public_id: "lesson".to_string(),
            bytes: 1,
            original_name: "lesson.html".to_string(),
        };
        assert_eq!(
            list.attach_upload(i, &upload),
            Err(BlockError::WrongKind {
                index: 0,
                expected: BlockKind::Iframe,
                actual: BlockKind::Text,
            })
        );
    }
}
