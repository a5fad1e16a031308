//! Access to the prose layout of a document.
//!
//! The chain finder only needs one question answered: is there a paragraph
//! in a vertical band of a page? Callers with a live layout engine implement
//! [`LayoutIndex`] themselves; callers holding block coordinates can use
//! [`TextBlockIndex`].

use serde::{Deserialize, Serialize};

/// Source of paragraph positions.
pub trait LayoutIndex: Sync {
    /// Whether any text block on `page` lies within `(y_start, y_end)`.
    fn has_text_block_between(&self, page: u32, y_start: f64, y_end: f64) -> bool;
}

/// Vertical extent of a paragraph on a page.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub page: u32,
    pub top: f64,
    pub bottom: f64,
}

/// [`LayoutIndex`] over a flat list of text blocks.
#[derive(Clone, Debug, Default)]
pub struct TextBlockIndex {
    blocks: Vec<TextBlock>,
}

impl TextBlockIndex {
    pub fn new(mut blocks: Vec<TextBlock>) -> Self {
        blocks.sort_by(|a, b| a.page.cmp(&b.page).then(a.top.total_cmp(&b.top)));
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn page_blocks(&self, page: u32) -> &[TextBlock] {
        let start = self.blocks.partition_point(|b| b.page < page);
        let end = self.blocks.partition_point(|b| b.page <= page);
        &self.blocks[start..end]
    }
}

impl LayoutIndex for TextBlockIndex {
    fn has_text_block_between(&self, page: u32, y_start: f64, y_end: f64) -> bool {
        if y_end <= y_start {
            return false;
        }
        self.page_blocks(page)
            .iter()
            .any(|b| b.bottom > y_start && b.top < y_end)
    }
}
