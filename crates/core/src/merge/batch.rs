//! JSON document batch: everything the upstream extractor hands over for
//! one document.

use std::io::Read;

use serde::{Deserialize, Serialize};

use super::layout_index::{LayoutIndex, TextBlock, TextBlockIndex};
use super::pipeline::{MergeOutcome, merge_all_tables};
use super::settings::MergeSettings;
use super::types::{PageDrawings, PageInfo, TableFragment};
use crate::error::Result;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentBatch {
    #[serde(default)]
    pub pages: Vec<PageInfo>,
    #[serde(default)]
    pub fragments: Vec<TableFragment>,
    #[serde(default)]
    pub drawings: PageDrawings,
    /// Paragraph positions; when absent the paragraph check is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_blocks: Option<Vec<TextBlock>>,
}

impl DocumentBatch {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Run the merge pass over this batch.
    pub fn merge(&self, settings: &MergeSettings) -> Result<MergeOutcome> {
        let index = self.text_blocks.clone().map(TextBlockIndex::new);
        merge_all_tables(
            &self.fragments,
            &self.pages,
            &self.drawings,
            index.as_ref().map(|i| i as &dyn LayoutIndex),
            settings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_batch() {
        let json = r#"{
            "pages": [{"page": 1, "width": 612.0, "height": 792.0}],
            "fragments": [{
                "id": "t1",
                "page": 1,
                "bbox": [50.0, 100.0, 550.0, 300.0],
                "columns": [{"index": 0, "path": ["Name"]}],
                "rows": [[{"text": "Name"}], [{"text": "Bolt", "bbox": [50.0, 120.0, 550.0, 140.0]}]],
                "header_info": {"col_levels": 1, "row_levels": 0, "header_detected": true}
            }],
            "drawings": {"1": [
                {"type": "line", "x0": 50.0, "y0": 100.0, "x1": 550.0, "y1": 100.0, "width": 0.5},
                {"type": "rect", "bbox": [50.0, 100.0, 550.0, 300.0]}
            ]}
        }"#;
        let batch = DocumentBatch::from_json(json).unwrap();
        assert_eq!(batch.fragments[0].rows.len(), 2);
        assert_eq!(batch.drawings[&1].len(), 2);
        assert!(batch.text_blocks.is_none());

        let outcome = batch.merge(&MergeSettings::default()).unwrap();
        assert_eq!(outcome.tables.len(), 1);
        assert!(!outcome.tables[0].is_merged());
    }
}
