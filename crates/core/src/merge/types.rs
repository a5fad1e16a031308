//! Data model for table fragments, drawing primitives and merge output.
//!
//! Coordinates use a top-left origin: `y0` is the top edge of a box and `y1`
//! its bottom edge, matching what table extractors emit after flipping the
//! PDF user space.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MergeError, Result};
use crate::utils::{Point, normalize_text};

/// Axis-aligned box `(x0, y0, x1, y1)` in page space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Coordinate-wise envelope of two boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// A column descriptor. `path` lists header labels from the outermost header
/// level to the innermost one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub index: usize,
    #[serde(default)]
    pub path: Vec<String>,
    /// Left boundary, when the extractor reports explicit column geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x0: Option<f64>,
    /// Right boundary, when the extractor reports explicit column geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x1: Option<f64>,
}

impl Column {
    pub fn new(index: usize, path: Vec<String>) -> Self {
        Self {
            index,
            path,
            x0: None,
            x1: None,
        }
    }

    pub fn with_bounds(mut self, x0: f64, x1: f64) -> Self {
        self.x0 = Some(x0);
        self.x1 = Some(x1);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
}

impl Cell {
    pub fn new(text: impl Into<String>, bbox: Option<BBox>) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// One table row; cells are aligned with the fragment's columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Whitespace-normalized cell texts.
    pub fn texts(&self) -> Vec<String> {
        self.cells.iter().map(|c| normalize_text(&c.text)).collect()
    }

    /// Bottom edge of the row, taken from the tallest cell that has a bbox.
    pub fn bottom(&self) -> Option<f64> {
        self.cells
            .iter()
            .filter_map(|c| c.bbox.map(|b| b.y1))
            .reduce(f64::max)
    }

    /// Top edge of the row, taken from the highest cell that has a bbox.
    pub fn top(&self) -> Option<f64> {
        self.cells
            .iter()
            .filter_map(|c| c.bbox.map(|b| b.y0))
            .reduce(f64::min)
    }
}

/// How many leading rows are column headers (`col_levels`) and how many
/// leading columns are row headers (`row_levels`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderInfo {
    #[serde(default)]
    pub col_levels: usize,
    #[serde(default)]
    pub row_levels: usize,
    #[serde(default)]
    pub header_detected: bool,
}

/// One table detected on one page by the upstream extractor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableFragment {
    pub id: String,
    /// 1-based page number.
    pub page: u32,
    pub bbox: BBox,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub header_info: HeaderInfo,
    /// Extraction method reported by the front-end (e.g. "lines").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl TableFragment {
    /// Check the structural invariants the merge engine relies on.
    pub fn validate(&self) -> Result<()> {
        let malformed = |reason: String| MergeError::MalformedFragment {
            id: self.id.clone(),
            reason,
        };
        if !self.bbox.is_finite() {
            return Err(malformed("bbox has non-finite coordinates".into()));
        }
        if self.bbox.width() <= 0.0 || self.bbox.height() <= 0.0 {
            return Err(malformed(format!(
                "bbox has non-positive size {:.2}x{:.2}",
                self.bbox.width(),
                self.bbox.height()
            )));
        }
        if self.page == 0 {
            return Err(malformed("page numbers are 1-based".into()));
        }
        if !self.columns.is_empty() {
            let ncols = self.columns.len();
            if let Some((i, row)) = self
                .rows
                .iter()
                .enumerate()
                .find(|(_, r)| r.cells.len() != ncols)
            {
                return Err(malformed(format!(
                    "row {i} has {} cells, expected {ncols}",
                    row.cells.len()
                )));
            }
        }
        Ok(())
    }

    /// Number of columns, falling back to the widest row when no column
    /// descriptors were supplied.
    pub fn column_count(&self) -> usize {
        if !self.columns.is_empty() {
            return self.columns.len();
        }
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }

    /// Leading rows that form the column header.
    pub fn header_rows(&self) -> &[Row] {
        let n = self.header_info.col_levels.min(self.rows.len());
        &self.rows[..n]
    }

    /// Rows below the column header.
    pub fn data_rows(&self) -> &[Row] {
        let n = self.header_info.col_levels.min(self.rows.len());
        &self.rows[n..]
    }

    pub fn first_data_row(&self) -> Option<&Row> {
        self.rows.get(self.header_info.col_levels)
    }

    pub fn col_paths(&self) -> Vec<Vec<String>> {
        self.columns.iter().map(|c| c.path.clone()).collect()
    }
}

/// A straight stroke taken from the page's vector drawing layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    #[serde(default = "default_stroke_width")]
    pub width: f64,
}

fn default_stroke_width() -> f64 {
    1.0
}

impl LineSegment {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64, width: f64) -> Self {
        Self {
            x0,
            y0,
            x1,
            y1,
            width,
        }
    }

    pub fn x_min(&self) -> f64 {
        self.x0.min(self.x1)
    }

    pub fn x_max(&self) -> f64 {
        self.x0.max(self.x1)
    }

    pub fn y_min(&self) -> f64 {
        self.y0.min(self.y1)
    }

    pub fn y_max(&self) -> f64 {
        self.y0.max(self.y1)
    }

    pub fn y_mid(&self) -> f64 {
        (self.y0 + self.y1) / 2.0
    }

    pub fn x_mid(&self) -> f64 {
        (self.x0 + self.x1) / 2.0
    }

    pub fn is_horizontal(&self, tolerance: f64) -> bool {
        (self.y1 - self.y0).abs() < tolerance
    }

    pub fn is_vertical(&self, tolerance: f64) -> bool {
        (self.x1 - self.x0).abs() < tolerance
    }
}

/// Vector primitive drawn on a page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawingPrimitive {
    Line(LineSegment),
    Rect {
        bbox: BBox,
        #[serde(default = "default_stroke_width")]
        width: f64,
    },
    Curve {
        points: Vec<Point>,
        #[serde(default = "default_stroke_width")]
        width: f64,
    },
}

impl DrawingPrimitive {
    /// Straight segments making up the primitive. Rectangles contribute
    /// their four sides, curves one segment per consecutive point pair.
    pub fn segments(&self) -> Vec<LineSegment> {
        match self {
            DrawingPrimitive::Line(l) => vec![*l],
            DrawingPrimitive::Rect { bbox, width } => vec![
                LineSegment::new(bbox.x0, bbox.y0, bbox.x1, bbox.y0, *width),
                LineSegment::new(bbox.x0, bbox.y1, bbox.x1, bbox.y1, *width),
                LineSegment::new(bbox.x0, bbox.y0, bbox.x0, bbox.y1, *width),
                LineSegment::new(bbox.x1, bbox.y0, bbox.x1, bbox.y1, *width),
            ],
            DrawingPrimitive::Curve { points, width } => points
                .windows(2)
                .map(|p| LineSegment::new(p[0].0, p[0].1, p[1].0, p[1].1, *width))
                .collect(),
        }
    }
}

/// Page geometry needed by the merge engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub width: f64,
    /// Page height; unknown heights extend the bottom-margin search to +inf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl PageInfo {
    pub fn new(page: u32, width: f64, height: Option<f64>) -> Self {
        Self {
            page,
            width,
            height,
        }
    }
}

/// Drawing primitives keyed by page number.
pub type PageDrawings = BTreeMap<u32, Vec<DrawingPrimitive>>;

/// A logical table, possibly assembled from several page fragments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergedTable {
    pub id: String,
    /// First page the table appears on.
    pub page: u32,
    pub pages: Vec<u32>,
    pub bbox: BBox,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub header_info: HeaderInfo,
    /// Source fragment ids in chain order.
    pub merged_from: Vec<String>,
    pub method: String,
}

impl MergedTable {
    /// Pass a single fragment through unchanged.
    pub fn from_fragment(fragment: &TableFragment) -> Self {
        Self {
            id: fragment.id.clone(),
            page: fragment.page,
            pages: vec![fragment.page],
            bbox: fragment.bbox,
            columns: fragment.columns.clone(),
            rows: fragment.rows.clone(),
            header_info: fragment.header_info,
            merged_from: vec![fragment.id.clone()],
            method: fragment.method.clone().unwrap_or_default(),
        }
    }

    pub fn is_merged(&self) -> bool {
        self.merged_from.len() > 1
    }
}

/// Advisory column template for a fragment whose extraction looks clipped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContinuationHint {
    pub table_id: String,
    pub predecessor_id: String,
    pub expected_cols: usize,
    /// Column boundary x-coordinates, left to right.
    pub vertical_lines: Vec<f64>,
}
