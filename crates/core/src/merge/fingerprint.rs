//! Comparable summaries of table fragments.

use super::border::BorderDetector;
use super::settings::MergeSettings;
use super::types::{BBox, DrawingPrimitive, TableFragment};
use crate::utils::{EPSILON, hash_col_paths, normalize_x};

/// Geometry, structure, visual and content signals of one fragment.
///
/// Horizontal measurements are fractions of the page width so fragments on
/// pages with different crop boxes stay comparable.
#[derive(Clone, Debug, PartialEq)]
pub struct TableFingerprint<'a> {
    pub table_id: String,
    pub page_num: u32,
    pub bbox: BBox,

    pub x_edges_norm: Vec<f64>,
    pub table_width_norm: f64,
    pub left_margin_norm: f64,
    pub right_margin_norm: f64,

    pub col_levels: usize,
    pub row_levels: usize,
    pub col_paths: Vec<Vec<String>>,
    pub col_paths_hash: String,

    pub has_top_border: bool,
    pub has_bottom_border: bool,
    pub border_line_width: f64,

    pub header_rows_texts: Vec<Vec<String>>,
    pub first_data_row_texts: Vec<String>,

    pub fragment: &'a TableFragment,
}

/// Column boundary x-coordinates of a fragment, left to right.
///
/// Explicit column bounds win; otherwise each column's left edge is the
/// leftmost cell bbox in it and the right edge of the last column closes
/// the list. Columns without any positioned cell contribute nothing, which
/// is how a clipped column shows up downstream.
pub fn column_edges(fragment: &TableFragment) -> Vec<f64> {
    let explicit: Option<Vec<(f64, f64)>> = fragment
        .columns
        .iter()
        .map(|c| c.x0.zip(c.x1))
        .collect();

    let mut edges: Vec<f64> = match explicit {
        Some(bounds) if !bounds.is_empty() => {
            let mut e: Vec<f64> = bounds.iter().map(|(x0, _)| *x0).collect();
            if let Some((_, x1)) = bounds.last() {
                e.push(*x1);
            }
            e
        }
        _ => edges_from_cells(fragment),
    };

    if edges.is_empty() {
        edges = vec![fragment.bbox.x0, fragment.bbox.x1];
    }
    edges.sort_by(f64::total_cmp);
    edges.dedup_by(|a, b| (*a - *b).abs() < EPSILON);
    edges
}

fn edges_from_cells(fragment: &TableFragment) -> Vec<f64> {
    let ncols = fragment.column_count();
    let mut edges = Vec::with_capacity(ncols + 1);
    for col in 0..ncols {
        let left = fragment
            .rows
            .iter()
            .filter_map(|r| r.cells.get(col).and_then(|c| c.bbox))
            .map(|b| b.x0)
            .reduce(f64::min);
        if let Some(x) = left {
            edges.push(x);
        }
    }
    let right = fragment
        .rows
        .iter()
        .filter_map(|r| r.cells.last().and_then(|c| c.bbox))
        .map(|b| b.x1)
        .reduce(f64::max);
    if let Some(x) = right {
        edges.push(x);
    }
    edges
}

pub struct FingerprintGenerator<'s> {
    settings: &'s MergeSettings,
}

impl<'s> FingerprintGenerator<'s> {
    pub fn new(settings: &'s MergeSettings) -> Self {
        Self { settings }
    }

    /// Build the fingerprint of `fragment`. Never fails: missing drawings
    /// only mean "no visual evidence".
    pub fn generate<'a>(
        &self,
        fragment: &'a TableFragment,
        page_width: f64,
        page_drawings: Option<&[DrawingPrimitive]>,
    ) -> TableFingerprint<'a> {
        let bbox = fragment.bbox;
        let x_edges_norm = column_edges(fragment)
            .into_iter()
            .map(|x| normalize_x(x, page_width))
            .collect();

        let borders = BorderDetector::new(&self.settings.border)
            .assume_open_without_drawings(self.settings.assume_open_without_drawings)
            .detect(&bbox, page_drawings);

        let col_paths = fragment.col_paths();
        let col_paths_hash = hash_col_paths(&col_paths);

        TableFingerprint {
            table_id: fragment.id.clone(),
            page_num: fragment.page,
            bbox,
            x_edges_norm,
            table_width_norm: normalize_x(bbox.width(), page_width),
            left_margin_norm: normalize_x(bbox.x0, page_width),
            right_margin_norm: normalize_x(page_width - bbox.x1, page_width),
            col_levels: fragment.header_info.col_levels,
            row_levels: fragment.header_info.row_levels,
            col_paths,
            col_paths_hash,
            has_top_border: borders.has_top,
            has_bottom_border: borders.has_bottom,
            border_line_width: borders.line_width,
            header_rows_texts: fragment.header_rows().iter().map(|r| r.texts()).collect(),
            first_data_row_texts: fragment
                .first_data_row()
                .map(|r| r.texts())
                .unwrap_or_default(),
            fragment,
        }
    }
}
