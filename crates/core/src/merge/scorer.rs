//! Pairwise similarity between fragment fingerprints.
//!
//! Three axes are scored independently in `[0, 1]` and combined with the
//! configured axis weights:
//! - geometry: column edge alignment, margins and width
//! - structure: header depth and column paths
//! - visual: open borders across the page break and stroke width

use indexmap::IndexMap;
use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};

use super::fingerprint::TableFingerprint;
use super::settings::ScoreSettings;
use crate::utils::{closeness, jaccard_with_tolerance, label_jaccard};

/// Scored (earlier fragment, later fragment) pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeCandidate {
    pub prev_id: String,
    pub next_id: String,
    pub prev_page: u32,
    pub next_page: u32,
    pub score: f64,
    pub geometry_score: f64,
    pub structure_score: f64,
    pub visual_score: f64,
    pub geometry_details: IndexMap<String, f64>,
    pub structure_details: IndexMap<String, f64>,
    pub visual_details: IndexMap<String, f64>,
}

pub struct Scorer<'s> {
    settings: &'s ScoreSettings,
}

fn weighted(parts: &[(f64, f64)]) -> f64 {
    parts
        .iter()
        .map(|(w, v)| w * v)
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

impl<'s> Scorer<'s> {
    pub fn new(settings: &'s ScoreSettings) -> Self {
        Self { settings }
    }

    pub fn threshold(&self) -> f64 {
        self.settings.threshold
    }

    /// Score `prev` (earlier page) against `next` (later page).
    pub fn score(&self, prev: &TableFingerprint<'_>, next: &TableFingerprint<'_>) -> MergeCandidate {
        let (geometry_score, geometry_details) = self.geometry(prev, next);
        let (structure_score, structure_details) = self.structure(prev, next);
        let (visual_score, visual_details) = self.visual(prev, next);

        let s = self.settings;
        let score = weighted(&[
            (s.geometry_weight, geometry_score),
            (s.structure_weight, structure_score),
            (s.visual_weight, visual_score),
        ]);

        MergeCandidate {
            prev_id: prev.table_id.clone(),
            next_id: next.table_id.clone(),
            prev_page: prev.page_num,
            next_page: next.page_num,
            score,
            geometry_score,
            structure_score,
            visual_score,
            geometry_details,
            structure_details,
            visual_details,
        }
    }

    fn geometry(
        &self,
        prev: &TableFingerprint<'_>,
        next: &TableFingerprint<'_>,
    ) -> (f64, IndexMap<String, f64>) {
        let s = self.settings;
        let edges = jaccard_with_tolerance(&prev.x_edges_norm, &next.x_edges_norm, s.edge_tolerance);
        let left = closeness(prev.left_margin_norm, next.left_margin_norm, s.margin_tolerance);
        let right = closeness(
            prev.right_margin_norm,
            next.right_margin_norm,
            s.margin_tolerance,
        );
        let width = closeness(prev.table_width_norm, next.table_width_norm, s.width_tolerance);

        let [w_edges, w_left, w_right, w_width] = s.geometry_split;
        let total = weighted(&[
            (w_edges, edges),
            (w_left, left),
            (w_right, right),
            (w_width, width),
        ]);
        let details = IndexMap::from([
            ("x_edges".to_string(), edges),
            ("left_margin".to_string(), left),
            ("right_margin".to_string(), right),
            ("width".to_string(), width),
        ]);
        (total, details)
    }

    fn structure(
        &self,
        prev: &TableFingerprint<'_>,
        next: &TableFingerprint<'_>,
    ) -> (f64, IndexMap<String, f64>) {
        let col_levels = f64::from(u8::from(prev.col_levels == next.col_levels));
        let row_levels = f64::from(u8::from(prev.row_levels == next.row_levels));
        let paths = col_paths_similarity(prev, next);

        let [w_col, w_row, w_paths] = self.settings.structure_split;
        let total = weighted(&[(w_col, col_levels), (w_row, row_levels), (w_paths, paths)]);
        let details = IndexMap::from([
            ("col_levels".to_string(), col_levels),
            ("row_levels".to_string(), row_levels),
            ("col_paths".to_string(), paths),
        ]);
        (total, details)
    }

    fn visual(
        &self,
        prev: &TableFingerprint<'_>,
        next: &TableFingerprint<'_>,
    ) -> (f64, IndexMap<String, f64>) {
        let continuation = f64::from(u8::from(!prev.has_bottom_border && !next.has_top_border));
        let line_width = closeness(
            prev.border_line_width,
            next.border_line_width,
            self.settings.line_width_tolerance,
        );

        let [w_cont, w_line] = self.settings.visual_split;
        let total = weighted(&[(w_cont, continuation), (w_line, line_width)]);
        let details = IndexMap::from([
            ("continuation".to_string(), continuation),
            ("line_width".to_string(), line_width),
        ]);
        (total, details)
    }
}

/// 1.0 on equal digests, otherwise the mean per-column label overlap over
/// the wider of the two column lists.
fn col_paths_similarity(prev: &TableFingerprint<'_>, next: &TableFingerprint<'_>) -> f64 {
    if prev.col_paths_hash == next.col_paths_hash {
        return 1.0;
    }
    let n = prev.col_paths.len().max(next.col_paths.len());
    if n == 0 {
        return 1.0;
    }
    let total: f64 = prev
        .col_paths
        .iter()
        .zip_longest(next.col_paths.iter())
        .map(|pair| match pair {
            EitherOrBoth::Both(a, b) => label_jaccard(a, b),
            _ => 0.0,
        })
        .sum();
    (total / n as f64).clamp(0.0, 1.0)
}
