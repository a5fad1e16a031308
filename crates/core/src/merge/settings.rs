//! Tunable thresholds and weights for the merge engine.
//!
//! Every constant the heuristics depend on lives here so it can be tuned per
//! document collection without touching the scoring logic.

use serde::{Deserialize, Serialize};

use crate::error::{MergeError, Result};

pub(crate) const DEFAULT_THRESHOLD: f64 = 0.70;
pub(crate) const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.80;
pub(crate) const DEFAULT_REPEAT_SIMILARITY: f64 = 0.85;

/// Parameters of the border detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderSettings {
    /// Maximum |dy| for a segment to count as horizontal.
    pub horizontal_slope_tolerance: f64,
    /// Slack added on both sides of the bbox when testing x-overlap.
    pub x_overlap_tolerance: f64,
    /// Maximum distance between a rule and the table edge it closes.
    pub edge_distance_tolerance: f64,
    /// Gaps up to this size between collinear segments are bridged.
    pub join_gap_tolerance: f64,
    /// Fraction of the bbox width a rule must cover to close an edge.
    pub coverage_threshold: f64,
    /// Line width reported when no rule is found.
    pub default_line_width: f64,
}

impl Default for BorderSettings {
    fn default() -> Self {
        Self {
            horizontal_slope_tolerance: 2.0,
            x_overlap_tolerance: 5.0,
            edge_distance_tolerance: 3.0,
            join_gap_tolerance: 5.0,
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
            default_line_width: 1.0,
        }
    }
}

/// Weights and tolerances of the pairwise scorer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreSettings {
    pub geometry_weight: f64,
    pub structure_weight: f64,
    pub visual_weight: f64,

    /// Geometry split: column edges, left margin, right margin, width.
    pub geometry_split: [f64; 4],
    /// Structure split: col_levels, row_levels, col_paths.
    pub structure_split: [f64; 3],
    /// Visual split: open-border continuation, line width consistency.
    pub visual_split: [f64; 2],

    /// Two normalized column edges closer than this are the same boundary.
    pub edge_tolerance: f64,
    pub margin_tolerance: f64,
    pub width_tolerance: f64,
    pub line_width_tolerance: f64,

    /// Minimum total score for a pair to be considered a continuation.
    pub threshold: f64,
}

impl Default for ScoreSettings {
    fn default() -> Self {
        Self {
            geometry_weight: 0.40,
            structure_weight: 0.35,
            visual_weight: 0.25,
            geometry_split: [0.5, 0.2, 0.2, 0.1],
            structure_split: [0.3, 0.2, 0.5],
            visual_split: [0.7, 0.3],
            edge_tolerance: 0.01,
            margin_tolerance: 0.05,
            width_tolerance: 0.03,
            line_width_tolerance: 0.5,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Parameters of header deduplication and reclassification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderSettings {
    /// Share of equal cells for a row to count as a repeated header row.
    pub repeat_similarity: f64,
    /// Header rows at or above this numeric share are demoted to data.
    pub numeric_header_ratio: f64,
    /// Demote misidentified header rows before fingerprinting.
    pub recover_headers: bool,
    /// Promote a leading text row to header on tables without one.
    pub classify_headers: bool,
    /// Minimum numeric share of the body for header promotion.
    pub classify_min_data_numeric_ratio: f64,
}

impl Default for HeaderSettings {
    fn default() -> Self {
        Self {
            repeat_similarity: DEFAULT_REPEAT_SIMILARITY,
            numeric_header_ratio: 0.5,
            recover_headers: true,
            classify_headers: true,
            classify_min_data_numeric_ratio: 0.3,
        }
    }
}

/// Top-level settings for one merge pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    pub border: BorderSettings,
    pub scoring: ScoreSettings,
    pub header: HeaderSettings,
    /// Join cells split by the page break.
    pub enable_cell_merge: bool,
    /// Treat borders as open when a page has no drawing data at all.
    pub assume_open_without_drawings: bool,
    /// Fingerprint fragments on the rayon pool.
    pub parallel_fingerprints: bool,
    /// Height of the running-header band excluded from the paragraph check.
    pub top_margin: f64,
    /// Height of the footer band excluded from the paragraph check.
    pub bottom_margin: f64,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            border: BorderSettings::default(),
            scoring: ScoreSettings::default(),
            header: HeaderSettings::default(),
            enable_cell_merge: false,
            assume_open_without_drawings: false,
            parallel_fingerprints: true,
            top_margin: 36.0,
            bottom_margin: 36.0,
        }
    }
}

fn check_unit(name: &str, v: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&v) {
        return Err(MergeError::InvalidSettings(format!(
            "{name} must be within [0, 1], got {v}"
        )));
    }
    Ok(())
}

fn check_positive(name: &str, v: f64) -> Result<()> {
    if !(v > 0.0) {
        return Err(MergeError::InvalidSettings(format!(
            "{name} must be positive, got {v}"
        )));
    }
    Ok(())
}

fn check_split(name: &str, split: &[f64]) -> Result<()> {
    for (i, w) in split.iter().enumerate() {
        check_unit(&format!("{name}[{i}]"), *w)?;
    }
    let sum: f64 = split.iter().sum();
    if (sum - 1.0).abs() > 1e-6 {
        return Err(MergeError::InvalidSettings(format!(
            "{name} must sum to 1, got {sum}"
        )));
    }
    Ok(())
}

impl MergeSettings {
    /// Check that weights form convex combinations and tolerances are usable.
    ///
    /// Scores stay in `[0, 1]` only when every weight split sums to one.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        check_split(
            "axis weights",
            &[s.geometry_weight, s.structure_weight, s.visual_weight],
        )?;
        check_split("geometry_split", &s.geometry_split)?;
        check_split("structure_split", &s.structure_split)?;
        check_split("visual_split", &s.visual_split)?;
        check_unit("threshold", s.threshold)?;
        check_positive("edge_tolerance", s.edge_tolerance)?;
        check_positive("margin_tolerance", s.margin_tolerance)?;
        check_positive("width_tolerance", s.width_tolerance)?;
        check_positive("line_width_tolerance", s.line_width_tolerance)?;

        let b = &self.border;
        check_unit("coverage_threshold", b.coverage_threshold)?;
        check_positive("horizontal_slope_tolerance", b.horizontal_slope_tolerance)?;
        check_positive("edge_distance_tolerance", b.edge_distance_tolerance)?;
        if b.x_overlap_tolerance < 0.0 || b.join_gap_tolerance < 0.0 {
            return Err(MergeError::InvalidSettings(
                "border tolerances must not be negative".into(),
            ));
        }

        if !(self.top_margin >= 0.0 && self.bottom_margin >= 0.0) {
            return Err(MergeError::InvalidSettings(format!(
                "page margins must not be negative, got top {} bottom {}",
                self.top_margin, self.bottom_margin
            )));
        }

        let h = &self.header;
        check_unit("repeat_similarity", h.repeat_similarity)?;
        check_unit("numeric_header_ratio", h.numeric_header_ratio)?;
        check_unit(
            "classify_min_data_numeric_ratio",
            h.classify_min_data_numeric_ratio,
        )?;
        Ok(())
    }

    /// Settings with a different acceptance threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.scoring.threshold = threshold;
        self
    }
}
