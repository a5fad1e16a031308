//! Border detection from vector drawing primitives.
//!
//! A table edge is "closed" when a horizontal rule covers most of its width
//! and "open" otherwise. Open edges at a page break are the strongest sign
//! that a table continues on the next page.

use super::settings::BorderSettings;
use super::types::{BBox, DrawingPrimitive, LineSegment};

/// Border evidence for one table bbox.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BorderEvidence {
    pub has_top: bool,
    pub has_bottom: bool,
    /// Average stroke width of the rules found at the top and bottom edges.
    pub line_width: f64,
}

/// Horizontal interval `[x0, x1]` used for coverage computation.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Span {
    x0: f64,
    x1: f64,
}

pub struct BorderDetector<'a> {
    settings: &'a BorderSettings,
    assume_open_without_drawings: bool,
}

impl<'a> BorderDetector<'a> {
    pub fn new(settings: &'a BorderSettings) -> Self {
        Self {
            settings,
            assume_open_without_drawings: false,
        }
    }

    /// Report borders as open instead of closed when no drawings exist.
    pub fn assume_open_without_drawings(mut self, open: bool) -> Self {
        self.assume_open_without_drawings = open;
        self
    }

    /// Decide whether the top and bottom edges of `bbox` carry a rule.
    ///
    /// Missing or empty drawing data yields closed edges (or open ones when
    /// configured), never an error.
    pub fn detect(&self, bbox: &BBox, drawings: Option<&[DrawingPrimitive]>) -> BorderEvidence {
        let drawings = match drawings {
            Some(d) if !d.is_empty() => d,
            _ => {
                let closed = !self.assume_open_without_drawings;
                return BorderEvidence {
                    has_top: closed,
                    has_bottom: closed,
                    line_width: self.settings.default_line_width,
                };
            }
        };

        let segments = self.horizontal_segments(drawings, bbox.x0, bbox.x1);
        let top: Vec<&LineSegment> = self.segments_near(&segments, bbox.y0);
        let bottom: Vec<&LineSegment> = self.segments_near(&segments, bbox.y1);

        let has_top = self.is_covered(&top, bbox.x0, bbox.x1);
        let has_bottom = self.is_covered(&bottom, bbox.x0, bbox.x1);

        let widths: Vec<f64> = top.iter().chain(bottom.iter()).map(|s| s.width).collect();
        let line_width = if widths.is_empty() {
            self.settings.default_line_width
        } else {
            widths.iter().sum::<f64>() / widths.len() as f64
        };

        BorderEvidence {
            has_top,
            has_bottom,
            line_width,
        }
    }

    /// Whether a horizontal rule at height `y` spans the cell range
    /// `[x0, x1]`. Without drawings the answer is `true`, so cells are never
    /// joined on missing evidence.
    pub fn cell_has_horizontal_line(
        &self,
        x0: f64,
        x1: f64,
        y: f64,
        drawings: Option<&[DrawingPrimitive]>,
    ) -> bool {
        let drawings = match drawings {
            Some(d) if !d.is_empty() => d,
            _ => return true,
        };
        let segments = self.horizontal_segments(drawings, x0, x1);
        let near = self.segments_near(&segments, y);
        self.is_covered(&near, x0, x1)
    }

    fn horizontal_segments(&self, drawings: &[DrawingPrimitive], x0: f64, x1: f64) -> Vec<LineSegment> {
        let tol = self.settings.x_overlap_tolerance;
        drawings
            .iter()
            .flat_map(DrawingPrimitive::segments)
            .filter(|s| s.is_horizontal(self.settings.horizontal_slope_tolerance))
            .filter(|s| s.x_max() >= x0 - tol && s.x_min() <= x1 + tol)
            .collect()
    }

    fn segments_near<'s>(&self, segments: &'s [LineSegment], y: f64) -> Vec<&'s LineSegment> {
        segments
            .iter()
            .filter(|s| (s.y_mid() - y).abs() < self.settings.edge_distance_tolerance)
            .collect()
    }

    fn is_covered(&self, segments: &[&LineSegment], x0: f64, x1: f64) -> bool {
        let width = x1 - x0;
        if width <= 0.0 || segments.is_empty() {
            return false;
        }
        let covered = covered_length(segments, x0, x1, self.settings.join_gap_tolerance);
        covered >= self.settings.coverage_threshold * width
    }
}

/// Total length of `[x0, x1]` covered by the segments after bridging gaps
/// up to `gap_tolerance`.
fn covered_length(segments: &[&LineSegment], x0: f64, x1: f64, gap_tolerance: f64) -> f64 {
    let mut spans: Vec<Span> = segments
        .iter()
        .map(|s| Span {
            x0: s.x_min().max(x0),
            x1: s.x_max().min(x1),
        })
        .filter(|s| s.x1 > s.x0)
        .collect();
    join_spans(&mut spans, gap_tolerance)
        .iter()
        .map(|s| s.x1 - s.x0)
        .sum()
}

/// Join collinear spans that are within tolerance of each other.
fn join_spans(spans: &mut [Span], tolerance: f64) -> Vec<Span> {
    spans.sort_by(|a, b| a.x0.total_cmp(&b.x0));
    let mut joined: Vec<Span> = Vec::new();
    for span in spans.iter() {
        match joined.last_mut() {
            Some(last) if span.x0 <= last.x1 + tolerance => {
                if span.x1 > last.x1 {
                    last.x1 = span.x1;
                }
            }
            _ => joined.push(*span),
        }
    }
    joined
}
