//! Continuation hints for fragments whose column grid looks clipped.
//!
//! When a chain member has fewer column boundaries than its predecessor the
//! extractor most likely lost a rule (typically the leftmost one). The hint
//! hands the predecessor's template back for a re-extraction pass; the merge
//! engine itself does not repair anything.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::fingerprint::column_edges;
use super::merger::FragmentIndex;
use super::settings::BorderSettings;
use super::types::{ContinuationHint, DrawingPrimitive, PageDrawings, TableFragment};
use crate::utils::cluster_list;

/// Vertical rules drawn inside `fragment`'s bbox, one x per clustered rule.
fn drawn_vertical_lines(
    fragment: &TableFragment,
    drawings: Option<&[DrawingPrimitive]>,
    settings: &BorderSettings,
) -> Vec<f64> {
    let Some(drawings) = drawings else {
        return Vec::new();
    };
    let bbox = fragment.bbox;
    let tol = settings.x_overlap_tolerance;
    let xs: Vec<f64> = drawings
        .iter()
        .flat_map(DrawingPrimitive::segments)
        .filter(|s| s.is_vertical(settings.horizontal_slope_tolerance))
        .filter(|s| s.x_mid() >= bbox.x0 - tol && s.x_mid() <= bbox.x1 + tol)
        .filter(|s| s.y_max() > bbox.y0 && s.y_min() < bbox.y1)
        .map(|s| s.x_mid())
        .collect();
    cluster_list(xs, settings.edge_distance_tolerance)
        .into_iter()
        .map(|c| c.iter().sum::<f64>() / c.len() as f64)
        .collect()
}

/// Build one hint per page whose chain member lost column boundaries.
///
/// Chains whose ids are missing from `fragments` are skipped; hints are
/// advisory and never fail the merge.
pub fn build_hints(
    chains: &[Vec<String>],
    fragments: &FragmentIndex,
    drawings: &PageDrawings,
    settings: &BorderSettings,
) -> BTreeMap<u32, ContinuationHint> {
    let mut hints: BTreeMap<u32, ContinuationHint> = BTreeMap::new();

    for chain in chains {
        let Some(members) = chain
            .iter()
            .map(|id| fragments.get(id))
            .collect::<Option<Vec<&TableFragment>>>()
        else {
            warn!(chain = ?chain, "chain references unknown fragments, no hints built");
            continue;
        };

        // the widest template seen so far along the chain
        let mut template: Option<(Vec<f64>, usize)> = None;
        for pair in members.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            let (prev_edges, prev_cols) = template
                .take()
                .unwrap_or_else(|| (column_edges(prev), prev.column_count()));
            let next_edges = column_edges(next);

            if next_edges.len() < prev_edges.len() {
                debug!(
                    table = %next.id,
                    page = next.page,
                    found = next_edges.len(),
                    expected = prev_edges.len(),
                    "column boundaries missing on continuation"
                );
                if hints.contains_key(&next.page) {
                    warn!(page = next.page, table = %next.id, "page already has a hint, keeping the first");
                } else {
                    hints.insert(
                        next.page,
                        ContinuationHint {
                            table_id: next.id.clone(),
                            predecessor_id: prev.id.clone(),
                            expected_cols: prev_cols,
                            vertical_lines: refine_with_drawings(prev, &prev_edges, drawings, settings),
                        },
                    );
                }
                template = Some((prev_edges, prev_cols));
            } else {
                template = Some((next_edges, next.column_count()));
            }
        }
    }
    hints
}

/// Replace `edges` by the rules drawn inside `fragment` when both describe
/// the same number of boundaries; drawn rules carry the exact positions.
fn refine_with_drawings(
    fragment: &TableFragment,
    edges: &[f64],
    drawings: &PageDrawings,
    settings: &BorderSettings,
) -> Vec<f64> {
    let drawn = drawn_vertical_lines(
        fragment,
        drawings.get(&fragment.page).map(Vec::as_slice),
        settings,
    );
    if drawn.len() == edges.len() {
        drawn
    } else {
        edges.to_vec()
    }
}
