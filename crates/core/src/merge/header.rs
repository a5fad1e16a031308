//! Header deduplication and header row reclassification.
//!
//! Continuation pages often reprint the column header. Those rows are
//! detected here so the merger can drop them. The same module also fixes
//! header counts the upstream detector got wrong, in both directions.

use tracing::debug;

use super::settings::HeaderSettings;
use super::types::{MergedTable, Row, TableFragment};
use crate::utils::{normalize_text, numeric_ratio};

/// Share of columns whose normalized text is identical in both rows.
///
/// A header row with no text at all never matches: blank rows are layout
/// noise, not a reprinted header.
fn row_similarity(header: &[String], row: &[String]) -> f64 {
    let n = header.len().max(row.len());
    if n == 0 || header.iter().all(String::is_empty) {
        return 0.0;
    }
    let equal = header.iter().zip(row.iter()).filter(|(a, b)| a == b).count();
    equal as f64 / n as f64
}

/// Count the leading rows of `next` that repeat the header of `prev`.
///
/// Rows are compared pairwise against the header rows of `prev`, in order.
/// Matching stops at the first row below the similarity threshold, so the
/// result is always the length of a contiguous prefix.
pub fn detect_repeated_header_rows(
    prev: &TableFragment,
    next: &TableFragment,
    settings: &HeaderSettings,
) -> usize {
    let mut repeated = 0usize;
    for (header, row) in prev.header_rows().iter().zip(next.rows.iter()) {
        let sim = row_similarity(&header.texts(), &row.texts());
        if sim + f64::EPSILON < settings.repeat_similarity {
            break;
        }
        repeated += 1;
    }
    if repeated > 0 {
        debug!(prev = %prev.id, next = %next.id, repeated, "repeated header rows");
    }
    repeated
}

fn row_numeric_ratio(row: &Row) -> Option<f64> {
    numeric_ratio(row.cells.iter().map(|c| c.text.as_str()))
}

/// Demote trailing header rows whose cells are mostly numbers.
///
/// Returns a new fragment; the input is left untouched. Column paths lose
/// the levels that came from demoted rows.
pub fn recover_misidentified_headers(
    fragment: &TableFragment,
    settings: &HeaderSettings,
) -> TableFragment {
    let levels = fragment.header_info.col_levels.min(fragment.rows.len());
    let mut kept = levels;
    while kept > 0 {
        match row_numeric_ratio(&fragment.rows[kept - 1]) {
            Some(r) if r >= settings.numeric_header_ratio => kept -= 1,
            _ => break,
        }
    }

    let mut out = fragment.clone();
    if kept == levels {
        return out;
    }
    debug!(
        table = %fragment.id,
        from = fragment.header_info.col_levels,
        to = kept,
        "demoting numeric header rows to data"
    );
    out.header_info.col_levels = kept;
    out.header_info.header_detected = kept > 0;
    for col in &mut out.columns {
        col.path.truncate(kept);
    }
    out
}

/// Promote the first row of a header-less table to a one-level header when
/// it reads as labels above a numeric body.
pub fn classify_headers(table: MergedTable, settings: &HeaderSettings) -> MergedTable {
    if table.header_info.header_detected || table.rows.len() < 2 {
        return table;
    }
    let first = &table.rows[0];
    let filled = first
        .cells
        .iter()
        .filter(|c| !c.text.trim().is_empty())
        .count();
    if filled * 2 < first.cells.len() || filled == 0 {
        return table;
    }
    let first_numeric = row_numeric_ratio(first).unwrap_or(1.0);
    if first_numeric >= settings.numeric_header_ratio {
        return table;
    }
    let body = numeric_ratio(
        table.rows[1..]
            .iter()
            .flat_map(|r| r.cells.iter().map(|c| c.text.as_str())),
    );
    match body {
        Some(r) if r >= settings.classify_min_data_numeric_ratio => {}
        _ => return table,
    }

    debug!(table = %table.id, "classified first row as header");
    let mut out = table;
    out.header_info.col_levels = 1;
    out.header_info.header_detected = true;
    let labels: Vec<String> = out.rows[0]
        .cells
        .iter()
        .map(|c| normalize_text(&c.text))
        .collect();
    for (col, label) in out.columns.iter_mut().zip(labels) {
        if col.path.is_empty() {
            col.path = vec![label];
        }
    }
    out
}
