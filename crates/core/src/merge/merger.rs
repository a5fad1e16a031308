//! Physical concatenation of a verified chain into one logical table.

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::border::BorderDetector;
use super::header::detect_repeated_header_rows;
use super::settings::MergeSettings;
use super::types::{BBox, Cell, MergedTable, PageDrawings, Row, TableFragment};
use crate::error::{MergeError, Result};

/// Provenance tag appended to the `method` of merged tables.
pub const MERGE_METHOD_TAG: &str = "cross_page_merge";
/// Extra tag when cells broken by a page break were joined.
pub const CELL_MERGE_METHOD_TAG: &str = "split_cells";

/// Fragments keyed by id, in input order.
pub type FragmentIndex = IndexMap<String, TableFragment>;

pub struct TableMerger<'s> {
    settings: &'s MergeSettings,
}

impl<'s> TableMerger<'s> {
    pub fn new(settings: &'s MergeSettings) -> Self {
        Self { settings }
    }

    /// Merge the fragments of `chain` into one table.
    ///
    /// The first fragment supplies columns and header info. Each following
    /// fragment loses its repeated header rows before its rows are
    /// appended. Fails on chains shorter than two or unknown ids.
    pub fn merge(
        &self,
        chain: &[String],
        fragments: &FragmentIndex,
        drawings: &PageDrawings,
    ) -> Result<MergedTable> {
        if chain.len() < 2 {
            return Err(MergeError::ChainTooShort(chain.len()));
        }
        let members: Vec<&TableFragment> = chain
            .iter()
            .map(|id| {
                fragments
                    .get(id)
                    .ok_or_else(|| MergeError::UnresolvedChainReference(id.clone()))
            })
            .collect::<Result<_>>()?;

        let base = members[0];
        let ncols = base.column_count();
        let mut rows: Vec<Row> = base.rows.clone();
        let mut bbox: BBox = base.bbox;
        let mut pages = vec![base.page];
        let mut joined_cells = false;

        for pair in members.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            // a continuation without its own header is compared against the
            // header of the first page
            let header_source = if prev.header_info.col_levels > 0 {
                prev
            } else {
                base
            };
            let skip = detect_repeated_header_rows(header_source, next, &self.settings.header);
            let mut retained = next.rows[skip.min(next.rows.len())..].iter();

            if self.settings.enable_cell_merge {
                if let (Some(last), Some(first)) = (rows.last_mut(), next.rows.get(skip)) {
                    let joined = self.join_split_cells(last, prev, first, next, drawings);
                    if !joined.is_empty() {
                        joined_cells = true;
                        retained.next();
                        if let Some(rest) = remainder_row(first, &joined) {
                            rows.push(fit_row(&rest, ncols, &next.id));
                        }
                    }
                }
            }

            for row in retained {
                rows.push(fit_row(row, ncols, &next.id));
            }
            bbox = bbox.union(&next.bbox);
            pages.push(next.page);
        }

        let mut method = match base.method.as_deref() {
            Some(m) if !m.is_empty() => format!("{m}+{MERGE_METHOD_TAG}"),
            _ => MERGE_METHOD_TAG.to_string(),
        };
        if joined_cells {
            method.push('+');
            method.push_str(CELL_MERGE_METHOD_TAG);
        }

        debug!(
            table = %base.id,
            fragments = chain.len(),
            rows = rows.len(),
            "merged chain"
        );

        Ok(MergedTable {
            id: base.id.clone(),
            page: base.page,
            pages,
            bbox,
            columns: base.columns.clone(),
            rows,
            header_info: base.header_info,
            merged_from: chain.to_vec(),
            method,
        })
    }

    /// Join the cells of `first` (top row of `next`) into `last` (bottom row
    /// so far) wherever a page break cut through the cell: no rule under it
    /// on its page and no rule above its continuation on the next page.
    ///
    /// Returns the indices of the joined columns.
    fn join_split_cells(
        &self,
        last: &mut Row,
        prev: &TableFragment,
        first: &Row,
        next: &TableFragment,
        drawings: &PageDrawings,
    ) -> Vec<usize> {
        let detector = BorderDetector::new(&self.settings.border);
        let prev_drawings = drawings.get(&prev.page).map(Vec::as_slice);
        let next_drawings = drawings.get(&next.page).map(Vec::as_slice);
        let y_below = last.bottom().unwrap_or(prev.bbox.y1);
        let y_above = first.top().unwrap_or(next.bbox.y0);

        let ncols = last.cells.len().min(first.cells.len());
        let split: Vec<usize> = (0..ncols)
            .filter(|&j| {
                let Some((x0, x1)) = cell_x_range(last, first, prev, j) else {
                    return false;
                };
                !detector.cell_has_horizontal_line(x0, x1, y_below, prev_drawings)
                    && !detector.cell_has_horizontal_line(x0, x1, y_above, next_drawings)
            })
            .collect();

        for &j in &split {
            merge_cell(&mut last.cells[j], &first.cells[j]);
        }
        if !split.is_empty() {
            debug!(prev = %prev.id, next = %next.id, columns = ?split, "joined cells split by page break");
        }
        split
    }
}

/// What is left of a continuation row once its `joined` cells moved up:
/// `None` when nothing but empty cells remain.
fn remainder_row(first: &Row, joined: &[usize]) -> Option<Row> {
    let mut rest = first.clone();
    for &j in joined {
        rest.cells[j] = Cell::default();
    }
    rest.cells
        .iter()
        .any(|c| !c.text.trim().is_empty())
        .then_some(rest)
}

/// Horizontal extent of column `j` at the page boundary.
fn cell_x_range(last: &Row, first: &Row, prev: &TableFragment, j: usize) -> Option<(f64, f64)> {
    last.cells[j]
        .bbox
        .or(first.cells[j].bbox)
        .map(|b| (b.x0, b.x1))
        .or_else(|| prev.columns.get(j).and_then(|c| c.x0.zip(c.x1)))
}

/// Append the continuation text with no separator and grow the bbox.
fn merge_cell(dst: &mut Cell, src: &Cell) {
    dst.text.push_str(src.text.trim_start());
    dst.bbox = match (dst.bbox, src.bbox) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, b) => a.or(b),
    };
}

/// Pad short rows with empty cells so every row spans the base columns.
fn fit_row(row: &Row, ncols: usize, table: &str) -> Row {
    let mut out = row.clone();
    if ncols == 0 {
        return out;
    }
    match out.cells.len() {
        n if n < ncols => out.cells.resize(ncols, Cell::default()),
        n if n > ncols => {
            warn!(table, cells = n, expected = ncols, "continuation row wider than base table")
        }
        _ => {}
    }
    out
}
