//! Whole-document merge pass.
//!
//! The pass is a pure function of its inputs: headers are repaired on
//! copies of the fragments, chains are found, merged, classified and
//! returned together with the continuation hints and diagnostics.

use std::collections::BTreeMap;

use indexmap::map::Entry;
use ordered_float::OrderedFloat;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::chain::{ChainFinder, ChainSearch, PageLookup};
use super::header::{classify_headers, recover_misidentified_headers};
use super::hints::build_hints;
use super::layout_index::LayoutIndex;
use super::merger::{FragmentIndex, TableMerger};
use super::settings::MergeSettings;
use super::types::{ContinuationHint, MergedTable, PageDrawings, PageInfo, TableFragment};
use crate::error::Result;

/// Everything one merge pass produces.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// All logical tables, merged and single, ordered by (page, top, id).
    pub tables: Vec<MergedTable>,
    /// Re-extraction hints keyed by page.
    pub hints: BTreeMap<u32, ContinuationHint>,
    pub diagnostics: ChainSearch,
}

impl MergeOutcome {
    pub fn merged_tables(&self) -> impl Iterator<Item = &MergedTable> {
        self.tables.iter().filter(|t| t.is_merged())
    }
}

/// Find the merge chains of a document without merging them.
pub fn find_chains(
    fragments: &[TableFragment],
    pages: &[PageInfo],
    drawings: &PageDrawings,
    layout: Option<&dyn LayoutIndex>,
    settings: &MergeSettings,
) -> ChainSearch {
    let lookup = PageLookup::new(pages, drawings);
    ChainFinder::new(settings).find_chains(fragments, &lookup, layout)
}

/// Merge every cross-page table of a document.
///
/// Malformed fragments and fragments reusing an id are passed through
/// unmerged and reported in the diagnostics. Only invalid settings fail the
/// call.
pub fn merge_all_tables(
    fragments: &[TableFragment],
    pages: &[PageInfo],
    drawings: &PageDrawings,
    layout: Option<&dyn LayoutIndex>,
    settings: &MergeSettings,
) -> Result<MergeOutcome> {
    settings.validate()?;

    let prepared: Vec<TableFragment> = fragments
        .iter()
        .map(|f| {
            if settings.header.recover_headers {
                recover_misidentified_headers(f, &settings.header)
            } else {
                f.clone()
            }
        })
        .collect();

    let search = find_chains(&prepared, pages, drawings, layout, settings);

    // the chain finder links the first well-formed fragment of each id; any
    // other fragment sharing that id is passed through on its own
    let mut index = FragmentIndex::with_capacity(prepared.len());
    let mut duplicates: Vec<TableFragment> = Vec::new();
    for f in prepared {
        match index.entry(f.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(f);
            }
            Entry::Occupied(mut slot) => {
                if slot.get().validate().is_err() && f.validate().is_ok() {
                    duplicates.push(slot.insert(f));
                } else {
                    duplicates.push(f);
                }
            }
        }
    }
    if !duplicates.is_empty() {
        warn!(
            count = duplicates.len(),
            "fragments with duplicate ids passed through unmerged"
        );
    }

    let merger = TableMerger::new(settings);
    let mut tables: Vec<MergedTable> = Vec::with_capacity(index.len());
    let mut chained: FxHashSet<&str> = FxHashSet::default();
    for chain in &search.chains {
        tables.push(merger.merge(chain, &index, drawings)?);
        chained.extend(chain.iter().map(String::as_str));
    }
    tables.extend(
        index
            .values()
            .filter(|f| !chained.contains(f.id.as_str()))
            .map(MergedTable::from_fragment),
    );
    tables.extend(duplicates.iter().map(MergedTable::from_fragment));

    if settings.header.classify_headers {
        tables = tables
            .into_iter()
            .map(|t| classify_headers(t, &settings.header))
            .collect();
    }
    tables.sort_by_key(|t| (t.page, OrderedFloat(t.bbox.y0), t.id.clone()));

    let hints = build_hints(&search.chains, &index, drawings, &settings.border);

    info!(
        fragments = fragments.len(),
        chains = search.chains.len(),
        tables = tables.len(),
        hints = hints.len(),
        skipped = search.skipped.len(),
        "merged document tables"
    );

    Ok(MergeOutcome {
        tables,
        hints,
        diagnostics: search,
    })
}
