//! Discovery of merge chains across consecutive pages.
//!
//! Every fragment on page `p` is scored against every fragment on page
//! `p + 1`. Candidates above the threshold that are not separated by prose
//! are linked greedily in descending score order. A fragment takes part in
//! at most one link as predecessor and at most one as successor, so chains
//! never branch.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::fingerprint::{FingerprintGenerator, TableFingerprint};
use super::layout_index::LayoutIndex;
use super::scorer::{MergeCandidate, Scorer};
use super::settings::MergeSettings;
use super::types::{DrawingPrimitive, PageDrawings, PageInfo, TableFragment};

/// Why a scored candidate was not linked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    BelowThreshold,
    ParagraphInterruption,
    AlreadyConsumed,
}

/// A scored candidate and what happened to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(flatten)]
    pub candidate: MergeCandidate,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<RejectReason>,
}

/// Fragment excluded from chain search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkippedFragment {
    pub id: String,
    pub reason: String,
}

/// Result of one chain search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainSearch {
    /// Ordered fragment ids, each chain at least two long.
    pub chains: Vec<Vec<String>>,
    /// Every scored pair in evaluation order.
    pub candidates: Vec<CandidateRecord>,
    /// Fragments with more than one next-page candidate above threshold.
    pub ambiguous: Vec<String>,
    pub skipped: Vec<SkippedFragment>,
}

/// Resolves page widths, heights and drawings for fingerprinting.
pub struct PageLookup<'d> {
    pages: BTreeMap<u32, PageInfo>,
    drawings: &'d PageDrawings,
}

impl<'d> PageLookup<'d> {
    pub fn new(pages: &[PageInfo], drawings: &'d PageDrawings) -> Self {
        Self {
            pages: pages.iter().map(|p| (p.page, *p)).collect(),
            drawings,
        }
    }

    pub fn width(&self, page: u32) -> Option<f64> {
        self.pages.get(&page).map(|p| p.width).filter(|w| *w > 0.0)
    }

    /// Page height, or +inf when unknown.
    pub fn height(&self, page: u32) -> f64 {
        self.pages
            .get(&page)
            .and_then(|p| p.height)
            .unwrap_or(f64::INFINITY)
    }

    pub fn drawings(&self, page: u32) -> Option<&'d [DrawingPrimitive]> {
        self.drawings.get(&page).map(Vec::as_slice)
    }
}

pub struct ChainFinder<'s> {
    settings: &'s MergeSettings,
}

impl<'s> ChainFinder<'s> {
    pub fn new(settings: &'s MergeSettings) -> Self {
        Self { settings }
    }

    /// Find the merge chains among `fragments`.
    ///
    /// Malformed fragments are logged and skipped. Without a layout index
    /// the paragraph interruption check is not applied.
    pub fn find_chains(
        &self,
        fragments: &[TableFragment],
        pages: &PageLookup<'_>,
        layout: Option<&dyn LayoutIndex>,
    ) -> ChainSearch {
        let mut search = ChainSearch::default();

        let mut valid: Vec<&TableFragment> = Vec::with_capacity(fragments.len());
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for f in fragments {
            if let Err(e) = f.validate() {
                warn!(table = %f.id, error = %e, "skipping malformed fragment");
                search.skipped.push(SkippedFragment {
                    id: f.id.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
            if !seen.insert(f.id.as_str()) {
                warn!(table = %f.id, "skipping fragment with duplicate id");
                search.skipped.push(SkippedFragment {
                    id: f.id.clone(),
                    reason: "duplicate fragment id".into(),
                });
                continue;
            }
            valid.push(f);
        }

        let fingerprints = self.fingerprint_all(&valid, pages);

        let mut by_page: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, fp) in fingerprints.iter().enumerate() {
            by_page.entry(fp.page_num).or_default().push(i);
        }

        let scorer = Scorer::new(&self.settings.scoring);
        let threshold = scorer.threshold();
        let mut eligible: Vec<usize> = Vec::new();
        let mut above_per_prev: FxHashMap<&str, usize> = FxHashMap::default();

        for (page, prev_idxs) in &by_page {
            // continuations never skip a page
            let Some(next_idxs) = page.checked_add(1).and_then(|p| by_page.get(&p)) else {
                continue;
            };
            for &pi in prev_idxs {
                for &ni in next_idxs {
                    let prev = &fingerprints[pi];
                    let next = &fingerprints[ni];
                    let candidate = scorer.score(prev, next);
                    debug!(
                        prev = %candidate.prev_id,
                        next = %candidate.next_id,
                        score = candidate.score,
                        geometry = candidate.geometry_score,
                        structure = candidate.structure_score,
                        visual = candidate.visual_score,
                        "scored candidate"
                    );

                    let rejected = if candidate.score < threshold {
                        Some(RejectReason::BelowThreshold)
                    } else {
                        *above_per_prev.entry(prev.table_id.as_str()).or_default() += 1;
                        if self.interrupted_by_paragraph(prev, next, pages, layout) {
                            Some(RejectReason::ParagraphInterruption)
                        } else {
                            None
                        }
                    };
                    if let Some(reason) = rejected {
                        debug!(prev = %candidate.prev_id, next = %candidate.next_id, ?reason, "rejected candidate");
                    } else {
                        eligible.push(search.candidates.len());
                    }
                    search.candidates.push(CandidateRecord {
                        candidate,
                        accepted: false,
                        rejected,
                    });
                }
            }
        }

        let mut ambiguous: Vec<String> = above_per_prev
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id.to_string())
            .collect();
        ambiguous.sort();
        search.ambiguous = ambiguous;

        let links = assemble_links(&mut search.candidates, eligible);
        search.chains = chains_from_links(&links, &fingerprints);
        search
    }

    fn fingerprint_all<'a>(
        &self,
        fragments: &[&'a TableFragment],
        pages: &PageLookup<'_>,
    ) -> Vec<TableFingerprint<'a>> {
        let fallback = page_width_fallback(fragments);
        let generator = FingerprintGenerator::new(self.settings);
        let one = |f: &&'a TableFragment| {
            let width = pages.width(f.page).unwrap_or_else(|| {
                warn!(table = %f.id, page = f.page, "page width unknown, using table extent");
                fallback.get(&f.page).copied().unwrap_or(f.bbox.x1)
            });
            generator.generate(*f, width, pages.drawings(f.page))
        };
        if self.settings.parallel_fingerprints {
            fragments.par_iter().map(one).collect()
        } else {
            fragments.iter().map(one).collect()
        }
    }

    /// Whether prose sits between `prev` and the bottom margin of its page or
    /// between the top margin and `next` on the following page. Running
    /// headers and footers inside the margins do not count.
    fn interrupted_by_paragraph(
        &self,
        prev: &TableFingerprint<'_>,
        next: &TableFingerprint<'_>,
        pages: &PageLookup<'_>,
        layout: Option<&dyn LayoutIndex>,
    ) -> bool {
        let Some(layout) = layout else {
            return false;
        };
        let band = |page: u32, y_start: f64, y_end: f64| {
            y_end > y_start && layout.has_text_block_between(page, y_start, y_end)
        };
        let below_prev = band(
            prev.page_num,
            prev.bbox.y1,
            pages.height(prev.page_num) - self.settings.bottom_margin,
        );
        let above_next = band(next.page_num, self.settings.top_margin, next.bbox.y0);
        below_prev || above_next
    }
}

/// Largest right edge of any fragment per page, the best available stand-in
/// for a missing page width.
fn page_width_fallback(fragments: &[&TableFragment]) -> BTreeMap<u32, f64> {
    let mut out: BTreeMap<u32, f64> = BTreeMap::new();
    for f in fragments {
        let w = out.entry(f.page).or_insert(f.bbox.x1);
        *w = w.max(f.bbox.x1);
    }
    out
}

/// Greedy link assignment in descending score order.
///
/// Equal scores are ordered by earlier page, then prev id, then next id.
/// Returns `prev_id -> next_id`.
fn assemble_links(
    records: &mut [CandidateRecord],
    mut eligible: Vec<usize>,
) -> FxHashMap<String, String> {
    eligible.sort_by(|&a, &b| {
        let ca = &records[a].candidate;
        let cb = &records[b].candidate;
        OrderedFloat(cb.score)
            .cmp(&OrderedFloat(ca.score))
            .then(ca.prev_page.cmp(&cb.prev_page))
            .then_with(|| ca.prev_id.cmp(&cb.prev_id))
            .then_with(|| ca.next_id.cmp(&cb.next_id))
    });

    let mut used_prev: FxHashSet<String> = FxHashSet::default();
    let mut used_next: FxHashSet<String> = FxHashSet::default();
    let mut links: FxHashMap<String, String> = FxHashMap::default();

    for idx in eligible {
        let record = &mut records[idx];
        let c = &record.candidate;
        if used_prev.contains(&c.prev_id) || used_next.contains(&c.next_id) {
            debug!(prev = %c.prev_id, next = %c.next_id, "candidate ids already consumed");
            record.rejected = Some(RejectReason::AlreadyConsumed);
            continue;
        }
        used_prev.insert(c.prev_id.clone());
        used_next.insert(c.next_id.clone());
        links.insert(c.prev_id.clone(), c.next_id.clone());
        record.accepted = true;
    }
    links
}

/// Walk links from their heads. Chains are ordered by the position of
/// their first fragment (page, top, id).
fn chains_from_links(
    links: &FxHashMap<String, String>,
    fingerprints: &[TableFingerprint<'_>],
) -> Vec<Vec<String>> {
    let position: FxHashMap<&str, (u32, OrderedFloat<f64>)> = fingerprints
        .iter()
        .map(|fp| (fp.table_id.as_str(), (fp.page_num, OrderedFloat(fp.bbox.y0))))
        .collect();
    let successors: FxHashSet<&str> = links.values().map(String::as_str).collect();

    let mut heads: Vec<&str> = links
        .keys()
        .map(String::as_str)
        .filter(|id| !successors.contains(id))
        .collect();
    heads.sort_by_key(|id| (position.get(id).copied(), *id));

    heads
        .into_iter()
        .map(|head| {
            let mut chain = vec![head.to_string()];
            let mut cur = head;
            while let Some(next) = links.get(cur) {
                chain.push(next.clone());
                cur = next.as_str();
            }
            chain
        })
        .collect()
}
