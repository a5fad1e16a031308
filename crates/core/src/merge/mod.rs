//! Cross-page table merging.
//!
//! This module turns independently extracted per-page table fragments into
//! logical tables: fragments are fingerprinted, scored pairwise across
//! consecutive pages, linked into chains, and merged with repeated headers
//! removed.

mod batch;
mod border;
mod chain;
mod fingerprint;
mod header;
mod hints;
mod layout_index;
mod merger;
mod pipeline;
mod scorer;
mod settings;
mod types;

// Re-export public types
pub use batch::DocumentBatch;
pub use border::{BorderDetector, BorderEvidence};
pub use chain::{
    CandidateRecord, ChainFinder, ChainSearch, PageLookup, RejectReason, SkippedFragment,
};
pub use fingerprint::{FingerprintGenerator, TableFingerprint, column_edges};
pub use layout_index::{LayoutIndex, TextBlock, TextBlockIndex};
pub use merger::{CELL_MERGE_METHOD_TAG, FragmentIndex, MERGE_METHOD_TAG, TableMerger};
pub use scorer::{MergeCandidate, Scorer};
pub use settings::{BorderSettings, HeaderSettings, MergeSettings, ScoreSettings};
pub use types::{
    BBox, Cell, Column, ContinuationHint, DrawingPrimitive, HeaderInfo, LineSegment,
    MergedTable, PageDrawings, PageInfo, Row, TableFragment,
};

// Re-export public API functions
pub use header::{classify_headers, detect_repeated_header_rows, recover_misidentified_headers};
pub use hints::build_hints;
pub use pipeline::{MergeOutcome, find_chains, merge_all_tables};
