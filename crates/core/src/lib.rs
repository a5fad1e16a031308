//! pagestitch - cross-page table merging for untagged PDFs.
//!
//! Table extractors work one page at a time, so a table that runs over a
//! page break comes out as several fragments. This crate decides which
//! fragments belong together and merges them into logical tables.

pub mod error;
pub mod merge;
pub mod utils;

pub use error::{MergeError, Result};
pub use merge::{DocumentBatch, MergeOutcome, MergeSettings, merge_all_tables};
