//! Geometry and comparison helpers shared by the merge engine.
//!
//! Provides:
//! - Page-width normalization of horizontal measurements
//! - Tolerant set similarity (Jaccard) over coordinate lists
//! - Order-preserving digests of hierarchical column paths
//! - 1-D clustering of coordinates
//! - Text normalization used by header comparison

use sha2::{Digest, Sha256};

/// Small epsilon for floating-point comparisons.
pub const EPSILON: f64 = 1e-9;

/// A 2D point (x, y).
pub type Point = (f64, f64);

/// Compares two floats for approximate equality.
#[inline]
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Express an x-coordinate as a fraction of the page width.
///
/// A non-positive page width carries no scale information, so every value
/// collapses to 0.0.
#[inline]
pub fn normalize_x(x: f64, page_width: f64) -> f64 {
    if page_width <= EPSILON || !page_width.is_finite() {
        return 0.0;
    }
    x / page_width
}

/// Linear closeness score: 1.0 for identical values, 0.0 once the difference
/// reaches `tolerance`.
#[inline]
pub fn closeness(a: f64, b: f64, tolerance: f64) -> f64 {
    if tolerance <= 0.0 {
        return if approx_eq(a, b, EPSILON) { 1.0 } else { 0.0 };
    }
    (1.0 - (a - b).abs() / tolerance).clamp(0.0, 1.0)
}

/// Jaccard similarity of two coordinate lists where values within
/// `tolerance` of each other count as the same element.
///
/// Each value is matched at most once. Two empty lists score 0.0: with no
/// boundaries there is nothing to align.
pub fn jaccard_with_tolerance(a: &[f64], b: &[f64], tolerance: f64) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut xs = a.to_vec();
    let mut ys = b.to_vec();
    xs.sort_by(f64::total_cmp);
    ys.sort_by(f64::total_cmp);

    let (mut i, mut j, mut matched) = (0usize, 0usize, 0usize);
    while i < xs.len() && j < ys.len() {
        let d = xs[i] - ys[j];
        if d.abs() <= tolerance + EPSILON {
            matched += 1;
            i += 1;
            j += 1;
        } else if d < 0.0 {
            i += 1;
        } else {
            j += 1;
        }
    }
    let union = xs.len() + ys.len() - matched;
    matched as f64 / union as f64
}

/// Order-preserving digest of a list of column paths.
///
/// Every component is length-prefixed so `[["ab"], ["c"]]` and
/// `[["a"], ["bc"]]` hash differently.
pub fn hash_col_paths(paths: &[Vec<String>]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((paths.len() as u64).to_le_bytes());
    for path in paths {
        hasher.update((path.len() as u64).to_le_bytes());
        for label in path {
            let label = normalize_text(label);
            hasher.update((label.len() as u64).to_le_bytes());
            hasher.update(label.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// Cluster a list of f64 values based on tolerance.
pub fn cluster_list(mut xs: Vec<f64>, tolerance: f64) -> Vec<Vec<f64>> {
    xs.sort_by(f64::total_cmp);
    if tolerance == 0.0 || xs.len() < 2 {
        return xs.into_iter().map(|x| vec![x]).collect();
    }
    let mut groups: Vec<Vec<f64>> = Vec::new();
    let mut current: Vec<f64> = vec![xs[0]];
    let mut last = xs[0];
    for x in xs.into_iter().skip(1) {
        if x <= last + tolerance {
            current.push(x);
        } else {
            groups.push(current);
            current = vec![x];
        }
        last = x;
    }
    groups.push(current);
    groups
}

/// Collapse internal whitespace runs and trim both ends.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a cell's text reads as a number (amounts, percentages, dates
/// written with digits and separators).
pub fn is_numeric_text(s: &str) -> bool {
    let t = s.trim();
    if t.is_empty() {
        return false;
    }
    let mut digits = 0usize;
    for ch in t.chars() {
        if ch.is_ascii_digit() {
            digits += 1;
        } else if !matches!(
            ch,
            '.' | ',' | '-' | '+' | '%' | '/' | '(' | ')' | ' ' | '$' | '€' | '¥' | '£' | '￥'
        ) {
            return false;
        }
    }
    digits > 0
}

/// Share of non-empty texts that are numeric; `None` when all are empty.
pub fn numeric_ratio<'a>(texts: impl IntoIterator<Item = &'a str>) -> Option<f64> {
    let mut filled = 0usize;
    let mut numeric = 0usize;
    for t in texts {
        if t.trim().is_empty() {
            continue;
        }
        filled += 1;
        if is_numeric_text(t) {
            numeric += 1;
        }
    }
    (filled > 0).then(|| numeric as f64 / filled as f64)
}

/// Jaccard similarity of two label lists compared after normalization.
pub fn label_jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let xs: Vec<String> = a.iter().map(|s| normalize_text(s)).collect();
    let ys: Vec<String> = b.iter().map(|s| normalize_text(s)).collect();
    let mut used = vec![false; ys.len()];
    let mut matched = 0usize;
    for x in &xs {
        if let Some(pos) = ys.iter().enumerate().position(|(k, y)| !used[k] && y == x) {
            used[pos] = true;
            matched += 1;
        }
    }
    matched as f64 / (xs.len() + ys.len() - matched) as f64
}
