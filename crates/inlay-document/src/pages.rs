// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page selection — turn a caller's 1-based page selector into zero-based
// page indices bounded by the document length.

use inlay_core::PageSelector;

/// Resolve `selector` against a document of `total_pages` pages.
///
/// The result is ascending and duplicate-free. References outside
/// `1..=total_pages` are dropped, never reported: one instruction set may be
/// applied to documents of different lengths.
pub fn resolve(selector: &PageSelector, total_pages: usize) -> Vec<usize> {
    let in_range = |n: i64| n >= 1 && (n as u64) <= total_pages as u64;

    match selector {
        PageSelector::All => (0..total_pages).collect(),
        PageSelector::First if total_pages > 0 => vec![0],
        PageSelector::Last if total_pages > 0 => vec![total_pages - 1],
        PageSelector::First | PageSelector::Last => Vec::new(),
        PageSelector::Single(n) if in_range(*n) => vec![(*n - 1) as usize],
        PageSelector::Single(_) => Vec::new(),
        PageSelector::List(list) => {
            let mut indices: Vec<usize> = list
                .iter()
                .copied()
                .filter(|n| in_range(*n))
                .map(|n| (n - 1) as usize)
                .collect();
            indices.sort_unstable();
            indices.dedup();
            indices
        }
    }
}
