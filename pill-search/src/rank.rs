//! Result rank filtering
//!
//! A fixed top-k is often wrong: sometimes one hit is clearly the pill,
//! sometimes five are tied. The filter looks for a natural break in the
//! descending score curve and keeps only the hits above it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RankConfig;

/// A scored hit as returned by the search engine
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RankedHit<D = Value> {
    pub score: f32,
    pub document: D,
}

/// Hits retained by the filter, with the cutoffs that produced them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterDecision<D = Value> {
    pub hits: Vec<RankedHit<D>>,
    /// Number of hits kept
    pub cutoff: usize,
    /// Cutoff suggested by the first large score drop
    pub gap_cutoff: usize,
    /// Cutoff suggested by the absolute score floor
    pub threshold_cutoff: usize,
}

impl<D> FilterDecision<D> {
    fn keep_all(hits: Vec<RankedHit<D>>) -> Self {
        let n = hits.len();
        Self {
            hits,
            cutoff: n,
            gap_cutoff: n,
            threshold_cutoff: n,
        }
    }
}

/// Trim `hits` (sorted by descending score) to the meaningful prefix.
///
/// The cutoff is the earlier of the first gap larger than
/// `gap_ratio_threshold * top` and the first score below
/// `absolute_ratio_threshold * top`, raised to `min_results` and capped at
/// `max_results`.
pub fn filter_ranked<D>(
    hits: Vec<RankedHit<D>>,
    min_results: usize,
    max_results: usize,
    gap_ratio_threshold: f32,
    absolute_ratio_threshold: f32,
) -> FilterDecision<D> {
    if hits.len() <= min_results {
        return FilterDecision::keep_all(hits);
    }

    let top = hits[0].score;
    let gap_ratio = |i: usize| {
        if top == 0.0 {
            0.0
        } else {
            (hits[i].score - hits[i + 1].score) / top
        }
    };

    let gap_cutoff = (0..hits.len() - 1)
        .find(|&i| gap_ratio(i) > gap_ratio_threshold)
        .map_or(hits.len(), |i| i + 1);

    let floor = top * absolute_ratio_threshold;
    let threshold_cutoff = hits
        .iter()
        .position(|hit| hit.score < floor)
        .unwrap_or(hits.len());

    let cutoff = gap_cutoff
        .min(threshold_cutoff)
        .max(min_results)
        .min(max_results);

    tracing::debug!(
        total = hits.len(),
        top_score = top,
        gap_cutoff,
        threshold_cutoff,
        cutoff,
        "rank filter"
    );

    let mut hits = hits;
    hits.truncate(cutoff);
    FilterDecision {
        hits,
        cutoff,
        gap_cutoff,
        threshold_cutoff,
    }
}

/// [`filter_ranked`] with the thresholds from `config`
pub fn filter_with_config<D>(
    hits: Vec<RankedHit<D>>,
    max_results: usize,
    config: &RankConfig,
) -> FilterDecision<D> {
    let min_results = config.min_results.min(max_results);
    filter_ranked(
        hits,
        min_results,
        max_results,
        config.gap_ratio_threshold,
        config.absolute_ratio_threshold,
    )
}
