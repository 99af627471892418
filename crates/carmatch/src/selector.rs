//! Catalog scan and best-match selection.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::features::FeatureSet;
use crate::types::{MatchCandidate, MatchResult, ReferenceEntry, VisionResult};

/// Every usable candidate of one scan, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub candidates: Vec<MatchCandidate>,
    pub scanned: usize,
    pub skipped: usize,
}

impl ScanReport {
    /// Reduce the scan to its best candidate. Ties go to the earlier catalog entry.
    pub fn best_match(&self) -> MatchResult {
        let best = self
            .candidates
            .iter()
            .fold(None, |best, candidate| keep_best(best, candidate));

        match best {
            Some(candidate) => {
                tracing::info!(
                    "Best match: {} (score {:.4}, entry {} of {})",
                    candidate.label,
                    candidate.similarity_score,
                    candidate.index + 1,
                    self.scanned
                );
                MatchResult::from_candidate(candidate.clone(), self.scanned, self.skipped)
            }
            None => {
                tracing::info!(
                    "No usable catalog entry ({} scanned, {} skipped)",
                    self.scanned,
                    self.skipped
                );
                MatchResult::not_found(self.scanned, self.skipped)
            }
        }
    }

    /// Top `k` candidates by score.
    pub fn top(&self, k: usize) -> Vec<MatchCandidate> {
        rank_candidates(&self.candidates, k)
    }
}

/// Scans a catalog and scores every entry against a query.
///
/// Ties go to the entry that appears first in the catalog, in both the
/// sequential and the parallel scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchSelector {
    parallel: bool,
}

impl MatchSelector {
    pub fn sequential() -> Self {
        Self { parallel: false }
    }

    /// Scan entries on the rayon worker pool.
    pub fn parallel() -> Self {
        Self { parallel: true }
    }

    /// Return the best entry for `query`.
    ///
    /// `extract` produces the features of one reference entry. Recoverable
    /// failures (see [`VisionError::is_recoverable`](crate::VisionError::is_recoverable))
    /// skip that entry; any other error from `extract` or `score` aborts the scan.
    pub fn select_best<E, S>(
        &self,
        query: &FeatureSet,
        catalog: &[ReferenceEntry],
        extract: E,
        score: S,
    ) -> VisionResult<MatchResult>
    where
        E: Fn(&ReferenceEntry) -> VisionResult<FeatureSet> + Sync,
        S: Fn(&FeatureSet, &FeatureSet) -> VisionResult<f32> + Sync,
    {
        Ok(self.score_all(query, catalog, extract, score)?.best_match())
    }

    /// Score every entry, keeping catalog order. Skipped entries are counted, not listed.
    pub fn score_all<E, S>(
        &self,
        query: &FeatureSet,
        catalog: &[ReferenceEntry],
        extract: E,
        score: S,
    ) -> VisionResult<ScanReport>
    where
        E: Fn(&ReferenceEntry) -> VisionResult<FeatureSet> + Sync,
        S: Fn(&FeatureSet, &FeatureSet) -> VisionResult<f32> + Sync,
    {
        let outcomes: Vec<Option<MatchCandidate>> = if self.parallel {
            catalog
                .par_iter()
                .enumerate()
                .map(|(index, entry)| evaluate(index, entry, query, &extract, &score))
                .collect::<VisionResult<_>>()?
        } else {
            catalog
                .iter()
                .enumerate()
                .map(|(index, entry)| evaluate(index, entry, query, &extract, &score))
                .collect::<VisionResult<_>>()?
        };

        let scanned = outcomes.len();
        let candidates: Vec<MatchCandidate> = outcomes.into_iter().flatten().collect();
        Ok(ScanReport {
            skipped: scanned - candidates.len(),
            candidates,
            scanned,
        })
    }
}

/// Top `k` candidates by score; equal scores keep catalog order.
pub fn rank_candidates(candidates: &[MatchCandidate], k: usize) -> Vec<MatchCandidate> {
    let mut ranked = candidates.to_vec();
    ranked.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    ranked.truncate(k);
    ranked
}

fn keep_best<'a>(
    current: Option<&'a MatchCandidate>,
    candidate: &'a MatchCandidate,
) -> Option<&'a MatchCandidate> {
    match current {
        Some(best) if !candidate.beats(best) => Some(best),
        _ => Some(candidate),
    }
}

/// Extract and score one entry. `Ok(None)` means the entry was skipped.
fn evaluate<E, S>(
    index: usize,
    entry: &ReferenceEntry,
    query: &FeatureSet,
    extract: &E,
    score: &S,
) -> VisionResult<Option<MatchCandidate>>
where
    E: Fn(&ReferenceEntry) -> VisionResult<FeatureSet>,
    S: Fn(&FeatureSet, &FeatureSet) -> VisionResult<f32>,
{
    let features = match extract(entry) {
        Ok(features) => features,
        Err(e) if e.is_recoverable() => {
            tracing::warn!(
                "Skipping catalog entry {} ({}, {}): {e}",
                index,
                entry.label,
                entry.image_source
            );
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let similarity = score(query, &features)?;
    if !similarity.is_finite() {
        tracing::warn!("Skipping catalog entry {index} ({}): non-finite score", entry.label);
        return Ok(None);
    }

    tracing::debug!("Entry {index} ({}) scored {similarity:.4}", entry.label);
    Ok(Some(MatchCandidate {
        index,
        label: entry.label.clone(),
        similarity_score: similarity,
    }))
}
