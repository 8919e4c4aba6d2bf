//! Residual evaluation with a passive-score fast path.
//!
//! A position is "passive" while its score has stayed constant since the last
//! checkpoint; the cache lets those positions skip the oracle entirely. A
//! fresh evaluation that disagrees with the cached score evicts the entry and
//! counts the position as "active" under the new coefficient value. Repeated
//! evaluations under an unchanging vector therefore converge toward a fully
//! trustworthy cache.

use std::collections::HashMap;

use crate::corpus::TestRecord;
use crate::error::TuneResult;
use crate::oracle::Oracle;

/// Fixed logistic mapping from a pawn-unit score to a winning probability.
/// The 4.0 scaling is part of the objective, not a tunable.
pub fn score_to_probability(score: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf(-score / 4.0))
}

/// Per-shard memo of positions whose score has stayed constant since the
/// last checkpoint.
#[derive(Clone, Debug, Default)]
pub struct PassiveCache {
    scores: HashMap<String, f64>,
}

impl PassiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, position: &str) -> Option<f64> {
        self.scores.get(position).copied()
    }

    pub fn evict(&mut self, position: &str) {
        self.scores.remove(position);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Rebuild the cache from a checkpoint baseline: one score per record,
    /// in corpus order.
    pub fn rebuild(&mut self, records: &[TestRecord], scores: &[f64]) {
        self.scores.clear();
        for (record, &score) in records.iter().zip(scores) {
            self.scores.insert(record.position.clone(), score);
        }
    }
}

/// Outcome of evaluating one shard under the current coefficient state.
#[derive(Clone, Debug)]
pub struct ShardEvaluation {
    /// Sum of squared errors between predicted and target probabilities.
    pub sum_squared_errors: f64,
    /// Per-position scores in corpus order, cached or fresh.
    pub scores: Vec<f64>,
    /// Positions whose score changed since the last checkpoint.
    pub active: usize,
}

/// Evaluate `records` against the oracle, reusing cached scores when
/// `use_cache` allows it. The cache is mutated in place: entries that
/// disagree with a fresh evaluation are evicted.
pub fn evaluate_shard<O: Oracle + ?Sized>(
    oracle: &mut O,
    records: &[TestRecord],
    passive: &mut PassiveCache,
    use_cache: bool,
    depth: u32,
) -> TuneResult<ShardEvaluation> {
    let mut sum_squared_errors = 0.0;
    let mut scores = Vec::with_capacity(records.len());
    let mut active = 0;

    for record in records {
        let cached = passive.get(&record.position);
        let score = match cached {
            Some(score) if use_cache => score,
            _ => {
                let fresh = oracle.evaluate(&record.position, depth)?;
                match cached {
                    Some(old) if fresh != old => {
                        passive.evict(&record.position);
                        active += 1;
                    }
                    Some(_) => {}
                    None => active += 1,
                }
                fresh
            }
        };
        scores.push(score);
        let p = score_to_probability(score);
        sum_squared_errors += (p - record.target) * (p - record.target);
    }

    Ok(ShardEvaluation {
        sum_squared_errors,
        scores,
        active,
    })
}
