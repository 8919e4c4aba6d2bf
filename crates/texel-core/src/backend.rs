//! The evaluation backend seam between the session driver and the corpus.
//!
//! The driver never touches oracles or shards directly; it speaks to an
//! [`EvalBackend`]. The worker pool implements the same contract over
//! channels ([`crate::worker::WorkerPool`]); [`LocalBackend`] runs the
//! identical algorithm in-process for the zero-worker configuration.

use crate::corpus::TestRecord;
use crate::error::{TuneError, TuneResult};
use crate::oracle::Oracle;
use crate::residual::{evaluate_shard, PassiveCache};

/// Aggregated outcome of one corpus evaluation.
#[derive(Clone, Copy, Debug)]
pub struct Evaluation {
    /// Root-mean-square error over the whole corpus.
    pub residual: f64,
    /// Number of positions whose score changed since the last checkpoint.
    pub active: usize,
}

/// Command surface the tuning driver requires from an evaluation backend.
///
/// Calls are strictly sequential: the driver never issues a new command
/// before the previous one returned.
pub trait EvalBackend {
    /// Total number of corpus records behind this backend.
    fn corpus_len(&self) -> usize;

    /// Apply `value` at coefficient `index` on every oracle instance.
    fn set_coefficient(&mut self, index: usize, value: i64) -> TuneResult<()>;

    /// Evaluate the full corpus under the current coefficient state.
    fn evaluate(&mut self, use_cache: bool) -> TuneResult<Evaluation>;

    /// Promote the last evaluation's scores into the checkpoint baseline.
    fn update(&mut self) -> TuneResult<()>;

    /// Rebuild the passive cache from the checkpoint baseline.
    fn next(&mut self) -> TuneResult<()>;
}

/// Single-threaded backend owning the whole corpus and one oracle.
pub struct LocalBackend<O> {
    oracle: O,
    records: Vec<TestRecord>,
    depth: u32,
    passive: PassiveCache,
    last_scores: Vec<f64>,
    best_scores: Option<Vec<f64>>,
}

impl<O: Oracle> LocalBackend<O> {
    /// Build the backend and install `initial` coefficient values on the
    /// oracle.
    pub fn new(
        mut oracle: O,
        records: Vec<TestRecord>,
        depth: u32,
        initial: &[i64],
    ) -> TuneResult<Self> {
        if records.is_empty() {
            return Err(TuneError::Config("corpus is empty".to_string()));
        }
        apply_vector(&mut oracle, initial)?;
        Ok(Self {
            oracle,
            records,
            depth,
            passive: PassiveCache::new(),
            last_scores: Vec::new(),
            best_scores: None,
        })
    }
}

/// Install every coefficient of `values` on an oracle, in index order.
pub(crate) fn apply_vector<O: Oracle + ?Sized>(oracle: &mut O, values: &[i64]) -> TuneResult<()> {
    for (index, &value) in values.iter().enumerate() {
        if oracle.set_coefficient(index, value)?.is_none() {
            return Err(TuneError::Oracle(format!(
                "coefficient index {index} out of range while applying vector"
            )));
        }
    }
    Ok(())
}

impl<O: Oracle> EvalBackend for LocalBackend<O> {
    fn corpus_len(&self) -> usize {
        self.records.len()
    }

    fn set_coefficient(&mut self, index: usize, value: i64) -> TuneResult<()> {
        match self.oracle.set_coefficient(index, value)? {
            Some(_) => Ok(()),
            None => Err(TuneError::Oracle(format!(
                "coefficient index {index} out of range"
            ))),
        }
    }

    fn evaluate(&mut self, use_cache: bool) -> TuneResult<Evaluation> {
        let eval = evaluate_shard(
            &mut self.oracle,
            &self.records,
            &mut self.passive,
            use_cache,
            self.depth,
        )?;
        let residual = (eval.sum_squared_errors / self.records.len() as f64).sqrt();
        self.last_scores = eval.scores;
        Ok(Evaluation {
            residual,
            active: eval.active,
        })
    }

    fn update(&mut self) -> TuneResult<()> {
        self.best_scores = Some(self.last_scores.clone());
        Ok(())
    }

    fn next(&mut self) -> TuneResult<()> {
        match &self.best_scores {
            Some(scores) => self.passive.rebuild(&self.records, scores),
            None => self.passive = PassiveCache::new(),
        }
        Ok(())
    }
}
