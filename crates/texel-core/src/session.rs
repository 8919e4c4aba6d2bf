//! The round-based session driver.
//!
//! A session tunes every selected coefficient once per round, then keeps the
//! most volatile half (lowest residual delta) for the next round, until a
//! round changes nothing or the list halves away. The vector file is
//! rewritten after every coefficient so an interrupted run loses at most one
//! coefficient's work.

use std::path::PathBuf;

use log::{info, warn};

use crate::backend::EvalBackend;
use crate::config::TunerConfig;
use crate::error::TuneResult;
use crate::search::tune_single;
use crate::vector::CoefficientVector;

/// Outcome of a whole tuning session.
#[derive(Clone, Copy, Debug)]
pub struct SessionSummary {
    /// Residual of the best vector found.
    pub residual: f64,
    /// Number of rounds executed.
    pub rounds: usize,
    /// Whether any coefficient changed value.
    pub changed: bool,
}

/// Owns the authoritative vector and drives tuning against a backend.
pub struct TuningSession {
    vector: CoefficientVector,
    config: TunerConfig,
    path: PathBuf,
}

impl TuningSession {
    pub fn new(vector: CoefficientVector, config: TunerConfig, path: PathBuf) -> Self {
        Self {
            vector,
            config,
            path,
        }
    }

    pub fn vector(&self) -> &CoefficientVector {
        &self.vector
    }

    /// Indices to tune, honoring the name filter, sorted by ascending delta
    /// so last run's biggest improvers go first.
    fn coefficient_list(&self) -> Vec<usize> {
        let mut list: Vec<usize> = if self.config.coefficients.is_empty() {
            (0..self.vector.len()).collect()
        } else {
            for name in &self.config.coefficients {
                if self.vector.index_of(name).is_none() {
                    warn!("unknown coefficient id {name}");
                }
            }
            (0..self.vector.len())
                .filter(|&i| {
                    self.config
                        .coefficients
                        .iter()
                        .any(|name| name == self.vector.name(i))
                })
                .collect()
        };
        list.sort_by(|&a, &b| self.vector.delta(a).total_cmp(&self.vector.delta(b)));
        list
    }

    /// Run the session to completion. The backend must already hold the
    /// vector's current values.
    pub fn run<B: EvalBackend + ?Sized>(&mut self, backend: &mut B) -> TuneResult<SessionSummary> {
        let initial = backend.evaluate(false)?;
        let mut best_residual = initial.residual;
        info!(
            "vector filename {:?} residual {best_residual:.9} positions {} depth {}",
            self.path,
            backend.corpus_len(),
            self.config.depth
        );

        if self.config.quit_after_initial {
            return Ok(SessionSummary {
                residual: best_residual,
                rounds: 0,
                changed: false,
            });
        }
        backend.update()?;

        let mut coef_list = self.coefficient_list();
        let mut rounds = 0;
        let mut changed = false;
        let mut exhausted = false;

        while !coef_list.is_empty() && !exhausted {
            rounds += 1;
            info!("round {rounds} count {}", coef_list.len());

            exhausted = true;
            for &coef in &coef_list {
                let old_value = self.vector.value(coef);
                let name = self.vector.name(coef).to_string();
                let outcome =
                    tune_single(backend, coef, &name, old_value, best_residual, &self.config)?;

                let delta_residual = outcome.residual - best_residual;
                self.vector.set_delta(coef, delta_residual);

                if outcome.value != old_value {
                    info!(
                        "update id {name} residual {:.9} delta {delta_residual:.3e} \
                         active {} oldValue {old_value} newValue {}",
                        outcome.residual, outcome.active, outcome.value
                    );
                    self.vector.set_value(coef, outcome.value);
                    best_residual = outcome.residual;
                    changed = true;
                    exhausted = false;
                }
                self.vector.write(&self.path)?;
            }

            // Keep the most volatile half for the next round.
            coef_list.sort_by(|&a, &b| self.vector.delta(a).total_cmp(&self.vector.delta(b)));
            coef_list.truncate(coef_list.len() / 2);
        }

        info!(
            "vector filename {:?} residual {best_residual:.9} positions {} depth {}",
            self.path,
            backend.corpus_len(),
            self.config.depth
        );

        Ok(SessionSummary {
            residual: best_residual,
            rounds,
            changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::corpus::TestRecord;
    use crate::oracle::testing::LinearOracle;

    fn even_money_corpus(n: usize) -> Vec<TestRecord> {
        (0..n)
            .map(|i| TestRecord::new(format!("pos{i}"), 0.5))
            .collect()
    }

    fn session_parts(path: PathBuf) -> (TuningSession, LocalBackend<LinearOracle>) {
        let mut schema = LinearOracle { value: 40, weight: 0.01 };
        let vector = CoefficientVector::from_oracle(&mut schema).unwrap();

        let oracle = LinearOracle { value: 0, weight: 0.01 };
        let backend =
            LocalBackend::new(oracle, even_money_corpus(5), 0, vector.values()).unwrap();
        let session = TuningSession::new(vector, TunerConfig::default(), path);
        (session, backend)
    }

    #[test]
    fn session_tunes_to_the_optimum_and_persists_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.json");
        let (mut session, mut backend) = session_parts(path.clone());

        let summary = session.run(&mut backend).unwrap();
        assert!(summary.changed);
        assert!(summary.residual < 1e-12);
        assert_eq!(session.vector().value(0), 0);

        let text = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<(String, i64, f64)> = serde_json::from_str(&text).unwrap();
        assert_eq!(entries[0].0, "linear");
        assert_eq!(entries[0].1, 0);
    }

    #[test]
    fn quit_after_initial_skips_tuning_and_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.json");
        let (mut session, mut backend) = session_parts(path.clone());
        session.config.quit_after_initial = true;

        let summary = session.run(&mut backend).unwrap();
        assert_eq!(summary.rounds, 0);
        assert!(!summary.changed);
        assert_eq!(session.vector().value(0), 40, "vector is untouched");
        assert!(!path.exists(), "no write happens before tuning starts");
    }

    #[test]
    fn name_filter_limits_the_coefficient_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.json");
        let (mut session, mut backend) = session_parts(path);
        session.config.coefficients = vec!["no-such-id".to_string()];

        let summary = session.run(&mut backend).unwrap();
        assert_eq!(summary.rounds, 0);
        assert!(!summary.changed);
        assert_eq!(session.vector().value(0), 40);
    }

    #[test]
    fn already_optimal_vector_reports_no_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.json");

        let mut schema = LinearOracle { value: 0, weight: 0.01 };
        let vector = CoefficientVector::from_oracle(&mut schema).unwrap();
        let oracle = LinearOracle { value: 0, weight: 0.01 };
        let mut backend =
            LocalBackend::new(oracle, even_money_corpus(5), 0, vector.values()).unwrap();
        let mut session = TuningSession::new(vector, TunerConfig::default(), path);

        let summary = session.run(&mut backend).unwrap();
        assert!(!summary.changed);
        assert_eq!(summary.rounds, 1, "one round proves exhaustion");
        assert_eq!(session.vector().value(0), 0);
    }
}
