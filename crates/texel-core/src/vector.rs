//! The authoritative coefficient vector and its persistence.
//!
//! The vector file is a JSON array of `[name, value, delta]` triples, sorted
//! by ascending delta (most improving first) so the head of the file shows
//! where the last run found its gains. The file is rewritten after every
//! tuned coefficient, which makes a session resumable and inspectable at any
//! point.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::warn;

use crate::error::{TuneError, TuneResult};
use crate::oracle::Oracle;

/// Delta assigned to coefficients the file has never seen. Negative so new
/// coefficients sort ahead of everything a previous run measured.
const NEW_COEFFICIENT_DELTA: f64 = -1.0;

/// Ordered, named set of tunable integers. The single source of truth for a
/// session: workers hold private applied copies, never this struct.
#[derive(Clone, Debug)]
pub struct CoefficientVector {
    names: Vec<String>,
    values: Vec<i64>,
    deltas: Vec<f64>,
}

impl CoefficientVector {
    /// Discover the oracle's schema by probing indices upward until it
    /// signals out-of-range. Each probe writes a placeholder and immediately
    /// restores the previous value, so the oracle ends up unchanged.
    pub fn from_oracle<O: Oracle + ?Sized>(oracle: &mut O) -> TuneResult<Self> {
        let mut names = Vec::new();
        let mut values = Vec::new();
        let mut index = 0;
        while let Some(coef) = oracle.set_coefficient(index, 0)? {
            oracle.set_coefficient(index, coef.previous)?;
            names.push(coef.name);
            values.push(coef.previous);
            index += 1;
        }
        let deltas = vec![NEW_COEFFICIENT_DELTA; names.len()];
        Ok(Self {
            names,
            values,
            deltas,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn value(&self, index: usize) -> i64 {
        self.values[index]
    }

    pub fn set_value(&mut self, index: usize, value: i64) {
        self.values[index] = value;
    }

    pub fn delta(&self, index: usize) -> f64 {
        self.deltas[index]
    }

    pub fn set_delta(&mut self, index: usize, delta: f64) {
        self.deltas[index] = delta;
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Overlay values from a previously persisted vector file.
    ///
    /// A missing or unparseable file is recoverable: the run continues with
    /// the oracle's compiled-in defaults. Unknown names are reported per name
    /// and skipped; the rest of the file still applies.
    pub fn merge_file(&mut self, path: &Path) {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("cannot read {}: {e}; continuing with oracle defaults", path.display());
                return;
            }
        };
        let entries: Vec<(String, i64, f64)> = match serde_json::from_str(&text) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("invalid vector file {}: {e}; continuing with oracle defaults", path.display());
                return;
            }
        };
        for (name, value, delta) in entries {
            match self.index_of(&name) {
                Some(index) => {
                    self.values[index] = value;
                    self.deltas[index] = delta;
                }
                None => warn!("unknown coefficient id {name}"),
            }
        }
    }

    /// Persist the full vector with its delta-priority metadata.
    pub fn write(&self, path: &Path) -> TuneResult<()> {
        let mut entries: Vec<(String, i64, f64)> = self
            .names
            .iter()
            .cloned()
            .zip(self.values.iter().copied())
            .zip(self.deltas.iter().copied())
            .map(|((name, value), delta)| (name, value, delta))
            .collect();
        // Stable sort: equal deltas keep schema order.
        entries.sort_by(|a, b| a.2.total_cmp(&b.2));

        let file = File::create(path).map_err(TuneError::Io)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &entries)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::FixedOracle;

    fn sample_oracle() -> FixedOracle {
        FixedOracle {
            coefficients: vec![
                ("pawn".to_string(), 100),
                ("knight".to_string(), 325),
                ("rook".to_string(), 500),
            ],
        }
    }

    #[test]
    fn schema_enumeration_restores_oracle_state() {
        let mut oracle = sample_oracle();
        let vector = CoefficientVector::from_oracle(&mut oracle).unwrap();
        assert_eq!(vector.len(), 3);
        assert_eq!(vector.name(1), "knight");
        assert_eq!(vector.value(2), 500);
        // Probing must not leave placeholder zeros behind.
        assert_eq!(oracle.coefficients[0].1, 100);
        assert_eq!(oracle.coefficients[2].1, 500);
    }

    #[test]
    fn merge_overrides_matching_names_only() {
        let mut oracle = sample_oracle();
        let mut vector = CoefficientVector::from_oracle(&mut oracle).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.json");
        std::fs::write(
            &path,
            r#"[["knight", 310, -0.002], ["queen", 900, 0.0]]"#,
        )
        .unwrap();

        vector.merge_file(&path);
        assert_eq!(vector.value(0), 100, "missing names keep defaults");
        assert_eq!(vector.value(1), 310);
        assert_eq!(vector.delta(1), -0.002);
    }

    #[test]
    fn missing_file_keeps_defaults() {
        let mut oracle = sample_oracle();
        let mut vector = CoefficientVector::from_oracle(&mut oracle).unwrap();
        vector.merge_file(Path::new("/nonexistent/vector.json"));
        assert_eq!(vector.values(), &[100, 325, 500]);
    }

    #[test]
    fn write_then_merge_round_trips() {
        let mut oracle = sample_oracle();
        let mut vector = CoefficientVector::from_oracle(&mut oracle).unwrap();
        vector.set_value(0, 95);
        vector.set_delta(0, -0.0003);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.json");
        vector.write(&path).unwrap();

        let mut reloaded = CoefficientVector::from_oracle(&mut sample_oracle()).unwrap();
        reloaded.merge_file(&path);
        assert_eq!(reloaded.values(), vector.values());
        assert_eq!(reloaded.delta(0), -0.0003);
    }

    #[test]
    fn file_is_sorted_by_ascending_delta() {
        let mut oracle = sample_oracle();
        let mut vector = CoefficientVector::from_oracle(&mut oracle).unwrap();
        vector.set_delta(0, 0.5);
        vector.set_delta(1, -0.25);
        vector.set_delta(2, 0.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.json");
        vector.write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<(String, i64, f64)> = serde_json::from_str(&text).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.0.as_str()).collect();
        assert_eq!(names, vec!["knight", "rook", "pawn"]);
    }
}
