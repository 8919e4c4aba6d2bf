//! The scoring oracle seam.
//!
//! The oracle is the external search/evaluation function being tuned. It owns
//! its coefficient state; the engine only mutates it through
//! [`Oracle::set_coefficient`] and reads scores through [`Oracle::evaluate`].

use crate::error::TuneResult;

/// Reply to a coefficient write: the value that was installed before, and the
/// coefficient's name. The same operation doubles as schema discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coefficient {
    pub previous: i64,
    pub name: String,
}

/// A position-scoring function with a mutable, indexed coefficient schema.
///
/// Implementations must be deterministic for a fixed coefficient state:
/// the caching strategy treats an unchanged score as proof that a position
/// is passive under the current vector.
pub trait Oracle {
    /// Install `value` at coefficient `index`. Returns `Ok(None)` when
    /// `index` is beyond the schema, which ends enumeration.
    fn set_coefficient(&mut self, index: usize, value: i64) -> TuneResult<Option<Coefficient>>;

    /// Score `position` at the given search depth, in pawn units from the
    /// side to move's point of view.
    fn evaluate(&mut self, position: &str, depth: u32) -> TuneResult<f64>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Mock oracles shared by the unit tests.

    use super::*;

    /// Scores every position as `weight * value` for a single coefficient.
    pub struct LinearOracle {
        pub value: i64,
        pub weight: f64,
    }

    impl Oracle for LinearOracle {
        fn set_coefficient(&mut self, index: usize, value: i64) -> TuneResult<Option<Coefficient>> {
            if index > 0 {
                return Ok(None);
            }
            let previous = self.value;
            self.value = value;
            Ok(Some(Coefficient {
                previous,
                name: "linear".to_string(),
            }))
        }

        fn evaluate(&mut self, _position: &str, _depth: u32) -> TuneResult<f64> {
            Ok(self.weight * self.value as f64)
        }
    }

    /// Ignores coefficients entirely and scores positions by name length.
    pub struct FixedOracle {
        pub coefficients: Vec<(String, i64)>,
    }

    impl Oracle for FixedOracle {
        fn set_coefficient(&mut self, index: usize, value: i64) -> TuneResult<Option<Coefficient>> {
            match self.coefficients.get_mut(index) {
                Some((name, current)) => {
                    let previous = *current;
                    *current = value;
                    Ok(Some(Coefficient {
                        previous,
                        name: name.clone(),
                    }))
                }
                None => Ok(None),
            }
        }

        fn evaluate(&mut self, position: &str, _depth: u32) -> TuneResult<f64> {
            Ok(position.len() as f64)
        }
    }
}
