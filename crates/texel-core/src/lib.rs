//! Coordinate-descent tuning of integer evaluation coefficients against a
//! corpus of labeled positions.
//!
//! The library is oracle-agnostic: anything implementing [`Oracle`] can be
//! tuned. A [`TuningSession`] drives per-coefficient window searches through
//! an [`EvalBackend`], which is either the in-process [`LocalBackend`] or a
//! [`WorkerPool`] sharding the corpus over threads.

pub mod backend;
pub mod config;
pub mod corpus;
pub mod error;
pub mod oracle;
pub mod residual;
pub mod search;
pub mod session;
pub mod vector;
pub mod worker;

pub use backend::{EvalBackend, Evaluation, LocalBackend};
pub use config::TunerConfig;
pub use corpus::TestRecord;
pub use error::{TuneError, TuneResult};
pub use oracle::{Coefficient, Oracle};
pub use session::{SessionSummary, TuningSession};
pub use vector::CoefficientVector;
pub use worker::WorkerPool;
