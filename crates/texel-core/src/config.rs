//! Tuning run configuration.

use crate::error::{TuneError, TuneResult};

/// Settings for one tuning session, passed into the driver at construction.
///
/// The probe/window knobs apply per coefficient; the worker knobs shape the
/// evaluation backend. All fields are fixed for the lifetime of a session.
#[derive(Clone, Debug)]
pub struct TunerConfig {
    /// Number of parallel workers. 0 runs the identical algorithm in-process.
    pub workers: usize,
    /// Search depth per position evaluation. 0 means static/quiescence only.
    pub depth: u32,
    /// Number of probes across a window before it shrinks. Must be >= 2.
    pub steps: usize,
    /// Active positions observed in one probe before evaluations stop
    /// tracking cache diffs ("dirty mode"). `None` disables the shortcut.
    pub max_active: Option<usize>,
    /// Report the initial residual and stop without tuning.
    pub quit_after_initial: bool,
    /// Coefficient names to tune. Empty means all coefficients.
    pub coefficients: Vec<String>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            depth: 0,
            steps: 2,
            max_active: None,
            quit_after_initial: false,
            coefficients: Vec::new(),
        }
    }
}

impl TunerConfig {
    /// Reject configurations the search cannot run with.
    ///
    /// Window probing places `steps` candidates at `window / (steps - 1)`
    /// spacing, so a single-probe window is a configuration error.
    pub fn validate(&self) -> TuneResult<()> {
        if self.steps < 2 {
            return Err(TuneError::Config(format!(
                "steps must be at least 2, got {}",
                self.steps
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TunerConfig::default().validate().is_ok());
    }

    #[test]
    fn single_probe_window_is_rejected() {
        let cfg = TunerConfig {
            steps: 1,
            ..TunerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(TuneError::Config(_))));
    }
}
