//! Per-coefficient hill climbing with an adaptive probe window.
//!
//! One call to [`tune_single`] optimizes a single coefficient while all
//! others stay fixed. The search probes a few evenly spaced integer values
//! around the best known one, memoizes every probed residual, and narrows or
//! widens the window depending on where the best value sits in it. A final
//! quadratic fit over the nearest memoized points squeezes out one more
//! candidate before the winner is installed.

use std::collections::HashMap;

use log::info;

use crate::backend::EvalBackend;
use crate::config::TunerConfig;
use crate::error::TuneResult;

/// Initial probe window, scaled by the coefficient's sensitivity. A value in
/// the flat tail of the sigmoid moves the prediction little per unit, so it
/// gets a wide window; the slope is clipped at 1% to bound the width.
pub fn initial_window(value: i64) -> f64 {
    let sigmoid = 1.0 / (1.0 + (-(value as f64) * 1e-3).exp());
    let slope = sigmoid * (1.0 - sigmoid);
    0.02 / slope.max(0.01) * 1e3
}

/// Extreme of a least-squares quadratic through `(value, residual)` samples.
/// Falls back to the mean of the values when the fit has no curvature.
pub fn quadratic_vertex(samples: &[(f64, f64)]) -> f64 {
    let n = samples.len() as f64;
    let sum_x: f64 = samples.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = samples.iter().map(|(_, y)| y).sum();
    let sum_x2: f64 = samples.iter().map(|(x, _)| x * x).sum();
    let sum_xy: f64 = samples.iter().map(|(x, y)| x * y).sum();
    let sum_x3: f64 = samples.iter().map(|(x, _)| x * x * x).sum();
    let sum_x2y: f64 = samples.iter().map(|(x, y)| x * x * y).sum();
    let sum_x4: f64 = samples.iter().map(|(x, _)| x * x * x * x).sum();

    let sxx = sum_x2 - sum_x * sum_x / n;
    let sxy = sum_xy - sum_x * sum_y / n;
    let sxx2 = sum_x3 - sum_x * sum_x2 / n;
    let sx2y = sum_x2y - sum_x2 * sum_y / n;
    let sx2x2 = sum_x4 - sum_x2 * sum_x2 / n;

    let a = sx2y * sxx - sxy * sxx2;
    let b = sxy * sx2x2 - sx2y * sxx2;

    if a != 0.0 { -b / (2.0 * a) } else { sum_x / n }
}

/// Lexicographic acceptance: lower residual wins, a tied residual prefers the
/// value closer to zero.
fn improves(residual: f64, value: i64, best_residual: f64, best_value: i64) -> bool {
    residual < best_residual || (residual == best_residual && value.abs() < best_value.abs())
}

/// Result of tuning one coefficient.
#[derive(Clone, Copy, Debug)]
pub struct SingleOutcome {
    pub value: i64,
    pub residual: f64,
    /// Active-position count of the last corpus evaluation performed.
    pub active: usize,
}

struct Probe<'a, B: EvalBackend + ?Sized> {
    backend: &'a mut B,
    coef: usize,
    name: &'a str,
    cache: HashMap<i64, f64>,
    best_value: i64,
    best_residual: f64,
    last_active: Option<usize>,
    streak: usize,
    active: usize,
}

impl<B: EvalBackend + ?Sized> Probe<'_, B> {
    /// Evaluate one candidate value, record it, and promote it to best if it
    /// improves. Returns nothing the caller needs beyond the updated state.
    fn try_value(&mut self, value: i64, use_cache: bool, show_active: bool) -> TuneResult<()> {
        self.backend.set_coefficient(self.coef, value)?;
        let eval = self.backend.evaluate(use_cache)?;
        self.cache.insert(value, eval.residual);
        self.active = eval.active;

        let mut line = format!("evaluate id {} residual {:.9}", self.name, eval.residual);
        if show_active {
            line.push_str(&format!(" active {}", eval.active));
        }
        line.push_str(&format!(" value {value}"));

        if improves(eval.residual, value, self.best_residual, self.best_value) {
            self.best_value = value;
            self.best_residual = eval.residual;
            line.push_str(" best");
            self.backend.update()?;
        }
        info!("{line}");

        if Some(eval.active) != self.last_active {
            self.streak = 0;
        }
        self.last_active = Some(eval.active);
        self.streak += 1;
        Ok(())
    }
}

/// Optimize a single coefficient by windowed probing, then refine with a
/// quadratic fit, and leave the best value installed on the backend.
pub fn tune_single<B: EvalBackend + ?Sized>(
    backend: &mut B,
    coef: usize,
    name: &str,
    initial_value: i64,
    initial_residual: f64,
    config: &TunerConfig,
) -> TuneResult<SingleOutcome> {
    info!("evaluate id {name} residual {initial_residual:.9} value {initial_value}");

    let steps = config.steps;
    let mut probe = Probe {
        backend,
        coef,
        name,
        cache: HashMap::from([(initial_value, initial_residual)]),
        best_value: initial_value,
        best_residual: initial_residual,
        last_active: None,
        streak: 0,
        active: 0,
    };

    let mut window = initial_window(initial_value);

    // Seed every worker's passive cache from the checkpoint baseline.
    probe.backend.next()?;

    let mut quick = false;
    let mut dirty = false;
    let mut exhausted = false;
    while !exhausted {
        let center = probe.best_value;
        let min_value = center as f64 - window / 2.0;
        let max_value = center as f64 + window / 2.0;
        let step_size = window / (steps - 1) as f64;

        // Walk the range in equal steps; always complete the full row so a
        // late probe can still move the best value.
        exhausted = true;
        for step in 0..steps {
            let next_value = (min_value + step as f64 * step_size).round() as i64;
            if probe.cache.contains_key(&next_value) {
                continue;
            }
            exhausted = false;
            probe.try_value(next_value, quick || dirty, !quick && !dirty)?;
        }

        if ((probe.best_value - center).abs() as f64) < window / 4.0 {
            if probe.best_value != initial_value {
                break; // Improvement found near the center; move on.
            }
            window /= 2.0;
            quick = probe.streak >= steps;
        } else {
            let best = probe.best_value as f64;
            if (best - min_value).min(max_value - best) < window / 8.0 {
                window *= 1.25; // Best value sits at the edge; look further.
            }
        }

        dirty = match (config.max_active, probe.last_active) {
            (Some(ceiling), Some(active)) => active >= ceiling,
            _ => false,
        };
    }

    // Refine with a quadratic fit through the 5 points nearest the best.
    let mut points: Vec<(i64, f64)> = probe.cache.iter().map(|(&v, &r)| (v, r)).collect();
    points.sort_by_key(|&(v, _)| ((v - probe.best_value).abs(), v));
    let samples: Vec<(f64, f64)> = points
        .iter()
        .take(5)
        .map(|&(v, r)| (v as f64, r))
        .collect();
    let vertex = quadratic_vertex(&samples).round() as i64;
    if !probe.cache.contains_key(&vertex) {
        probe.try_value(vertex, quick || dirty, !quick && !dirty)?;
    }

    let outcome = SingleOutcome {
        value: probe.best_value,
        residual: probe.best_residual,
        active: probe.active,
    };
    probe.backend.set_coefficient(coef, outcome.value)?;
    Ok(outcome)
}
