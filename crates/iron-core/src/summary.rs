//! Robust single-value summary of a chip's probeset vector.
//!
//! Each probeset is weighted by the inverse fourth power of the local
//! volatility of the log signal around it, measured with a sliding window
//! over the probeset order. Stable stretches dominate the average.

use crate::chip::Chip;
use crate::domain::{IronError, IronResult, scratch_vec};
use crate::numerics::{population_mean_std, stable_weighted_mean};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Window width as a fraction of the probeset count.
pub const WINDOW_FRACTION: f64 = 0.01;
/// Exponent applied to the `min_weight / weight` ratio.
pub const WEIGHT_EXPONENT: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedMean {
    pub value: f64,
    pub window: usize,
    /// Smallest positive local volatility; `None` when every window was flat.
    pub min_weight: Option<f64>,
    pub max_weight: f64,
}

pub fn probeset_weighted_mean(chip: &Chip) -> IronResult<WeightedMean> {
    let values = chip.probeset_raw();
    let summary = weighted_mean(&values).map_err(|error| {
        IronError::new(
            error.category(),
            error.placeholder(),
            format!("chip '{}': {}", chip.filename, error.message()),
        )
    })?;
    info!(chip = %chip.filename, window = summary.window, "WeightedAvg:\t{:.6}", summary.value);
    Ok(summary)
}

/// Window width for `count` probesets, rounded half up and at least one.
pub fn window_width(count: usize) -> usize {
    ((count as f64 * WINDOW_FRACTION + 0.5) as usize).max(1)
}

pub fn weighted_mean(values: &[f64]) -> IronResult<WeightedMean> {
    if values.is_empty() {
        return Err(IronError::input_validation(
            "INPUT.WEIGHTED_MEAN_EMPTY",
            "cannot summarize an empty probeset vector",
        ));
    }
    if let Some(index) = values
        .iter()
        .position(|value| !(value.is_finite() && *value > 0.0))
    {
        return Err(IronError::input_validation(
            "INPUT.WEIGHTED_MEAN_DOMAIN",
            format!(
                "probeset {} has value {} but the summary needs positive finite values",
                index, values[index]
            ),
        ));
    }

    let count = values.len();
    let mut logs = scratch_vec(count, 0.0, "log signals")?;
    for (log, value) in logs.iter_mut().zip(values) {
        *log = value.ln();
    }

    let window = window_width(count);
    let mut volatility = scratch_vec(count, 0.0, "window weights")?;
    let mut windows = scratch_vec(count, 0u32, "window counts")?;
    for start in 0..=count - window {
        let range = start..start + window;
        let Some((_, std)) = population_mean_std(&logs[range.clone()]) else {
            continue;
        };
        for index in range {
            volatility[index] += std;
            windows[index] += 1;
        }
    }

    let mut weights = volatility;
    for (weight, &covered) in weights.iter_mut().zip(&windows) {
        *weight /= f64::from(covered);
    }

    let min_weight = weights
        .iter()
        .copied()
        .filter(|weight| *weight > 0.0)
        .min_by(f64::total_cmp);
    let max_weight = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    for weight in &mut weights {
        *weight = match min_weight {
            Some(min) if *weight > 0.0 => (min / *weight).powi(WEIGHT_EXPONENT),
            _ => 1.0,
        };
    }

    // Averaging log ratios against the first value keeps a constant
    // vector's summary exact.
    let pivot = logs[0];
    for log in &mut logs {
        *log -= pivot;
    }
    let mean = stable_weighted_mean(&logs, &weights).ok_or_else(|| {
        IronError::internal(
            "SYS.WEIGHTED_MEAN",
            "probeset weights summed to zero after normalization",
        )
    })?;

    Ok(WeightedMean {
        value: values[0] * mean.exp(),
        window,
        min_weight,
        max_weight,
    })
}
