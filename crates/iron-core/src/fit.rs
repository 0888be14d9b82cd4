//! Interface to the rank-based scale-factor fitter.
//!
//! The fitting mathematics live outside this crate; normalization only needs
//! a per-feature factor vector plus two fit-quality statistics back.

use crate::domain::{IronError, IronResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fraction of the joint rank range trusted in the first training pass.
pub const PRIMARY_RANK_FRACTION: f64 = 0.01;
/// Fraction used by the second, refining pass.
pub const SECONDARY_RANK_FRACTION: f64 = 0.10;

/// Fitter tuning switches forwarded unchanged to the fitter.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FitPolicy {
    pub global_scaling: bool,
    pub untilt: bool,
    pub fit_both_x_y: bool,
    pub condense_training: bool,
    pub weight_exponent: f64,
    pub fit_window_fraction: f64,
}

impl Default for FitPolicy {
    fn default() -> Self {
        Self {
            global_scaling: false,
            untilt: false,
            fit_both_x_y: false,
            condense_training: false,
            weight_exponent: 4.0,
            fit_window_fraction: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FitRequest<'a> {
    /// Label of the input chip, usually its file stem.
    pub label: &'a str,
    pub reference: &'a [f64],
    pub input: &'a [f64],
    pub mask: &'a [bool],
    pub primary_rank_fraction: f64,
    pub secondary_rank_fraction: f64,
    pub policy: &'a FitPolicy,
}

impl FitRequest<'_> {
    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitOutcome {
    /// One factor per feature; values `<= 0` mean "leave unchanged".
    pub scale_factors: Vec<f64>,
    pub fraction_used: f64,
    pub rmsd: f64,
}

pub trait ScaleFactorFitter {
    /// Computes scale factors mapping `request.input` onto
    /// `request.reference`. Masked features are excluded from training but
    /// still receive a factor.
    fn fit(&mut self, request: &FitRequest<'_>) -> IronResult<FitOutcome>;
}

impl<F> ScaleFactorFitter for &mut F
where
    F: ScaleFactorFitter + ?Sized,
{
    fn fit(&mut self, request: &FitRequest<'_>) -> IronResult<FitOutcome> {
        (**self).fit(request)
    }
}

/// Serves fit results computed earlier, keyed by input chip label.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ReplayFitter {
    outcomes: HashMap<String, FitOutcome>,
}

impl ReplayFitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, outcome: FitOutcome) {
        self.outcomes.insert(label.into(), outcome);
    }

    pub fn with(mut self, label: impl Into<String>, outcome: FitOutcome) -> Self {
        self.insert(label, outcome);
        self
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl ScaleFactorFitter for ReplayFitter {
    fn fit(&mut self, request: &FitRequest<'_>) -> IronResult<FitOutcome> {
        self.outcomes.get(request.label).cloned().ok_or_else(|| {
            IronError::computation(
                "RUN.FIT_UNAVAILABLE",
                format!("no recorded scale factors for chip '{}'", request.label),
            )
        })
    }
}
