//! Pairwise (IRON) normalization of a chip set against a model chip.
//!
//! Both entry points follow the same sequence: the model signal vector and
//! its mask are built once, then every chip is gathered, masked, fitted and
//! scaled in chip order. A failure stops the batch at the failing chip;
//! chips already scaled stay scaled.

use crate::apply::{ScaleOptions, apply_probe_scales, apply_probeset_scales};
use crate::assemble::{SlotTable, gather_probesets};
use crate::chip::{Chip, ChipSet};
use crate::domain::{Granularity, IronError, IronResult, SignalMode, scratch_vec};
use crate::fit::{
    FitOutcome, FitPolicy, FitRequest, PRIMARY_RANK_FRACTION, SECONDARY_RANK_FRACTION,
    ScaleFactorFitter,
};
use crate::floor::{relog_values, unlog_signals, unlog_values};
use crate::mask::{
    MaskPolicy, input_probe_mask, input_probeset_mask, model_probe_mask, model_probeset_mask,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::{debug, info};

/// Stabilizer added to both terms of the RMSD/fraction ratio.
pub const FIT_RATIO_EPSILON: f64 = 1e-5;
/// Scaled probeset values are clamped up to this unless configured otherwise.
pub const PROBESET_FLOOR: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairwiseOptions {
    pub signal_mode: SignalMode,
    pub mask_policy: MaskPolicy,
    pub primary_rank_fraction: f64,
    pub secondary_rank_fraction: f64,
    pub fit_policy: FitPolicy,
    /// Clamp for present probe intensities after scaling; off by default.
    pub probe_floor: Option<f64>,
    /// Clamp for present probeset values after scaling.
    pub probeset_floor: Option<f64>,
    /// Probeset values are log2; fit and scale them on the linear scale.
    pub unlog_inputs: bool,
}

impl Default for PairwiseOptions {
    fn default() -> Self {
        Self {
            signal_mode: SignalMode::default(),
            mask_policy: MaskPolicy::default(),
            primary_rank_fraction: PRIMARY_RANK_FRACTION,
            secondary_rank_fraction: SECONDARY_RANK_FRACTION,
            fit_policy: FitPolicy::default(),
            probe_floor: None,
            probeset_floor: Some(PROBESET_FLOOR),
            unlog_inputs: false,
        }
    }
}

impl PairwiseOptions {
    fn scale_options(&self, granularity: Granularity) -> ScaleOptions {
        let post_scale_floor = match granularity {
            Granularity::Probe => self.probe_floor,
            Granularity::Probeset => self.probeset_floor,
        };
        ScaleOptions {
            policy: self.mask_policy,
            post_scale_floor,
        }
    }
}

/// Fit-quality record for one (model, input) pair.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairwiseDiagnostic {
    pub granularity: Granularity,
    pub model_file: String,
    pub input_file: String,
    pub fraction_used: f64,
    pub rmsd: f64,
}

impl PairwiseDiagnostic {
    pub fn ratio(&self) -> f64 {
        (self.rmsd + FIT_RATIO_EPSILON) / (self.fraction_used + FIT_RATIO_EPSILON)
    }
}

impl Display for PairwiseDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pairwise\t{}\t{}\t{}\t{:.6}\t{:.6}\t{:.6}",
            self.granularity,
            self.model_file,
            self.input_file,
            self.fraction_used,
            self.rmsd,
            self.ratio()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairwiseReport {
    pub granularity: Granularity,
    pub diagnostics: Vec<PairwiseDiagnostic>,
    /// Values multiplied across all chips.
    pub scaled_values: usize,
}

impl PairwiseReport {
    fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            diagnostics: Vec::new(),
            scaled_values: 0,
        }
    }
}

type DiagnosticSink = Box<dyn FnMut(&PairwiseDiagnostic)>;

pub struct PairwiseNormalizer<F> {
    fitter: F,
    options: PairwiseOptions,
    sink: Option<DiagnosticSink>,
}

impl<F: ScaleFactorFitter> PairwiseNormalizer<F> {
    pub fn new(fitter: F, options: PairwiseOptions) -> Self {
        Self {
            fitter,
            options,
            sink: None,
        }
    }

    /// Hands every diagnostic to `sink` as soon as its chip is fitted,
    /// instead of logging the line at info level.
    pub fn with_diagnostic_sink(mut self, sink: impl FnMut(&PairwiseDiagnostic) + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Normalizes probe intensities of every chip in `set` toward `model`.
    pub fn normalize_probes(&mut self, set: &mut ChipSet, model: &Chip) -> IronResult<PairwiseReport> {
        let mut report = PairwiseReport::new(Granularity::Probe);
        if set.is_empty() {
            debug!("probe-level normalization skipped: empty chip set");
            return Ok(report);
        }
        set.validate()?;
        model.validate_against(&set.layout)?;

        let ChipSet { layout, chips } = set;
        let table = SlotTable::build(layout, self.options.signal_mode)?;
        let slots = table.len();
        debug!(
            mode = %table.mode(),
            slots,
            probes = layout.probe_count(),
            "assembled probe slot table"
        );

        let model_signals = table.signals(model)?;
        let mut model_mask = scratch_vec(slots, false, "model mask")?;
        let mut input_signals = scratch_vec(slots, 0.0, "input signal vector")?;
        let mut mask = scratch_vec(slots, false, "input mask")?;
        let mut seen = layout.seen_grid();

        model_probe_mask(
            layout,
            &table,
            model,
            &model_signals,
            self.options.mask_policy,
            &mut seen,
            &mut model_mask,
        );

        for chip in chips.iter_mut() {
            table.gather(chip, &mut input_signals)?;
            input_probe_mask(&table, chip, &input_signals, &model_mask, &mut mask);

            let outcome = self.fit(chip, &model_signals, &input_signals, &mask)?;
            let diagnostic = self.record(Granularity::Probe, model, chip, &outcome);

            let scaled = apply_probe_scales(
                layout,
                &table,
                chip,
                &outcome.scale_factors,
                self.options.scale_options(Granularity::Probe),
                &mut seen,
            )?;
            debug!(chip = %chip.filename, scaled, "applied probe scale factors");

            report.scaled_values += scaled;
            report.diagnostics.push(diagnostic);
        }

        Ok(report)
    }

    /// Normalizes probeset summaries of every chip in `set` toward `model`.
    pub fn normalize_probesets(
        &mut self,
        set: &mut ChipSet,
        model: &Chip,
    ) -> IronResult<PairwiseReport> {
        let mut report = PairwiseReport::new(Granularity::Probeset);
        if set.is_empty() {
            debug!("probeset-level normalization skipped: empty chip set");
            return Ok(report);
        }
        set.validate()?;
        model.validate_against(&set.layout)?;

        let ChipSet { layout, chips } = set;
        let count = layout.probeset_count();

        let mut model_signals = scratch_vec(count, 0.0, "model signal vector")?;
        gather_probesets(model, &mut model_signals);
        if self.options.unlog_inputs {
            unlog_signals(&mut model_signals);
        }

        let mut model_mask = scratch_vec(count, false, "model mask")?;
        let mut input_signals = scratch_vec(count, 0.0, "input signal vector")?;
        let mut mask = scratch_vec(count, false, "input mask")?;
        model_probeset_mask(
            layout,
            &model_signals,
            self.options.mask_policy,
            &mut model_mask,
        );

        for chip in chips.iter_mut() {
            gather_probesets(chip, &mut input_signals);
            if self.options.unlog_inputs {
                unlog_signals(&mut input_signals);
            }
            input_probeset_mask(&input_signals, &model_mask, &mut mask);

            let outcome = self.fit(chip, &model_signals, &input_signals, &mask)?;
            let diagnostic = self.record(Granularity::Probeset, model, chip, &outcome);

            // Stored values change only once the fit has succeeded.
            if self.options.unlog_inputs {
                unlog_values(&mut chip.probesets);
            }
            let scaled = apply_probeset_scales(
                layout,
                chip,
                &outcome.scale_factors,
                self.options.scale_options(Granularity::Probeset),
            );
            if self.options.unlog_inputs {
                relog_values(&mut chip.probesets);
            }
            debug!(chip = %chip.filename, scaled, "applied probeset scale factors");

            report.scaled_values += scaled;
            report.diagnostics.push(diagnostic);
        }

        Ok(report)
    }

    fn fit(
        &mut self,
        chip: &Chip,
        reference: &[f64],
        input: &[f64],
        mask: &[bool],
    ) -> IronResult<FitOutcome> {
        let request = FitRequest {
            label: chip.file_stem(),
            reference,
            input,
            mask,
            primary_rank_fraction: self.options.primary_rank_fraction,
            secondary_rank_fraction: self.options.secondary_rank_fraction,
            policy: &self.options.fit_policy,
        };
        let outcome = self.fitter.fit(&request)?;

        if outcome.scale_factors.len() != request.len() {
            return Err(IronError::computation(
                "RUN.FIT_LENGTH",
                format!(
                    "fitter returned {} scale factors for {} features of chip '{}'",
                    outcome.scale_factors.len(),
                    request.len(),
                    chip.filename
                ),
            ));
        }

        Ok(outcome)
    }

    fn record(
        &mut self,
        granularity: Granularity,
        model: &Chip,
        chip: &Chip,
        outcome: &FitOutcome,
    ) -> PairwiseDiagnostic {
        let diagnostic = PairwiseDiagnostic {
            granularity,
            model_file: model.filename.clone(),
            input_file: chip.filename.clone(),
            fraction_used: outcome.fraction_used,
            rmsd: outcome.rmsd,
        };
        match self.sink.as_mut() {
            Some(sink) => {
                debug!(chip = %chip.filename, "fit diagnostic handed to sink");
                sink(&diagnostic);
            }
            None => info!(
                fraction = diagnostic.fraction_used,
                rmsd = diagnostic.rmsd,
                "{diagnostic}"
            ),
        }
        diagnostic
    }
}

#[cfg(test)]
mod tests {
    use super::{PairwiseDiagnostic, PairwiseNormalizer, PairwiseOptions};
    use crate::chip::{Chip, ChipSet};
    use crate::domain::{Granularity, Intensity, IronError, IronErrorCategory, IronResult};
    use crate::fit::{FitOutcome, FitRequest, ReplayFitter, ScaleFactorFitter};
    use crate::layout::{ArrayLayout, Probeset};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FailingFitter;

    impl ScaleFactorFitter for FailingFitter {
        fn fit(&mut self, request: &FitRequest<'_>) -> IronResult<FitOutcome> {
            Err(IronError::computation(
                "RUN.FIT_FAILED",
                format!("training set for '{}' is empty", request.label),
            ))
        }
    }

    struct ShortFitter;

    impl ScaleFactorFitter for ShortFitter {
        fn fit(&mut self, _request: &FitRequest<'_>) -> IronResult<FitOutcome> {
            Ok(FitOutcome {
                scale_factors: vec![1.0],
                fraction_used: 1.0,
                rmsd: 0.0,
            })
        }
    }

    fn probeset_set() -> (ChipSet, Chip) {
        let mut layout = ArrayLayout::new(1, 1);
        layout.push_probeset(Probeset::new("a_at"));
        layout.push_probeset(Probeset::new("b_at"));
        let model = Chip::new("model.CEL", 1, 1).with_probesets(&[10.0, 20.0]);
        let mut set = ChipSet::new(layout);
        set.push(Chip::new("in.CEL", 1, 1).with_probesets(&[20.0, 40.0]));
        (set, model)
    }

    #[test]
    fn diagnostic_line_matches_tab_layout() {
        let diagnostic = PairwiseDiagnostic {
            granularity: Granularity::Probeset,
            model_file: "model.CEL".to_string(),
            input_file: "in.CEL".to_string(),
            fraction_used: 0.5,
            rmsd: 0.25,
        };
        assert_eq!(
            diagnostic.to_string(),
            "pairwise\tprobeset-level\tmodel.CEL\tin.CEL\t0.500000\t0.250000\t0.499990"
        );
    }

    #[test]
    fn empty_chip_set_is_a_no_op() {
        let (mut set, model) = probeset_set();
        set.chips.clear();
        let mut normalizer = PairwiseNormalizer::new(FailingFitter, PairwiseOptions::default());

        let report = normalizer
            .normalize_probesets(&mut set, &model)
            .expect("empty set is not an error");
        assert!(report.diagnostics.is_empty());

        let report = normalizer
            .normalize_probes(&mut set, &model)
            .expect("empty set is not an error");
        assert_eq!(report.granularity, Granularity::Probe);
    }

    #[test]
    fn fitter_errors_propagate_unchanged() {
        let (mut set, model) = probeset_set();
        let mut normalizer = PairwiseNormalizer::new(FailingFitter, PairwiseOptions::default());

        let error = normalizer
            .normalize_probesets(&mut set, &model)
            .expect_err("fitter failure should propagate");
        assert_eq!(error.placeholder(), "RUN.FIT_FAILED");
        assert_eq!(error.message(), "training set for 'in' is empty");
        assert_eq!(set.chips[0].probeset_raw(), vec![20.0, 40.0]);
    }

    #[test]
    fn failed_unlog_fit_leaves_stored_values_on_log_scale() {
        let mut layout = ArrayLayout::new(1, 1);
        layout.push_probeset(Probeset::new("a_at"));
        layout.push_probeset(Probeset::new("b_at"));
        let model = Chip::new("model.CEL", 1, 1).with_probesets(&[5.0, 5.0]);
        let mut set = ChipSet::new(layout);
        set.push(Chip::new("in.CEL", 1, 1).with_probesets(&[6.0, 0.0]));
        let options = PairwiseOptions {
            unlog_inputs: true,
            ..PairwiseOptions::default()
        };

        let error = PairwiseNormalizer::new(FailingFitter, options)
            .normalize_probesets(&mut set, &model)
            .expect_err("fitter failure should propagate");
        assert_eq!(error.placeholder(), "RUN.FIT_FAILED");
        assert_eq!(
            set.chips[0].probesets,
            vec![Intensity::Measured(6.0), Intensity::Missing]
        );
    }

    #[test]
    fn sink_receives_each_diagnostic_before_a_later_chip_fails() {
        let (mut set, model) = probeset_set();
        set.push(Chip::new("late.CEL", 1, 1).with_probesets(&[20.0, 40.0]));
        let fitter = ReplayFitter::new().with(
            "in",
            FitOutcome {
                scale_factors: vec![0.5, 0.5],
                fraction_used: 0.5,
                rmsd: 0.25,
            },
        );

        let lines = Rc::new(RefCell::new(Vec::new()));
        let captured = Rc::clone(&lines);
        let error = PairwiseNormalizer::new(fitter, PairwiseOptions::default())
            .with_diagnostic_sink(move |diagnostic| {
                captured.borrow_mut().push(diagnostic.to_string())
            })
            .normalize_probesets(&mut set, &model)
            .expect_err("second chip has no recorded fit");

        assert_eq!(error.placeholder(), "RUN.FIT_UNAVAILABLE");
        assert_eq!(
            *lines.borrow(),
            vec!["pairwise\tprobeset-level\tmodel.CEL\tin.CEL\t0.500000\t0.250000\t0.499990"]
        );
        assert_eq!(set.chips[0].probeset_raw(), vec![10.0, 20.0]);
    }

    #[test]
    fn short_factor_vectors_are_rejected() {
        let (mut set, model) = probeset_set();
        let mut normalizer = PairwiseNormalizer::new(ShortFitter, PairwiseOptions::default());

        let error = normalizer
            .normalize_probesets(&mut set, &model)
            .expect_err("length mismatch should fail");
        assert_eq!(error.category(), IronErrorCategory::FitFailure);
        assert_eq!(error.placeholder(), "RUN.FIT_LENGTH");
    }
}
