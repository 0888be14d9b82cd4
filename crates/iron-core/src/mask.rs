//! Exclusion masks for pairwise fits.
//!
//! A `true` entry keeps the feature out of the training set of the fit. The
//! fitter still reports a factor for it, which the applicator uses.

use crate::assemble::{SlotKind, SlotTable};
use crate::chip::Chip;
use crate::layout::{ArrayLayout, Probeset, SeenGrid};
use serde::{Deserialize, Serialize};

/// Signals below this value never drive a fit.
pub const MIN_TRAINING_SIGNAL: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskPolicy {
    /// Mask probesets listed in the layout's exclusion set.
    #[serde(default)]
    pub use_exclusions: bool,
    /// Mask spike-in probesets and leave them unscaled.
    #[serde(default)]
    pub use_spikeins: bool,
}

impl MaskPolicy {
    pub fn excludes(&self, layout: &ArrayLayout, probeset: &Probeset) -> bool {
        (self.use_exclusions && layout.is_excluded(probeset)) || self.protects(layout, probeset)
    }

    /// Spike-ins pass through normalization but keep a factor of exactly 1.
    pub fn protects(&self, layout: &ArrayLayout, probeset: &Probeset) -> bool {
        self.use_spikeins && layout.is_spikein(probeset)
    }
}

/// Builds the probe-level mask derived from the model chip.
///
/// Probes are visited in layout order. Of all probes sharing a grid cell, the
/// first one that survives the other criteria stays unmasked; every later
/// probe on that cell is masked. Mismatch slots are always masked.
pub fn model_probe_mask(
    layout: &ArrayLayout,
    table: &SlotTable,
    model: &Chip,
    model_signals: &[f64],
    policy: MaskPolicy,
    seen: &mut SeenGrid,
    out: &mut [bool],
) {
    seen.reset();

    for ((masked, slot), &signal) in out.iter_mut().zip(table.slots()).zip(model_signals) {
        if slot.kind == SlotKind::Mismatch {
            *masked = true;
            continue;
        }

        let probeset = layout.probeset_of(&layout.probes[slot.probe]);
        let mut mask = model.is_masked(slot.coord)
            || layout.cell_kind(slot.coord).is_reserved()
            || probeset.is_control()
            || signal < MIN_TRAINING_SIGNAL
            || policy.excludes(layout, probeset);

        if !mask && !seen.is_seen(slot.coord) {
            seen.mark(slot.coord);
        } else if seen.is_seen(slot.coord) {
            mask = true;
        }

        *masked = mask;
    }
}

/// Combines the model mask with the input chip's own QC flags and low
/// signals.
pub fn input_probe_mask(
    table: &SlotTable,
    input: &Chip,
    input_signals: &[f64],
    model_mask: &[bool],
    out: &mut [bool],
) {
    for (((masked, slot), &signal), &model_masked) in out
        .iter_mut()
        .zip(table.slots())
        .zip(input_signals)
        .zip(model_mask)
    {
        *masked =
            model_masked || input.is_masked(slot.coord) || signal < MIN_TRAINING_SIGNAL;
    }
}

pub fn model_probeset_mask(
    layout: &ArrayLayout,
    model_signals: &[f64],
    policy: MaskPolicy,
    out: &mut [bool],
) {
    for ((masked, probeset), &signal) in out.iter_mut().zip(&layout.probesets).zip(model_signals)
    {
        *masked = probeset.is_control()
            || signal < MIN_TRAINING_SIGNAL
            || policy.excludes(layout, probeset);
    }
}

pub fn input_probeset_mask(input_signals: &[f64], model_mask: &[bool], out: &mut [bool]) {
    for ((masked, &signal), &model_masked) in out.iter_mut().zip(input_signals).zip(model_mask) {
        *masked = model_masked || signal < MIN_TRAINING_SIGNAL;
    }
}
