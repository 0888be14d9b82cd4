//! In-place floor and un-log passes over a chip set.

use crate::chip::ChipSet;
use crate::domain::{Intensity, IronResult};
use tracing::warn;

/// Values at or below this are treated as zero by the non-zero floors.
pub const NEAR_ZERO_SIGNAL: f64 = 1e-5;

/// Clamps every probe intensity to `floor`: the flat PM vector entry by
/// entry, and each grid cell referenced by a probe (PM or MM) once.
pub fn floor_probe(set: &mut ChipSet, floor: f64) -> IronResult<()> {
    if set.is_empty() {
        return Ok(());
    }
    set.validate()?;

    let ChipSet { layout, chips } = set;
    let mut seen = layout.seen_grid();

    for chip in chips.iter_mut() {
        if let Some(pm) = chip.pm.as_mut() {
            floor_values(pm, floor);
        }

        seen.reset();
        for probe in &layout.probes {
            for coord in std::iter::once(probe.pm).chain(probe.mm) {
                if seen.visit(coord) {
                    let cell = chip.cell_mut(coord);
                    cell.intensity = cell.intensity.floored(floor);
                }
            }
        }
    }

    Ok(())
}

pub fn floor_probeset(set: &mut ChipSet, floor: f64) {
    for chip in &mut set.chips {
        floor_values(&mut chip.probesets, floor);
    }
}

/// Raises every probeset value to the chip's smallest value above
/// `threshold`. Chips with no such value are left as they are.
pub fn floor_probeset_to_min_non_zero(set: &mut ChipSet, threshold: f64) {
    for chip in &mut set.chips {
        let minimum = chip
            .probesets
            .iter()
            .map(|value| value.raw())
            .filter(|value| *value > threshold)
            .min_by(f64::total_cmp);

        match minimum {
            Some(minimum) => floor_values(&mut chip.probesets, minimum),
            None => warn!(
                chip = %chip.filename,
                threshold,
                "no probeset value above threshold; floor skipped"
            ),
        }
    }
}

/// Raises probeset values between `threshold` and 1 up to 1, leaving
/// near-zero values alone.
pub fn floor_probeset_non_zero_to_one(set: &mut ChipSet, threshold: f64) {
    for chip in &mut set.chips {
        for value in &mut chip.probesets {
            let raw = value.raw();
            if raw > threshold && raw < 1.0 {
                *value = Intensity::Measured(1.0);
            }
        }
    }
}

/// Converts base-2 logarithmic probeset values back to the linear scale.
/// Missing values stay missing.
pub fn unlog_probeset(set: &mut ChipSet) {
    for chip in &mut set.chips {
        unlog_values(&mut chip.probesets);
    }
}

pub(crate) fn unlog_values(values: &mut [Intensity]) {
    for value in values {
        if let Intensity::Measured(raw) = *value {
            *value = Intensity::from_raw(raw.exp2());
        }
    }
}

/// Inverse of [`unlog_values`]. A measured 1.0 maps to log 0, which reads
/// back as missing.
pub(crate) fn relog_values(values: &mut [Intensity]) {
    for value in values {
        if let Intensity::Measured(raw) = *value {
            *value = Intensity::from_raw(raw.log2());
        }
    }
}

/// Same as [`unlog_values`] over gathered fit signals, where missing is `0.0`.
pub(crate) fn unlog_signals(values: &mut [f64]) {
    for value in values.iter_mut().filter(|value| **value != 0.0) {
        *value = value.exp2();
    }
}

fn floor_values(values: &mut [Intensity], floor: f64) {
    for value in values {
        *value = value.floored(floor);
    }
}
