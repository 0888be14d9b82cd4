//! Writes fitted scale factors back onto chip intensities.

use crate::assemble::SlotTable;
use crate::chip::Chip;
use crate::domain::{Intensity, IronError, IronResult, SignalMode};
use crate::layout::{ArrayLayout, SeenGrid};
use crate::mask::MaskPolicy;

/// How factors are turned into in-place updates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScaleOptions {
    pub policy: MaskPolicy,
    /// Clamp applied to present values after scaling; off unless set.
    pub post_scale_floor: Option<f64>,
}

impl ScaleOptions {
    fn effective_factor(&self, layout: &ArrayLayout, probeset: usize, fitted: f64) -> f64 {
        if self.policy.protects(layout, &layout.probesets[probeset]) {
            1.0
        } else {
            fitted
        }
    }

    fn floor(&self, value: Intensity) -> Intensity {
        match self.post_scale_floor {
            Some(floor) => value.floored(floor),
            None => value,
        }
    }
}

/// Scales probe intensities. Returns the number of values multiplied.
///
/// PM-only tables scale the chip's flat PM vector entry by entry. PM/MM
/// tables scale grid cells; a cell referenced by several probes is
/// multiplied by the first non-trivial factor that reaches it and never
/// again.
pub fn apply_probe_scales(
    layout: &ArrayLayout,
    table: &SlotTable,
    chip: &mut Chip,
    factors: &[f64],
    options: ScaleOptions,
    seen: &mut SeenGrid,
) -> IronResult<usize> {
    let mut scaled = 0;

    match table.mode() {
        SignalMode::PmOnly => {
            let filename = &chip.filename;
            let pm = chip.pm.as_mut().ok_or_else(|| {
                IronError::input_validation(
                    "INPUT.CHIP_PM_MISSING",
                    format!("chip '{filename}' has no perfect-match vector"),
                )
            })?;

            for (slot, &fitted) in table.slots().iter().zip(factors) {
                let value = &mut pm[slot.probe];
                if value.is_missing() {
                    continue;
                }

                let probeset = layout.probes[slot.probe].probeset;
                let factor = options.effective_factor(layout, probeset, fitted);
                if factor > 0.0 {
                    *value = value.scaled(factor);
                    scaled += 1;
                }
                *value = options.floor(*value);
            }
        }
        SignalMode::PmAndMm => {
            seen.reset();

            for (slot, &fitted) in table.slots().iter().zip(factors) {
                let cell = chip.cell_mut(slot.coord);
                if cell.intensity.is_missing() {
                    continue;
                }

                let probeset = layout.probes[slot.probe].probeset;
                let factor = options.effective_factor(layout, probeset, fitted);
                if factor > 0.0 && factor != 1.0 && seen.visit(slot.coord) {
                    cell.intensity = cell.intensity.scaled(factor);
                    scaled += 1;
                }
                cell.intensity = options.floor(cell.intensity);
            }
        }
    }

    Ok(scaled)
}

/// Scales probeset summaries. Returns the number of values multiplied.
pub fn apply_probeset_scales(
    layout: &ArrayLayout,
    chip: &mut Chip,
    factors: &[f64],
    options: ScaleOptions,
) -> usize {
    let mut scaled = 0;

    for (index, (value, &fitted)) in chip.probesets.iter_mut().zip(factors).enumerate() {
        if value.is_missing() {
            continue;
        }

        let factor = options.effective_factor(layout, index, fitted);
        if factor > 0.0 {
            *value = value.scaled(factor);
            scaled += 1;
        }
        *value = options.floor(*value);
    }

    scaled
}

#[cfg(test)]
mod tests {
    use super::{ScaleOptions, apply_probe_scales, apply_probeset_scales};
    use crate::assemble::SlotTable;
    use crate::chip::Chip;
    use crate::domain::{GridCoord, Intensity, SignalMode};
    use crate::layout::{ArrayLayout, Probe, Probeset, ProbesetKind};
    use crate::mask::MaskPolicy;

    fn duplicate_layout() -> ArrayLayout {
        let mut layout = ArrayLayout::new(2, 3);
        let first = layout.push_probeset(Probeset::new("g1_at"));
        let second = layout.push_probeset(Probeset::new("g2_at"));
        layout.push_probe(Probe::from_pair(
            GridCoord::new(0, 0),
            GridCoord::new(1, 0),
            first,
        ));
        layout.push_probe(Probe::pm_only(GridCoord::new(0, 1), first));
        // Same physical cell as probe 0's PM.
        layout.push_probe(Probe::pm_only(GridCoord::new(0, 0), second));
        layout
    }

    fn grid_chip(layout: &ArrayLayout) -> Chip {
        let mut chip = Chip::for_layout("in.CEL", layout);
        chip.set_intensity(GridCoord::new(0, 0), 100.0);
        chip.set_intensity(GridCoord::new(1, 0), 40.0);
        chip.set_intensity(GridCoord::new(0, 1), 0.0);
        chip
    }

    #[test]
    fn duplicate_cells_are_scaled_once() {
        let layout = duplicate_layout();
        let table = SlotTable::build(&layout, SignalMode::PmAndMm).expect("slot table");
        let mut chip = grid_chip(&layout);
        let mut seen = layout.seen_grid();

        let scaled = apply_probe_scales(
            &layout,
            &table,
            &mut chip,
            &[2.0, 0.5, 3.0, 3.0],
            ScaleOptions::default(),
            &mut seen,
        )
        .expect("scales apply");

        assert_eq!(scaled, 2);
        assert_eq!(chip.intensity(GridCoord::new(0, 0)), Intensity::Measured(200.0));
        assert_eq!(chip.intensity(GridCoord::new(1, 0)), Intensity::Measured(20.0));
        assert_eq!(chip.intensity(GridCoord::new(0, 1)), Intensity::Missing);
    }

    #[test]
    fn unit_factor_leaves_duplicate_available_for_later_copy() {
        let layout = duplicate_layout();
        let table = SlotTable::build(&layout, SignalMode::PmAndMm).expect("slot table");
        let mut chip = grid_chip(&layout);
        let mut seen = layout.seen_grid();

        apply_probe_scales(
            &layout,
            &table,
            &mut chip,
            &[1.0, 1.0, 1.0, 3.0],
            ScaleOptions::default(),
            &mut seen,
        )
        .expect("scales apply");

        assert_eq!(chip.intensity(GridCoord::new(0, 0)), Intensity::Measured(300.0));
        assert_eq!(chip.intensity(GridCoord::new(1, 0)), Intensity::Measured(40.0));
    }

    #[test]
    fn pm_only_scales_flat_vector_and_keeps_missing() {
        let layout = duplicate_layout();
        let table = SlotTable::build(&layout, SignalMode::PmOnly).expect("slot table");
        let mut chip = grid_chip(&layout).with_pm(&[10.0, 0.0, 10.0]);
        let mut seen = layout.seen_grid();

        apply_probe_scales(
            &layout,
            &table,
            &mut chip,
            &[2.0, 2.0, -1.0],
            ScaleOptions::default(),
            &mut seen,
        )
        .expect("scales apply");

        assert_eq!(
            chip.pm.as_deref(),
            Some(
                &[
                    Intensity::Measured(20.0),
                    Intensity::Missing,
                    Intensity::Measured(10.0)
                ][..]
            )
        );
    }

    #[test]
    fn spikeins_keep_unit_factor() {
        let mut layout = ArrayLayout::new(1, 1).with_spikeins(["spk_at"]);
        layout.push_probeset(Probeset::with_kind("spk_at", ProbesetKind::Regular));
        layout.push_probeset(Probeset::new("g_at"));
        let mut chip = Chip::new("in.CEL", 1, 1).with_probesets(&[50.0, 50.0]);

        let options = ScaleOptions {
            policy: MaskPolicy {
                use_exclusions: false,
                use_spikeins: true,
            },
            post_scale_floor: None,
        };
        apply_probeset_scales(&layout, &mut chip, &[4.0, 4.0], options);

        assert_eq!(chip.probeset_raw(), vec![50.0, 200.0]);
    }

    #[test]
    fn optional_floor_clamps_present_values_only() {
        let layout = {
            let mut layout = ArrayLayout::new(1, 1);
            layout.push_probeset(Probeset::new("a_at"));
            layout.push_probeset(Probeset::new("b_at"));
            layout
        };
        let mut chip = Chip::new("in.CEL", 1, 1).with_probesets(&[2.0, 0.0]);
        let options = ScaleOptions {
            post_scale_floor: Some(1.0),
            ..ScaleOptions::default()
        };

        apply_probeset_scales(&layout, &mut chip, &[0.25, 0.25], options);

        assert_eq!(chip.probeset_raw(), vec![1.0, 0.0]);
    }
}
