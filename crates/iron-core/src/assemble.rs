//! Signal vector assembly.
//!
//! Probe-level vectors are described by a [`SlotTable`]: one slot per emitted
//! value, in probe order, each remembering the probe and grid cell it came
//! from. The table depends only on the layout and the [`SignalMode`], so the
//! model chip and every input chip share it.

use crate::chip::Chip;
use crate::domain::{GridCoord, IronResult, SignalMode, scratch_vec, scratch_with_capacity};
use crate::layout::ArrayLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    PerfectMatch,
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub probe: usize,
    pub coord: GridCoord,
    pub kind: SlotKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable {
    mode: SignalMode,
    slots: Vec<Slot>,
}

impl SlotTable {
    pub fn build(layout: &ArrayLayout, mode: SignalMode) -> IronResult<Self> {
        let capacity = match mode {
            SignalMode::PmOnly => layout.probe_count(),
            SignalMode::PmAndMm => layout.probe_count() * 2,
        };
        let mut slots = scratch_with_capacity(capacity, "probe slot table")?;

        for (index, probe) in layout.probes.iter().enumerate() {
            slots.push(Slot {
                probe: index,
                coord: probe.pm,
                kind: SlotKind::PerfectMatch,
            });

            if mode == SignalMode::PmAndMm {
                if let Some(mm) = probe.mm {
                    slots.push(Slot {
                        probe: index,
                        coord: mm,
                        kind: SlotKind::Mismatch,
                    });
                }
            }
        }

        Ok(Self { mode, slots })
    }

    pub fn mode(&self) -> SignalMode {
        self.mode
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of emitted values; PM/MM tables shrink below twice the probe
    /// count for every probe without a mismatch cell.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fills `out` with the chip's signal for every slot, `0.0` for missing.
    pub fn gather(&self, chip: &Chip, out: &mut [f64]) -> IronResult<()> {
        debug_assert_eq!(out.len(), self.slots.len());
        match self.mode {
            SignalMode::PmOnly => {
                let pm = chip.require_pm()?;
                for (value, slot) in out.iter_mut().zip(&self.slots) {
                    *value = pm[slot.probe].raw();
                }
            }
            SignalMode::PmAndMm => {
                for (value, slot) in out.iter_mut().zip(&self.slots) {
                    *value = chip.intensity(slot.coord).raw();
                }
            }
        }
        Ok(())
    }

    pub fn signals(&self, chip: &Chip) -> IronResult<Vec<f64>> {
        let mut values = scratch_vec(self.slots.len(), 0.0, "probe signal vector")?;
        self.gather(chip, &mut values)?;
        Ok(values)
    }
}

/// Copies the chip's probeset summaries into `out`, `0.0` for missing.
pub fn gather_probesets(chip: &Chip, out: &mut [f64]) {
    for (value, intensity) in out.iter_mut().zip(&chip.probesets) {
        *value = intensity.raw();
    }
}

#[cfg(test)]
mod tests {
    use super::{SlotKind, SlotTable, gather_probesets};
    use crate::chip::Chip;
    use crate::domain::{GridCoord, SignalMode};
    use crate::layout::{ArrayLayout, Probe, Probeset};

    fn layout() -> ArrayLayout {
        let mut layout = ArrayLayout::new(3, 3);
        let probeset = layout.push_probeset(Probeset::new("g1_at"));
        layout.push_probe(Probe::from_pair(
            GridCoord::new(0, 0),
            GridCoord::new(0, 1),
            probeset,
        ));
        // Mismatch repeats the PM coordinate: no real MM probe.
        layout.push_probe(Probe::from_pair(
            GridCoord::new(1, 0),
            GridCoord::new(1, 0),
            probeset,
        ));
        layout.push_probe(Probe::from_pair(
            GridCoord::new(2, 0),
            GridCoord::new(2, 1),
            probeset,
        ));
        layout
    }

    fn chip(layout: &ArrayLayout) -> Chip {
        let mut chip = Chip::for_layout("a.CEL", layout).with_pm(&[100.0, 200.0, 300.0]);
        chip.set_intensity(GridCoord::new(0, 0), 10.0);
        chip.set_intensity(GridCoord::new(0, 1), 11.0);
        chip.set_intensity(GridCoord::new(1, 0), 20.0);
        chip.set_intensity(GridCoord::new(2, 0), 30.0);
        chip.set_intensity(GridCoord::new(2, 1), 31.0);
        chip
    }

    #[test]
    fn probe_without_mismatch_contributes_one_slot() {
        let layout = layout();
        let table = SlotTable::build(&layout, SignalMode::PmAndMm).expect("table should build");

        assert_eq!(table.len(), 5);
        let kinds: Vec<_> = table.slots().iter().map(|slot| (slot.probe, slot.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (0, SlotKind::PerfectMatch),
                (0, SlotKind::Mismatch),
                (1, SlotKind::PerfectMatch),
                (2, SlotKind::PerfectMatch),
                (2, SlotKind::Mismatch),
            ]
        );

        let signals = table.signals(&chip(&layout)).expect("grid signals");
        assert_eq!(signals, vec![10.0, 11.0, 20.0, 30.0, 31.0]);
    }

    #[test]
    fn pm_only_reads_flat_pm_vector() {
        let layout = layout();
        let table = SlotTable::build(&layout, SignalMode::PmOnly).expect("table should build");

        assert_eq!(table.len(), 3);
        let signals = table.signals(&chip(&layout)).expect("pm signals");
        assert_eq!(signals, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn probeset_gather_maps_missing_to_zero() {
        let chip = Chip::new("a.CEL", 1, 1).with_probesets(&[4.0, 0.0, 9.0]);
        let mut out = vec![-1.0; 3];
        gather_probesets(&chip, &mut out);
        assert_eq!(out, vec![4.0, 0.0, 9.0]);
    }
}
