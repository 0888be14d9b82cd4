//! Per-chip intensity storage and the chip set that groups chips sharing one
//! array layout.

use crate::domain::{GridCoord, Intensity, IronError, IronResult};
use crate::layout::ArrayLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Cell {
    pub intensity: Intensity,
    /// Set when quality control flagged the cell as unusable.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub masked: bool,
}

impl Cell {
    pub fn new(intensity: Intensity) -> Self {
        Self {
            intensity,
            masked: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chip {
    pub filename: String,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Cell>,
    /// Flat perfect-match intensities in probe order, when the chip has them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm: Option<Vec<Intensity>>,
    /// Probeset summary intensities in probeset order.
    #[serde(default)]
    pub probesets: Vec<Intensity>,
}

impl Chip {
    pub fn new(filename: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self {
            filename: filename.into(),
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
            pm: None,
            probesets: Vec::new(),
        }
    }

    /// Builds an all-missing chip sized for `layout`.
    pub fn for_layout(filename: impl Into<String>, layout: &ArrayLayout) -> Self {
        let mut chip = Self::new(filename, layout.rows, layout.cols);
        chip.probesets = vec![Intensity::Missing; layout.probeset_count()];
        chip
    }

    pub fn with_probesets(mut self, raw: &[f64]) -> Self {
        self.probesets = raw.iter().copied().map(Intensity::from_raw).collect();
        self
    }

    pub fn with_pm(mut self, raw: &[f64]) -> Self {
        self.pm = Some(raw.iter().copied().map(Intensity::from_raw).collect());
        self
    }

    pub fn cell(&self, coord: GridCoord) -> &Cell {
        &self.cells[coord.x * self.cols + coord.y]
    }

    pub fn cell_mut(&mut self, coord: GridCoord) -> &mut Cell {
        &mut self.cells[coord.x * self.cols + coord.y]
    }

    pub fn intensity(&self, coord: GridCoord) -> Intensity {
        self.cell(coord).intensity
    }

    pub fn set_intensity(&mut self, coord: GridCoord, raw: f64) {
        self.cell_mut(coord).intensity = Intensity::from_raw(raw);
    }

    pub fn set_masked(&mut self, coord: GridCoord, masked: bool) {
        self.cell_mut(coord).masked = masked;
    }

    pub fn is_masked(&self, coord: GridCoord) -> bool {
        self.cell(coord).masked
    }

    pub fn probeset_raw(&self) -> Vec<f64> {
        self.probesets.iter().map(|value| value.raw()).collect()
    }

    /// File name without directories or extension, used to label fits.
    pub fn file_stem(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.filename)
    }

    /// Checks that the chip's storage matches the layout's dimensions.
    pub fn validate_against(&self, layout: &ArrayLayout) -> IronResult<()> {
        if self.rows != layout.rows
            || self.cols != layout.cols
            || self.cells.len() != layout.cell_count()
        {
            return Err(IronError::input_validation(
                "INPUT.CHIP_SHAPE",
                format!(
                    "chip '{}' has a {}x{} grid with {} cells; layout expects {}x{}",
                    self.filename,
                    self.rows,
                    self.cols,
                    self.cells.len(),
                    layout.rows,
                    layout.cols
                ),
            ));
        }

        if let Some(pm) = &self.pm {
            if pm.len() != layout.probe_count() {
                return Err(IronError::input_validation(
                    "INPUT.CHIP_PM_LENGTH",
                    format!(
                        "chip '{}' carries {} PM values for {} layout probes",
                        self.filename,
                        pm.len(),
                        layout.probe_count()
                    ),
                ));
            }
        }

        if self.probesets.len() != layout.probeset_count() {
            return Err(IronError::input_validation(
                "INPUT.CHIP_PROBESET_LENGTH",
                format!(
                    "chip '{}' carries {} probeset values for {} layout probesets",
                    self.filename,
                    self.probesets.len(),
                    layout.probeset_count()
                ),
            ));
        }

        Ok(())
    }

    pub(crate) fn require_pm(&self) -> IronResult<&[Intensity]> {
        self.pm.as_deref().ok_or_else(|| {
            IronError::input_validation(
                "INPUT.CHIP_PM_MISSING",
                format!("chip '{}' has no perfect-match vector", self.filename),
            )
        })
    }
}

/// Chips normalized together, all described by the same layout.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChipSet {
    pub layout: ArrayLayout,
    #[serde(default)]
    pub chips: Vec<Chip>,
}

impl ChipSet {
    pub fn new(layout: ArrayLayout) -> Self {
        Self {
            layout,
            chips: Vec::new(),
        }
    }

    pub fn push(&mut self, chip: Chip) {
        self.chips.push(chip);
    }

    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chips.len()
    }

    pub fn validate(&self) -> IronResult<()> {
        self.layout.validate()?;
        for chip in &self.chips {
            chip.validate_against(&self.layout)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Chip, ChipSet};
    use crate::domain::{GridCoord, Intensity};
    use crate::layout::{ArrayLayout, Probe, Probeset};

    fn layout() -> ArrayLayout {
        let mut layout = ArrayLayout::new(2, 2);
        let probeset = layout.push_probeset(Probeset::new("g1_at"));
        layout.push_probe(Probe::pm_only(GridCoord::new(0, 0), probeset));
        layout
    }

    #[test]
    fn file_stem_strips_directories_and_extension() {
        let chip = Chip::new("runs/batch1/sample_07.CEL", 1, 1);
        assert_eq!(chip.file_stem(), "sample_07");
    }

    #[test]
    fn raw_zero_cells_are_missing() {
        let mut chip = Chip::new("a.CEL", 2, 2);
        chip.set_intensity(GridCoord::new(1, 1), 0.0);
        chip.set_intensity(GridCoord::new(0, 1), 42.0);
        assert_eq!(chip.intensity(GridCoord::new(1, 1)), Intensity::Missing);
        assert_eq!(chip.intensity(GridCoord::new(0, 1)), Intensity::Measured(42.0));
    }

    #[test]
    fn chip_set_validation_checks_vector_lengths() {
        let layout = layout();
        let mut set = ChipSet::new(layout.clone());
        set.push(Chip::for_layout("ok.CEL", &layout).with_pm(&[5.0]));
        assert!(set.validate().is_ok());

        set.push(Chip::for_layout("bad.CEL", &layout).with_pm(&[5.0, 6.0]));
        let error = set.validate().expect_err("PM length mismatch should fail");
        assert_eq!(error.placeholder(), "INPUT.CHIP_PM_LENGTH");
    }

    #[test]
    fn chip_requires_pm_for_pm_only_access() {
        let chip = Chip::for_layout("nopm.CEL", &layout());
        let error = chip.require_pm().expect_err("chip without PM vector");
        assert_eq!(error.placeholder(), "INPUT.CHIP_PM_MISSING");
    }
}
