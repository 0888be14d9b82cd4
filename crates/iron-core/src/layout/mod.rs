//! Array layout: the probe/probeset description shared by every chip of a
//! chip set.
//!
//! The layout is immutable once built. Per-traversal duplicate tracking lives
//! in a separate [`SeenGrid`] created from the layout, so several passes (or
//! several workers) never share hidden state.

mod seen;

pub use seen::SeenGrid;

use crate::domain::{GridCoord, IronError, IronResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    #[default]
    Normal,
    Undefined,
    Qc,
}

impl CellKind {
    /// Undefined and QC-reserved cells never take part in a fit.
    pub const fn is_reserved(self) -> bool {
        matches!(self, Self::Undefined | Self::Qc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbesetKind {
    Control,
    Regular,
}

impl ProbesetKind {
    /// Classifies a probeset by name: `AFFX*` names, spike-in names and names
    /// mentioning "control" are control probesets.
    pub fn classify(name: &str) -> Self {
        if name.starts_with("AFFX") {
            return Self::Control;
        }

        let lower = name.to_ascii_lowercase();
        if let Some(position) = lower.find("spike") {
            let rest = &lower[position + "spike".len()..];
            if ["in", "-in", "_in", " in"]
                .iter()
                .any(|suffix| rest.starts_with(suffix))
            {
                return Self::Control;
            }
        }
        if lower.contains("control") {
            return Self::Control;
        }

        Self::Regular
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "ProbesetRecord")]
pub struct Probeset {
    pub name: String,
    pub kind: ProbesetKind,
}

impl Probeset {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = ProbesetKind::classify(&name);
        Self { name, kind }
    }

    pub fn with_kind(name: impl Into<String>, kind: ProbesetKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn is_control(&self) -> bool {
        self.kind == ProbesetKind::Control
    }
}

#[derive(Deserialize)]
struct ProbesetRecord {
    name: String,
    #[serde(default)]
    kind: Option<ProbesetKind>,
}

impl From<ProbesetRecord> for Probeset {
    fn from(record: ProbesetRecord) -> Self {
        match record.kind {
            Some(kind) => Self::with_kind(record.name, kind),
            None => Self::new(record.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "ProbeRecord")]
pub struct Probe {
    pub pm: GridCoord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mm: Option<GridCoord>,
    pub probeset: usize,
}

impl Probe {
    /// Builds a probe from a raw PM/MM coordinate pair. Layouts without a
    /// real mismatch probe repeat the PM coordinate as MM; that pair becomes
    /// a probe with no MM.
    pub fn from_pair(pm: GridCoord, mm: GridCoord, probeset: usize) -> Self {
        Self {
            pm,
            mm: (mm != pm).then_some(mm),
            probeset,
        }
    }

    pub fn pm_only(pm: GridCoord, probeset: usize) -> Self {
        Self {
            pm,
            mm: None,
            probeset,
        }
    }
}

#[derive(Deserialize)]
struct ProbeRecord {
    pm: GridCoord,
    #[serde(default)]
    mm: Option<GridCoord>,
    probeset: usize,
}

impl From<ProbeRecord> for Probe {
    fn from(record: ProbeRecord) -> Self {
        match record.mm {
            Some(mm) => Self::from_pair(record.pm, mm, record.probeset),
            None => Self::pm_only(record.pm, record.probeset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayLayout {
    pub rows: usize,
    pub cols: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    cell_kinds: Vec<CellKind>,
    pub probes: Vec<Probe>,
    pub probesets: Vec<Probeset>,
    #[serde(default)]
    pub exclusions: HashSet<String>,
    #[serde(default)]
    pub spikeins: HashSet<String>,
}

impl ArrayLayout {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cell_kinds: vec![CellKind::Normal; rows * cols],
            probes: Vec::new(),
            probesets: Vec::new(),
            exclusions: HashSet::new(),
            spikeins: HashSet::new(),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    pub fn probeset_count(&self) -> usize {
        self.probesets.len()
    }

    pub fn push_probeset(&mut self, probeset: Probeset) -> usize {
        self.probesets.push(probeset);
        self.probesets.len() - 1
    }

    pub fn push_probe(&mut self, probe: Probe) -> usize {
        self.probes.push(probe);
        self.probes.len() - 1
    }

    pub fn set_cell_kind(&mut self, coord: GridCoord, kind: CellKind) -> IronResult<()> {
        self.ensure_cell_kinds();
        let index = self.checked_cell_index(coord)?;
        self.cell_kinds[index] = kind;
        Ok(())
    }

    pub fn with_exclusions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_spikeins<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spikeins.extend(names.into_iter().map(Into::into));
        self
    }

    /// Row-major index of a coordinate, `x` selecting the row.
    pub fn cell_index(&self, coord: GridCoord) -> usize {
        coord.x * self.cols + coord.y
    }

    pub fn checked_cell_index(&self, coord: GridCoord) -> IronResult<usize> {
        if coord.x >= self.rows || coord.y >= self.cols {
            return Err(IronError::input_validation(
                "INPUT.LAYOUT_COORD",
                format!(
                    "grid coordinate {} is outside the {}x{} layout grid",
                    coord, self.rows, self.cols
                ),
            ));
        }
        Ok(self.cell_index(coord))
    }

    pub fn cell_kind(&self, coord: GridCoord) -> CellKind {
        // Documents written without cell kinds describe an all-normal grid.
        self.cell_kinds
            .get(self.cell_index(coord))
            .copied()
            .unwrap_or_default()
    }

    pub fn probeset_of(&self, probe: &Probe) -> &Probeset {
        &self.probesets[probe.probeset]
    }

    pub fn is_excluded(&self, probeset: &Probeset) -> bool {
        self.exclusions.contains(&probeset.name)
    }

    pub fn is_spikein(&self, probeset: &Probeset) -> bool {
        self.spikeins.contains(&probeset.name)
    }

    pub fn seen_grid(&self) -> SeenGrid {
        SeenGrid::new(self.rows, self.cols)
    }

    /// Checks the internal references of a layout built from external data.
    pub fn validate(&self) -> IronResult<()> {
        if !self.cell_kinds.is_empty() && self.cell_kinds.len() != self.cell_count() {
            return Err(IronError::input_validation(
                "INPUT.LAYOUT_CELL_KINDS",
                format!(
                    "layout declares {} cell kinds for a {}x{} grid",
                    self.cell_kinds.len(),
                    self.rows,
                    self.cols
                ),
            ));
        }

        for (index, probe) in self.probes.iter().enumerate() {
            if probe.probeset >= self.probesets.len() {
                return Err(IronError::input_validation(
                    "INPUT.LAYOUT_PROBESET_REF",
                    format!(
                        "probe {} references probeset {} but the layout has {} probesets",
                        index,
                        probe.probeset,
                        self.probesets.len()
                    ),
                ));
            }
            self.checked_cell_index(probe.pm)?;
            if let Some(mm) = probe.mm {
                self.checked_cell_index(mm)?;
            }
        }

        Ok(())
    }

    fn ensure_cell_kinds(&mut self) {
        if self.cell_kinds.len() != self.cell_count() {
            self.cell_kinds = vec![CellKind::Normal; self.cell_count()];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ArrayLayout, CellKind, Probe, Probeset, ProbesetKind};
    use crate::assemble::SlotTable;
    use crate::domain::{GridCoord, IronErrorCategory, SignalMode};

    #[test]
    fn control_names_are_classified() {
        for name in [
            "AFFX-BioB-5_at",
            "ERCC spike-in 00002",
            "my_spike_in_set",
            "Spike In 3",
            "negative_CONTROL_17",
        ] {
            assert_eq!(ProbesetKind::classify(name), ProbesetKind::Control, "{name}");
        }
        for name in ["1007_s_at", "spiked_gene", "affx_lowercase_prefix"] {
            assert_eq!(ProbesetKind::classify(name), ProbesetKind::Regular, "{name}");
        }
    }

    #[test]
    fn equal_pm_and_mm_means_no_mismatch_probe() {
        let pm = GridCoord::new(1, 2);
        assert_eq!(Probe::from_pair(pm, pm, 0).mm, None);
        assert_eq!(
            Probe::from_pair(pm, GridCoord::new(1, 3), 0).mm,
            Some(GridCoord::new(1, 3))
        );
    }

    #[test]
    fn json_probe_repeating_pm_as_mm_has_no_mismatch_slot() {
        let layout: ArrayLayout = serde_json::from_str(
            r#"{
              "rows": 1,
              "cols": 2,
              "probes": [
                { "pm": { "x": 0, "y": 0 }, "mm": { "x": 0, "y": 0 }, "probeset": 0 }
              ],
              "probesets": [{ "name": "g_at" }]
            }"#,
        )
        .expect("layout should parse");

        assert_eq!(layout.probes[0].mm, None);
        let table = SlotTable::build(&layout, SignalMode::PmAndMm).expect("table should build");
        assert_eq!(table.len(), 1);

        let paired: Probe = serde_json::from_str(
            r#"{ "pm": { "x": 0, "y": 0 }, "mm": { "x": 0, "y": 1 }, "probeset": 0 }"#,
        )
        .expect("probe should parse");
        assert_eq!(paired.mm, Some(GridCoord::new(0, 1)));
    }

    #[test]
    fn validate_rejects_out_of_grid_probes() {
        let mut layout = ArrayLayout::new(2, 2);
        let probeset = layout.push_probeset(Probeset::new("gene_at"));
        layout.push_probe(Probe::pm_only(GridCoord::new(2, 0), probeset));

        let error = layout.validate().expect_err("probe outside grid should fail");
        assert_eq!(error.category(), IronErrorCategory::InvalidInput);
        assert_eq!(error.placeholder(), "INPUT.LAYOUT_COORD");
    }

    #[test]
    fn cell_kinds_and_name_sets_are_queryable() {
        let mut layout = ArrayLayout::new(2, 3).with_spikeins(["spk_at"]);
        layout
            .set_cell_kind(GridCoord::new(1, 2), CellKind::Qc)
            .expect("coordinate is inside the grid");
        let spike = layout.push_probeset(Probeset::new("spk_at"));

        assert!(layout.cell_kind(GridCoord::new(1, 2)).is_reserved());
        assert!(!layout.cell_kind(GridCoord::new(0, 0)).is_reserved());
        assert!(layout.is_spikein(&layout.probesets[spike]));
        assert!(!layout.is_excluded(&layout.probesets[spike]));
    }

    #[test]
    fn probeset_kind_is_inferred_when_absent_from_json() {
        let probesets: Vec<Probeset> = serde_json::from_str(
            r#"[{"name": "AFFX-r2-P1"}, {"name": "AFFX-kept", "kind": "regular"}, {"name": "g_at"}]"#,
        )
        .expect("probesets should parse");
        assert!(probesets[0].is_control());
        assert!(!probesets[1].is_control());
        assert!(!probesets[2].is_control());
    }
}
