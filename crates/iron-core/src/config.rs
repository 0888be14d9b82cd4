use crate::domain::SignalMode;
use crate::fit::{FitPolicy, PRIMARY_RANK_FRACTION, SECONDARY_RANK_FRACTION};
use crate::floor::NEAR_ZERO_SIGNAL;
use crate::mask::MaskPolicy;
use crate::pairwise::{PROBESET_FLOOR, PairwiseOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Run settings shared by the normalization and floor commands.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalizationConfig {
    pub signal_mode: SignalMode,
    pub use_exclusions: bool,
    pub use_spikeins: bool,
    pub primary_rank_fraction: f64,
    pub secondary_rank_fraction: f64,
    pub fit_policy: FitPolicy,
    pub probe_floor: Option<f64>,
    /// `null` turns the probeset floor off.
    pub probeset_floor: Option<f64>,
    pub unlog_inputs: bool,
    pub min_non_zero_threshold: f64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            signal_mode: SignalMode::default(),
            use_exclusions: false,
            use_spikeins: false,
            primary_rank_fraction: PRIMARY_RANK_FRACTION,
            secondary_rank_fraction: SECONDARY_RANK_FRACTION,
            fit_policy: FitPolicy::default(),
            probe_floor: None,
            probeset_floor: Some(PROBESET_FLOOR),
            unlog_inputs: false,
            min_non_zero_threshold: NEAR_ZERO_SIGNAL,
        }
    }
}

impl NormalizationConfig {
    pub fn mask_policy(&self) -> MaskPolicy {
        MaskPolicy {
            use_exclusions: self.use_exclusions,
            use_spikeins: self.use_spikeins,
        }
    }

    pub fn to_pairwise_options(&self) -> PairwiseOptions {
        PairwiseOptions {
            signal_mode: self.signal_mode,
            mask_policy: self.mask_policy(),
            primary_rank_fraction: self.primary_rank_fraction,
            secondary_rank_fraction: self.secondary_rank_fraction,
            fit_policy: self.fit_policy,
            probe_floor: self.probe_floor,
            probeset_floor: self.probeset_floor,
            unlog_inputs: self.unlog_inputs,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizationConfigError {
    #[error("failed to read normalization config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse normalization config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub fn load_normalization_config(
    config_path: impl AsRef<Path>,
) -> Result<NormalizationConfig, NormalizationConfigError> {
    let config_path = config_path.as_ref();
    let source =
        fs::read_to_string(config_path).map_err(|source| NormalizationConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&source).map_err(|source| NormalizationConfigError::Parse {
        path: config_path.to_path_buf(),
        source,
    })
}
