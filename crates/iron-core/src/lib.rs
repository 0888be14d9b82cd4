//! Pairwise intensity normalization for microarray chips.

pub mod apply;
pub mod assemble;
pub mod chip;
pub mod config;
pub mod domain;
pub mod fit;
pub mod floor;
pub mod layout;
pub mod mask;
pub mod numerics;
pub mod pairwise;
pub mod summary;

pub use chip::{Chip, ChipSet};
pub use config::{NormalizationConfig, NormalizationConfigError, load_normalization_config};
pub use domain::{IronError, IronErrorCategory, IronResult};
pub use fit::{FitOutcome, FitRequest, ReplayFitter, ScaleFactorFitter};
pub use layout::ArrayLayout;
pub use pairwise::{PairwiseDiagnostic, PairwiseNormalizer, PairwiseOptions, PairwiseReport};
