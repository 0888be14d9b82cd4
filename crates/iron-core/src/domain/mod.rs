pub mod errors;

pub use errors::{IronError, IronErrorCategory, IronResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Physical (x, y) location of a feature on the chip grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct GridCoord {
    pub x: usize,
    pub y: usize,
}

impl GridCoord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl Display for GridCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A single measured signal, or the absence of one.
///
/// Raw inputs encode "missing" as exactly `0.0`; that encoding is only
/// interpreted in [`Intensity::from_raw`] and [`Intensity::raw`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(from = "f64", into = "f64")]
pub enum Intensity {
    #[default]
    Missing,
    Measured(f64),
}

impl Intensity {
    pub fn from_raw(value: f64) -> Self {
        if value == 0.0 {
            Self::Missing
        } else {
            Self::Measured(value)
        }
    }

    pub fn raw(self) -> f64 {
        match self {
            Self::Missing => 0.0,
            Self::Measured(value) => value,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Missing => None,
            Self::Measured(value) => Some(value),
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Multiplies a measured value; missing values stay missing.
    pub fn scaled(self, factor: f64) -> Self {
        match self {
            Self::Missing => Self::Missing,
            Self::Measured(value) => Self::Measured(value * factor),
        }
    }

    /// Raises the value to `floor` when it is below it. Missing compares as
    /// zero, so a positive floor turns it into a measurement.
    pub fn floored(self, floor: f64) -> Self {
        if self.raw() < floor {
            Self::from_raw(floor)
        } else {
            self
        }
    }
}

impl From<f64> for Intensity {
    fn from(value: f64) -> Self {
        Self::from_raw(value)
    }
}

impl From<Intensity> for f64 {
    fn from(value: Intensity) -> Self {
        value.raw()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    Probe,
    Probeset,
}

impl Granularity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Probe => "probe-level",
            Self::Probeset => "probeset-level",
        }
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Which probe signals take part in probe-level normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalMode {
    /// Perfect-match and mismatch cells read from the chip grid.
    #[default]
    PmAndMm,
    /// Only the chip's flat perfect-match vector.
    PmOnly,
}

impl SignalMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PmAndMm => "pm-and-mm",
            Self::PmOnly => "pm-only",
        }
    }
}

impl Display for SignalMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Allocates an empty scratch buffer able to hold `capacity` entries,
/// reporting allocation failure instead of aborting.
pub(crate) fn scratch_with_capacity<T>(capacity: usize, what: &'static str) -> IronResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(capacity).map_err(|_| {
        IronError::out_of_memory(
            "SYS.SCRATCH_ALLOC",
            format!("failed to allocate {capacity} entries for {what}"),
        )
    })?;
    Ok(buffer)
}

pub(crate) fn scratch_vec<T: Clone>(len: usize, fill: T, what: &'static str) -> IronResult<Vec<T>> {
    let mut buffer = scratch_with_capacity(len, what)?;
    buffer.resize(len, fill);
    Ok(buffer)
}
