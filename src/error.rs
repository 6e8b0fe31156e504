use std::fmt;
use thiserror::Error;

/// Errors raised while simulating or calibrating.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("drainage network construction failed: {0}")]
    NetworkConstruction(#[from] NetworkConstructionError),

    #[error("missing {quantity} value at timestep {timestep}, cell ({row}, {col})")]
    MissingValue {
        timestep: usize,
        quantity: Quantity,
        row: usize,
        col: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Reasons a DEM cannot be turned into a drainage network.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetworkConstructionError {
    #[error("elevation raster has no defined cells")]
    NoData,

    #[error("depression at ({row}, {col}) left unresolved: {metric} {value} exceeds threshold {threshold}")]
    UnresolvedPit {
        row: usize,
        col: usize,
        metric: PitMetric,
        value: f64,
        threshold: f64,
    },

    #[error("flow directions contain a cycle: only {resolved} of {total} cells reach an outlet")]
    Cycle { resolved: usize, total: usize },
}

/// The sampled quantity reported by [`Error::MissingValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Discharge,
    Observed,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Discharge => write!(f, "discharge"),
            Quantity::Observed => write!(f, "observed"),
        }
    }
}

/// The four measures compared against a [`crate::PitFillPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitMetric {
    OutflowDepth,
    CoreArea,
    CoreVolume,
    CatchmentArea,
}

impl fmt::Display for PitMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PitMetric::OutflowDepth => "outflow depth",
            PitMetric::CoreArea => "core area",
            PitMetric::CoreVolume => "core volume",
            PitMetric::CatchmentArea => "catchment area",
        };
        write!(f, "{name}")
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::InvalidConfiguration(msg.into()))
}
