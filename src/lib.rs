//! # Snowmelt calibration
//!
//! `snowmelt-calibration` runs a degree-day snow model over a DEM, routes the runoff down a D8
//! drainage network to an outflow point, and calibrates the melt rate and the temperature lapse
//! rate by grid search against observed discharge.
//!
//! Loading rasters and time series from disk, and plotting results, are left to the caller:
//! everything here works on preloaded [`Raster`]s and [`TimeSeries`].
//!
//! ## Example
//!
//! ```
//! use ndarray::array;
//! use snowmelt_calibration::*;
//!
//! let dem = Raster::from_array(array![
//!     [10.0, 12.0, 10.0],
//!     [12.0, 11.0, 12.0],
//!     [10.0, 12.0,  8.0],
//! ]);
//! let forcing = Forcing::new(
//!     TimeSeries::from_values(&[10.0, 0.0, 0.0]),
//!     TimeSeries::from_values(&[-1.0, 1.0, 1.0]),
//!     TimeSeries::from_values(&[0.0, 2.0, 2.0]),
//! );
//! let config = CalibrationConfig::new()
//!     .nr_of_timesteps(3)
//!     .station_elevation(0.0)
//!     .parallel(false);
//! let catchment = Catchment::new(dem, ObservationPoint::new(2, 2), forcing, &config.pit_fill)?;
//!
//! let grid = SearchGrid::new(
//!     "example",
//!     RangeSpec::new(0.25, 1, 4),
//!     RangeSpec::new(0.0, 0, 1),
//! );
//! let result = search(&grid, &catchment, &config)?;
//! assert_eq!(result.trials.len(), 3);
//! assert_eq!(result.best.melt_rate, 0.5);
//! # Ok::<(), snowmelt_calibration::Error>(())
//! ```
pub mod calibration;
pub mod catchment;
pub mod config;
pub mod drainage;
pub mod error;
pub mod model;
pub mod raster;
pub mod simulation;

pub use calibration::{
    CalibrationResult, CalibrationTrial, RangeSpec, SearchGrid, best_of, run_trial, search, search_tiers,
    trace_trial,
};
pub use catchment::{Catchment, Forcing, ObservationPoint, TimeSeries};
pub use config::CalibrationConfig;
pub use drainage::{DrainageNetwork, PitFillPolicy};
pub use error::{Error, NetworkConstructionError, PitMetric, Quantity, Result};
pub use model::{Parameters, SnowRunoffModel, StepOutput, temperature_correction};
pub use raster::{Mask, Raster};
pub use simulation::{RunTrace, SimulationRun, SquaredErrorAccumulator};
