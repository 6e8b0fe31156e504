//! Run and sweep settings.
//!
//! The defaults describe a 181-day calibration season with a meteorological station at
//! 208.1 m, every depression filled, and three search tiers of increasing resolution.
use crate::calibration::SearchGrid;
use crate::drainage::PitFillPolicy;
use crate::error::{Result, invalid};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NR_OF_TIMESTEPS: usize = 181;
pub const DEFAULT_STATION_ELEVATION: f64 = 208.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub nr_of_timesteps: usize,
    /// Elevation of the station the temperature series was measured at.
    pub station_elevation: f64,
    /// Area of one cell, multiplying runoff depth into discharge.
    pub cell_area: f64,
    pub pit_fill: PitFillPolicy,
    /// Score trials on the rayon thread pool.
    pub parallel: bool,
    pub tiers: Vec<SearchGrid>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            nr_of_timesteps: DEFAULT_NR_OF_TIMESTEPS,
            station_elevation: DEFAULT_STATION_ELEVATION,
            cell_area: 1.0,
            pit_fill: PitFillPolicy::unbounded(),
            parallel: true,
            tiers: vec![SearchGrid::coarse(), SearchGrid::fine(), SearchGrid::finest()],
        }
    }
}

impl CalibrationConfig {
    pub fn new() -> Self {
        CalibrationConfig::default()
    }

    pub fn nr_of_timesteps(mut self, n: usize) -> Self {
        self.nr_of_timesteps = n;
        self
    }

    pub fn station_elevation(mut self, elevation: f64) -> Self {
        self.station_elevation = elevation;
        self
    }

    pub fn cell_area(mut self, area: f64) -> Self {
        self.cell_area = area;
        self
    }

    pub fn pit_fill(mut self, policy: PitFillPolicy) -> Self {
        self.pit_fill = policy;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Replaces the search tiers.
    pub fn tiers(mut self, tiers: Vec<SearchGrid>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Checks the settings a single run depends on.
    pub fn validate_run(&self) -> Result<()> {
        if self.nr_of_timesteps == 0 {
            return invalid("number of timesteps must be positive");
        }
        if !(self.cell_area > 0.0 && self.cell_area.is_finite()) {
            return invalid(format!("cell area must be positive, got {}", self.cell_area));
        }
        if !self.station_elevation.is_finite() {
            return invalid("station elevation must be finite");
        }
        Ok(())
    }

    /// Checks run settings and every search tier.
    pub fn validate(&self) -> Result<()> {
        self.validate_run()?;
        if self.tiers.is_empty() {
            return invalid("no search tiers configured");
        }
        self.tiers.iter().try_for_each(SearchGrid::validate)
    }
}
