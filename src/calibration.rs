//! Exhaustive grid search over melt rate and lapse rate.
//!
//! Every trial is independent: it builds its own temperature correction, snow store and error
//! accumulator, and only reads the shared [`Catchment`]. That lets the sweep run on rayon's
//! thread pool while producing exactly the same trials, in the same order, as a serial sweep.
use crate::catchment::Catchment;
use crate::config::CalibrationConfig;
use crate::error::{Result, invalid};
use crate::model::{Parameters, SnowRunoffModel};
use crate::simulation::{RunTrace, SimulationRun};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Candidate values `multiplier * i` for `i` in `start_index..stop_index`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub multiplier: f64,
    pub start_index: usize,
    pub stop_index: usize,
}

impl RangeSpec {
    pub fn new(multiplier: f64, start_index: usize, stop_index: usize) -> Self {
        RangeSpec {
            multiplier,
            start_index,
            stop_index,
        }
    }

    pub fn len(&self) -> usize {
        self.stop_index.saturating_sub(self.start_index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> Vec<f64> {
        (self.start_index..self.stop_index)
            .map(|i| self.multiplier * i as f64)
            .collect()
    }
}

/// A melt rate range crossed with a lapse rate range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchGrid {
    #[serde(default)]
    pub label: String,
    pub melt_rate: RangeSpec,
    pub lapse_rate: RangeSpec,
}

impl SearchGrid {
    pub fn new(label: impl Into<String>, melt_rate: RangeSpec, lapse_rate: RangeSpec) -> Self {
        SearchGrid {
            label: label.into(),
            melt_rate,
            lapse_rate,
        }
    }

    pub fn coarse() -> Self {
        SearchGrid::new("coarse", RangeSpec::new(0.002, 1, 20), RangeSpec::new(0.001, 1, 20))
    }

    pub fn fine() -> Self {
        SearchGrid::new("fine", RangeSpec::new(0.0002, 26, 60), RangeSpec::new(0.0002, 6, 30))
    }

    pub fn finest() -> Self {
        SearchGrid::new("finest", RangeSpec::new(0.0001, 78, 98), RangeSpec::new(0.0001, 32, 52))
    }

    pub fn len(&self) -> usize {
        self.melt_rate.len() * self.lapse_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All parameter pairs, melt rate in the outer loop.
    pub fn pairs(&self) -> Vec<Parameters> {
        let lapse_rates = self.lapse_rate.values();
        self.melt_rate
            .values()
            .into_iter()
            .flat_map(|m| lapse_rates.iter().map(move |&l| Parameters::new(m, l)))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.melt_rate.is_empty() {
            return invalid(format!("melt rate range of grid '{}' is empty", self.label));
        }
        if self.lapse_rate.is_empty() {
            return invalid(format!("lapse rate range of grid '{}' is empty", self.label));
        }
        if let Some(m) = self.melt_rate.values().into_iter().find(|m| !(*m >= 0.0 && m.is_finite())) {
            return invalid(format!(
                "melt rate range of grid '{}' yields {m}, melt rates must be nonnegative numbers",
                self.label
            ));
        }
        Ok(())
    }
}

/// The score of one parameter pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTrial {
    pub rmse: f64,
    pub melt_rate: f64,
    pub lapse_rate: f64,
}

impl CalibrationTrial {
    pub fn parameters(&self) -> Parameters {
        Parameters::new(self.melt_rate, self.lapse_rate)
    }
}

/// The best trial of a sweep and every trial in enumeration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub best: CalibrationTrial,
    pub trials: Vec<CalibrationTrial>,
}

/// Lowest RMSE, the earliest one on ties. NaN scores never win over a number.
pub fn best_of(trials: &[CalibrationTrial]) -> Option<CalibrationTrial> {
    trials.iter().copied().fold(None, |best, t| match best {
        None => Some(t),
        Some(b) if t.rmse < b.rmse || (b.rmse.is_nan() && !t.rmse.is_nan()) => Some(t),
        keep => keep,
    })
}

/// RMSE of one parameter pair with a fresh snow store.
pub fn run_trial(params: Parameters, catchment: &Catchment, config: &CalibrationConfig) -> Result<f64> {
    let model = SnowRunoffModel::with_parameters(
        catchment.elevation(),
        config.station_elevation,
        config.cell_area,
        params,
    )?;
    let rmse = SimulationRun::new(catchment, config.nr_of_timesteps)?.run(model)?;
    debug!(
        "melt rate {:.5}, lapse rate {:.5}: rmse {}",
        params.melt_rate, params.lapse_rate, rmse
    );
    Ok(rmse)
}

/// Traced run of a single parameter pair, for plotting modelled against observed discharge.
pub fn trace_trial(
    params: Parameters,
    catchment: &Catchment,
    config: &CalibrationConfig,
    keep_discharge: bool,
) -> Result<RunTrace> {
    let model = SnowRunoffModel::with_parameters(
        catchment.elevation(),
        config.station_elevation,
        config.cell_area,
        params,
    )?;
    SimulationRun::new(catchment, config.nr_of_timesteps)?.trace(model, keep_discharge)
}

/// Scores every pair of `grid` and picks the lowest RMSE.
///
/// The first failing trial aborts the sweep with its error.
pub fn search(grid: &SearchGrid, catchment: &Catchment, config: &CalibrationConfig) -> Result<CalibrationResult> {
    grid.validate()?;
    config.validate_run()?;
    catchment.forcing().check_covers(config.nr_of_timesteps)?;

    let pairs = grid.pairs();
    let score = |p: &Parameters| -> Result<CalibrationTrial> {
        Ok(CalibrationTrial {
            rmse: run_trial(*p, catchment, config)?,
            melt_rate: p.melt_rate,
            lapse_rate: p.lapse_rate,
        })
    };
    let trials: Vec<CalibrationTrial> = if config.parallel {
        pairs.par_iter().map(score).collect::<Result<_>>()?
    } else {
        pairs.iter().map(score).collect::<Result<_>>()?
    };

    let best = match best_of(&trials) {
        Some(best) => best,
        None => return invalid(format!("grid '{}' produced no trials", grid.label)),
    };
    info!(
        "grid '{}': {} trials, best melt rate {:.5}, lapse rate {:.5}, rmse {}",
        grid.label,
        trials.len(),
        best.melt_rate,
        best.lapse_rate,
        best.rmse
    );
    Ok(CalibrationResult { best, trials })
}

/// Runs every tier in `config.tiers`, in order.
pub fn search_tiers(catchment: &Catchment, config: &CalibrationConfig) -> Result<Vec<CalibrationResult>> {
    config.validate()?;
    config
        .tiers
        .iter()
        .map(|grid| search(grid, catchment, config))
        .collect()
}
