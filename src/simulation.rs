//! Driving a model through the forcing period and scoring it at the outflow point.
use crate::catchment::Catchment;
use crate::error::{Error, Quantity, Result, invalid};
use crate::model::{SnowRunoffModel, StepOutput};
use crate::raster::Raster;
use log::trace;

/// Running sum of squared differences between modelled and observed values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SquaredErrorAccumulator {
    sum: f64,
    count: usize,
}

impl SquaredErrorAccumulator {
    pub fn new() -> Self {
        SquaredErrorAccumulator::default()
    }

    pub fn add(&mut self, modelled: f64, observed: f64) {
        self.sum += (modelled - observed).powi(2);
        self.count += 1;
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean squared error over `n` timesteps.
    pub fn mse(&self, n: usize) -> f64 {
        self.sum / n as f64
    }

    pub fn rmse(&self, n: usize) -> f64 {
        self.mse(n).sqrt()
    }
}

/// The paired series from one traced run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTrace {
    pub modelled: Vec<f64>,
    pub observed: Vec<f64>,
    /// Discharge rasters per timestep, empty unless requested.
    pub discharge: Vec<Raster>,
    pub mse: f64,
    pub rmse: f64,
}

/// A fixed number of ordered timesteps over a catchment.
#[derive(Debug, Clone, Copy)]
pub struct SimulationRun<'a> {
    catchment: &'a Catchment,
    nr_of_timesteps: usize,
}

impl<'a> SimulationRun<'a> {
    /// Fails when `nr_of_timesteps` is zero or the forcing is too short.
    pub fn new(catchment: &'a Catchment, nr_of_timesteps: usize) -> Result<Self> {
        if nr_of_timesteps == 0 {
            return invalid("number of timesteps must be positive");
        }
        catchment.forcing().check_covers(nr_of_timesteps)?;
        Ok(SimulationRun {
            catchment,
            nr_of_timesteps,
        })
    }

    pub fn nr_of_timesteps(&self) -> usize {
        self.nr_of_timesteps
    }

    /// Root-mean-square error of discharge at the observation point.
    pub fn run(&self, model: SnowRunoffModel) -> Result<f64> {
        let errors = self.drive(model, |_, _, _, _| {})?;
        Ok(errors.rmse(self.nr_of_timesteps))
    }

    /// Like [`SimulationRun::run`] but keeps the modelled and observed series, and the
    /// discharge rasters when `keep_discharge` is set.
    pub fn trace(&self, model: SnowRunoffModel, keep_discharge: bool) -> Result<RunTrace> {
        let n = self.nr_of_timesteps;
        let mut modelled = Vec::with_capacity(n);
        let mut observed = Vec::with_capacity(n);
        let mut discharge = Vec::new();
        let errors = self.drive(model, |_, q, obs, out| {
            modelled.push(q);
            observed.push(obs);
            if keep_discharge {
                discharge.push(out.discharge);
            }
        })?;
        Ok(RunTrace {
            modelled,
            observed,
            discharge,
            mse: errors.mse(n),
            rmse: errors.rmse(n),
        })
    }

    fn drive<F>(&self, mut model: SnowRunoffModel, mut on_step: F) -> Result<SquaredErrorAccumulator>
    where
        F: FnMut(usize, f64, f64, StepOutput),
    {
        let forcing = self.catchment.forcing();
        let network = self.catchment.network();
        let point = self.catchment.observation();
        let mut errors = SquaredErrorAccumulator::new();

        for t in 1..=self.nr_of_timesteps {
            let out = model.step(forcing.precipitation.at(t), forcing.temperature.at(t), network)?;
            let modelled = point.sample(&out.discharge).ok_or(Error::MissingValue {
                timestep: t,
                quantity: Quantity::Discharge,
                row: point.row,
                col: point.col,
            })?;
            let observed = forcing.observed.at(t).ok_or(Error::MissingValue {
                timestep: t,
                quantity: Quantity::Observed,
                row: point.row,
                col: point.col,
            })?;
            trace!("t {t}: modelled {modelled:.6}, observed {observed:.6}");
            errors.add(modelled, observed);
            on_step(t, modelled, observed, out);
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_rmse() {
        let mut acc = SquaredErrorAccumulator::new();
        acc.add(3.0, 1.0);
        acc.add(1.0, 1.0);
        assert_eq!(acc.sum(), 4.0);
        assert_eq!(acc.count(), 2);
        assert_eq!(acc.mse(2), 2.0);
        assert!((acc.rmse(2) - 2.0_f64.sqrt()).abs() < 1e-15);
    }
}
