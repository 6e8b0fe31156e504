//! Preloaded inputs shared read-only by every calibration trial.
use crate::drainage::{DrainageNetwork, PitFillPolicy};
use crate::error::{Result, invalid};
use crate::raster::{Mask, Raster};

/// One scalar per timestep, indexed from 1. Missing entries are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    values: Vec<Option<f64>>,
}

impl TimeSeries {
    pub fn new(values: Vec<Option<f64>>) -> Self {
        TimeSeries { values }
    }

    /// A series with no missing entries.
    pub fn from_values(values: &[f64]) -> Self {
        TimeSeries {
            values: values.iter().copied().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at timestep `t` (1-based). `None` when missing or out of range.
    pub fn at(&self, t: usize) -> Option<f64> {
        t.checked_sub(1).and_then(|i| self.values.get(i).copied().flatten())
    }
}

/// Precipitation, temperature and observed discharge, aligned by timestep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Forcing {
    pub precipitation: TimeSeries,
    pub temperature: TimeSeries,
    pub observed: TimeSeries,
}

impl Forcing {
    pub fn new(precipitation: TimeSeries, temperature: TimeSeries, observed: TimeSeries) -> Self {
        Forcing {
            precipitation,
            temperature,
            observed,
        }
    }

    /// Number of timesteps covered by all three series.
    pub fn len(&self) -> usize {
        self.precipitation
            .len()
            .min(self.temperature.len())
            .min(self.observed.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails unless every series covers `nr_of_timesteps`.
    pub fn check_covers(&self, nr_of_timesteps: usize) -> Result<()> {
        for (name, series) in [
            ("precipitation", &self.precipitation),
            ("temperature", &self.temperature),
            ("observed", &self.observed),
        ] {
            if series.len() < nr_of_timesteps {
                return invalid(format!(
                    "{name} series has {} entries, {nr_of_timesteps} timesteps requested",
                    series.len()
                ));
            }
        }
        Ok(())
    }
}

/// The cell where modelled discharge is compared with observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationPoint {
    pub row: usize,
    pub col: usize,
}

impl ObservationPoint {
    pub fn new(row: usize, col: usize) -> Self {
        ObservationPoint { row, col }
    }

    /// Reads the point from a boolean map that holds at exactly one cell.
    pub fn from_mask(mask: &Mask) -> Result<Self> {
        match mask.true_cells().as_slice() {
            [(row, col)] => Ok(ObservationPoint::new(*row, *col)),
            cells => invalid(format!(
                "observation mask must mark exactly one cell, found {}",
                cells.len()
            )),
        }
    }

    /// The raster value at this point, `None` when undefined.
    pub fn sample(&self, raster: &Raster) -> Option<f64> {
        raster.get(self.row, self.col)
    }
}

/// Elevation, its drainage network, the outflow point and the forcing series.
#[derive(Debug, Clone)]
pub struct Catchment {
    elevation: Raster,
    network: DrainageNetwork,
    observation: ObservationPoint,
    forcing: Forcing,
}

impl Catchment {
    /// Derives the drainage network and checks the observation point lies on it.
    pub fn new(
        elevation: Raster,
        observation: ObservationPoint,
        forcing: Forcing,
        pit_fill: &PitFillPolicy,
    ) -> Result<Self> {
        let network = DrainageNetwork::build(&elevation, pit_fill)?;
        Catchment::with_network(elevation, network, observation, forcing)
    }

    /// Uses an already built network, e.g. one shared between several forcing sets.
    pub fn with_network(
        elevation: Raster,
        network: DrainageNetwork,
        observation: ObservationPoint,
        forcing: Forcing,
    ) -> Result<Self> {
        elevation.check_shape(network.shape())?;
        if !network.contains(observation.row, observation.col) {
            return invalid(format!(
                "observation point ({}, {}) is not on the drainage network",
                observation.row, observation.col
            ));
        }
        Ok(Catchment {
            elevation,
            network,
            observation,
            forcing,
        })
    }

    pub fn elevation(&self) -> &Raster {
        &self.elevation
    }

    pub fn network(&self) -> &DrainageNetwork {
        &self.network
    }

    pub fn observation(&self) -> ObservationPoint {
        self.observation
    }

    pub fn forcing(&self) -> &Forcing {
        &self.forcing
    }

    pub fn shape(&self) -> (usize, usize) {
        self.elevation.shape()
    }

    /// A copy with different forcing, keeping the network.
    pub fn with_forcing(&self, forcing: Forcing) -> Catchment {
        Catchment {
            forcing,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn series_is_one_based() {
        let s = TimeSeries::new(vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(s.at(0), None);
        assert_eq!(s.at(1), Some(1.0));
        assert_eq!(s.at(2), None);
        assert_eq!(s.at(3), Some(3.0));
        assert_eq!(s.at(4), None);
    }

    #[test]
    fn observation_mask_needs_one_cell() {
        let one = Mask::from_bools(&array![[false, true], [false, false]]);
        assert_eq!(ObservationPoint::from_mask(&one).unwrap(), ObservationPoint::new(0, 1));
        let two = Mask::from_bools(&array![[true, true], [false, false]]);
        assert!(ObservationPoint::from_mask(&two).is_err());
        let none = Mask::from_bools(&array![[false, false], [false, false]]);
        assert!(ObservationPoint::from_mask(&none).is_err());
    }

    #[test]
    fn short_series_fail_coverage() {
        let f = Forcing::new(
            TimeSeries::from_values(&[1.0, 2.0]),
            TimeSeries::from_values(&[1.0, 2.0, 3.0]),
            TimeSeries::from_values(&[1.0, 2.0, 3.0]),
        );
        assert_eq!(f.len(), 2);
        assert!(f.check_covers(2).is_ok());
        assert!(f.check_covers(3).is_err());
    }
}
