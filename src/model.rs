//! Degree-day snow accumulation and melt with routed runoff.
use crate::drainage::DrainageNetwork;
use crate::error::{Result, invalid};
use crate::raster::Raster;
use log::trace;
use serde::{Deserialize, Serialize};

/// The two calibrated coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Melt per degree above freezing per timestep.
    pub melt_rate: f64,
    /// Temperature drop per unit elevation above the station.
    pub lapse_rate: f64,
}

impl Parameters {
    pub fn new(melt_rate: f64, lapse_rate: f64) -> Self {
        Parameters {
            melt_rate,
            lapse_rate,
        }
    }
}

/// `(elevation - station_elevation) * lapse_rate`, subtracted from the station temperature.
pub fn temperature_correction(elevation: &Raster, station_elevation: f64, lapse_rate: f64) -> Raster {
    elevation.map(move |z| (z - station_elevation) * lapse_rate)
}

/// Intermediate and routed fields of one timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub snowfall: Raster,
    pub rainfall: Raster,
    pub potential_melt: Raster,
    pub actual_melt: Raster,
    pub runoff: Raster,
    pub discharge: Raster,
}

/// Per-cell snow store driven by uniform precipitation and temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct SnowRunoffModel {
    snow: Raster,
    temperature_correction: Raster,
    melt_rate: f64,
    cell_area: f64,
}

impl SnowRunoffModel {
    /// A model with an empty snow store over the cells where the correction is defined.
    pub fn new(temperature_correction: Raster, melt_rate: f64, cell_area: f64) -> Result<Self> {
        if !(melt_rate >= 0.0 && melt_rate.is_finite()) {
            return invalid(format!("melt rate must be a nonnegative number, got {melt_rate}"));
        }
        if !(cell_area > 0.0 && cell_area.is_finite()) {
            return invalid(format!("cell area must be positive, got {cell_area}"));
        }
        Ok(SnowRunoffModel {
            snow: temperature_correction.map(|_| 0.0),
            temperature_correction,
            melt_rate,
            cell_area,
        })
    }

    /// Builds the correction from `elevation` and binds both parameters.
    pub fn with_parameters(
        elevation: &Raster,
        station_elevation: f64,
        cell_area: f64,
        params: Parameters,
    ) -> Result<Self> {
        let correction = temperature_correction(elevation, station_elevation, params.lapse_rate);
        SnowRunoffModel::new(correction, params.melt_rate, cell_area)
    }

    /// Snow water equivalent currently stored.
    pub fn snow(&self) -> &Raster {
        &self.snow
    }

    pub fn temperature_correction(&self) -> &Raster {
        &self.temperature_correction
    }

    pub fn melt_rate(&self) -> f64 {
        self.melt_rate
    }

    /// Advances the snow store by one timestep and routes the runoff through `network`.
    ///
    /// A missing `precipitation` or `temperature` makes every cell undefined for this step.
    pub fn step(
        &mut self,
        precipitation: Option<f64>,
        temperature: Option<f64>,
        network: &DrainageNetwork,
    ) -> Result<StepOutput> {
        let shape = self.snow.shape();
        let corrected = Raster::broadcast(shape, temperature).sub(&self.temperature_correction)?;
        let freezing = corrected.lt(0.0);
        let thawing = freezing.not();

        let precip = Raster::broadcast(shape, precipitation);
        let snowfall = freezing.select_or(&precip, 0.0)?;
        let rainfall = thawing.select_or(&precip, 0.0)?;

        let snow = self.snow.add(&snowfall)?;
        let potential_melt = thawing.select_or(&corrected.mul_scalar(self.melt_rate), 0.0)?;
        let actual_melt = snow.min(&potential_melt)?;
        self.snow = snow.sub(&actual_melt)?;

        let runoff = actual_melt.add(&rainfall)?;
        let discharge = network.accumulate(&runoff.mul_scalar(self.cell_area))?;
        trace!(
            "step: P {:?} T {:?}, stored snow {:.4}, runoff {:.4}",
            precipitation,
            temperature,
            self.snow.sum(),
            runoff.sum()
        );

        Ok(StepOutput {
            snowfall,
            rainfall,
            potential_melt,
            actual_melt,
            runoff,
            discharge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn correction_scales_with_height_above_station() {
        let dem = Raster::from_array(array![[100.0, 300.0]]);
        let c = temperature_correction(&dem, 100.0, 0.005);
        assert_eq!(c.get(0, 0), Some(0.0));
        assert!((c.get(0, 1).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn negative_melt_rate_is_rejected() {
        let c = Raster::zeros((1, 1));
        assert!(SnowRunoffModel::new(c.clone(), -0.1, 1.0).is_err());
        assert!(SnowRunoffModel::new(c.clone(), 0.1, 0.0).is_err());
        assert!(SnowRunoffModel::new(c, 0.0, 1.0).is_ok());
    }
}
