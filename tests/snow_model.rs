#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use snowmelt_calibration::{
        Catchment, DrainageNetwork, Error, Forcing, ObservationPoint, Parameters, PitFillPolicy, Quantity, Raster,
        SimulationRun, SnowRunoffModel, TimeSeries,
    };

    fn single_cell() -> (DrainageNetwork, SnowRunoffModel) {
        let dem = Raster::from_array(array![[0.0]]);
        let ldd = DrainageNetwork::build(&dem, &PitFillPolicy::unbounded()).unwrap();
        let model = SnowRunoffModel::with_parameters(&dem, 0.0, 1.0, Parameters::new(0.5, 0.0)).unwrap();
        (ldd, model)
    }

    #[test]
    fn test_three_day_single_cell() {
        let (ldd, mut model) = single_cell();

        let day1 = model.step(Some(10.0), Some(-1.0), &ldd).unwrap();
        assert_eq!(model.snow().get(0, 0), Some(10.0));
        assert_eq!(day1.discharge.get(0, 0), Some(0.0));

        let day2 = model.step(Some(0.0), Some(1.0), &ldd).unwrap();
        assert_eq!(day2.potential_melt.get(0, 0), Some(0.5));
        assert_eq!(day2.actual_melt.get(0, 0), Some(0.5));
        assert_eq!(day2.rainfall.get(0, 0), Some(0.0));
        assert_eq!(model.snow().get(0, 0), Some(9.5));
        assert_eq!(day2.discharge.get(0, 0), Some(0.5));

        let day3 = model.step(Some(0.0), Some(1.0), &ldd).unwrap();
        assert_eq!(model.snow().get(0, 0), Some(9.0));
        assert_eq!(day3.discharge.get(0, 0), Some(0.5));
    }

    #[test]
    fn test_melt_is_capped_by_snow() {
        let (ldd, mut model) = single_cell();
        model.step(Some(1.0), Some(-5.0), &ldd).unwrap();
        let out = model.step(Some(2.0), Some(10.0), &ldd).unwrap();
        assert_eq!(out.potential_melt.get(0, 0), Some(5.0));
        assert_eq!(out.actual_melt.get(0, 0), Some(1.0));
        assert_eq!(model.snow().get(0, 0), Some(0.0));
        // melt plus rain
        assert_eq!(out.discharge.get(0, 0), Some(3.0));
    }

    #[test]
    fn test_invariants_hold_every_step() {
        let dem = Raster::from_array(array![
            [420.0, 390.0, 360.0, 350.0],
            [380.0, 330.0, 300.0, 310.0],
            [350.0, 290.0, 250.0, 240.0],
            [330.0, 270.0, 230.0, 210.0],
        ]);
        let ldd = DrainageNetwork::build(&dem, &PitFillPolicy::unbounded()).unwrap();
        let mut model = SnowRunoffModel::with_parameters(&dem, 208.1, 25.0, Parameters::new(0.008, 0.004)).unwrap();

        for t in 0..120 {
            let tf = t as f64;
            let precipitation = (3.0 * (tf * 0.7).sin()).max(0.0);
            let temperature = -4.0 + tf * 0.08 + 2.0 * (tf * 0.3).cos();
            let before = model.snow().clone();
            let out = model.step(Some(precipitation), Some(temperature), &ldd).unwrap();
            let corrected = temperature_at(&model, temperature);

            for r in 0..4 {
                for c in 0..4 {
                    let snowfall = out.snowfall.get(r, c).unwrap();
                    let rainfall = out.rainfall.get(r, c).unwrap();
                    assert_eq!(snowfall + rainfall, precipitation);

                    let melt = out.actual_melt.get(r, c).unwrap();
                    let available = before.get(r, c).unwrap() + snowfall;
                    assert!(melt >= 0.0);
                    assert!(melt <= available);
                    assert!(melt <= out.potential_melt.get(r, c).unwrap());
                    if corrected.get(r, c).unwrap() < 0.0 {
                        assert_eq!(melt, 0.0);
                        assert_eq!(rainfall, 0.0);
                    }
                    assert!(model.snow().get(r, c).unwrap() >= 0.0);
                }
            }

            // every drop of runoff arrives somewhere downstream
            let outlets = ldd.outlets();
            let routed: f64 = outlets.iter().map(|(r, c)| out.discharge.get(*r, *c).unwrap()).sum();
            assert_abs_diff_eq!(routed, out.runoff.sum() * 25.0, epsilon = 1e-9);
        }
    }

    fn temperature_at(model: &SnowRunoffModel, temperature: f64) -> Raster {
        model.temperature_correction().rsub_scalar(temperature)
    }

    #[test]
    fn test_nodata_elevation_stays_undefined() {
        let nd = -9999.0;
        let dem = Raster::new(array![[300.0, nd], [250.0, 200.0]], nd);
        let ldd = DrainageNetwork::build(&dem, &PitFillPolicy::unbounded()).unwrap();
        let mut model = SnowRunoffModel::with_parameters(&dem, 200.0, 1.0, Parameters::new(0.1, 0.005)).unwrap();
        let out = model.step(Some(1.0), Some(2.0), &ldd).unwrap();
        assert_eq!(model.snow().get(0, 1), None);
        assert_eq!(out.discharge.get(0, 1), None);
        assert!(out.discharge.get(1, 1).is_some());
    }

    #[test]
    fn test_zero_nodata_dem_runs() {
        // snow store and a zero lapse correction both equal the DEM's sentinel
        let dem = Raster::new(array![[5.0]], 0.0);
        let ldd = DrainageNetwork::build(&dem, &PitFillPolicy::unbounded()).unwrap();
        let mut model = SnowRunoffModel::with_parameters(&dem, 5.0, 1.0, Parameters::new(0.5, 0.0)).unwrap();
        assert_eq!(model.snow().get(0, 0), Some(0.0));
        assert_eq!(model.temperature_correction().get(0, 0), Some(0.0));

        let day1 = model.step(Some(10.0), Some(-1.0), &ldd).unwrap();
        assert_eq!(model.snow().get(0, 0), Some(10.0));
        assert_eq!(day1.discharge.get(0, 0), Some(0.0));
        let day2 = model.step(Some(0.0), Some(1.0), &ldd).unwrap();
        assert_eq!(model.snow().get(0, 0), Some(9.5));
        assert_eq!(day2.discharge.get(0, 0), Some(0.5));

        let forcing = Forcing::new(
            TimeSeries::from_values(&[10.0, 0.0, 0.0]),
            TimeSeries::from_values(&[-1.0, 1.0, 1.0]),
            TimeSeries::from_values(&[0.0, 0.5, 0.5]),
        );
        let catchment =
            Catchment::new(dem.clone(), ObservationPoint::new(0, 0), forcing, &PitFillPolicy::unbounded()).unwrap();
        let model = SnowRunoffModel::with_parameters(&dem, 5.0, 1.0, Parameters::new(0.5, 0.0)).unwrap();
        assert_eq!(SimulationRun::new(&catchment, 3).unwrap().run(model).unwrap(), 0.0);
    }

    #[test]
    fn test_missing_precipitation_aborts_run() {
        let dem = Raster::from_array(array![[0.0]]);
        let forcing = Forcing::new(
            TimeSeries::new(vec![Some(1.0), None, Some(1.0)]),
            TimeSeries::from_values(&[1.0, 1.0, 1.0]),
            TimeSeries::from_values(&[1.0, 1.0, 1.0]),
        );
        let catchment =
            Catchment::new(dem.clone(), ObservationPoint::new(0, 0), forcing, &PitFillPolicy::unbounded()).unwrap();
        let model = SnowRunoffModel::with_parameters(&dem, 0.0, 1.0, Parameters::new(0.5, 0.0)).unwrap();
        let run = SimulationRun::new(&catchment, 3).unwrap();
        assert_eq!(
            run.run(model),
            Err(Error::MissingValue {
                timestep: 2,
                quantity: Quantity::Discharge,
                row: 0,
                col: 0
            })
        );
    }

    #[test]
    fn test_missing_observation_aborts_run() {
        let dem = Raster::from_array(array![[0.0]]);
        let forcing = Forcing::new(
            TimeSeries::from_values(&[1.0, 1.0, 1.0]),
            TimeSeries::from_values(&[1.0, 1.0, 1.0]),
            TimeSeries::new(vec![Some(1.0), Some(1.0), None]),
        );
        let catchment =
            Catchment::new(dem.clone(), ObservationPoint::new(0, 0), forcing, &PitFillPolicy::unbounded()).unwrap();
        let model = SnowRunoffModel::with_parameters(&dem, 0.0, 1.0, Parameters::new(0.5, 0.0)).unwrap();
        let run = SimulationRun::new(&catchment, 3).unwrap();
        assert!(matches!(
            run.run(model),
            Err(Error::MissingValue {
                timestep: 3,
                quantity: Quantity::Observed,
                ..
            })
        ));
    }

    #[test]
    fn test_rmse_of_known_series() {
        let dem = Raster::from_array(array![[0.0]]);
        let forcing = Forcing::new(
            TimeSeries::from_values(&[10.0, 0.0, 0.0]),
            TimeSeries::from_values(&[-1.0, 1.0, 1.0]),
            TimeSeries::from_values(&[1.0, 0.5, 1.5]),
        );
        let catchment =
            Catchment::new(dem.clone(), ObservationPoint::new(0, 0), forcing, &PitFillPolicy::unbounded()).unwrap();
        let model = SnowRunoffModel::with_parameters(&dem, 0.0, 1.0, Parameters::new(0.5, 0.0)).unwrap();
        let run = SimulationRun::new(&catchment, 3).unwrap();

        let trace = run.trace(model.clone(), true).unwrap();
        assert_eq!(trace.modelled, vec![0.0, 0.5, 0.5]);
        assert_eq!(trace.observed, vec![1.0, 0.5, 1.5]);
        assert_eq!(trace.discharge.len(), 3);
        assert_abs_diff_eq!(trace.mse, 2.0 / 3.0, epsilon = 1e-12);

        let rmse = run.run(model).unwrap();
        assert_abs_diff_eq!(rmse, (2.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!(rmse, trace.rmse);
    }

    #[test]
    fn test_run_rejects_bad_timestep_counts() {
        let dem = Raster::from_array(array![[0.0]]);
        let forcing = Forcing::new(
            TimeSeries::from_values(&[1.0]),
            TimeSeries::from_values(&[1.0]),
            TimeSeries::from_values(&[1.0]),
        );
        let catchment = Catchment::new(dem, ObservationPoint::new(0, 0), forcing, &PitFillPolicy::unbounded()).unwrap();
        assert!(matches!(SimulationRun::new(&catchment, 0), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(SimulationRun::new(&catchment, 2), Err(Error::InvalidConfiguration(_))));
    }
}
