use anyhow::Result;
use log::info;
use ndarray::Array2;
use snowmelt_calibration::*;

/// Calibrates against discharge generated with known parameters and prints what it finds.
///
/// Run with `RUST_LOG=info` (or `debug` to see every trial).
fn main() -> Result<()> {
    pretty_env_logger::init();

    // a tilted valley draining to the bottom middle cell
    let (rows, cols) = (30, 21);
    let dem = Raster::from_array(Array2::from_shape_fn((rows, cols), |(r, c)| {
        let across = (c as f64 - 10.0).abs();
        900.0 - 20.0 * r as f64 + 15.0 * across
    }));

    let nr_of_timesteps = 181;
    let precipitation: Vec<f64> = (0..nr_of_timesteps)
        .map(|t| if t % 4 == 0 { 6.0 } else { 0.3 })
        .collect();
    let temperature: Vec<f64> = (0..nr_of_timesteps)
        .map(|t| -8.0 + 16.0 * (t as f64 / nr_of_timesteps as f64))
        .collect();
    let placeholder = vec![0.0; nr_of_timesteps];

    let config = CalibrationConfig::new()
        .nr_of_timesteps(nr_of_timesteps)
        .cell_area(25.0 * 25.0);
    let catchment = Catchment::new(
        dem,
        ObservationPoint::new(rows - 1, 10),
        Forcing::new(
            TimeSeries::from_values(&precipitation),
            TimeSeries::from_values(&temperature),
            TimeSeries::from_values(&placeholder),
        ),
        &config.pit_fill,
    )?;

    let truth = Parameters::new(0.0081, 0.0041);
    let generated = trace_trial(truth, &catchment, &config, false)?;
    let catchment = catchment.with_forcing(Forcing::new(
        TimeSeries::from_values(&precipitation),
        TimeSeries::from_values(&temperature),
        TimeSeries::from_values(&generated.modelled),
    ));

    let results = search_tiers(&catchment, &config)?;
    for (grid, result) in config.tiers.iter().zip(&results) {
        println!(
            "{:>7}: melt rate {:.4}, lapse rate {:.4}, rmse {:.6} ({} trials)",
            grid.label,
            result.best.melt_rate,
            result.best.lapse_rate,
            result.best.rmse,
            result.trials.len()
        );
    }

    let all: Vec<CalibrationTrial> = results.iter().flat_map(|r| r.trials.iter().copied()).collect();
    if let Some(best) = best_of(&all) {
        info!("overall best {:?}, generated with {:?}", best, truth);
        let trace = trace_trial(best.parameters(), &catchment, &config, false)?;
        println!("mean squared error at best fit: {}", trace.mse);
    }

    Ok(())
}
