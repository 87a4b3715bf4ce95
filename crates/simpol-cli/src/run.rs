use std::path::PathBuf;
use std::time::Instant;

use simpol_core::config::MEGA;
use simpol_core::report::{self, Report};
use simpol_core::statistics::Observer;
use simpol_core::{Measurements, Predictions, RandomSource, RunConfig, StatisticsEngine, Stokes};

pub struct RunOptions {
    pub checks: bool,
    pub json: Option<PathBuf>,
    pub output_dir: PathBuf,
}

/// Logs progress once per Mega samples.
struct Progress {
    total: u64,
}

impl Observer for Progress {
    fn observe(&mut self, index: u64, _stokes: &Stokes) {
        let done = index + 1;
        if done % MEGA == 0 {
            log::debug!("{done}/{} samples", self.total);
        }
    }
}

fn banner(title: &str) {
    let rule = "*".repeat(67);
    println!("\n {rule} \n\n {title} \n\n {rule} \n");
}

pub fn run(config: &RunConfig, options: &RunOptions) -> simpol_core::Result<()> {
    let mut sample = config.build_sample();
    let predictions = Predictions::from_sample(&sample, config.nlag, config.coherency);

    let mut rng = match config.seed {
        Some(seed) => RandomSource::seeded(seed),
        None => RandomSource::from_entropy(),
    };

    let measurements = if config.theory_only {
        None
    } else {
        log::info!("Simulating {} Stokes samples (seed {})", config.nsamp, rng.seed());
        let t0 = Instant::now();
        let mut engine = StatisticsEngine::new(config.engine_config(&sample));
        let mut progress = Progress {
            total: config.nsamp,
        };
        engine.run_observed(&mut sample, &mut rng, &mut progress);
        log::info!("done in {:.1}s", t0.elapsed().as_secs_f64());
        sample.report_diagnostics();
        Some(engine.finish())
    };

    if config.means_only {
        print_means_and_variances(&predictions, measurements.as_ref());
        return Ok(());
    }

    banner("STOKES PARAMETERS");
    print_stokes_summary(&predictions, measurements.as_ref());

    if config.nlag > 0 {
        let measured_lags = measurements.as_ref().map(|m| m.lags.as_slice());
        let (acf, plot) =
            report::write_lag_files(&options.output_dir, &predictions.lags, measured_lags)?;
        println!("\nLag report saved to: {}", acf.display());
        println!("Lag table saved to: {}", plot.display());
    }

    if config.coherency {
        banner("COHERENCY MATRIX");
        print_coherency(&predictions, measurements.as_ref());
    }

    let checks = match (&measurements, options.checks) {
        (Some(m), true) => Some(print_checks(m, &predictions)),
        (None, true) => {
            log::warn!("checks need measured moments; skipped in theory-only mode");
            None
        }
        _ => None,
    };

    if let Some(path) = &options.json {
        let report = Report::new(config, rng.seed(), &predictions, measurements.as_ref());
        let mut value = serde_json::to_value(&report)?;
        if let Some(checks) = checks {
            value["checks"] = serde_json::to_value(&checks)?;
        }
        report::write_json(path, &value)?;
        println!("\nReport saved to: {}", path.display());
    }

    Ok(())
}

/// Measured means and variances, or the predictions in theory-only mode.
fn print_means_and_variances(predictions: &Predictions, measurements: Option<&Measurements>) {
    let (mean, covariance) = match measurements {
        Some(m) => (m.mean, m.covariance),
        None => (predictions.mean, predictions.covariance),
    };
    for i in 0..4 {
        println!("mean[{i}] = {}", mean[i]);
        println!("var[{i}] = {}", covariance[(i, i)]);
    }
}

fn print_stokes_summary(predictions: &Predictions, measurements: Option<&Measurements>) {
    if let Some(m) = measurements {
        println!("mean sample dop={}\n", m.mean_dop);
        println!("modulation index={}\n", m.modulation_index);
        println!("mean={}", report::format_vector(&m.mean));
    }
    println!("expected={}", report::format_vector(&predictions.mean));

    if let Some(m) = measurements {
        println!("\ncovar=\n{}", report::format_matrix(&m.covariance));
    }
    println!("expected=\n{}", report::format_matrix(&predictions.covariance));
}

fn print_coherency(predictions: &Predictions, measurements: Option<&Measurements>) {
    if let Some(rho) = measurements.and_then(|m| m.coherency.as_ref()) {
        println!("rho sq=\n{}", report::format_complex_matrix(&rho.square));
        println!("rho mean=\n{}", report::format_coherency(&rho.mean));
        println!("rho covar=\n{}", report::format_complex_matrix(&rho.covariance));
    }

    if let Some(modes) = &predictions.modes {
        println!("candidate=\n{}", report::format_complex_matrix(&modes.operator));
        print!("{}", report::format_modes(modes));
    }
}

fn print_checks(
    measurements: &Measurements,
    predictions: &Predictions,
) -> Vec<simpol_checks::CheckResult> {
    let results = simpol_checks::run_all_checks(measurements, predictions);
    let score = simpol_checks::calculate_quality_score(&results);
    let passed = results.iter().filter(|r| r.passed).count();

    println!("\n{}", "=".repeat(60));
    println!("{:<20} {:>6} {:>10} {:>12}", "Check", "Grade", "p-value", "Statistic");
    println!("{}", "-".repeat(60));
    for r in &results {
        let p = r
            .p_value
            .map(|p| format!("{p:.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<18} {:>6} {:>10} {:>12.4}", r.name, r.grade, p, r.statistic);
    }
    println!("{}", "-".repeat(60));
    println!("  Score {score:.1}/100 ({passed}/{} passed)", results.len());

    results
}
