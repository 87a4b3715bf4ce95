//! Statistical check battery for simulated Stokes moments.
//!
//! Compares the [`Measurements`] of a run with the [`Predictions`] of the
//! same sample. Each check returns a [`CheckResult`] with a p-value (where
//! applicable), a pass/fail determination, and a letter grade (A through F).

use serde::Serialize;
use simpol_core::{Measurements, Predictions};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// Names of the four Stokes parameters, in vector order.
pub const COMPONENTS: [&str; 4] = ["I", "Q", "U", "V"];

/// Pass threshold applied to every p-value.
pub const PASS_THRESHOLD: f64 = 0.01;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a single check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub p_value: Option<f64>,
    pub statistic: f64,
    pub details: String,
    pub grade: char,
}

impl CheckResult {
    /// Assign a letter grade based on p-value.
    ///
    /// - A: p >= 0.1
    /// - B: p >= 0.01
    /// - C: p >= 0.001
    /// - D: p >= 0.0001
    /// - F: otherwise or None
    pub fn grade_from_p(p: Option<f64>) -> char {
        match p {
            Some(p) if p >= 0.1 => 'A',
            Some(p) if p >= 0.01 => 'B',
            Some(p) if p >= 0.001 => 'C',
            Some(p) if p >= 0.0001 => 'D',
            _ => 'F',
        }
    }

    /// Determine pass/fail from p-value against a threshold.
    pub fn pass_from_p(p: Option<f64>, threshold: f64) -> bool {
        match p {
            Some(p) => p >= threshold,
            None => false,
        }
    }

    fn from_p(name: String, p: Option<f64>, statistic: f64, details: String) -> Self {
        Self {
            name,
            passed: Self::pass_from_p(p, PASS_THRESHOLD),
            p_value: p,
            statistic,
            details,
            grade: Self::grade_from_p(p),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Two-sided p-value of a standard normal deviate.
pub fn two_sided_p(z: f64) -> f64 {
    erfc(z.abs() / SQRT_2)
}

/// Return a failing `CheckResult` when the standard error cannot be formed.
fn undetermined(name: String, reason: &str) -> CheckResult {
    CheckResult {
        name,
        passed: false,
        p_value: None,
        statistic: 0.0,
        details: reason.to_string(),
        grade: 'F',
    }
}

/// z-score check of `measured` against `expected` with variance `variance / n`.
fn z_check(name: String, measured: f64, expected: f64, variance: f64, n: f64) -> CheckResult {
    if variance.is_nan() || variance <= 0.0 || n <= 0.0 {
        return undetermined(name, "Degenerate standard error");
    }
    let z = (measured - expected) / (variance / n).sqrt();
    let p = two_sided_p(z);
    CheckResult::from_p(
        name,
        Some(p),
        z,
        format!("measured={measured:.6e}, expected={expected:.6e}, z={z:.3}"),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════════════════════════

/// Mean of each Stokes parameter.
///
/// The variance of the sample mean is C_ii plus twice the predicted lag
/// covariances from lag 1.
pub fn mean_checks(measured: &Measurements, expected: &Predictions) -> Vec<CheckResult> {
    let n = measured.count as f64;
    (0..4)
        .map(|i| {
            let memory: f64 = expected.lags.iter().skip(1).map(|x| x[(i, i)]).sum();
            z_check(
                format!("Mean {}", COMPONENTS[i]),
                measured.mean[i],
                expected.mean[i],
                expected.covariance[(i, i)] + 2.0 * memory,
                n,
            )
        })
        .collect()
}

/// Variance of each Stokes parameter.
///
/// Uses var(ŝ²) ≈ (μ4 − σ⁴) / N with the measured central fourth moment.
pub fn variance_checks(measured: &Measurements, expected: &Predictions) -> Vec<CheckResult> {
    let n = measured.count as f64;
    (0..4)
        .map(|i| {
            let sigma2 = measured.covariance[(i, i)];
            z_check(
                format!("Variance {}", COMPONENTS[i]),
                sigma2,
                expected.covariance[(i, i)],
                measured.central_fourth[i] - sigma2 * sigma2,
                n,
            )
        })
        .collect()
}

/// Diagonal lag covariances, one chi-squared check per lag from 1.
///
/// Each element is treated as independent with variance C_ii² / N_lag.
pub fn lag_checks(measured: &Measurements, expected: &Predictions) -> Vec<CheckResult> {
    let n = measured.lag_count as f64;
    let Ok(dist) = ChiSquared::new(4.0) else {
        return Vec::new();
    };

    measured
        .lags
        .iter()
        .zip(&expected.lags)
        .enumerate()
        .skip(1)
        .map(|(lag, (acf, exp))| {
            let name = format!("Lag {lag}");
            let mut chi2 = 0.0;
            for i in 0..4 {
                let variance = measured.covariance[(i, i)].powi(2) / n;
                if variance.is_nan() || variance <= 0.0 {
                    return undetermined(name, "Degenerate standard error");
                }
                chi2 += (acf[(i, i)] - exp[(i, i)]).powi(2) / variance;
            }
            let p = dist.sf(chi2);
            CheckResult::from_p(name, Some(p), chi2, format!("chi2={chi2:.3}, N={n}"))
        })
        .collect()
}

/// Mean of the measured Stokes vector lies within the realizable cone.
pub fn realizability_check(measured: &Measurements) -> CheckResult {
    let p = simpol_core::algebra::polarized_intensity(&measured.mean);
    let passed = simpol_core::algebra::is_realizable(&measured.mean);
    CheckResult {
        name: "Realizable Mean".to_string(),
        passed,
        p_value: None,
        statistic: p / measured.mean[0],
        details: format!("p={p:.6e}, I={:.6e}", measured.mean[0]),
        grade: if passed { 'A' } else { 'F' },
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Battery
// ═══════════════════════════════════════════════════════════════════════════════

/// Run every check: 4 means, 4 variances, realizability, and one per lag
/// from 1 when lags were measured.
pub fn run_all_checks(measured: &Measurements, expected: &Predictions) -> Vec<CheckResult> {
    let mut results = mean_checks(measured, expected);
    results.extend(variance_checks(measured, expected));
    results.push(realizability_check(measured));
    results.extend(lag_checks(measured, expected));
    results
}

/// Calculate overall quality score (0-100) from check results.
///
/// Each grade maps to a score: A=100, B=75, C=50, D=25, F=0.
/// Returns the average across all checks.
pub fn calculate_quality_score(results: &[CheckResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results
        .iter()
        .map(|r| match r.grade {
            'A' => 100.0,
            'B' => 75.0,
            'C' => 50.0,
            'D' => 25.0,
            _ => 0.0,
        })
        .sum();
    total / results.len() as f64
}
