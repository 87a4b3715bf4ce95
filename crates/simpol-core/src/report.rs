//! Report formatting and output files.
//!
//! Console formatting of Stokes vectors and 4×4 matrices, the lag report pair
//! (`acf.txt`, `acf_plot.txt`) and the JSON export.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nalgebra::Matrix4;
use num_complex::Complex64;
use serde::{Serialize, Serializer};

use crate::algebra::{Coherency, Covariance, ModeDecomposition, Stokes};
use crate::config::RunConfig;
use crate::error::Result;
use crate::statistics::{Measurements, Predictions};

/// Separator line written before each lag block of `acf.txt`.
pub const LAG_SEPARATOR: &str = "============================================================";

/// `(i, q, u, v)` using the shortest round-trip float representation.
pub fn format_vector(v: &Stokes) -> String {
    format!("({}, {}, {}, {})", v[0], v[1], v[2], v[3])
}

/// One bracketed row per line.
pub fn format_matrix(m: &Covariance) -> String {
    let mut out = String::new();
    for i in 0..4 {
        out.push_str(&format!(
            "[{:>14.6e} {:>14.6e} {:>14.6e} {:>14.6e} ]\n",
            m[(i, 0)],
            m[(i, 1)],
            m[(i, 2)],
            m[(i, 3)]
        ));
    }
    out
}

fn format_complex(z: &Complex64) -> String {
    format!("({:.6e},{:.6e})", z.re, z.im)
}

/// Coherency matrix, one bracketed row per line.
pub fn format_coherency(rho: &Coherency) -> String {
    let mut out = String::new();
    for i in 0..2 {
        out.push_str(&format!(
            "[ {} {} ]\n",
            format_complex(&rho[(i, 0)]),
            format_complex(&rho[(i, 1)])
        ));
    }
    out
}

/// Complex 4×4 matrix, one bracketed row per line.
pub fn format_complex_matrix(m: &Matrix4<Complex64>) -> String {
    let mut out = String::new();
    for i in 0..4 {
        let row: Vec<String> = (0..4).map(|j| format_complex(&m[(i, j)])).collect();
        out.push_str(&format!("[ {} ]\n", row.join(" ")));
    }
    out
}

/// One line per principal mode: eigenvalue and eigenvector.
pub fn format_modes(modes: &ModeDecomposition) -> String {
    let mut out = String::new();
    for k in 0..4 {
        let v: Vec<String> = modes
            .eigenvectors
            .column(k)
            .iter()
            .map(format_complex)
            .collect();
        out.push_str(&format!(
            "e_{k}={:.6e}  v=({})\n",
            modes.eigenvalues[k],
            v.join(", ")
        ));
    }
    out
}

/// Write the block-per-lag report. `measured` is `None` in theory-only runs.
pub fn write_lag_report<W: Write>(
    out: &mut W,
    expected: &[Covariance],
    measured: Option<&[Covariance]>,
) -> Result<()> {
    for (lag, exp) in expected.iter().enumerate() {
        writeln!(out, "{LAG_SEPARATOR}")?;
        writeln!(out, "lag={lag}")?;
        if let Some(acf) = measured.and_then(|m| m.get(lag)) {
            write!(out, "mean=\n{}", format_matrix(acf))?;
        }
        write!(out, "expected=\n{}", format_matrix(exp))?;
    }
    Ok(())
}

/// Write the whitespace table: `lag` then, row-major over (i, j),
/// `expected [measured]`.
pub fn write_lag_plot<W: Write>(
    out: &mut W,
    expected: &[Covariance],
    measured: Option<&[Covariance]>,
) -> Result<()> {
    for (lag, exp) in expected.iter().enumerate() {
        let acf = measured.and_then(|m| m.get(lag));
        write!(out, "{lag} ")?;
        for i in 0..4 {
            for j in 0..4 {
                write!(out, "{} ", exp[(i, j)])?;
                if let Some(acf) = acf {
                    write!(out, "{} ", acf[(i, j)])?;
                }
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write `acf.txt` and `acf_plot.txt` into `dir`, creating it if needed.
pub fn write_lag_files(
    dir: &Path,
    expected: &[Covariance],
    measured: Option<&[Covariance]>,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;
    let report_path = dir.join("acf.txt");
    let plot_path = dir.join("acf_plot.txt");

    let mut report = BufWriter::new(fs::File::create(&report_path)?);
    write_lag_report(&mut report, expected, measured)?;
    report.flush()?;

    let mut plot = BufWriter::new(fs::File::create(&plot_path)?);
    write_lag_plot(&mut plot, expected, measured)?;
    plot.flush()?;

    log::debug!("wrote {} and {}", report_path.display(), plot_path.display());
    Ok((report_path, plot_path))
}

// ---------------------------------------------------------------------------
// JSON export
// ---------------------------------------------------------------------------

/// Serialize a Stokes vector as a plain `[i, q, u, v]` array.
pub fn serialize_vector<S: Serializer>(v: &Stokes, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    vector_array(v).serialize(serializer)
}

fn vector_array(v: &Stokes) -> [f64; 4] {
    [v[0], v[1], v[2], v[3]]
}

fn matrix_rows(m: &Covariance) -> [[f64; 4]; 4] {
    std::array::from_fn(|i| std::array::from_fn(|j| m[(i, j)]))
}

fn complex_rows(m: &Matrix4<Complex64>) -> [[[f64; 2]; 4]; 4] {
    std::array::from_fn(|i| std::array::from_fn(|j| [m[(i, j)].re, m[(i, j)].im]))
}

#[derive(Debug, Clone, Serialize)]
pub struct MomentsReport {
    pub mean: [f64; 4],
    /// Row-major.
    pub covariance: [[f64; 4]; 4],
    pub lags: Vec<[[f64; 4]; 4]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasuredReport {
    pub count: u64,
    #[serde(flatten)]
    pub moments: MomentsReport,
    pub mean_dop: f64,
    pub modulation_index: f64,
    pub lag_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModesReport {
    /// Elements as `[re, im]`.
    pub operator: [[[f64; 2]; 4]; 4],
    pub eigenvalues: [f64; 4],
    /// One eigenvector per entry, elements as `[re, im]`.
    pub eigenvectors: Vec<[[f64; 2]; 4]>,
}

/// Machine-readable summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub version: String,
    pub seed: u64,
    pub config: RunConfig,
    pub expected: MomentsReport,
    pub measured: Option<MeasuredReport>,
    pub modes: Option<ModesReport>,
}

impl Report {
    pub fn new(
        config: &RunConfig,
        seed: u64,
        predictions: &Predictions,
        measurements: Option<&Measurements>,
    ) -> Self {
        let expected = MomentsReport {
            mean: vector_array(&predictions.mean),
            covariance: matrix_rows(&predictions.covariance),
            lags: predictions.lags.iter().map(matrix_rows).collect(),
        };
        let measured = measurements.map(|m| MeasuredReport {
            count: m.count,
            moments: MomentsReport {
                mean: vector_array(&m.mean),
                covariance: matrix_rows(&m.covariance),
                lags: m.lags.iter().map(matrix_rows).collect(),
            },
            mean_dop: m.mean_dop,
            modulation_index: m.modulation_index,
            lag_count: m.lag_count,
        });
        let modes = predictions.modes.as_ref().map(|d| ModesReport {
            operator: complex_rows(&d.operator),
            eigenvalues: vector_array(&d.eigenvalues),
            eigenvectors: (0..4)
                .map(|k| {
                    let col = d.eigenvectors.column(k);
                    std::array::from_fn(|i| [col[i].re, col[i].im])
                })
                .collect(),
        });
        Self {
            version: crate::VERSION.to_string(),
            seed,
            config: config.clone(),
            expected,
            measured,
            modes,
        }
    }
}

/// Pretty-print any serializable value to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;

    fn lag(scale: f64) -> Covariance {
        Covariance::from_fn(|i, j| scale * (4 * i + j) as f64)
    }

    #[test]
    fn test_format_vector() {
        assert_eq!(format_vector(&Vector4::new(2.0, 3.0, 0.0, 0.5)), "(2, 3, 0, 0.5)");
    }

    #[test]
    fn test_format_matrix_has_four_rows() {
        let text = format_matrix(&Covariance::identity());
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with("[    1.000000e0"));
    }

    #[test]
    fn test_format_coherency_rows() {
        let rho = crate::algebra::coherency(&Vector4::new(1.0, 0.0, 0.0, 1.0));
        let text = format_coherency(&rho);
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 2);
        // ρ01 = −i/2 for V = 1.
        assert!(rows[0].contains("(0.000000e0,-5.000000e-1)"));
    }

    #[test]
    fn test_lag_report_blocks() {
        let expected = vec![lag(1.0), lag(0.5)];
        let measured = vec![lag(1.1), lag(0.4)];
        let mut buf = Vec::new();
        write_lag_report(&mut buf, &expected, Some(&measured)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.matches(LAG_SEPARATOR).count(), 2);
        assert!(text.contains("lag=0\nmean=\n"));
        assert!(text.contains("lag=1\nmean=\n"));
        assert_eq!(text.matches("expected=").count(), 2);
    }

    #[test]
    fn test_lag_report_theory_only_omits_measured() {
        let mut buf = Vec::new();
        write_lag_report(&mut buf, &[lag(1.0)], None).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("mean="));
        assert!(text.contains("expected="));
    }

    #[test]
    fn test_lag_plot_columns() {
        let expected = vec![lag(1.0), lag(2.0), lag(3.0)];
        let measured = vec![lag(-1.0), lag(-2.0), lag(-3.0)];
        let mut buf = Vec::new();
        write_lag_plot(&mut buf, &expected, Some(&measured)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let fields: Vec<f64> = lines[1]
            .split_whitespace()
            .map(|f| f.parse().unwrap())
            .collect();
        assert_eq!(fields.len(), 1 + 32);
        assert_eq!(fields[0], 1.0);
        // (0,1): expected 2·1, measured −2·1
        assert_eq!(fields[3], 2.0);
        assert_eq!(fields[4], -2.0);
        // (3,3): expected 2·15
        assert_eq!(fields[31], 30.0);
    }

    #[test]
    fn test_lag_plot_theory_only() {
        let mut buf = Vec::new();
        write_lag_plot(&mut buf, &[lag(1.0)], None).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.split_whitespace().count(), 17);
    }

    #[test]
    fn test_write_lag_files_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("run");
        let (report, plot) = write_lag_files(&dir, &[lag(1.0)], None).unwrap();
        assert!(report.ends_with("acf.txt"));
        assert!(plot.ends_with("acf_plot.txt"));
        assert!(std::fs::read_to_string(report).unwrap().contains("lag=0"));
        assert!(plot.exists());
    }

    #[test]
    fn test_report_json_layout() {
        let config = RunConfig::default();
        let sample = config.build_sample();
        let predictions = Predictions::from_sample(&sample, 2, true);
        let report = Report::new(&config, 42, &predictions, None);

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.json");
        write_json(&path, &report).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["seed"], 42);
        assert_eq!(value["expected"]["mean"][0], 1.0);
        assert_eq!(value["expected"]["covariance"][1][1], 0.5);
        assert_eq!(value["expected"]["lags"].as_array().unwrap().len(), 2);
        assert!(value["measured"].is_null());
        assert_eq!(value["modes"]["eigenvectors"].as_array().unwrap().len(), 4);
        assert_eq!(value["config"]["a"]["mean"][0], 1.0);
    }
}
