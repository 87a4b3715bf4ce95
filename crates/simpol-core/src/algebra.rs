//! Stokes / coherency algebra on top of `nalgebra`.
//!
//! Conventions:
//! - Pauli basis σ0 = 1, σ1 = diag(1, −1), σ2 = [[0, 1], [1, 0]], σ3 = [[0, −i], [i, 0]].
//! - Coherency ρ = ½ Σ S_k σ_k, so S_k = tr(σ_k ρ) and tr ρ = I.
//! - A field (spinor) e detects to ρ = e e†.
//!
//! Every function here works on fixed-size stack types; nothing allocates.

use nalgebra::{Matrix2, Matrix4, SymmetricEigen, Vector2, Vector4};
use num_complex::Complex64;

/// Stokes 4-vector (I, Q, U, V).
pub type Stokes = Vector4<f64>;

/// Two-component complex field.
pub type Spinor = Vector2<Complex64>;

/// 2×2 complex Hermitian coherency matrix.
pub type Coherency = Matrix2<Complex64>;

/// 4×4 real covariance (or cross-covariance) matrix of Stokes parameters.
pub type Covariance = Matrix4<f64>;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

/// The four Pauli matrices, σ0 (identity) first.
pub fn pauli() -> [Coherency; 4] {
    [
        Matrix2::new(ONE, ZERO, ZERO, ONE),
        Matrix2::new(ONE, ZERO, ZERO, -ONE),
        Matrix2::new(ZERO, ONE, ONE, ZERO),
        Matrix2::new(ZERO, -I, I, ZERO),
    ]
}

/// Real outer product a bᵀ.
pub fn outer(a: &Stokes, b: &Stokes) -> Covariance {
    a * b.transpose()
}

/// Tensor (Kronecker) product of two 2×2 complex matrices.
pub fn direct(a: &Coherency, b: &Coherency) -> Matrix4<Complex64> {
    let mut out = Matrix4::zeros();
    for i in 0..2 {
        for j in 0..2 {
            for k in 0..2 {
                for l in 0..2 {
                    out[(2 * i + k, 2 * j + l)] = a[(i, j)] * b[(k, l)];
                }
            }
        }
    }
    out
}

/// Convert Stokes parameters to the coherency matrix.
pub fn coherency(s: &Stokes) -> Coherency {
    let half = 0.5;
    Matrix2::new(
        Complex64::new(half * (s[0] + s[1]), 0.0),
        Complex64::new(half * s[2], -half * s[3]),
        Complex64::new(half * s[2], half * s[3]),
        Complex64::new(half * (s[0] - s[1]), 0.0),
    )
}

/// Convert a Hermitian matrix to Stokes parameters, S_k = Re tr(σ_k ρ).
pub fn stokes(rho: &Coherency) -> Stokes {
    let off = rho[(0, 1)];
    Vector4::new(
        rho[(0, 0)].re + rho[(1, 1)].re,
        rho[(0, 0)].re - rho[(1, 1)].re,
        2.0 * off.re,
        -2.0 * off.im,
    )
}

/// Detect a field: Stokes parameters of e e†.
pub fn detect(e: &Spinor) -> Stokes {
    let x = e[0];
    let y = e[1];
    let xx = x.norm_sqr();
    let yy = y.norm_sqr();
    let xy = x * y.conj();
    Vector4::new(xx + yy, xx - yy, 2.0 * xy.re, -2.0 * xy.im)
}

/// Polarized intensity sqrt(Q² + U² + V²).
pub fn polarized_intensity(s: &Stokes) -> f64 {
    s.fixed_rows::<3>(1).norm()
}

/// Polarized fraction of the total intensity.
pub fn degree_of_polarization(s: &Stokes) -> f64 {
    polarized_intensity(s) / s[0]
}

/// True when the polarized intensity does not exceed the total intensity.
pub fn is_realizable(s: &Stokes) -> bool {
    polarized_intensity(s) <= s[0]
}

/// Principal square root of a 2×2 Hermitian positive semi-definite matrix.
///
/// Uses sqrt(M) = (M + sqrt(det M)·1) / sqrt(tr M + 2 sqrt(det M)).
pub fn hermitian_sqrt(m: &Coherency) -> Coherency {
    let det = (m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)]).re.max(0.0);
    let s = det.sqrt();
    let t = (m.trace().re + 2.0 * s).sqrt();
    if t == 0.0 {
        return Matrix2::zeros();
    }
    (m + Matrix2::identity() * Complex64::new(s, 0.0)) * Complex64::new(1.0 / t, 0.0)
}

/// The bilinear form T(ρ1, ρ2)_ab = Re tr(σ_a ρ1 σ_b ρ2).
///
/// T(ρ, ρ) is the Stokes covariance of one instance of a circular complex
/// Gaussian field with coherency ρ; T(ρA, ρB) + T(ρB, ρA) is the covariance
/// of the interference term between two independent such fields.
pub fn trace_form(rho1: &Coherency, rho2: &Coherency) -> Covariance {
    let sigma = pauli();
    let mut out = Matrix4::zeros();
    for a in 0..4 {
        let left = sigma[a] * rho1;
        for b in 0..4 {
            out[(a, b)] = (left * sigma[b] * rho2).trace().re;
        }
    }
    out
}

/// Covariance of the Stokes parameters detected from a single instance of a
/// Gaussian field with population mean `s`.
pub fn gaussian_covariance(s: &Stokes) -> Covariance {
    let rho = coherency(s);
    trace_form(&rho, &rho)
}

/// The 16 Dirac basis matrices σ_i ⊗ σ_j, indexed `[i][j]`.
pub fn dirac() -> [[Matrix4<Complex64>; 4]; 4] {
    let sigma = pauli();
    std::array::from_fn(|i| std::array::from_fn(|j| direct(&sigma[i], &sigma[j])))
}

/// Eigen decomposition of the coherency-space covariance operator.
#[derive(Debug, Clone)]
pub struct ModeDecomposition {
    /// The Hermitian operator Σ_ij ¼ C_ij σ_i ⊗ σ_j.
    pub operator: Matrix4<Complex64>,
    /// Eigenvalues in solver order (not sorted).
    pub eigenvalues: Vector4<f64>,
    /// Eigenvectors, one per column, matching `eigenvalues`.
    pub eigenvectors: Matrix4<Complex64>,
}

/// Build Σ_ij ¼ C_ij σ_i ⊗ σ_j from a real Stokes covariance.
pub fn covariance_operator(cov: &Covariance) -> Matrix4<Complex64> {
    let basis = dirac();
    let mut out = Matrix4::zeros();
    for i in 0..4 {
        for j in 0..4 {
            out += basis[i][j] * Complex64::new(0.25 * cov[(i, j)], 0.0);
        }
    }
    out
}

/// Decompose a Stokes covariance into principal radiation modes.
pub fn principal_modes(cov: &Covariance) -> ModeDecomposition {
    let operator = covariance_operator(cov);
    let eigen = SymmetricEigen::new(operator);
    ModeDecomposition {
        operator,
        eigenvalues: eigen.eigenvalues,
        eigenvectors: eigen.eigenvectors,
    }
}
