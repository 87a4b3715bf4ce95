//! Dual-mode combinators.
//!
//! Each combinator exclusively owns two independent field transformer chains,
//! A and B, and exposes them as a single [`StokesSource`]:
//!
//! - [`Superposed`]: fields of A and B are added before detection.
//! - [`Composite`]: each instance comes from A with probability `p`.
//! - [`Disjoint`]: a deterministic fraction `p` of reported samples comes
//!   entirely from A, the rest entirely from B.
//! - [`Coherent`]: fields of A and B are added with partially correlated
//!   underlying deviates.

use crate::algebra::{self, Coherency, Covariance, Stokes, coherency, detect, outer, trace_form};
use crate::mode::FieldTransformer;
use crate::random::RandomSource;
use crate::sample::StokesSource;
use num_complex::Complex64;

/// Number of selections averaged when estimating the autocorrelation of the
/// [`Disjoint`] partition sequence.
const PARTITION_WINDOW: usize = 1 << 16;

/// Covariance of the interference term between two independent fields.
fn interference(mean_a: &Stokes, mean_b: &Stokes) -> Covariance {
    let rho_a = coherency(mean_a);
    let rho_b = coherency(mean_b);
    trace_form(&rho_a, &rho_b) + trace_form(&rho_b, &rho_a)
}

/// Covariance of a two-component mixture with weight `p` on A.
fn mixture_covariance(p: f64, a: &dyn FieldTransformer, b: &dyn FieldTransformer) -> Covariance {
    let delta = a.mean() - b.mean();
    a.covariance() * p + b.covariance() * (1.0 - p) + outer(&delta, &delta) * (p * (1.0 - p))
}

fn mixture_mean(p: f64, a: &dyn FieldTransformer, b: &dyn FieldTransformer) -> Stokes {
    a.mean() * p + b.mean() * (1.0 - p)
}

// ---------------------------------------------------------------------------
// Superposed
// ---------------------------------------------------------------------------

/// Incoherent superposition: independent fields summed before detection.
pub struct Superposed {
    a: Box<dyn FieldTransformer>,
    b: Box<dyn FieldTransformer>,
}

impl Superposed {
    pub fn new(a: Box<dyn FieldTransformer>, b: Box<dyn FieldTransformer>) -> Self {
        Self { a, b }
    }
}

impl StokesSource for Superposed {
    fn instance(&mut self, rng: &mut RandomSource) -> Stokes {
        let e = self.a.field(rng) + self.b.field(rng);
        detect(&e)
    }

    fn mean(&self) -> Stokes {
        self.a.mean() + self.b.mean()
    }

    fn covariance(&self) -> Covariance {
        self.a.covariance() + self.b.covariance() + interference(&self.a.mean(), &self.b.mean())
    }

    fn crosscovariance(&self, lag: usize) -> Covariance {
        self.a.crosscovariance(lag) + self.b.crosscovariance(lag)
    }

    fn report_diagnostics(&self) {
        self.a.report_diagnostics();
        self.b.report_diagnostics();
    }
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// Random per-instance selection between the two modes.
pub struct Composite {
    a: Box<dyn FieldTransformer>,
    b: Box<dyn FieldTransformer>,
    fraction: f64,
}

impl Composite {
    /// `fraction` is the probability that an instance comes from A.
    pub fn new(a: Box<dyn FieldTransformer>, b: Box<dyn FieldTransformer>, fraction: f64) -> Self {
        Self { a, b, fraction }
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

impl StokesSource for Composite {
    fn instance(&mut self, rng: &mut RandomSource) -> Stokes {
        let e = if rng.uniform() < self.fraction {
            self.a.field(rng)
        } else {
            self.b.field(rng)
        };
        detect(&e)
    }

    fn mean(&self) -> Stokes {
        mixture_mean(self.fraction, self.a.as_ref(), self.b.as_ref())
    }

    fn covariance(&self) -> Covariance {
        mixture_covariance(self.fraction, self.a.as_ref(), self.b.as_ref())
    }

    // Both instances must come from the same chain for its memory to matter.
    fn crosscovariance(&self, lag: usize) -> Covariance {
        let p = self.fraction;
        self.a.crosscovariance(lag) * (p * p) + self.b.crosscovariance(lag) * ((1.0 - p) * (1.0 - p))
    }

    fn report_diagnostics(&self) {
        self.a.report_diagnostics();
        self.b.report_diagnostics();
    }
}

// ---------------------------------------------------------------------------
// Disjoint
// ---------------------------------------------------------------------------

/// Deterministic selection sequence: accumulates `fraction` credit per step
/// and selects A whenever a whole unit has accrued.
#[derive(Debug, Clone, Copy)]
struct Partition {
    fraction: f64,
    credit: f64,
}

impl Partition {
    fn new(fraction: f64) -> Self {
        Self {
            fraction,
            credit: 0.0,
        }
    }

    fn next_is_a(&mut self) -> bool {
        self.credit += self.fraction;
        if self.credit >= 1.0 {
            self.credit -= 1.0;
            true
        } else {
            false
        }
    }

    /// Mean of s_t · s_{t+lag} over the sequence, s = 1 when A is selected.
    fn autocorrelation(fraction: f64, lag: usize) -> f64 {
        let mut partition = Self::new(fraction);
        let picks: Vec<bool> = (0..PARTITION_WINDOW + lag)
            .map(|_| partition.next_is_a())
            .collect();
        let both = (0..PARTITION_WINDOW)
            .filter(|&t| picks[t] && picks[t + lag])
            .count();
        both as f64 / PARTITION_WINDOW as f64
    }
}

/// Each reported sample is drawn entirely from one mode; exactly a fraction
/// `p` of samples come from A, in a fixed interleaved order.
pub struct Disjoint {
    a: Box<dyn FieldTransformer>,
    b: Box<dyn FieldTransformer>,
    partition: Partition,
    use_a: bool,
}

impl Disjoint {
    pub fn new(a: Box<dyn FieldTransformer>, b: Box<dyn FieldTransformer>, fraction: f64) -> Self {
        Self {
            a,
            b,
            partition: Partition::new(fraction),
            use_a: false,
        }
    }

    pub fn fraction(&self) -> f64 {
        self.partition.fraction
    }
}

impl StokesSource for Disjoint {
    fn begin_sample(&mut self, _rng: &mut RandomSource) {
        self.use_a = self.partition.next_is_a();
    }

    fn instance(&mut self, rng: &mut RandomSource) -> Stokes {
        let e = if self.use_a {
            self.a.field(rng)
        } else {
            self.b.field(rng)
        };
        detect(&e)
    }

    fn mean(&self) -> Stokes {
        mixture_mean(self.fraction(), self.a.as_ref(), self.b.as_ref())
    }

    fn covariance(&self) -> Covariance {
        mixture_covariance(self.fraction(), self.a.as_ref(), self.b.as_ref())
    }

    // Selection is per sample, so only the within-mode part averages down.
    fn integrated_covariance(&self, sample_size: u32) -> Covariance {
        let p = self.fraction();
        let delta = self.a.mean() - self.b.mean();
        let within = self.a.covariance() * p + self.b.covariance() * (1.0 - p);
        within / sample_size as f64 + outer(&delta, &delta) * (p * (1.0 - p))
    }

    fn crosscovariance(&self, lag: usize) -> Covariance {
        let p = self.fraction();
        let delta = self.a.mean() - self.b.mean();
        let selection = Partition::autocorrelation(p, lag) - p * p;
        outer(&delta, &delta) * selection
            + self.a.crosscovariance(lag) * p
            + self.b.crosscovariance(lag) * (1.0 - p)
    }

    fn report_diagnostics(&self) {
        self.a.report_diagnostics();
        self.b.report_diagnostics();
    }
}

// ---------------------------------------------------------------------------
// Coherent
// ---------------------------------------------------------------------------

/// Moments E[M^k] of the intensity factor of a chain used by [`Coherent`].
#[derive(Debug, Clone, Copy)]
struct FactorMoments {
    half: f64,
    first: f64,
    three_halves: f64,
    second: f64,
}

impl FactorMoments {
    fn of(chain: &dyn FieldTransformer) -> Self {
        Self {
            half: chain.power_mean(0.5),
            first: chain.power_mean(1.0),
            three_halves: chain.power_mean(1.5),
            second: chain.power_mean(2.0),
        }
    }
}

fn symmetric_outer(x: &Stokes, y: &Stokes) -> Covariance {
    outer(x, y) + outer(y, x)
}

fn symmetric_trace_form(x: &Coherency, y: &Coherency) -> Covariance {
    trace_form(x, y) + trace_form(y, x)
}

/// Superposition of two modes whose underlying deviates are correlated with
/// coefficient `c`: z_B = c·z_A + sqrt(1 − c²)·z'.
///
/// Each chain is an emitter with polarizer J scaled by the square root of an
/// independent intensity factor M, so its field is √M·J·z. The zero-lag
/// moments average the conditionally Gaussian moments over both factors.
pub struct Coherent {
    a: Box<dyn FieldTransformer>,
    b: Box<dyn FieldTransformer>,
    coefficient: f64,
}

impl Coherent {
    pub fn new(a: Box<dyn FieldTransformer>, b: Box<dyn FieldTransformer>, coefficient: f64) -> Self {
        Self { a, b, coefficient }
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    /// c(J_A J_B† + J_B J_A†), the cross coherency for unit intensity factors.
    fn unit_cross_coherency(&self) -> Coherency {
        let ja = self.a.polarizer();
        let jb = self.b.polarizer();
        (ja * jb.adjoint() + jb * ja.adjoint()) * Complex64::new(self.coefficient, 0.0)
    }

    /// E[e_A e_B† + e_B e_A†], the cross coherency of the two fields.
    pub fn cross_coherency(&self) -> Coherency {
        let amplitude = self.a.power_mean(0.5) * self.b.power_mean(0.5);
        self.unit_cross_coherency() * Complex64::new(amplitude, 0.0)
    }
}

impl StokesSource for Coherent {
    fn instance(&mut self, rng: &mut RandomSource) -> Stokes {
        let c = self.coefficient;
        let independent = (1.0 - c * c).max(0.0).sqrt();
        let za = rng.spinor();
        let zb = za * Complex64::new(c, 0.0) + rng.spinor() * Complex64::new(independent, 0.0);
        let e = self.a.transform(za, rng) + self.b.transform(zb, rng);
        detect(&e)
    }

    fn mean(&self) -> Stokes {
        self.a.mean() + self.b.mean() + algebra::stokes(&self.cross_coherency())
    }

    // Given the factors, ρ(M) = M_A ρ_A + M_B ρ_B + sqrt(M_A M_B) K and the
    // covariance is T(ρ(M), ρ(M)) plus the spread of stokes(ρ(M)).
    fn covariance(&self) -> Covariance {
        let (ja, jb) = (self.a.polarizer(), self.b.polarizer());
        let rho_a = ja * ja.adjoint();
        let rho_b = jb * jb.adjoint();
        let k = self.unit_cross_coherency();
        let (ma, mb) = (FactorMoments::of(self.a.as_ref()), FactorMoments::of(self.b.as_ref()));
        let (sa, sb, sk) = (algebra::stokes(&rho_a), algebra::stokes(&rho_b), algebra::stokes(&k));

        let independent = ma.first * mb.first;
        let skew_a = ma.three_halves * mb.half;
        let skew_b = ma.half * mb.three_halves;

        let noise = trace_form(&rho_a, &rho_a) * ma.second
            + trace_form(&rho_b, &rho_b) * mb.second
            + (symmetric_trace_form(&rho_a, &rho_b) + trace_form(&k, &k)) * independent
            + symmetric_trace_form(&rho_a, &k) * skew_a
            + symmetric_trace_form(&rho_b, &k) * skew_b;

        let second = outer(&sa, &sa) * ma.second
            + outer(&sb, &sb) * mb.second
            + (symmetric_outer(&sa, &sb) + outer(&sk, &sk)) * independent
            + symmetric_outer(&sa, &sk) * skew_a
            + symmetric_outer(&sb, &sk) * skew_b;
        let mean = self.mean();

        noise + second - outer(&mean, &mean)
    }

    fn crosscovariance(&self, lag: usize) -> Covariance {
        self.a.crosscovariance(lag) + self.b.crosscovariance(lag)
    }

    fn report_diagnostics(&self) {
        self.a.report_diagnostics();
        self.b.report_diagnostics();
    }
}
