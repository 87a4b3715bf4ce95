//! Amplitude modulation of a mode of radiation.
//!
//! A [`Modulation`] is a positive scalar random factor with exact analytic
//! mean and variance. [`ModulatedMode`] multiplies the intensity of the field
//! produced by its source by that factor (the amplitude by its square root).
//! [`Boxcar`] and [`Square`] wrap another modulation and introduce correlation
//! between consecutive factors.

use crate::algebra::{Coherency, Covariance, Spinor, Stokes, outer};
use crate::mode::FieldTransformer;
use crate::random::RandomSource;
use num_complex::Complex64;

/// A positive scalar modulation factor.
pub trait Modulation {
    /// Draw the next factor.
    fn modulation(&mut self, rng: &mut RandomSource) -> f64;

    /// Mean of the factor.
    fn mod_mean(&self) -> f64;

    /// Variance of the factor.
    fn mod_variance(&self) -> f64;

    /// Autocovariance between factors `lag` draws apart, excluding lag-0
    /// variance for memoryless factors.
    fn lag_covariance(&self, _lag: usize) -> f64 {
        0.0
    }

    /// E[m^k]. The default is the second-order expansion
    /// μ^k (1 + k(k−1)/2 · σ²/μ²), exact for k = 0, 1, 2.
    fn power_mean(&self, k: f64) -> f64 {
        let mean = self.mod_mean();
        if mean <= 0.0 {
            return 0.0;
        }
        mean.powf(k) * (1.0 + 0.5 * k * (k - 1.0) * self.mod_variance() / (mean * mean))
    }
}

// ---------------------------------------------------------------------------
// Log-normal
// ---------------------------------------------------------------------------

/// Log-normal factor with unit mean and modulation index β.
#[derive(Debug, Clone)]
pub struct Lognormal {
    log_sigma: f64,
}

impl Lognormal {
    pub fn new(beta: f64) -> Self {
        let mut l = Self { log_sigma: 0.0 };
        l.set_beta(beta);
        l
    }

    pub fn set_beta(&mut self, beta: f64) {
        self.log_sigma = (beta * beta + 1.0).ln().sqrt();
    }

    pub fn beta(&self) -> f64 {
        self.mod_variance().sqrt()
    }

    /// Standard deviation of the logarithm of the factor.
    pub fn log_sigma(&self) -> f64 {
        self.log_sigma
    }
}

impl Modulation for Lognormal {
    fn modulation(&mut self, rng: &mut RandomSource) -> f64 {
        let s = self.log_sigma;
        (s * (rng.normal() - 0.5 * s)).exp()
    }

    fn mod_mean(&self) -> f64 {
        1.0
    }

    fn mod_variance(&self) -> f64 {
        (self.log_sigma * self.log_sigma).exp() - 1.0
    }

    fn power_mean(&self, k: f64) -> f64 {
        (0.5 * k * (k - 1.0) * self.log_sigma * self.log_sigma).exp()
    }
}

// ---------------------------------------------------------------------------
// Box-car smoothed
// ---------------------------------------------------------------------------

/// Running mean of the last `width` draws of the wrapped modulation.
///
/// Fractional moments of a sum of lognormals have no closed form, so
/// [`Modulation::power_mean`] uses the second-order expansion.
pub struct Boxcar {
    inner: Box<dyn Modulation>,
    width: usize,
    history: Vec<f64>,
    current: usize,
}

impl Boxcar {
    pub fn new(inner: Box<dyn Modulation>, width: usize) -> Self {
        Self {
            inner,
            width: width.max(1),
            history: Vec::new(),
            current: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    // Slot 0 is left for the first regular draw.
    fn prefill(&mut self, rng: &mut RandomSource) {
        self.current = 0;
        self.history = vec![0.0; self.width];
        for i in 1..self.width {
            self.history[i] = self.inner.modulation(rng);
        }
    }
}

impl Modulation for Boxcar {
    fn modulation(&mut self, rng: &mut RandomSource) -> f64 {
        if self.history.len() < self.width {
            self.prefill(rng);
        }

        self.history[self.current] = self.inner.modulation(rng);
        self.current = (self.current + 1) % self.width;

        self.history.iter().sum::<f64>() / self.width as f64
    }

    fn mod_mean(&self) -> f64 {
        self.inner.mod_mean()
    }

    fn mod_variance(&self) -> f64 {
        self.inner.mod_variance() / self.width as f64
    }

    fn lag_covariance(&self, lag: usize) -> f64 {
        if lag >= self.width {
            return 0.0;
        }
        (self.width - lag) as f64 / self.width as f64 * self.mod_variance()
    }
}

// ---------------------------------------------------------------------------
// Square pulse
// ---------------------------------------------------------------------------

/// Holds one draw of the wrapped modulation for `width` consecutive calls.
pub struct Square {
    inner: Box<dyn Modulation>,
    width: usize,
    current: usize,
    value: f64,
}

impl Square {
    pub fn new(inner: Box<dyn Modulation>, width: usize) -> Self {
        let width = width.max(1);
        Self {
            inner,
            width,
            current: width,
            value: 0.0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

impl Modulation for Square {
    fn modulation(&mut self, rng: &mut RandomSource) -> f64 {
        if self.current == self.width {
            self.value = self.inner.modulation(rng);
            self.current = 0;
        }
        self.current += 1;
        self.value
    }

    fn mod_mean(&self) -> f64 {
        self.inner.mod_mean()
    }

    fn mod_variance(&self) -> f64 {
        self.inner.mod_variance()
    }

    fn lag_covariance(&self, lag: usize) -> f64 {
        if lag >= self.width {
            0.0
        } else {
            self.mod_variance()
        }
    }

    fn power_mean(&self, k: f64) -> f64 {
        self.inner.power_mean(k)
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Running moments of the factors actually drawn by a [`ModulatedMode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ModulationProbe {
    pub count: u64,
    pub sum: f64,
    pub sum_sq: f64,
}

impl ModulationProbe {
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.sum_sq / self.count as f64 - mean * mean
    }
}

// ---------------------------------------------------------------------------
// Modulated mode
// ---------------------------------------------------------------------------

/// A field transformer that scales its source's intensity by a modulation.
pub struct ModulatedMode {
    source: Box<dyn FieldTransformer>,
    modulation: Box<dyn Modulation>,
    probe: Option<ModulationProbe>,
}

impl ModulatedMode {
    pub fn new(source: Box<dyn FieldTransformer>, modulation: Box<dyn Modulation>) -> Self {
        Self {
            source,
            modulation,
            probe: None,
        }
    }

    /// Record every drawn factor for [`FieldTransformer::report_diagnostics`].
    pub fn with_probe(mut self) -> Self {
        self.probe = Some(ModulationProbe::default());
        self
    }

    pub fn probe(&self) -> Option<&ModulationProbe> {
        self.probe.as_ref()
    }

    pub fn modulation(&self) -> &dyn Modulation {
        self.modulation.as_ref()
    }
}

impl FieldTransformer for ModulatedMode {
    fn transform(&mut self, field: Spinor, rng: &mut RandomSource) -> Spinor {
        let e = self.source.transform(field, rng);
        let m = self.modulation.modulation(rng);
        if let Some(probe) = self.probe.as_mut() {
            probe.record(m);
        }
        e * Complex64::new(m.sqrt(), 0.0)
    }

    fn mean(&self) -> Stokes {
        self.source.mean() * self.modulation.mod_mean()
    }

    fn covariance(&self) -> Covariance {
        let mean = self.modulation.mod_mean();
        let var = self.modulation.mod_variance();
        let ms = self.source.mean();
        self.source.covariance() * (mean * mean + var) + outer(&ms, &ms) * var
    }

    // E[m_t m_{t+lag}] = mean² + L for a modulation independent of the source.
    fn crosscovariance(&self, lag: usize) -> Covariance {
        let mean = self.modulation.mod_mean();
        let l = self.modulation.lag_covariance(lag);
        let ms = self.source.mean();
        self.source.crosscovariance(lag) * (mean * mean + l) + outer(&ms, &ms) * l
    }

    fn polarizer(&self) -> Coherency {
        self.source.polarizer()
    }

    fn power_mean(&self, k: f64) -> f64 {
        self.source.power_mean(k) * self.modulation.power_mean(k)
    }

    fn report_diagnostics(&self) {
        if let Some(probe) = &self.probe {
            log::debug!(
                "modulated mode: expected mean={} var={}; measured mean={} var={} over {} draws",
                self.modulation.mod_mean(),
                self.modulation.mod_variance(),
                probe.mean(),
                probe.variance(),
                probe.count
            );
        }
        self.source.report_diagnostics();
    }
}
