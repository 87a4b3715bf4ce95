//! Streaming moment accumulation.
//!
//! [`StatisticsEngine`] consumes Stokes samples one at a time and keeps:
//! - running sums of S and S Sᵀ, of the third and fourth powers of each
//!   component, and of the degree of polarization;
//! - optionally, a ring buffer of the last `nlag` samples and the lagged
//!   products used for the cross-covariance estimate;
//! - optionally, running sums of the coherency matrix ρ and of ρ ⊗ ρ.
//!
//! Nothing is allocated per sample: the ring buffer and lag accumulators are
//! sized once at construction.

use nalgebra::Matrix4;
use num_complex::Complex64;

use crate::algebra::{
    self, Coherency, Covariance, ModeDecomposition, Stokes, coherency, direct, outer,
};
use crate::random::RandomSource;
use crate::sample::Sample;

/// Which mean is subtracted from the normalized outer-product sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Centering {
    /// The measured sample mean (default).
    SampleMean,
    /// A known population mean.
    Population(Stokes),
}

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Number of samples drawn by [`StatisticsEngine::run`].
    pub nsamp: u64,
    /// Number of lags (0 disables lag analysis).
    pub nlag: usize,
    /// Accumulate coherency-matrix moments.
    pub coherency: bool,
    pub centering: Centering,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nsamp: 1 << 20,
            nlag: 0,
            coherency: false,
            centering: Centering::SampleMean,
        }
    }
}

/// Injected per-sample hook, called after each sample is accumulated.
pub trait Observer {
    fn observe(&mut self, index: u64, stokes: &Stokes);
}

/// Normalized coherency-matrix moments.
#[derive(Debug, Clone)]
pub struct CoherencyMoments {
    pub mean: Coherency,
    /// Mean of ρ ⊗ ρ.
    pub square: Matrix4<Complex64>,
    /// square − mean ⊗ mean.
    pub covariance: Matrix4<Complex64>,
}

/// Normalized results of a run.
#[derive(Debug, Clone)]
pub struct Measurements {
    pub count: u64,
    pub mean: Stokes,
    pub covariance: Covariance,
    /// Central fourth moment of each component.
    pub central_fourth: Stokes,
    /// Mean degree of polarization of the samples.
    pub mean_dop: f64,
    /// sqrt(var I) / mean I.
    pub modulation_index: f64,
    /// Lagged cross-covariances E[(S_t − m)(S_{t+lag} − m)ᵀ], one per lag;
    /// empty when lag analysis is off.
    pub lags: Vec<Covariance>,
    /// Number of samples that contributed to each lag estimate.
    pub lag_count: u64,
    pub coherency: Option<CoherencyMoments>,
}

/// Analytic predictions of a [`Sample`] for comparison with [`Measurements`].
#[derive(Debug, Clone)]
pub struct Predictions {
    pub mean: Stokes,
    pub covariance: Covariance,
    pub lags: Vec<Covariance>,
    pub modes: Option<ModeDecomposition>,
}

impl Predictions {
    pub fn from_sample(sample: &Sample, nlag: usize, modes: bool) -> Self {
        let covariance = sample.covariance();
        Self {
            mean: sample.mean(),
            covariance,
            lags: (0..nlag).map(|lag| sample.crosscovariance(lag)).collect(),
            modes: modes.then(|| algebra::principal_modes(&covariance)),
        }
    }
}

/// Running accumulators for a stream of Stokes samples.
pub struct StatisticsEngine {
    config: EngineConfig,
    count: u64,
    tot: Stokes,
    totsq: Covariance,
    tot3: Stokes,
    tot4: Stokes,
    totp: f64,
    ring: Vec<Stokes>,
    current: usize,
    acf: Vec<Covariance>,
    count_lag: u64,
    tot_rho: Coherency,
    totsq_rho: Matrix4<Complex64>,
}

impl StatisticsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            count: 0,
            tot: Stokes::zeros(),
            totsq: Covariance::zeros(),
            tot3: Stokes::zeros(),
            tot4: Stokes::zeros(),
            totp: 0.0,
            ring: vec![Stokes::zeros(); config.nlag],
            current: 0,
            acf: vec![Covariance::zeros(); config.nlag],
            count_lag: 0,
            tot_rho: Coherency::zeros(),
            totsq_rho: Matrix4::zeros(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Samples accumulated so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Draw `nsamp` samples and accumulate them.
    pub fn run(&mut self, sample: &mut Sample, rng: &mut RandomSource) {
        for _ in 0..self.config.nsamp {
            let s = sample.stokes(rng);
            self.accumulate(&s);
        }
    }

    /// As [`run`](Self::run), handing every sample to `observer`.
    pub fn run_observed(
        &mut self,
        sample: &mut Sample,
        rng: &mut RandomSource,
        observer: &mut dyn Observer,
    ) {
        for idat in 0..self.config.nsamp {
            let s = sample.stokes(rng);
            self.accumulate(&s);
            observer.observe(idat, &s);
        }
    }

    /// Add one sample to every enabled accumulator.
    pub fn accumulate(&mut self, s: &Stokes) {
        self.tot += s;
        self.totsq += outer(s, s);
        let sq = s.component_mul(s);
        self.tot3 += sq.component_mul(s);
        self.tot4 += sq.component_mul(&sq);
        self.count += 1;

        let nlag = self.config.nlag;
        if nlag > 0 {
            self.ring[self.current] = *s;
            self.current = (self.current + 1) % nlag;

            // `current` now indexes the oldest sample in the ring.
            if self.count >= nlag as u64 {
                let oldest = self.ring[self.current];
                for (lag, acf) in self.acf.iter_mut().enumerate() {
                    let later = self.ring[(self.current + lag) % nlag];
                    *acf += outer(&oldest, &later);
                }
                self.count_lag += 1;
            }
        }

        self.totp += algebra::degree_of_polarization(s);

        if self.config.coherency {
            let rho = coherency(s);
            self.tot_rho += rho;
            self.totsq_rho += direct(&rho, &rho);
        }
    }

    /// Normalize every accumulator.
    ///
    /// The covariance is `totsq / n − outer(ref, ref)`: division first, then
    /// subtraction, with `ref` chosen by [`Centering`].
    pub fn finish(self) -> Measurements {
        let n = self.count as f64;

        let mean_dop = self.totp / n;
        let mean = self.tot / n;
        let mut covariance = self.totsq / n;

        let e3 = self.tot3 / n;
        let e4 = self.tot4 / n;
        let central_fourth = Stokes::from_fn(|i, _| {
            let m = mean[i];
            let e2 = covariance[(i, i)];
            e4[i] - 4.0 * m * e3[i] + 6.0 * m * m * e2 - 3.0 * m.powi(4)
        });

        match self.config.centering {
            Centering::SampleMean => covariance -= outer(&mean, &mean),
            Centering::Population(population) => covariance -= outer(&population, &population),
        }

        let mean_outer = outer(&mean, &mean);
        let lags: Vec<Covariance> = self
            .acf
            .into_iter()
            .map(|mut acf| {
                acf /= self.count_lag as f64;
                acf -= mean_outer;
                acf
            })
            .collect();
        if !lags.is_empty() {
            log::debug!("normalized {} lags over {} samples", lags.len(), self.count_lag);
        }

        let coherency = self.config.coherency.then(|| {
            let mean_rho = self.tot_rho / Complex64::new(n, 0.0);
            let square = self.totsq_rho / Complex64::new(n, 0.0);
            CoherencyMoments {
                mean: mean_rho,
                square,
                covariance: square - direct(&mean_rho, &mean_rho),
            }
        });

        Measurements {
            count: self.count,
            mean,
            modulation_index: covariance[(0, 0)].sqrt() / mean[0],
            covariance,
            central_fourth,
            mean_dop,
            lags,
            lag_count: self.count_lag,
            coherency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Emitter;
    use crate::modulation::{Boxcar, Lognormal, ModulatedMode};
    use nalgebra::Vector4;

    fn stream() -> Vec<Stokes> {
        vec![
            Vector4::new(1.0, 0.1, 0.0, 0.0),
            Vector4::new(2.0, -0.3, 0.5, 0.1),
            Vector4::new(0.5, 0.2, -0.1, 0.3),
            Vector4::new(1.5, 0.0, 0.4, -0.2),
            Vector4::new(0.7, 0.3, 0.3, 0.3),
        ]
    }

    #[test]
    fn test_sample_mean_centering_order() {
        let mut engine = StatisticsEngine::new(EngineConfig::default());
        let data = stream();
        let mut tot = Stokes::zeros();
        let mut totsq = Covariance::zeros();
        for s in &data {
            engine.accumulate(s);
            tot += s;
            totsq += outer(s, s);
        }
        let m = engine.finish();
        let n = data.len() as f64;
        tot /= n;
        totsq /= n;
        totsq -= outer(&tot, &tot);
        assert_eq!(m.mean, tot);
        assert_eq!(m.covariance, totsq);
    }

    #[test]
    fn test_population_centering_order() {
        let population = Vector4::new(1.0, 0.0, 0.0, 0.0);
        let config = EngineConfig {
            centering: Centering::Population(population),
            ..EngineConfig::default()
        };
        let mut engine = StatisticsEngine::new(config);
        let data = stream();
        let mut totsq = Covariance::zeros();
        for s in &data {
            engine.accumulate(s);
            totsq += outer(s, s);
        }
        let m = engine.finish();
        totsq /= data.len() as f64;
        totsq -= outer(&population, &population);
        assert_eq!(m.covariance, totsq);
    }

    #[test]
    fn test_lag_accumulation_waits_for_full_ring() {
        let config = EngineConfig {
            nlag: 3,
            ..EngineConfig::default()
        };
        let mut engine = StatisticsEngine::new(config);
        let data = stream();
        for s in &data {
            engine.accumulate(s);
        }
        let m = engine.finish();
        // Windows (0,1,2), (1,2,3), (2,3,4).
        assert_eq!(m.lag_count, 3);
        assert_eq!(m.lags.len(), 3);

        let mut expected = Covariance::zeros();
        for t in 0..3 {
            expected += outer(&data[t], &data[t + 2]);
        }
        expected /= 3.0;
        expected -= outer(&m.mean, &m.mean);
        assert!((m.lags[2] - expected).amax() < 1e-15);

        // Rows index the earlier sample: I_t·Q_{t+2} sums to 0.35, Q_t·I_{t+2} to −0.26.
        let asymmetry = m.lags[2][(0, 1)] - m.lags[2][(1, 0)];
        assert!((asymmetry - 0.61 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_lag_zero_equals_covariance_for_in_window_samples() {
        let config = EngineConfig {
            nlag: 1,
            ..EngineConfig::default()
        };
        let mut engine = StatisticsEngine::new(config);
        for s in &stream() {
            engine.accumulate(s);
        }
        let m = engine.finish();
        assert_eq!(m.lag_count, 5);
        assert!((m.lags[0] - m.covariance).amax() < 1e-12);
    }

    #[test]
    fn test_central_fourth_moment() {
        let mut engine = StatisticsEngine::new(EngineConfig::default());
        engine.accumulate(&Vector4::new(1.0, 2.0, 0.0, 0.0));
        engine.accumulate(&Vector4::new(3.0, -2.0, 0.0, 0.0));
        let m = engine.finish();
        // Deviations of ±1 and ±2 from the means 2 and 0.
        assert!((m.central_fourth[0] - 1.0).abs() < 1e-12);
        assert!((m.central_fourth[1] - 16.0).abs() < 1e-12);
        assert_eq!(m.central_fourth[2], 0.0);
    }

    #[test]
    fn test_degree_of_polarization_accumulates() {
        let mut engine = StatisticsEngine::new(EngineConfig::default());
        engine.accumulate(&Vector4::new(1.0, 1.0, 0.0, 0.0));
        engine.accumulate(&Vector4::new(2.0, 0.0, 0.0, 0.0));
        let m = engine.finish();
        assert!((m.mean_dop - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_coherency_moments_match_stokes_moments() {
        let config = EngineConfig {
            coherency: true,
            ..EngineConfig::default()
        };
        let mut engine = StatisticsEngine::new(config);
        for s in &stream() {
            engine.accumulate(s);
        }
        let m = engine.finish();
        let rho = m.coherency.expect("coherency enabled");
        assert!((algebra::stokes(&rho.mean) - m.mean).amax() < 1e-12);
        let operator = algebra::covariance_operator(&m.covariance);
        assert!((rho.covariance - operator).norm() < 1e-12);
    }

    #[test]
    fn test_run_observed_visits_every_sample() {
        struct Count(u64);
        impl Observer for Count {
            fn observe(&mut self, index: u64, _stokes: &Stokes) {
                assert_eq!(index, self.0);
                self.0 += 1;
            }
        }
        let config = EngineConfig {
            nsamp: 1000,
            ..EngineConfig::default()
        };
        let mut engine = StatisticsEngine::new(config);
        let mut sample = Sample::single(Box::new(Emitter::new(Vector4::new(1.0, 0.0, 0.0, 0.0))), 1);
        let mut rng = RandomSource::seeded(9);
        let mut count = Count(0);
        engine.run_observed(&mut sample, &mut rng, &mut count);
        assert_eq!(count.0, 1000);
        assert_eq!(engine.count(), 1000);
    }

    #[test]
    fn test_predictions_follow_sample() {
        let chain = ModulatedMode::new(
            Box::new(Emitter::new(Vector4::new(1.0, 0.0, 0.0, 0.0))),
            Box::new(Boxcar::new(Box::new(Lognormal::new(0.5)), 4)),
        );
        let sample = Sample::single(Box::new(chain), 2);
        let p = Predictions::from_sample(&sample, 6, true);
        assert_eq!(p.lags.len(), 6);
        assert_eq!(p.covariance, sample.covariance());
        assert_eq!(p.lags[5], Covariance::zeros());
        assert!(p.modes.is_some());
    }
}
