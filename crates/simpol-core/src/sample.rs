//! Detector integration.
//!
//! A [`StokesSource`] produces one detected Stokes instance per call, either
//! from a single mode ([`SingleMode`]) or from a dual-mode combinator. A
//! [`Sample`] averages `sample_size` instances into one reported sample, which
//! divides the instance covariance by `sample_size` and leaves the mean and the
//! cross-covariance between samples untouched.

use crate::algebra::{Covariance, Stokes, detect};
use crate::mode::FieldTransformer;
use crate::random::RandomSource;

/// Anything that yields detected Stokes instances with known moments.
pub trait StokesSource {
    /// Draw and detect one instance.
    fn instance(&mut self, rng: &mut RandomSource) -> Stokes;

    /// Called once before the instances of each reported sample are drawn.
    fn begin_sample(&mut self, _rng: &mut RandomSource) {}

    /// Population mean of one instance.
    fn mean(&self) -> Stokes;

    /// Covariance of one instance.
    fn covariance(&self) -> Covariance;

    /// Covariance of the mean of `sample_size` instances drawn within one
    /// reported sample.
    fn integrated_covariance(&self, sample_size: u32) -> Covariance {
        self.covariance() / sample_size as f64
    }

    /// Cross-covariance between reported samples `lag` apart.
    fn crosscovariance(&self, _lag: usize) -> Covariance {
        Covariance::zeros()
    }

    /// Log any diagnostics collected during the run.
    fn report_diagnostics(&self) {}
}

/// Detects the field of a single mode.
pub struct SingleMode {
    chain: Box<dyn FieldTransformer>,
}

impl SingleMode {
    pub fn new(chain: Box<dyn FieldTransformer>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &dyn FieldTransformer {
        self.chain.as_ref()
    }
}

impl StokesSource for SingleMode {
    fn instance(&mut self, rng: &mut RandomSource) -> Stokes {
        detect(&self.chain.field(rng))
    }

    fn mean(&self) -> Stokes {
        self.chain.mean()
    }

    fn covariance(&self) -> Covariance {
        self.chain.covariance()
    }

    fn crosscovariance(&self, lag: usize) -> Covariance {
        self.chain.crosscovariance(lag)
    }

    fn report_diagnostics(&self) {
        self.chain.report_diagnostics();
    }
}

/// Averages `sample_size` instances per reported Stokes sample.
pub struct Sample {
    source: Box<dyn StokesSource>,
    sample_size: u32,
}

impl Sample {
    pub fn new(source: Box<dyn StokesSource>, sample_size: u32) -> Self {
        if sample_size == 0 {
            log::warn!("sample size is zero; every sample will be NaN");
        }
        Self {
            source,
            sample_size,
        }
    }

    /// Wrap a single mode.
    pub fn single(chain: Box<dyn FieldTransformer>, sample_size: u32) -> Self {
        Self::new(Box::new(SingleMode::new(chain)), sample_size)
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    pub fn set_sample_size(&mut self, sample_size: u32) {
        self.sample_size = sample_size;
    }

    /// Draw one integrated Stokes sample.
    pub fn stokes(&mut self, rng: &mut RandomSource) -> Stokes {
        self.source.begin_sample(rng);
        let mut result = Stokes::zeros();
        for _ in 0..self.sample_size {
            result += self.source.instance(rng);
        }
        result / self.sample_size as f64
    }

    pub fn mean(&self) -> Stokes {
        self.source.mean()
    }

    pub fn covariance(&self) -> Covariance {
        self.source.integrated_covariance(self.sample_size)
    }

    pub fn crosscovariance(&self, lag: usize) -> Covariance {
        self.source.crosscovariance(lag)
    }

    pub fn report_diagnostics(&self) {
        self.source.report_diagnostics();
    }
}
