//! Field transformer trait and the base emitter.
//!
//! A mode of radiation is a linear chain of [`FieldTransformer`] nodes. The
//! leaf is an [`Emitter`]; every decorator exclusively owns the node it wraps.
//! Each node supplies both a random-draw path ([`FieldTransformer::transform`])
//! and the closed-form moments of the Stokes parameters it produces.

use crate::algebra::{self, Coherency, Covariance, Spinor, Stokes};
use crate::random::RandomSource;

/// A node in a field generation chain.
pub trait FieldTransformer {
    /// Apply this node (and everything it wraps) to a standard spinor drawn
    /// upstream.
    fn transform(&mut self, field: Spinor, rng: &mut RandomSource) -> Spinor;

    /// Population mean of the detected Stokes parameters.
    fn mean(&self) -> Stokes;

    /// Covariance of the Stokes parameters detected from one instance.
    fn covariance(&self) -> Covariance;

    /// Cross-covariance between instances separated by `lag` draws.
    ///
    /// Zero for memoryless nodes, including at lag 0.
    fn crosscovariance(&self, _lag: usize) -> Covariance {
        Covariance::zeros()
    }

    /// ρ^{1/2} of the emitter at the root of the chain.
    fn polarizer(&self) -> Coherency;

    /// E[M^k], where M is the product of every intensity factor in the chain.
    fn power_mean(&self, _k: f64) -> f64 {
        1.0
    }

    /// Draw one field instance through the whole chain.
    fn field(&mut self, rng: &mut RandomSource) -> Spinor {
        let z = rng.spinor();
        self.transform(z, rng)
    }

    /// Log any diagnostics collected during the run.
    fn report_diagnostics(&self) {}
}

/// Leaf emitter of a circular complex Gaussian field with a fixed population
/// mean Stokes vector.
#[derive(Debug, Clone)]
pub struct Emitter {
    mean: Stokes,
    polarizer: Coherency,
}

impl Emitter {
    /// The mean is assumed to be realizable; validation happens upstream.
    pub fn new(mean: Stokes) -> Self {
        Self {
            mean,
            polarizer: algebra::hermitian_sqrt(&algebra::coherency(&mean)),
        }
    }

    /// Replace the population mean.
    pub fn set_stokes(&mut self, mean: Stokes) {
        *self = Self::new(mean);
    }
}

impl FieldTransformer for Emitter {
    fn transform(&mut self, field: Spinor, _rng: &mut RandomSource) -> Spinor {
        self.polarizer * field
    }

    fn mean(&self) -> Stokes {
        self.mean
    }

    fn covariance(&self) -> Covariance {
        algebra::gaussian_covariance(&self.mean)
    }

    fn polarizer(&self) -> Coherency {
        self.polarizer
    }
}
