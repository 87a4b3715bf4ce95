//! # simpol-core
//!
//! **Simulated polarized noise, checked against its own moment formulas.**
//!
//! `simpol-core` draws random electromagnetic fields from composable models,
//! detects them as Stokes 4-vectors, and accumulates running moments that can
//! be compared with the closed-form mean, covariance and lagged
//! cross-covariance every model node predicts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use simpol_core::{RandomSource, RunConfig, StatisticsEngine};
//!
//! let config = RunConfig { nlag: 4, ..RunConfig::default() };
//! let mut sample = config.build_sample();
//! let mut rng = RandomSource::seeded(1);
//!
//! let mut engine = StatisticsEngine::new(config.engine_config(&sample));
//! engine.run(&mut sample, &mut rng);
//! let measured = engine.finish();
//!
//! println!("measured {}", measured.mean);
//! println!("expected {}", sample.mean());
//! ```
//!
//! ## Architecture
//!
//! RandomSource → mode chain → Sample → StatisticsEngine → report
//!
//! A mode chain is an [`Emitter`] optionally wrapped by a [`ModulatedMode`].
//! Two chains can be combined by a dual-mode [`StokesSource`]:
//! - **Superposed**: fields add, both modes in every instance.
//! - **Composite**: each instance comes from A with probability `f`.
//! - **Disjoint**: each reported sample comes from A for a fraction `f`.
//! - **Coherent**: fields add with correlation coefficient `c`.
//!
//! A [`Sample`] averages `sample_size` detected instances per reported sample.

pub mod algebra;
pub mod combination;
pub mod config;
pub mod error;
pub mod mode;
pub mod modulation;
pub mod random;
pub mod report;
pub mod sample;
pub mod statistics;

pub use algebra::{Coherency, Covariance, ModeDecomposition, Spinor, Stokes};
pub use combination::{Coherent, Composite, Disjoint, Superposed};
pub use config::{DualSelector, ModeSetup, ModeTarget, RunConfig};
pub use error::{Result, SimpolError};
pub use mode::{Emitter, FieldTransformer};
pub use modulation::{Boxcar, Lognormal, ModulatedMode, Modulation, ModulationProbe, Square};
pub use random::RandomSource;
pub use report::Report;
pub use sample::{Sample, SingleMode, StokesSource};
pub use statistics::{
    Centering, CoherencyMoments, EngineConfig, Measurements, Observer, Predictions,
    StatisticsEngine,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
