//! Run configuration and lenient argument coercion.
//!
//! Numeric options follow C `atof` / `atoi` semantics: the longest leading
//! numeric prefix is used and anything unparsable becomes 0. Only the
//! population Stokes vector is validated strictly.

use serde::Serialize;

use crate::algebra::{self, Stokes};
use crate::combination::{Coherent, Composite, Disjoint, Superposed};
use crate::error::{Result, SimpolError};
use crate::mode::{Emitter, FieldTransformer};
use crate::modulation::{Boxcar, Lognormal, ModulatedMode, Modulation, Square};
use crate::sample::Sample;
use crate::statistics::{Centering, EngineConfig};

/// Samples per unit of the `-N` option.
pub const MEGA: u64 = 1 << 20;

fn skip_whitespace(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

fn digits(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    pos
}

/// Parse the leading floating-point number of `s`.
///
/// Returns the value and the number of bytes consumed, leading whitespace
/// included, or `None` when no number starts the string.
pub fn float_prefix(s: &str) -> Option<(f64, usize)> {
    let start = skip_whitespace(s);
    let bytes = s.as_bytes();
    let mut pos = start;
    if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
        pos += 1;
    }

    let rest = &s[pos..];
    for word in ["infinity", "inf", "nan"] {
        if rest.get(..word.len()).is_some_and(|w| w.eq_ignore_ascii_case(word)) {
            let end = pos + word.len();
            let value = s[start..end].to_ascii_lowercase().parse().ok()?;
            return Some((value, end));
        }
    }

    let int_end = digits(bytes, pos);
    let mut end = int_end;
    let mut mantissa = int_end > pos;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_end = digits(bytes, end + 1);
        mantissa |= frac_end > end + 1;
        end = frac_end;
    }
    if !mantissa {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        let exp_end = digits(bytes, exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    let value = s[start..end].parse().ok()?;
    Some((value, end))
}

/// C `atof`: leading numeric prefix, otherwise 0.
pub fn atof(s: &str) -> f64 {
    float_prefix(s).map_or(0.0, |(value, _)| value)
}

/// C `atoi`: leading integer prefix, otherwise 0. Saturates at the `i32` range.
pub fn atoi(s: &str) -> i32 {
    let start = skip_whitespace(s);
    let bytes = s.as_bytes();
    let mut pos = start;
    let negative = pos < bytes.len() && bytes[pos] == b'-';
    if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
        pos += 1;
    }
    let mut value: i64 = 0;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        value = (value * 10 + i64::from(bytes[pos] - b'0')).min(i64::from(i32::MAX) + 1);
        pos += 1;
    }
    if negative {
        value = -value;
    }
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// `atoi` stored into an unsigned option; negative values wrap.
pub fn atou(s: &str) -> u32 {
    atoi(s) as u32
}

/// Parse `i,q,u,v` and check that the vector is realizable.
///
/// Each field is a leading float prefix; text after the fourth field is
/// ignored.
pub fn parse_stokes(arg: &str) -> Result<Stokes> {
    let parse_error = || SimpolError::StokesParse(arg.to_string());
    let mut values = [0.0; 4];
    let mut rest = arg;
    for (k, value) in values.iter_mut().enumerate() {
        if k > 0 {
            rest = rest.strip_prefix(',').ok_or_else(parse_error)?;
        }
        let (v, used) = float_prefix(rest).ok_or_else(parse_error)?;
        *value = v;
        rest = &rest[used..];
    }

    let stokes = Stokes::from(values);
    if !algebra::is_realizable(&stokes) {
        return Err(SimpolError::Unrealizable { stokes });
    }
    Ok(stokes)
}

/// Which mode a per-mode option applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModeTarget {
    A,
    B,
}

/// Strip an optional leading `B` that redirects an option to mode B.
pub fn split_target(arg: &str) -> (ModeTarget, &str) {
    match arg.strip_prefix('B') {
        Some(rest) => (ModeTarget::B, rest),
        None => (ModeTarget::A, arg),
    }
}

/// Per-mode configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeSetup {
    #[serde(serialize_with = "crate::report::serialize_vector")]
    pub mean: Stokes,
    /// Lognormal modulation index; 0 disables modulation.
    pub beta: f64,
    /// Boxcar width applied to the modulation.
    pub boxcar: u32,
    /// Square-pulse width applied to the modulation.
    pub square: u32,
}

impl Default for ModeSetup {
    fn default() -> Self {
        Self {
            mean: Stokes::new(1.0, 0.0, 0.0, 0.0),
            beta: 0.0,
            boxcar: 0,
            square: 0,
        }
    }
}

impl ModeSetup {
    /// Assemble the chain: emitter, then lognormal modulation when
    /// `beta != 0`, smoothed by boxcar and then square-pulse when their
    /// widths exceed 1.
    pub fn build(&self, probe: bool) -> Box<dyn FieldTransformer> {
        let emitter = Box::new(Emitter::new(self.mean));
        if self.beta == 0.0 {
            return emitter;
        }

        let mut modulation: Box<dyn Modulation> = Box::new(Lognormal::new(self.beta));
        if self.boxcar > 1 {
            modulation = Box::new(Boxcar::new(modulation, self.boxcar as usize));
        }
        if self.square > 1 {
            modulation = Box::new(Square::new(modulation, self.square as usize));
        }

        let mode = ModulatedMode::new(emitter, modulation);
        if probe {
            Box::new(mode.with_probe())
        } else {
            Box::new(mode)
        }
    }
}

/// How two modes are combined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DualSelector {
    Superposed,
    /// Fraction of instances drawn from mode A.
    Composite(f64),
    /// Fraction of samples drawn from mode A.
    Disjoint(f64),
    /// Correlation coefficient between the two fields.
    Coherent(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub nsamp: u64,
    pub sample_size: u32,
    pub nlag: usize,
    pub a: ModeSetup,
    pub b: ModeSetup,
    pub dual: Option<DualSelector>,
    /// Skip the simulation and report predictions only.
    pub theory_only: bool,
    /// Report only the measured means and variances.
    pub means_only: bool,
    /// Centre the measured covariance on the predicted mean.
    pub population_centering: bool,
    /// Accumulate coherency moments and decompose the covariance operator.
    pub coherency: bool,
    pub seed: Option<u64>,
    /// Attach modulation probes.
    pub probe: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            nsamp: MEGA,
            sample_size: 1,
            nlag: 0,
            a: ModeSetup::default(),
            b: ModeSetup::default(),
            dual: None,
            theory_only: false,
            means_only: false,
            population_centering: false,
            coherency: false,
            seed: None,
            probe: false,
        }
    }
}

impl RunConfig {
    /// Multiply `nsamp` by `factor`, truncating. Negative factors give 0.
    pub fn scale_nsamp(&mut self, factor: f64) {
        self.nsamp = (self.nsamp as f64 * factor) as u64;
    }

    pub fn setup(&self, target: ModeTarget) -> &ModeSetup {
        match target {
            ModeTarget::A => &self.a,
            ModeTarget::B => &self.b,
        }
    }

    pub fn setup_mut(&mut self, target: ModeTarget) -> &mut ModeSetup {
        match target {
            ModeTarget::A => &mut self.a,
            ModeTarget::B => &mut self.b,
        }
    }

    /// Build the configured sample. Mode B is only used by dual selectors.
    pub fn build_sample(&self) -> Sample {
        let a = self.a.build(self.probe);
        let Some(dual) = self.dual else {
            return Sample::single(a, self.sample_size);
        };

        let b = self.b.build(self.probe);
        let source: Box<dyn crate::sample::StokesSource> = match dual {
            DualSelector::Superposed => Box::new(Superposed::new(a, b)),
            DualSelector::Composite(fraction) => Box::new(Composite::new(a, b, fraction)),
            DualSelector::Disjoint(fraction) => Box::new(Disjoint::new(a, b, fraction)),
            DualSelector::Coherent(coefficient) => Box::new(Coherent::new(a, b, coefficient)),
        };
        Sample::new(source, self.sample_size)
    }

    /// Engine settings for `sample`.
    pub fn engine_config(&self, sample: &Sample) -> EngineConfig {
        EngineConfig {
            nsamp: self.nsamp,
            nlag: self.nlag,
            coherency: self.coherency,
            centering: if self.population_centering {
                Centering::Population(sample.mean())
            } else {
                Centering::SampleMean
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atof_prefix_semantics() {
        assert_eq!(atof("2.5"), 2.5);
        assert_eq!(atof("  -1e-2xyz"), -0.01);
        assert_eq!(atof(".5"), 0.5);
        assert_eq!(atof("3."), 3.0);
        assert_eq!(atof("1e"), 1.0);
        assert_eq!(atof("abc"), 0.0);
        assert_eq!(atof(""), 0.0);
        assert_eq!(atof("-"), 0.0);
        assert!(atof("inf").is_infinite());
    }

    #[test]
    fn test_atoi_prefix_semantics() {
        assert_eq!(atoi("42"), 42);
        assert_eq!(atoi(" +7abc"), 7);
        assert_eq!(atoi("3.9"), 3);
        assert_eq!(atoi("x1"), 0);
        assert_eq!(atoi("-5"), -5);
        assert_eq!(atoi("99999999999"), i32::MAX);
        assert_eq!(atou("-1"), u32::MAX);
    }

    #[test]
    fn test_parse_stokes_valid() {
        let s = parse_stokes("1,0.5,0,-0.5").unwrap();
        assert_eq!(s, Stokes::new(1.0, 0.5, 0.0, -0.5));
        // sscanf-style: whitespace before each number, trailing text ignored.
        let s = parse_stokes("2, 1, 1, 1 extra").unwrap();
        assert_eq!(s, Stokes::new(2.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn test_parse_stokes_malformed() {
        for arg in ["1,0,0", "a,b,c,d", "1;0;0;0", "", "1,0,,0"] {
            match parse_stokes(arg) {
                Err(SimpolError::StokesParse(text)) => assert_eq!(text, arg),
                other => panic!("{arg}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_stokes_unrealizable() {
        let err = parse_stokes("1,1,1,0").unwrap_err();
        assert!(matches!(err, SimpolError::Unrealizable { .. }));
        assert!(err.to_string().starts_with("Invalid Stokes parameters (p>I)"));
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("B0.5"), (ModeTarget::B, "0.5"));
        assert_eq!(split_target("0.5"), (ModeTarget::A, "0.5"));
        assert_eq!(split_target("B"), (ModeTarget::B, ""));
    }

    #[test]
    fn test_scale_nsamp() {
        let mut config = RunConfig::default();
        config.scale_nsamp(0.5);
        assert_eq!(config.nsamp, MEGA / 2);
        config.scale_nsamp(3.0);
        assert_eq!(config.nsamp, 3 * MEGA / 2);
        config.scale_nsamp(-2.0);
        assert_eq!(config.nsamp, 0);
    }

    #[test]
    fn test_mode_setup_unmodulated_by_default() {
        let setup = ModeSetup {
            boxcar: 5,
            square: 3,
            ..ModeSetup::default()
        };
        // Without beta the smoothing widths have nothing to act on.
        let chain = setup.build(false);
        assert_eq!(chain.covariance(), algebra::gaussian_covariance(&setup.mean));
        assert_eq!(chain.crosscovariance(1), crate::algebra::Covariance::zeros());
    }

    #[test]
    fn test_mode_setup_boxcar_memory() {
        let setup = ModeSetup {
            beta: 0.5,
            boxcar: 4,
            ..ModeSetup::default()
        };
        let chain = setup.build(true);
        assert!(chain.crosscovariance(3)[(0, 0)] > 0.0);
        assert_eq!(chain.crosscovariance(4), crate::algebra::Covariance::zeros());
    }

    #[test]
    fn test_build_sample_dual_uses_both_modes() {
        let mut config = RunConfig {
            dual: Some(DualSelector::Superposed),
            sample_size: 4,
            ..RunConfig::default()
        };
        config.setup_mut(ModeTarget::B).mean = Stokes::new(2.0, 1.0, 0.0, 0.0);
        let sample = config.build_sample();
        assert_eq!(sample.mean(), Stokes::new(3.0, 1.0, 0.0, 0.0));
        assert_eq!(sample.sample_size(), 4);

        config.dual = None;
        assert_eq!(config.build_sample().mean(), Stokes::new(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_engine_config_centering() {
        let config = RunConfig {
            population_centering: true,
            nlag: 3,
            ..RunConfig::default()
        };
        let sample = config.build_sample();
        let engine = config.engine_config(&sample);
        assert_eq!(engine.nlag, 3);
        assert_eq!(engine.centering, Centering::Population(sample.mean()));
        assert_eq!(
            RunConfig::default().engine_config(&sample).centering,
            Centering::SampleMean
        );
    }
}
