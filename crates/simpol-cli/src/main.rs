//! CLI for simpol: simulate polarized noise and compute statistics.

mod run;

use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use simpol_core::config::{self, ModeTarget};
use simpol_core::{DualSelector, RunConfig};

/// Per-mode options accept a leading `B` to address mode B (e.g. `-l B0.5`).
#[derive(Parser)]
#[command(name = "simpol")]
#[command(about = "simpol: simulate polarized noise and compute statistics")]
#[command(version = simpol_core::VERSION)]
#[command(group(ArgGroup::new("dual").args(["superposed", "composite", "disjoint", "coherent"])))]
struct Cli {
    /// Population mean Stokes parameters [default: 1,0,0,0]
    #[arg(short = 's', value_name = "I,Q,U,V", allow_hyphen_values = true)]
    stokes: Vec<String>,

    /// Number of Mega (2^20) Stokes samples; repeats multiply [default: 1]
    #[arg(short = 'N', value_name = "MSAMP", allow_hyphen_values = true)]
    mega_samples: Vec<String>,

    /// Number of instances in each Stokes sample [default: 1]
    #[arg(short = 'n', value_name = "NINT", allow_hyphen_values = true)]
    sample_size: Vec<String>,

    /// Modulation index of log-normal amplitude modulation
    #[arg(short = 'l', value_name = "BETA", allow_hyphen_values = true)]
    beta: Vec<String>,

    /// Box-car smooth the amplitude modulation function over NSAMP samples
    #[arg(short = 'b', value_name = "NSAMP", allow_hyphen_values = true)]
    boxcar: Vec<String>,

    /// Use a rectangular impulse amplitude modulation function NSAMP wide
    #[arg(short = 'r', value_name = "NSAMP", allow_hyphen_values = true)]
    square: Vec<String>,

    /// Compute cross-covariance matrices up to NLAG-1
    #[arg(short = 'X', value_name = "NLAG", allow_hyphen_values = true)]
    nlag: Vec<String>,

    /// Superposed modes
    #[arg(short = 'S')]
    superposed: bool,

    /// Composite modes with fraction of instances in mode A
    #[arg(short = 'C', value_name = "F_A", allow_hyphen_values = true)]
    composite: Option<String>,

    /// Disjoint modes with fraction of samples in mode A
    #[arg(short = 'D', value_name = "F_A", allow_hyphen_values = true)]
    disjoint: Option<String>,

    /// Coherent superposition of modes with correlation coefficient COV
    #[arg(short = 'c', value_name = "COV", allow_hyphen_values = true)]
    coherent: Option<String>,

    /// Report only theoretical predictions
    #[arg(short = 't')]
    theory_only: bool,

    /// Report the means and variances of the Stokes parameters
    #[arg(short = 'd')]
    means_only: bool,

    /// Centre the covariance on the population mean instead of the sample mean
    #[arg(short = 'o')]
    population: bool,

    /// Coherency matrix statistics and principal mode decomposition
    #[arg(short = 'R')]
    coherency: bool,

    /// Random seed (drawn from the OS when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Record the modulation factors actually drawn (reported at debug level)
    #[arg(long)]
    probe: bool,

    /// Run the statistical check battery on the measured moments
    #[arg(long)]
    checks: bool,

    /// Write a machine-readable report as JSON
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Directory for acf.txt and acf_plot.txt
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Debug-level logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn run_config(&self) -> simpol_core::Result<RunConfig> {
        let mut config = RunConfig {
            theory_only: self.theory_only,
            means_only: self.means_only,
            population_centering: self.population,
            coherency: self.coherency,
            seed: self.seed,
            probe: self.probe,
            ..RunConfig::default()
        };

        for arg in &self.mega_samples {
            config.scale_nsamp(config::atof(arg));
        }
        if let Some(arg) = self.sample_size.last() {
            config.sample_size = config::atou(arg);
        }
        if let Some(arg) = self.nlag.last() {
            config.nlag = config::atou(arg) as usize;
        }

        for arg in &self.stokes {
            let (target, value) = config::split_target(arg);
            config.setup_mut(target).mean = config::parse_stokes(value)?;
        }
        for arg in &self.beta {
            let (target, value) = config::split_target(arg);
            config.setup_mut(target).beta = config::atof(value);
        }
        for arg in &self.boxcar {
            let (target, value) = config::split_target(arg);
            config.setup_mut(target).boxcar = config::atou(value);
        }
        for arg in &self.square {
            let (target, value) = config::split_target(arg);
            config.setup_mut(target).square = config::atou(value);
        }

        config.dual = if self.superposed {
            Some(DualSelector::Superposed)
        } else if let Some(arg) = &self.composite {
            Some(DualSelector::Composite(config::atof(arg)))
        } else if let Some(arg) = &self.disjoint {
            Some(DualSelector::Disjoint(config::atof(arg)))
        } else {
            self.coherent
                .as_deref()
                .map(|arg| DualSelector::Coherent(config::atof(arg)))
        };

        if config.dual.is_none() && *config.setup(ModeTarget::B) != Default::default() {
            log::warn!("mode B options ignored without a dual-mode selector (-S, -C, -D, -c)");
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match cli.run_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let options = run::RunOptions {
        checks: cli.checks,
        json: cli.json,
        output_dir: cli.output_dir,
    };
    if let Err(e) = run::run(&config, &options) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
