use std::path::PathBuf;

use clap::Parser;
use fdmt::{InstrumentConfig, LogLevel};

use crate::ifile::IFileData;
use crate::DynError;

pub const DEFAULT_AMPLITUDE: f32 = 1.0;
pub const DEFAULT_REPEAT: usize = 1;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Fast dispersion-measure transform of a filterbank waterfall",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  fdmt --ifile lband.ifile --input obs.f32 --output obs.dmt --plot plots/obs\n  fdmt --fmin 1000 --fmax 1500 --nchans 8 --nsamps 64 --tsamp 1e-3 --dtmax 32 --simulate-dt 24 --simulate-t0 40 --plot sim\n  fdmt --ifile lband.ifile --simulate-dt 300 --repeat 10 --cpu 8 --log-level debug\n"
)]
pub struct Args {
    /// Instrument file with key=value parameters (overridden by explicit flags)
    #[arg(long)]
    pub ifile: Option<PathBuf>,

    /// Lowest frequency of the band in MHz
    #[arg(long = "fmin", visible_alias = "f-min")]
    pub f_min: Option<f64>,

    /// Highest frequency of the band in MHz
    #[arg(long = "fmax", visible_alias = "f-max")]
    pub f_max: Option<f64>,

    /// Number of frequency channels
    #[arg(long)]
    pub nchans: Option<usize>,

    /// Number of time samples (inferred from --input when omitted)
    #[arg(long)]
    pub nsamps: Option<usize>,

    /// Sampling interval in seconds
    #[arg(long)]
    pub tsamp: Option<f64>,

    /// Largest full-band sweep to search, in samples
    #[arg(long = "dtmax", visible_alias = "dt-max")]
    pub dt_max: Option<usize>,

    /// Spacing of the final trial grid, in samples
    #[arg(long = "dtstep", visible_alias = "dt-step")]
    pub dt_step: Option<usize>,

    /// Smallest full-band sweep to search, in samples
    #[arg(long = "dtmin", visible_alias = "dt-min")]
    pub dt_min: Option<usize>,

    /// Raw little-endian f32 waterfall, C order [nchans][nsamps], channel 0 at fmin
    #[arg(long, conflicts_with = "simulate_dt")]
    pub input: Option<PathBuf>,

    /// Synthesise a dispersed pulse sweeping this many samples instead of reading --input
    #[arg(long = "simulate-dt", visible_alias = "sim")]
    pub simulate_dt: Option<usize>,

    /// Arrival sample of the synthetic pulse at fmin (default: nsamps / 2)
    #[arg(long = "simulate-t0")]
    pub simulate_t0: Option<usize>,

    /// Total per-channel fluence of the synthetic pulse
    #[arg(long, default_value_t = DEFAULT_AMPLITUDE, allow_hyphen_values = true)]
    pub amplitude: f32,

    /// Number of times to run the transform (timing runs)
    #[arg(long, default_value_t = DEFAULT_REPEAT)]
    pub repeat: usize,

    /// Write the transform as raw little-endian f32, C order [ndt][nsamps]
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Stem for PNG plots (<stem>_dmt.png and <stem>_peak.png)
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Number of worker threads (0 = one per core)
    #[arg(long, default_value_t = 0)]
    pub cpu: usize,

    /// Logging verbosity
    #[arg(
        long = "log-level",
        visible_alias = "log",
        default_value = "info",
        value_parser = clap::builder::PossibleValuesParser::new(["off", "error", "warn", "info", "debug", "trace"])
    )]
    pub log_level: String,
}

impl Args {
    pub fn log_level(&self) -> Result<LogLevel, DynError> {
        Ok(self.log_level.parse::<LogLevel>()?)
    }
}

fn pick<T: Copy>(flag: Option<T>, file: Option<T>, name: &str) -> Result<T, DynError> {
    flag.or(file)
        .ok_or_else(|| format!("--{name} is required (flag or instrument file)").into())
}

/// Merge flags over instrument-file values. `inferred_nsamps` is used when
/// neither source names the sample count.
pub fn resolve_config(
    args: &Args,
    ifile: Option<&IFileData>,
    inferred_nsamps: Option<usize>,
) -> Result<InstrumentConfig, DynError> {
    let from_file = |get: fn(&IFileData) -> Option<f64>| ifile.and_then(get);
    let from_file_usize = |get: fn(&IFileData) -> Option<usize>| ifile.and_then(get);

    let f_min = pick(args.f_min, from_file(|d| d.f_min_mhz), "fmin")?;
    let f_max = pick(args.f_max, from_file(|d| d.f_max_mhz), "fmax")?;
    let nchans = pick(args.nchans, from_file_usize(|d| d.nchans), "nchans")?;
    let nsamps = pick(
        args.nsamps.or(inferred_nsamps),
        from_file_usize(|d| d.nsamps),
        "nsamps",
    )?;
    let tsamp = pick(args.tsamp, from_file(|d| d.tsamp_s), "tsamp")?;
    let dt_max = pick(args.dt_max, from_file_usize(|d| d.dt_max), "dtmax")?;

    let mut config = InstrumentConfig::new(f_min, f_max, nchans, nsamps, tsamp, dt_max);
    if let Some(dt_step) = args.dt_step.or(from_file_usize(|d| d.dt_step)) {
        config = config.with_dt_step(dt_step);
    }
    if let Some(dt_min) = args.dt_min.or(from_file_usize(|d| d.dt_min)) {
        config = config.with_dt_min(dt_min);
    }
    config.validate()?;
    Ok(config)
}
