//! Process-wide knobs: worker-thread count and log verbosity.
//!
//! Both settings are read when an execution starts, so a change applies to
//! subsequent executions only.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::Level;
use tracing_subscriber::{filter, fmt as tracing_fmt, prelude::*};

use crate::error::FdmtError;

static NUM_THREADS: AtomicUsize = AtomicUsize::new(0);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static POOL: OnceLock<Mutex<Option<(usize, Arc<ThreadPool>)>>> = OnceLock::new();

/// Verbosity levels, most quiet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    #[default]
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Off,
            1 => Self::Error,
            2 => Self::Warn,
            3 => Self::Info,
            4 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Whether an event at `level` passes this verbosity.
    pub fn allows(self, level: &Level) -> bool {
        let needed = match *level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warn,
            Level::INFO => Self::Info,
            Level::DEBUG => Self::Debug,
            _ => Self::Trace,
        };
        self != Self::Off && needed <= self
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "quiet" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Install a stderr `tracing` subscriber gated by [`log_level`].
///
/// Returns `false` when another global subscriber is already installed;
/// the existing one is left untouched.
pub fn init_logging() -> bool {
    let gate = filter::filter_fn(|metadata| log_level().allows(metadata.level()));
    tracing_subscriber::registry()
        .with(
            tracing_fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(gate),
        )
        .try_init()
        .is_ok()
}

/// Set the worker count for subsequent executions; `0` uses rayon's
/// default (one worker per available core).
pub fn set_num_threads(nthreads: usize) {
    NUM_THREADS.store(nthreads, Ordering::Relaxed);
}

pub fn num_threads() -> usize {
    NUM_THREADS.load(Ordering::Relaxed)
}

fn pool_for(nthreads: usize) -> Result<Arc<ThreadPool>, FdmtError> {
    let slot = POOL.get_or_init(|| Mutex::new(None));
    let mut cached = slot
        .lock()
        .map_err(|_| FdmtError::ThreadPool("thread pool cache poisoned".into()))?;
    if let Some((size, pool)) = cached.as_ref() {
        if *size == nthreads {
            return Ok(Arc::clone(pool));
        }
    }
    let pool = Arc::new(
        ThreadPoolBuilder::new()
            .num_threads(nthreads)
            .thread_name(|idx| format!("fdmt-worker-{idx}"))
            .build()?,
    );
    tracing::debug!(nthreads, "built fdmt worker pool");
    *cached = Some((nthreads, Arc::clone(&pool)));
    Ok(pool)
}

/// Run `op` on the pool selected by [`set_num_threads`].
pub(crate) fn install<R, F>(op: F) -> Result<R, FdmtError>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match num_threads() {
        0 => Ok(op()),
        nthreads => Ok(pool_for(nthreads)?.install(op)),
    }
}
