//! Fast Dispersion-Measure Transform.
//!
//! Incoherent dedispersion of a time-frequency waterfall over a grid of
//! trial sweeps, built by recursively merging adjacent sub-bands instead of
//! shifting and summing every channel for every trial.
//!
//! ```no_run
//! use fdmt::{Fdmt, InstrumentConfig, Waterfall};
//!
//! # fn main() -> Result<(), fdmt::FdmtError> {
//! let config = InstrumentConfig::new(1000.0, 1500.0, 8, 64, 1e-3, 32);
//! let fdmt = Fdmt::new(config)?;
//! let data = vec![0.0f32; 8 * 64];
//! let dmt = fdmt.execute(&Waterfall::new(&data, 8, 64)?)?;
//! assert_eq!(dmt.shape(), [33, 64]);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod controls;
pub mod dispersion;
pub mod engine;
pub mod error;
pub mod kernels;
pub mod plan;
pub mod waterfall;

pub use config::InstrumentConfig;
pub use controls::{init_logging, set_log_level, set_num_threads, LogLevel};
pub use dispersion::{cff, DelaySplit, DispersionModel, K_DM};
pub use engine::Fdmt;
pub use error::FdmtError;
pub use plan::{ChannelSpan, CoordMapping, FdmtPlan, StateShape};
pub use waterfall::{simulate_dispersed_pulse, Dmt, Waterfall};
