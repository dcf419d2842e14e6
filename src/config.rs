use crate::dispersion::DispersionModel;
use crate::error::FdmtError;

pub const DEFAULT_DT_STEP: usize = 1;
pub const DEFAULT_DT_MIN: usize = 0;

/// Instrument and search parameters a plan is built for.
///
/// Frequencies are in MHz, `tsamp` in seconds and every `dt_*` value is a
/// full-band sweep in samples.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentConfig {
    pub f_min: f64,
    pub f_max: f64,
    pub nchans: usize,
    pub nsamps: usize,
    pub tsamp: f64,
    pub dt_max: usize,
    pub dt_step: usize,
    pub dt_min: usize,
}

impl InstrumentConfig {
    #[must_use]
    pub fn new(
        f_min: f64,
        f_max: f64,
        nchans: usize,
        nsamps: usize,
        tsamp: f64,
        dt_max: usize,
    ) -> Self {
        Self {
            f_min,
            f_max,
            nchans,
            nsamps,
            tsamp,
            dt_max,
            dt_step: DEFAULT_DT_STEP,
            dt_min: DEFAULT_DT_MIN,
        }
    }

    #[must_use]
    pub fn with_dt_step(mut self, dt_step: usize) -> Self {
        self.dt_step = dt_step;
        self
    }

    #[must_use]
    pub fn with_dt_min(mut self, dt_min: usize) -> Self {
        self.dt_min = dt_min;
        self
    }

    pub fn validate(&self) -> Result<(), FdmtError> {
        if !(self.f_min.is_finite() && self.f_min > 0.0) {
            return Err(FdmtError::invalid_config(format!(
                "f_min must be finite and positive, got {}",
                self.f_min
            )));
        }
        if !(self.f_max.is_finite() && self.f_max > self.f_min) {
            return Err(FdmtError::invalid_config(format!(
                "f_max ({}) must be finite and greater than f_min ({})",
                self.f_max, self.f_min
            )));
        }
        if self.nchans == 0 {
            return Err(FdmtError::invalid_config("nchans must be at least 1"));
        }
        if self.nsamps == 0 {
            return Err(FdmtError::invalid_config("nsamps must be at least 1"));
        }
        if !(self.tsamp.is_finite() && self.tsamp > 0.0) {
            return Err(FdmtError::invalid_config(format!(
                "tsamp must be finite and positive, got {}",
                self.tsamp
            )));
        }
        if self.dt_min > self.dt_max {
            return Err(FdmtError::invalid_config(format!(
                "dt_min ({}) must not exceed dt_max ({})",
                self.dt_min, self.dt_max
            )));
        }
        if self.dt_step == 0 {
            return Err(FdmtError::invalid_config("dt_step must be at least 1"));
        }
        Ok(())
    }

    /// Channel bandwidth in MHz.
    pub fn df(&self) -> f64 {
        (self.f_max - self.f_min) / self.nchans as f64
    }

    /// Half a channel: how far a merge boundary must stay from the edges of
    /// the sub-band it splits.
    pub fn correction(&self) -> f64 {
        self.df() / 2.0
    }

    /// Number of merge levels, `ceil(log2(nchans))`.
    pub fn niters(&self) -> usize {
        match self.nchans {
            0 | 1 => 0,
            n => (usize::BITS - (n - 1).leading_zeros()) as usize,
        }
    }

    /// Lower edge of channel `chan`; `chan == nchans` gives `f_max`.
    pub fn channel_edge(&self, chan: usize) -> f64 {
        if chan >= self.nchans {
            self.f_max
        } else {
            self.f_min + chan as f64 * self.df()
        }
    }

    pub fn dispersion_model(&self) -> Result<DispersionModel, FdmtError> {
        DispersionModel::new(self.f_min, self.f_max, self.tsamp, self.correction())
    }
}
