use crate::error::FdmtError;

/// Dispersion constant in s MHz^2 pc^-1 cm^3.
pub const K_DM: f64 = 4.148808e3;

// --- Cold-plasma dispersion ---
// A pulse of dispersion measure DM arrives at frequency f (MHz) delayed by
//   t(f) = K_DM * DM / f^2
// The sweep across a band [f_bot, f_top] is therefore proportional to
//   1/f_bot^2 - 1/f_top^2
// Every trial delay in this crate is the sweep across the full band in
// samples; sub-band sweeps are obtained by scaling with `cff`.
// ----------------------------------

fn check_band(f_top: f64, f_bot: f64) -> Result<(), FdmtError> {
    let physical = f_top.is_finite() && f_bot.is_finite() && f_bot > 0.0 && f_top > f_bot;
    if physical {
        Ok(())
    } else {
        Err(FdmtError::InvalidFrequencyRange { f_top, f_bot })
    }
}

/// Ratio of the inverse-square sweep of band 1 to that of band 2.
#[inline]
pub fn cff(f1_start: f64, f1_end: f64, f2_start: f64, f2_end: f64) -> f64 {
    (f1_start.powi(-2) - f1_end.powi(-2)) / (f2_start.powi(-2) - f2_end.powi(-2))
}

#[inline]
fn scale_round(dt: usize, ratio: f64) -> usize {
    (dt as f64 * ratio).round().max(0.0) as usize
}

/// How a merged sub-band's trial delay distributes over its two halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelaySplit {
    pub head: usize,
    pub offset: usize,
    pub tail: usize,
}

/// Inverse-square dispersion law bound to one instrument band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispersionModel {
    f_min: f64,
    f_max: f64,
    tsamp: f64,
    correction: f64,
}

impl DispersionModel {
    pub fn new(f_min: f64, f_max: f64, tsamp: f64, correction: f64) -> Result<Self, FdmtError> {
        check_band(f_max, f_min)?;
        if !(tsamp.is_finite() && tsamp > 0.0) {
            return Err(FdmtError::invalid_config(format!(
                "tsamp must be finite and positive, got {tsamp}"
            )));
        }
        if !(correction.is_finite() && correction >= 0.0) {
            return Err(FdmtError::invalid_config(format!(
                "correction must be finite and non-negative, got {correction}"
            )));
        }
        Ok(Self {
            f_min,
            f_max,
            tsamp,
            correction,
        })
    }

    pub fn correction(&self) -> f64 {
        self.correction
    }

    /// Samples swept between `f_bot` and `f_top` by a signal that sweeps
    /// `dt_trial` samples across the full band. Rounds to nearest.
    ///
    /// Takes no correction term: delays are measured edge to edge, and the
    /// channel-width correction only bounds where a split may fall.
    pub fn delay_samples(
        &self,
        f_top: f64,
        f_bot: f64,
        dt_trial: usize,
    ) -> Result<usize, FdmtError> {
        check_band(f_top, f_bot)?;
        Ok(scale_round(dt_trial, cff(f_bot, f_top, self.f_min, self.f_max)))
    }

    pub fn max_trial_for_bandwidth(
        &self,
        f_top: f64,
        f_bot: f64,
        dt_max: usize,
    ) -> Result<usize, FdmtError> {
        check_band(f_top, f_bot)?;
        let ratio = cff(f_bot, f_top, self.f_min, self.f_max);
        Ok((dt_max as f64 * ratio).ceil().max(0.0) as usize)
    }

    /// Split the sweep `dt` of `[f_bot, f_top]` at the boundary `f_mid`.
    ///
    /// Both halves are measured at `f_mid` itself, so the lower half ends
    /// on the lag where the upper half starts and no lag is skipped. The
    /// boundary must lie at least `correction` inside the band.
    pub fn split_delay(
        &self,
        f_bot: f64,
        f_mid: f64,
        f_top: f64,
        dt: usize,
    ) -> Result<DelaySplit, FdmtError> {
        check_band(f_top, f_bot)?;
        check_band(f_mid - self.correction, f_bot)?;
        check_band(f_top, f_mid + self.correction)?;

        let head = scale_round(dt, cff(f_bot, f_mid, f_bot, f_top)).min(dt);
        Ok(DelaySplit {
            head,
            offset: head,
            tail: dt - head,
        })
    }

    // pc cm^-3
    pub fn dm_from_dt(&self, dt: usize) -> f64 {
        let sweep = self.f_min.powi(-2) - self.f_max.powi(-2);
        dt as f64 * self.tsamp / (K_DM * sweep)
    }
}
