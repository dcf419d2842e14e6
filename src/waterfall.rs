use crate::config::InstrumentConfig;
use crate::dispersion::cff;
use crate::error::FdmtError;

/// Borrowed time-frequency intensity array, C order `[nchans][nsamps]`,
/// channel 0 at `f_min`.
#[derive(Debug, Clone, Copy)]
pub struct Waterfall<'a> {
    data: &'a [f32],
    nchans: usize,
    nsamps: usize,
}

impl<'a> Waterfall<'a> {
    pub fn new(data: &'a [f32], nchans: usize, nsamps: usize) -> Result<Self, FdmtError> {
        let expected = nchans.checked_mul(nsamps).ok_or_else(|| {
            FdmtError::shape_mismatch("waterfall", [nchans, nsamps], [data.len()])
        })?;
        if data.len() != expected {
            return Err(FdmtError::shape_mismatch(
                "waterfall",
                [expected],
                [data.len()],
            ));
        }
        Ok(Self {
            data,
            nchans,
            nsamps,
        })
    }

    pub fn nchans(&self) -> usize {
        self.nchans
    }

    pub fn nsamps(&self) -> usize {
        self.nsamps
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.nchans, self.nsamps]
    }

    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    pub fn channel(&self, chan: usize) -> &'a [f32] {
        &self.data[chan * self.nsamps..(chan + 1) * self.nsamps]
    }
}

/// Transform output, C order `[ndt][nsamps]`; row `i` belongs to the
/// `i`-th entry of the final delay grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Dmt {
    data: Vec<f32>,
    ndt: usize,
    nsamps: usize,
}

impl Dmt {
    pub(crate) fn from_parts(data: Vec<f32>, ndt: usize, nsamps: usize) -> Self {
        debug_assert_eq!(data.len(), ndt * nsamps);
        Self { data, ndt, nsamps }
    }

    pub fn ndt(&self) -> usize {
        self.ndt
    }

    pub fn nsamps(&self) -> usize {
        self.nsamps
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.ndt, self.nsamps]
    }

    pub fn row(&self, idt: usize) -> &[f32] {
        &self.data[idt * self.nsamps..(idt + 1) * self.nsamps]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.nsamps)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Synthesise a waterfall holding one dispersed pulse.
///
/// The pulse sweeps `dt` samples across the band and reaches `f_min` at
/// sample `t0`; higher channels see it earlier. Each channel receives
/// `amplitude`, spread evenly over the samples its sweep crosses.
pub fn simulate_dispersed_pulse(
    config: &InstrumentConfig,
    dt: usize,
    t0: usize,
    amplitude: f32,
) -> Result<Vec<f32>, FdmtError> {
    config.validate()?;
    let nsamps = config.nsamps;
    let mut data = vec![0.0f32; config.nchans * nsamps];
    let delay_at = |freq: f64| -> f64 {
        dt as f64 * cff(config.f_min, freq, config.f_min, config.f_max)
    };

    for (chan, series) in data.chunks_exact_mut(nsamps).enumerate() {
        let late = delay_at(config.channel_edge(chan)).round() as usize;
        let early = delay_at(config.channel_edge(chan + 1)).round() as usize;
        let first = t0.checked_sub(early);
        let last = t0.checked_sub(late);
        let (Some(first), Some(last)) = (first, last) else {
            continue;
        };
        let weight = amplitude / (last - first + 1) as f32;
        for sample in series.iter_mut().take(last + 1).skip(first) {
            *sample += weight;
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::{simulate_dispersed_pulse, Dmt, Waterfall};
    use crate::config::InstrumentConfig;
    use crate::error::FdmtError;

    #[test]
    fn waterfall_rejects_wrong_length() {
        let data = vec![0.0f32; 10];
        assert!(matches!(
            Waterfall::new(&data, 2, 6),
            Err(FdmtError::ShapeMismatch { .. })
        ));
        let view = Waterfall::new(&data, 2, 5).unwrap();
        assert_eq!(view.shape(), [2, 5]);
        assert_eq!(view.channel(1).len(), 5);
    }

    #[test]
    fn dmt_rows_follow_the_grid() {
        let dmt = Dmt::from_parts((0..6).map(|v| v as f32).collect(), 2, 3);
        assert_eq!(dmt.shape(), [2, 3]);
        assert_eq!(dmt.row(1), &[3.0, 4.0, 5.0]);
        assert_eq!(dmt.rows().count(), 2);
    }

    #[test]
    fn simulated_pulse_carries_amplitude_per_channel() {
        let config = InstrumentConfig::new(1000.0, 1500.0, 8, 64, 1e-3, 32);
        let data = simulate_dispersed_pulse(&config, 24, 40, 2.0).unwrap();
        for series in data.chunks_exact(64) {
            let total: f32 = series.iter().sum();
            assert!((total - 2.0).abs() < 1e-5);
        }
        // Lowest channel ends exactly at t0, highest starts a full sweep earlier.
        assert!(data[40] > 0.0);
        assert_eq!(data[41], 0.0);
        assert!(data[7 * 64 + 16] > 0.0);
        assert_eq!(data[7 * 64 + 15], 0.0);
    }

    #[test]
    fn undispersed_pulse_is_a_single_column() {
        let config = InstrumentConfig::new(1000.0, 1500.0, 4, 16, 1e-3, 8);
        let data = simulate_dispersed_pulse(&config, 0, 5, 1.0).unwrap();
        for series in data.chunks_exact(16) {
            assert_eq!(series[5], 1.0);
            assert_eq!(series.iter().sum::<f32>(), 1.0);
        }
    }
}
