#![allow(dead_code)]

use fdmt::{cff, FdmtPlan, InstrumentConfig};

/// Largest magnitude `integer_waterfall` produces.
pub const MAX_SAMPLE: f32 = 4.0;

/// Deterministic small-integer waterfall; f32 sums of such values are
/// exact, so any summation order gives the same bits.
pub fn integer_waterfall(nchans: usize, nsamps: usize, seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..nchans * nsamps)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) % 9) as f32 - MAX_SAMPLE
        })
        .collect()
}

fn shift_and_sum_row(spans: &[(usize, usize)], data: &[f32], nsamps: usize, row: &mut [f32]) {
    for (t, value) in row.iter_mut().enumerate() {
        for (chan, &(first, last)) in spans.iter().enumerate() {
            for lag in first..=last.min(t) {
                *value += data[chan * nsamps + t - lag];
            }
        }
    }
}

/// Trial sweeps searched for `config`, straight from its parameters.
pub fn search_grid(config: &InstrumentConfig) -> Vec<usize> {
    (config.dt_min..=config.dt_max).step_by(config.dt_step).collect()
}

/// First and last lag of every channel for a full-band sweep of `dt`
/// samples, each rounded from the dispersion law at the channel edges.
pub fn law_spans(config: &InstrumentConfig, dt: usize) -> Vec<(usize, usize)> {
    let lag_at = |edge: usize| {
        let f = config.channel_edge(edge);
        (dt as f64 * cff(config.f_min, f, config.f_min, config.f_max)).round() as usize
    };
    (0..config.nchans)
        .map(|chan| (lag_at(chan), lag_at(chan + 1)))
        .collect()
}

/// Direct dedispersion: every channel shifted and summed over its law span,
/// one trial at a time. Knows nothing about the merge tree.
pub fn law_shift_and_sum(config: &InstrumentConfig, data: &[f32]) -> Vec<f32> {
    let nsamps = config.nsamps;
    let grid = search_grid(config);
    let mut out = vec![0.0f32; grid.len() * nsamps];
    for (&dt, row) in grid.iter().zip(out.chunks_exact_mut(nsamps)) {
        shift_and_sum_row(&law_spans(config, dt), data, nsamps, row);
    }
    out
}

/// Per-cell bound on `|fdmt - law_shift_and_sum|` for `integer_waterfall`
/// input. Nested rounding moves each span edge by at most
/// `ceil(niters / 2)` lags, and every lag gained or lost changes a cell by
/// at most `MAX_SAMPLE`.
pub fn law_tolerance(config: &InstrumentConfig) -> f32 {
    let edge_shift = config.niters().div_ceil(2);
    (2 * edge_shift * config.nchans) as f32 * MAX_SAMPLE
}

/// Shift-and-sum over the spans the plan assigns to every channel.
pub fn footprint_shift_and_sum(plan: &FdmtPlan, data: &[f32]) -> Vec<f32> {
    let nsamps = plan.nsamps();
    let ndt = plan.dt_grid_final().len();
    let mut out = vec![0.0f32; ndt * nsamps];
    for (idt, row) in out.chunks_exact_mut(nsamps).enumerate() {
        let spans: Vec<(usize, usize)> = plan
            .channel_footprint(idt)
            .expect("final trial index in range")
            .iter()
            .map(|span| (span.offset, span.offset + span.width))
            .collect();
        shift_and_sum_row(&spans, data, nsamps, row);
    }
    out
}
