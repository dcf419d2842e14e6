//! The recursive transform against direct shift-and-sum dedispersion.
//!
//! Two references: the dispersion law evaluated at every channel edge,
//! which knows nothing about the merge tree, and the channel spans the
//! plan reports, which the engine must follow to the bit.

mod common;

use common::{
    footprint_shift_and_sum, integer_waterfall, law_shift_and_sum, law_spans, law_tolerance,
    search_grid,
};
use fdmt::{Fdmt, InstrumentConfig, Waterfall};

fn transform(config: &InstrumentConfig, data: &[f32]) -> (Fdmt, Vec<f32>) {
    let fdmt = Fdmt::new(config.clone()).expect("valid configuration");
    let dmt = fdmt
        .execute(&Waterfall::new(data, config.nchans, config.nsamps).unwrap())
        .unwrap()
        .into_vec();
    (fdmt, dmt)
}

fn assert_matches_reference(config: InstrumentConfig, seed: u64) {
    let (nchans, nsamps) = (config.nchans, config.nsamps);
    let data = integer_waterfall(nchans, nsamps, seed);
    let (fdmt, dmt) = transform(&config, &data);
    assert_eq!(fdmt.dt_grid_final(), search_grid(&config).as_slice());

    let footprint = footprint_shift_and_sum(fdmt.plan(), &data);
    let law = law_shift_and_sum(&config, &data);
    let tolerance = law_tolerance(&config);
    let rows = dmt.chunks_exact(nsamps).zip(footprint.chunks_exact(nsamps));
    for (idt, ((got, spans), want)) in rows.zip(law.chunks_exact(nsamps)).enumerate() {
        let dt = fdmt.dt_grid_final()[idt];
        assert_eq!(got, spans, "trial {idt} (dt = {dt}) leaves its plan spans");
        for (t, (a, b)) in got.iter().zip(want).enumerate() {
            assert!(
                (a - b).abs() <= tolerance,
                "dt = {dt}, t = {t}: fdmt {a} vs law {b}"
            );
        }
    }
}

#[test]
fn four_channels_match_the_dispersion_law() {
    let config = InstrumentConfig::new(1000.0, 1500.0, 4, 16, 1e-3, 8);
    assert_matches_reference(config.clone(), 1);

    // Where nested rounding lands on the directly rounded edges, the rows
    // are identical.
    let data = integer_waterfall(4, 16, 11);
    let (_, dmt) = transform(&config, &data);
    let law = law_shift_and_sum(&config, &data);
    for dt in [0usize, 2, 3, 5, 6, 7, 8] {
        let row = dt * 16..(dt + 1) * 16;
        assert_eq!(dmt[row.clone()], law[row], "dt = {dt}");
    }
}

#[test]
fn every_lag_of_the_sweep_is_summed_once_per_channel() {
    // A flat unit waterfall: each channel adds one per lag it covers, and
    // neighbouring channels share their boundary lag.
    let config = InstrumentConfig::new(1200.0, 1600.0, 16, 600, 1e-3, 512).with_dt_step(37);
    let data = vec![1.0f32; 16 * 600];
    let (fdmt, dmt) = transform(&config, &data);
    for (idt, &dt) in fdmt.dt_grid_final().iter().enumerate() {
        let steady = dmt[idt * 600 + 599];
        assert_eq!(steady, (dt + 16) as f32, "dt = {dt}");
    }
}

#[test]
fn power_of_two_band_matches_the_dispersion_law() {
    assert_matches_reference(InstrumentConfig::new(400.0, 800.0, 16, 96, 1e-3, 60), 2);
}

#[test]
fn carried_sub_bands_match_the_dispersion_law() {
    for (nchans, seed) in [(3, 3), (5, 4), (7, 5), (11, 6)] {
        assert_matches_reference(
            InstrumentConfig::new(1200.0, 1600.0, nchans, 40, 1e-3, 24),
            seed,
        );
    }
}

#[test]
fn strided_and_offset_grids_match_the_dispersion_law() {
    let config = InstrumentConfig::new(1000.0, 1500.0, 8, 64, 1e-3, 40)
        .with_dt_step(3)
        .with_dt_min(5);
    assert_matches_reference(config, 7);
}

#[test]
fn sweeps_longer_than_the_series_match_the_dispersion_law() {
    assert_matches_reference(InstrumentConfig::new(1000.0, 1500.0, 6, 12, 1e-3, 30), 8);
}

#[test]
fn wide_sweeps_stay_within_two_lags_of_the_law() {
    let config = InstrumentConfig::new(1200.0, 1600.0, 64, 16, 64e-6, 512).with_dt_step(7);
    let fdmt = Fdmt::new(config.clone()).unwrap();
    for (idt, &dt) in fdmt.dt_grid_final().iter().enumerate() {
        let spans = fdmt.plan().channel_footprint(idt).unwrap();
        for (span, (first, last)) in spans.iter().zip(law_spans(&config, dt)) {
            let end = span.offset + span.width;
            assert!(span.offset.abs_diff(first) <= 2, "dt = {dt}");
            assert!(end.abs_diff(last) <= 2, "dt = {dt}");
        }
    }
}

#[test]
fn single_channel_rows_are_box_sums() {
    let config = InstrumentConfig::new(1000.0, 1500.0, 1, 10, 1e-3, 4);
    let data: Vec<f32> = (1..=10).map(|v| v as f32).collect();
    let (_, dmt) = transform(&config, &data);
    for (idt, row) in dmt.chunks_exact(10).enumerate() {
        for (t, &value) in row.iter().enumerate() {
            let lo = t.saturating_sub(idt);
            let expected: f32 = data[lo..=t].iter().sum();
            assert_eq!(value, expected);
        }
    }
}
