//! L-band reference setup: 8 channels over 1000-1500 MHz, 64 samples of
//! 1 ms, sweeps up to 32 samples.

mod common;

use fdmt::{simulate_dispersed_pulse, Fdmt, InstrumentConfig, Waterfall};

fn scenario() -> InstrumentConfig {
    InstrumentConfig::new(1000.0, 1500.0, 8, 64, 1e-3, 32)
}

#[test]
fn plan_has_three_levels_and_33_trials() {
    let fdmt = Fdmt::new(scenario()).unwrap();
    assert_eq!(fdmt.niters(), 3);
    let model = scenario().dispersion_model().unwrap();
    let expected = model.max_trial_for_bandwidth(1500.0, 1000.0, 32).unwrap() + 1;
    assert_eq!(fdmt.dt_grid_final().len(), expected);
    assert_eq!(expected, 33);
    assert_eq!(fdmt.dmt_shape(), [33, 64]);
}

#[test]
fn zeros_transform_to_zeros() {
    let fdmt = Fdmt::new(scenario()).unwrap();
    let data = vec![0.0f32; 8 * 64];
    let dmt = fdmt.execute(&Waterfall::new(&data, 8, 64).unwrap()).unwrap();
    assert_eq!(dmt.shape(), [33, 64]);
    assert!(dmt.as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn unit_impulse_lands_at_time_zero_of_the_zero_delay_row() {
    let fdmt = Fdmt::new(scenario()).unwrap();
    let mut data = vec![0.0f32; 8 * 64];
    data[0] = 1.0;
    let dmt = fdmt.execute(&Waterfall::new(&data, 8, 64).unwrap()).unwrap();
    let row = dmt.row(0);
    assert_eq!(row[0], 1.0);
    assert!(row[1..].iter().all(|&v| v == 0.0));
    // The lowest channel is never shifted, so every trial sees the impulse
    // at t = 0 and nowhere earlier.
    for trial in dmt.rows() {
        assert_eq!(trial[0], 1.0);
    }
}

#[test]
fn dispersed_pulse_peaks_near_its_sweep() {
    let config = scenario();
    let data = simulate_dispersed_pulse(&config, 20, 45, 1.0).unwrap();
    let fdmt = Fdmt::new(config).unwrap();
    let dmt = fdmt.execute(&Waterfall::new(&data, 8, 64).unwrap()).unwrap();

    let best = |idt: usize| dmt.row(idt).iter().cloned().fold(f32::MIN, f32::max);
    let (peak_idt, peak) = (0..dmt.ndt())
        .map(|idt| (idt, best(idt)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap();
    let peak_dt = fdmt.dt_grid_final()[peak_idt] as i64;
    assert!((peak_dt - 20).abs() <= 1, "peak at dt = {peak_dt}");
    // Eight channels of unit fluence; only the one-lag rounding at span
    // edges may cost anything.
    assert!(peak <= 8.0 + 1e-4);
    assert!(peak >= 0.9 * 8.0, "peak value {peak}");
    assert!(best(0) < 0.2 * peak);
}

#[test]
fn memory_report_matches_the_level_shapes() {
    let fdmt = Fdmt::new(scenario()).unwrap();
    let plan = fdmt.plan();
    let rows: usize = plan.state_shape().iter().map(|s| s.nrows).sum();
    assert_eq!(plan.calculate_memory_usage(), rows * 64 * 4);
    assert_eq!(plan.state_shape()[3].nrows, 33);
}
