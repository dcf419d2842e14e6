use std::path::Path;

use fdmt::Dmt;
use plotters::prelude::PathElement;
use plotters::prelude::*;

use crate::DynError;

const PLOT_FONT_SCALE: f64 = 1.2;
const HEATMAP_MAX_COLUMNS: usize = 1200;
const HEATMAP_MAX_ROWS: usize = 600;

fn scaled_font_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn scaled_area_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return None;
    }
    if lo == hi {
        Some((lo - 0.5, hi + 0.5))
    } else {
        Some((lo, hi))
    }
}

/// Reduce `dmt` to at most `max_rows x max_cols` cells, keeping the
/// maximum of every block so narrow pulses survive.
pub fn downsample_max(
    dmt: &Dmt,
    max_rows: usize,
    max_cols: usize,
) -> (Vec<Vec<f32>>, usize, usize) {
    let row_bin = dmt.ndt().div_ceil(max_rows.max(1)).max(1);
    let col_bin = dmt.nsamps().div_ceil(max_cols.max(1)).max(1);
    let cells: Vec<Vec<f32>> = dmt
        .rows()
        .collect::<Vec<_>>()
        .chunks(row_bin)
        .map(|block| {
            (0..dmt.nsamps())
                .step_by(col_bin)
                .map(|start| {
                    let end = (start + col_bin).min(dmt.nsamps());
                    block
                        .iter()
                        .flat_map(|row| row[start..end].iter().copied())
                        .fold(f32::NEG_INFINITY, f32::max)
                })
                .collect::<Vec<f32>>()
        })
        .collect();
    (cells, row_bin, col_bin)
}

fn heat_color(value: f64, lo: f64, hi: f64) -> HSLColor {
    let scaled = if value.is_finite() {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    HSLColor(0.7 * (1.0 - scaled), 0.9, 0.15 + 0.4 * scaled)
}

/// Render the transform as a time versus dispersion-measure heatmap.
pub fn plot_dmt_heatmap(
    dmt: &Dmt,
    dm_grid: &[f64],
    tsamp: f64,
    filename: &Path,
    peak: Option<(f64, f64)>,
) -> Result<(), DynError> {
    if dm_grid.len() != dmt.ndt() {
        return Err("DM grid length does not match the number of trials".into());
    }
    if dmt.ndt() == 0 || dmt.nsamps() == 0 {
        return Err("No data points to plot".into());
    }
    let (cells, row_bin, col_bin) = downsample_max(dmt, HEATMAP_MAX_ROWS, HEATMAP_MAX_COLUMNS);
    let (lo, hi) = finite_range(cells.iter().flatten().map(|&v| v as f64))
        .ok_or("Transform holds no finite values")?;

    let root = BitMapBackend::new(filename, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let t_max = dmt.nsamps() as f64 * tsamp;
    let dm_lo = dm_grid[0];
    let dm_step = if dm_grid.len() > 1 {
        dm_grid[1] - dm_grid[0]
    } else {
        1.0
    };
    let dm_hi = dm_grid[dm_grid.len() - 1] + dm_step;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(70))
        .build_cartesian_2d(0.0..t_max, dm_lo..dm_hi)?;

    chart
        .configure_mesh()
        .x_desc("Time [s]")
        .y_desc("DM [pc cm^-3]")
        .label_style(("sans-serif", scaled_font_size(20)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(24)).into_font())
        .disable_mesh()
        .draw()?;

    chart.draw_series(cells.iter().enumerate().flat_map(|(irow, row)| {
        let idt = irow * row_bin;
        let y0 = dm_grid[idt];
        let y1 = dm_grid
            .get((idt + row_bin).min(dm_grid.len()))
            .copied()
            .unwrap_or(dm_hi);
        row.iter().enumerate().map(move |(icol, &value)| {
            let x0 = (icol * col_bin) as f64 * tsamp;
            let x1 = x0 + col_bin as f64 * tsamp;
            Rectangle::new(
                [(x0, y0), (x1, y1)],
                heat_color(value as f64, lo, hi).filled(),
            )
        })
    }))?;

    if let Some((t, dm)) = peak {
        chart.draw_series(std::iter::once(Circle::new((t, dm), 8, WHITE.stroke_width(2))))?;
    }

    root.present()?;
    Ok(())
}

pub fn plot_series_f64_x(
    x_vals: &[f64],
    data: &[f64],
    filename: &Path,
    x_label: &str,
    y_label: &str,
    label: &str,
) -> Result<(), DynError> {
    if x_vals.len() != data.len() {
        return Err("X-value vector length does not match data length".into());
    }
    let (x_min, x_max) =
        finite_range(x_vals.iter().copied()).ok_or("No data points to plot")?;
    let (min_val, max_val) =
        finite_range(data.iter().copied()).ok_or("Series holds no finite values")?;

    let root = BitMapBackend::new(filename, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(60))
        .build_cartesian_2d(x_min..x_max, min_val..max_val)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .label_style(("sans-serif", scaled_font_size(20)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(24)).into_font())
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            x_vals.iter().zip(data.iter()).map(|(x, y)| (*x, *y)),
            &BLUE,
        ))?
        .label(label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], BLUE));

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", scaled_font_size(20)).into_font())
        .draw()?;

    root.present()?;
    Ok(())
}
