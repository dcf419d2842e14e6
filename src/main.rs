mod args;
mod ifile;
mod plot;

use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser};
use fdmt::{
    init_logging, set_log_level, set_num_threads, simulate_dispersed_pulse, Dmt, Fdmt, Waterfall,
};

pub type DynError = Box<dyn Error + Send + Sync>;

fn decode_f32_le(bytes: &[u8]) -> Result<Vec<f32>, DynError> {
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "input length {} is not a whole number of f32 samples",
            bytes.len()
        )
        .into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|word| f32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

fn read_waterfall(path: &Path) -> Result<Vec<f32>, DynError> {
    let file = File::open(path)
        .map_err(|err| format!("cannot open waterfall {}: {err}", path.display()))?;
    let mut bytes = Vec::new();
    BufReader::new(file).read_to_end(&mut bytes)?;
    decode_f32_le(&bytes)
}

fn write_dmt(path: &Path, dmt: &Dmt) -> Result<(), DynError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for value in dmt.as_slice() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Strongest cell of the transform and its significance within its row.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Peak {
    idt: usize,
    sample: usize,
    value: f32,
    snr: f64,
}

fn find_peak(dmt: &Dmt) -> Option<Peak> {
    let (index, &value) = dmt
        .as_slice()
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    let idt = index / dmt.nsamps();
    let row = dmt.row(idt);
    let n = row.len() as f64;
    let mean = row.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = row.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    let snr = if var > 0.0 {
        (value as f64 - mean) / var.sqrt()
    } else {
        0.0
    };
    Some(Peak {
        idt,
        sample: index % dmt.nsamps(),
        value,
        snr,
    })
}

fn plot_paths(stem: &Path) -> (PathBuf, PathBuf) {
    let base = stem.to_string_lossy();
    (
        PathBuf::from(format!("{base}_dmt.png")),
        PathBuf::from(format!("{base}_peak.png")),
    )
}

fn main() -> Result<(), DynError> {
    if std::env::args_os().len() == 1 {
        args::Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let args = args::Args::parse();
    set_log_level(args.log_level()?);
    init_logging();
    set_num_threads(args.cpu);

    if args.repeat == 0 {
        return Err("--repeat must be at least 1".into());
    }
    if args.input.is_none() && args.simulate_dt.is_none() {
        return Err("provide --input or --simulate-dt".into());
    }

    let ifile_data = if let Some(ifile_path) = &args.ifile {
        Some(ifile::parse_ifile(ifile_path)?)
    } else {
        None
    };

    let input = if let Some(path) = &args.input {
        Some(read_waterfall(path)?)
    } else {
        None
    };
    let nchans_hint = args
        .nchans
        .or_else(|| ifile_data.as_ref().and_then(|d| d.nchans));
    let inferred_nsamps = match (&input, nchans_hint) {
        (Some(samples), Some(nchans)) if nchans > 0 => Some(samples.len() / nchans),
        _ => None,
    };
    let config = args::resolve_config(&args, ifile_data.as_ref(), inferred_nsamps)?;

    let (data, origin) = match input {
        Some(samples) => {
            let label = args
                .input
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            (samples, label)
        }
        None => {
            let dt = args.simulate_dt.unwrap_or(0);
            let t0 = args.simulate_t0.unwrap_or(config.nsamps / 2);
            let samples = simulate_dispersed_pulse(&config, dt, t0, args.amplitude)?;
            (samples, format!("simulated pulse (dt={dt}, t0={t0})"))
        }
    };
    let waterfall = Waterfall::new(&data, config.nchans, config.nsamps)?;

    let fdmt = Fdmt::new(config.clone())?;
    let dm_grid = fdmt.dm_grid_final();
    let dt_grid = fdmt.dt_grid_final();

    println!("Starting FDMT with the following parameters:");
    println!("--------------------------------------------------");
    if let Some(source) = ifile_data.as_ref().and_then(|d| d.source.as_deref()) {
        println!("  source:     {source}");
    }
    println!("  input:      {origin}");
    println!("  band:       {:.6} .. {:.6} MHz", config.f_min, config.f_max);
    println!("  nchans:     {} (df = {:.6} MHz)", config.nchans, fdmt.df());
    println!("  nsamps:     {} (tsamp = {:.6e} s)", config.nsamps, config.tsamp);
    println!(
        "  dt:         {} .. {} step {} ({} trials)",
        config.dt_min,
        dt_grid.last().copied().unwrap_or(0),
        config.dt_step,
        dt_grid.len()
    );
    println!(
        "  dm:         {:.4} .. {:.4} pc cm^-3",
        dm_grid.first().copied().unwrap_or(0.0),
        dm_grid.last().copied().unwrap_or(0.0)
    );
    println!("  niters:     {}", fdmt.niters());
    println!(
        "  memory:     {:.3} MiB plan, {:.3} MiB per execution",
        fdmt.plan().calculate_memory_usage() as f64 / (1024.0 * 1024.0),
        fdmt.plan().execution_buffer_bytes() as f64 / (1024.0 * 1024.0)
    );
    println!(
        "  threads:    {}",
        if args.cpu == 0 {
            "auto".to_string()
        } else {
            args.cpu.to_string()
        }
    );
    println!("--------------------------------------------------");

    let mut dmt = None;
    let mut total_s = 0.0;
    for run in 0..args.repeat {
        let started = Instant::now();
        let result = fdmt.execute(&waterfall)?;
        let elapsed = started.elapsed().as_secs_f64();
        total_s += elapsed;
        tracing::debug!(run, elapsed_ms = elapsed * 1e3, "transform run");
        dmt = Some(result);
    }
    let dmt = dmt.ok_or("transform produced no output")?;
    tracing::info!(
        runs = args.repeat,
        mean_ms = total_s / args.repeat as f64 * 1e3,
        "transform complete"
    );

    let peak = find_peak(&dmt);
    match peak {
        Some(peak) => println!(
            "  peak:       dt={} (DM {:.4}) t={} ({:.6} s) value={:.4} snr={:.2}",
            dt_grid[peak.idt],
            dm_grid[peak.idt],
            peak.sample,
            peak.sample as f64 * config.tsamp,
            peak.value,
            peak.snr
        ),
        None => tracing::warn!("transform holds no finite values"),
    }

    if let Some(path) = &args.output {
        write_dmt(path, &dmt)?;
        println!("  output:     {}", path.display());
    }

    if let Some(stem) = &args.plot {
        let (heatmap_path, series_path) = plot_paths(stem);
        if let Some(parent) = heatmap_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let marker = peak.map(|p| (p.sample as f64 * config.tsamp, dm_grid[p.idt]));
        plot::plot_dmt_heatmap(&dmt, &dm_grid, config.tsamp, &heatmap_path, marker)?;
        println!("  plot:       {}", heatmap_path.display());

        if let Some(peak) = peak {
            let times: Vec<f64> = (0..config.nsamps)
                .map(|t| t as f64 * config.tsamp)
                .collect();
            let series: Vec<f64> = dmt.row(peak.idt).iter().map(|&v| v as f64).collect();
            plot::plot_series_f64_x(
                &times,
                &series,
                &series_path,
                "Time [s]",
                "Dedispersed intensity",
                &format!("DM {:.3} pc cm^-3", dm_grid[peak.idt]),
            )?;
            println!("  plot:       {}", series_path.display());
        }
    }

    Ok(())
}
