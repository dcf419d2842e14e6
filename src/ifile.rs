use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::DynError;

/// Instrument parameters read from a key=value file. Any field may be
/// missing; command-line flags fill or override them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IFileData {
    pub source: Option<String>,
    pub f_min_mhz: Option<f64>,
    pub f_max_mhz: Option<f64>,
    pub nchans: Option<usize>,
    pub nsamps: Option<usize>,
    pub tsamp_s: Option<f64>,
    pub dt_max: Option<usize>,
    pub dt_step: Option<usize>,
    pub dt_min: Option<usize>,
}

fn parse_optional_f64(
    params: &HashMap<String, String>,
    keys: &[&str],
) -> Result<Option<f64>, DynError> {
    for key in keys {
        if let Some(value) = params.get(*key) {
            return Ok(Some(value.trim().parse::<f64>()?));
        }
    }
    Ok(None)
}

fn parse_optional_usize(
    params: &HashMap<String, String>,
    keys: &[&str],
) -> Result<Option<usize>, DynError> {
    for key in keys {
        if let Some(value) = params.get(*key) {
            return Ok(Some(value.trim().parse::<usize>()?));
        }
    }
    Ok(None)
}

/// `fcenter`/`bw` pairs are accepted when the edges are not given.
fn resolve_band(params: &HashMap<String, String>) -> Result<(Option<f64>, Option<f64>), DynError> {
    let f_min = parse_optional_f64(params, &["fmin", "flow", "fbot", "fch1low"])?;
    let f_max = parse_optional_f64(params, &["fmax", "fhigh", "ftop"])?;
    if f_min.is_some() && f_max.is_some() {
        return Ok((f_min, f_max));
    }
    let center = parse_optional_f64(params, &["fcenter", "fcentre", "obsfreq", "freq"])?;
    let bw = parse_optional_f64(params, &["bw", "bandwidth"])?;
    match (center, bw) {
        (Some(center), Some(bw)) => {
            let half = bw.abs() / 2.0;
            Ok((f_min.or(Some(center - half)), f_max.or(Some(center + half))))
        }
        _ => Ok((f_min, f_max)),
    }
}

fn parse_ifile_params(text: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if let Some(index) = line.find('=') {
            let (key, value) = line.split_at(index);
            let key = key.trim().to_ascii_lowercase().replace(['_', '-'], "");
            let value = value
                .trim_start_matches('=')
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .to_string();
            params.insert(key, value);
        }
    }
    params
}

pub fn parse_ifile_str(text: &str) -> Result<IFileData, DynError> {
    let params = parse_ifile_params(text);
    let (f_min_mhz, f_max_mhz) = resolve_band(&params)?;
    Ok(IFileData {
        source: params
            .get("source")
            .or_else(|| params.get("object"))
            .cloned(),
        f_min_mhz,
        f_max_mhz,
        nchans: parse_optional_usize(&params, &["nchans", "nchan", "channels"])?,
        nsamps: parse_optional_usize(&params, &["nsamps", "nsamp", "samples"])?,
        tsamp_s: parse_optional_f64(&params, &["tsamp", "tsamps", "dt"])?,
        dt_max: parse_optional_usize(&params, &["dtmax", "maxdt"])?,
        dt_step: parse_optional_usize(&params, &["dtstep"])?,
        dt_min: parse_optional_usize(&params, &["dtmin", "mindt"])?,
    })
}

pub fn parse_ifile(path: &Path) -> Result<IFileData, DynError> {
    let file = File::open(path)
        .map_err(|err| format!("cannot open instrument file {}: {err}", path.display()))?;
    let mut text = String::new();
    for line in BufReader::new(file).lines() {
        text.push_str(&line?);
        text.push('\n');
    }
    parse_ifile_str(&text)
}
