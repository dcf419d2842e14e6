// --- Row kernels ---
// dest[t] = head[t] + tail[t - offset], tail zero-padded for t < offset.
#[inline]
pub fn add_offset_kernel(head: &[f32], tail: &[f32], offset: usize, dest: &mut [f32]) {
    debug_assert_eq!(head.len(), dest.len());
    debug_assert_eq!(tail.len(), dest.len());
    let split = offset.min(dest.len());
    let (dest_lead, dest_rest) = dest.split_at_mut(split);
    dest_lead.copy_from_slice(&head[..split]);
    for ((out, &h), &t) in dest_rest
        .iter_mut()
        .zip(head[split..].iter())
        .zip(tail.iter())
    {
        *out = h + t;
    }
}

#[inline]
pub fn copy_kernel(src: &[f32], dest: &mut [f32]) {
    debug_assert_eq!(src.len(), dest.len());
    dest.copy_from_slice(src);
}

/// Iteration-0 rows of one channel.
///
/// Row `d` holds `sum(series[t - k] for k in 0..=d)`, built as
/// `row_d[t] = series[t] + row_{d-1}[t - 1]`. Only the delays listed in
/// `grid` (ascending) are written, one `series.len()` row each, to `rows`.
pub fn accumulate_channel_rows(series: &[f32], grid: &[usize], rows: &mut [f32]) {
    let nsamps = series.len();
    debug_assert_eq!(rows.len(), grid.len() * nsamps);
    if nsamps == 0 || grid.is_empty() {
        return;
    }

    let mut current = series.to_vec();
    let mut scratch = vec![0.0f32; nsamps];
    let mut delay = 0usize;
    for (&target, out) in grid.iter().zip(rows.chunks_exact_mut(nsamps)) {
        while delay < target {
            scratch[0] = series[0];
            for t in 1..nsamps {
                scratch[t] = series[t] + current[t - 1];
            }
            std::mem::swap(&mut current, &mut scratch);
            delay += 1;
        }
        out.copy_from_slice(&current);
    }
}
