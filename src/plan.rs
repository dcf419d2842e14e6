//! Transform plan: the merge tree of sub-bands and the coordinate maps the
//! engine follows to fold one iteration's state into the next.
//!
//! Iteration 0 holds one sub-band per channel. Iteration `i` pairs the
//! sub-bands `(2k, 2k + 1)` of iteration `i - 1`; an odd trailing sub-band
//! is carried forward unchanged. Iteration `niters` holds a single sub-band
//! spanning the whole instrument band.
//!
//! State buffers are packed: the delay rows of sub-band 0, then sub-band 1,
//! and so on, each row `nsamps` long. Paired sub-bands always precede the
//! carried one, so every iteration's combine rows form one contiguous block
//! followed by the copy rows.

use std::collections::BTreeSet;
use std::ops::Range;

use crate::config::InstrumentConfig;
use crate::dispersion::{DelaySplit, DispersionModel};
use crate::error::FdmtError;

pub type DtGrid = Vec<usize>;

/// `(sub-band, delay index)` within one iteration.
pub type Coord = (usize, usize);

/// One elementary fold step.
///
/// `head` and `tail` index the delay axis of the lower and upper child of
/// the destination sub-band in the previous iteration; `offset` is how far
/// the tail row is shifted before it is added. Copy entries only read
/// `head`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordMapping {
    pub head: usize,
    pub tail: usize,
    pub offset: usize,
}

impl CoordMapping {
    pub fn copy_of(head: usize) -> Self {
        Self {
            head,
            tail: head,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateShape {
    pub nsub: usize,
    pub ndt_min: usize,
    pub ndt_max: usize,
    /// Delay rows over all sub-bands.
    pub nrows: usize,
    pub nsamps: usize,
}

impl StateShape {
    pub fn len(&self) -> usize {
        self.nrows * self.nsamps
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Time span one channel contributes to a final delay trial: samples
/// `t - offset - width ..= t - offset` of the channel are summed into
/// output sample `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSpan {
    pub offset: usize,
    pub width: usize,
}

/// Immutable merge tree and coordinate maps for one [`InstrumentConfig`].
///
/// Delay grids are resolved top-down. The final grid runs from `dt_min` to
/// the band's maximal sweep in steps of `dt_step`; every intermediate grid
/// holds exactly the sweeps its parent asks for, in ascending order, rather
/// than a dense `dt_step` range. Every child lookup is therefore exact and
/// the state rows, and hence [`FdmtPlan::calculate_memory_usage`], count
/// only the delays the final trials reach.
#[derive(Debug, Clone, PartialEq)]
pub struct FdmtPlan {
    nsamps: usize,
    sub_chans: Vec<Vec<Range<usize>>>,
    f_top: Vec<Vec<f64>>,
    f_bot: Vec<Vec<f64>>,
    state_shape: Vec<StateShape>,
    coordinates: Vec<Vec<Coord>>,
    mappings: Vec<Vec<CoordMapping>>,
    coordinates_to_copy: Vec<Vec<Coord>>,
    mappings_to_copy: Vec<Vec<CoordMapping>>,
    state_sub_idx: Vec<Vec<usize>>,
    dt_grid: Vec<Vec<DtGrid>>,
    dt_grid_sub_top: Vec<Vec<DtGrid>>,
}

fn fold_frequency_error(err: FdmtError) -> FdmtError {
    match err {
        FdmtError::InvalidFrequencyRange { f_top, f_bot } => FdmtError::invalid_config(format!(
            "non-physical sub-band [{f_bot}, {f_top}] MHz"
        )),
        other => other,
    }
}

/// Index of the largest grid value not exceeding `dt` (first index if none).
#[inline]
pub fn grid_index(grid: &[usize], dt: usize) -> usize {
    grid.partition_point(|&value| value <= dt).saturating_sub(1)
}

fn sub_band_layout(nchans: usize, niters: usize) -> Vec<Vec<Range<usize>>> {
    let mut levels: Vec<Vec<Range<usize>>> = Vec::with_capacity(niters + 1);
    levels.push((0..nchans).map(|chan| chan..chan + 1).collect());
    for _ in 0..niters {
        let next: Vec<Range<usize>> = levels[levels.len() - 1]
            .chunks(2)
            .map(|pair| pair[0].start..pair[pair.len() - 1].end)
            .collect();
        levels.push(next);
    }
    levels
}

impl FdmtPlan {
    pub fn build(config: &InstrumentConfig) -> Result<Self, FdmtError> {
        config.validate()?;
        let model = config.dispersion_model().map_err(fold_frequency_error)?;
        Self::build_with_model(config, &model).map_err(fold_frequency_error)
    }

    fn build_with_model(
        config: &InstrumentConfig,
        model: &DispersionModel,
    ) -> Result<Self, FdmtError> {
        let niters = config.niters();
        let nsamps = config.nsamps;
        let sub_chans = sub_band_layout(config.nchans, niters);

        let f_bot: Vec<Vec<f64>> = sub_chans
            .iter()
            .map(|level| level.iter().map(|r| config.channel_edge(r.start)).collect())
            .collect();
        let f_top: Vec<Vec<f64>> = sub_chans
            .iter()
            .map(|level| level.iter().map(|r| config.channel_edge(r.end)).collect())
            .collect();

        // --- Top-down delay grids ---
        let final_max =
            model.max_trial_for_bandwidth(config.f_max, config.f_min, config.dt_max)?;
        let final_grid: DtGrid = (config.dt_min..=final_max)
            .step_by(config.dt_step)
            .collect();

        let mut dt_grid: Vec<Vec<DtGrid>> = vec![Vec::new(); niters + 1];
        dt_grid[niters] = vec![final_grid];
        let mut splits: Vec<Vec<Option<Vec<DelaySplit>>>> = vec![Vec::new(); niters + 1];

        for iter in (1..=niters).rev() {
            let nchildren = sub_chans[iter - 1].len();
            let mut requests: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nchildren];
            let mut level_splits = Vec::with_capacity(sub_chans[iter].len());

            for (isub, grid) in dt_grid[iter].iter().enumerate() {
                let head_child = 2 * isub;
                if head_child + 1 < nchildren {
                    let f_mid = f_top[iter - 1][head_child];
                    let (lo, hi) = (f_bot[iter][isub], f_top[iter][isub]);
                    let sub_splits = grid
                        .iter()
                        .map(|&dt| model.split_delay(lo, f_mid, hi, dt))
                        .collect::<Result<Vec<_>, _>>()?;
                    for split in &sub_splits {
                        requests[head_child].insert(split.head);
                        requests[head_child + 1].insert(split.tail);
                    }
                    level_splits.push(Some(sub_splits));
                } else {
                    requests[head_child].extend(grid.iter().copied());
                    level_splits.push(None);
                }
            }

            dt_grid[iter - 1] = requests
                .into_iter()
                .map(|set| set.into_iter().collect())
                .collect();
            splits[iter] = level_splits;
        }

        let mut coordinates = vec![Vec::new(); niters + 1];
        let mut mappings = vec![Vec::new(); niters + 1];
        let mut coordinates_to_copy = vec![Vec::new(); niters + 1];
        let mut mappings_to_copy = vec![Vec::new(); niters + 1];
        let mut dt_grid_sub_top = vec![Vec::new(); niters + 1];
        dt_grid_sub_top[0] = dt_grid[0].clone();

        for iter in 1..=niters {
            let prev_grids = &dt_grid[iter - 1];
            for (isub, sub_splits) in splits[iter].iter().enumerate() {
                let head_grid = &prev_grids[2 * isub];
                match sub_splits {
                    Some(sub_splits) => {
                        let tail_grid = &prev_grids[2 * isub + 1];
                        let mut tops = Vec::with_capacity(sub_splits.len());
                        for (idt, split) in sub_splits.iter().enumerate() {
                            coordinates[iter].push((isub, idt));
                            mappings[iter].push(CoordMapping {
                                head: grid_index(head_grid, split.head),
                                tail: grid_index(tail_grid, split.tail),
                                offset: split.offset,
                            });
                            tops.push(split.tail);
                        }
                        dt_grid_sub_top[iter].push(tops);
                    }
                    None => {
                        let grid = &dt_grid[iter][isub];
                        for (idt, &dt) in grid.iter().enumerate() {
                            coordinates_to_copy[iter].push((isub, idt));
                            let head = grid_index(head_grid, dt);
                            mappings_to_copy[iter].push(CoordMapping::copy_of(head));
                        }
                        dt_grid_sub_top[iter].push(grid.clone());
                    }
                }
            }
        }

        let mut state_shape = Vec::with_capacity(niters + 1);
        let mut state_sub_idx = Vec::with_capacity(niters + 1);
        for grids in &dt_grid {
            let mut offsets = Vec::with_capacity(grids.len());
            let mut nrows = 0usize;
            for grid in grids {
                offsets.push(nrows * nsamps);
                nrows += grid.len();
            }
            state_shape.push(StateShape {
                nsub: grids.len(),
                ndt_min: grids.iter().map(Vec::len).min().unwrap_or(0),
                ndt_max: grids.iter().map(Vec::len).max().unwrap_or(0),
                nrows,
                nsamps,
            });
            state_sub_idx.push(offsets);
        }

        let plan = Self {
            nsamps,
            sub_chans,
            f_top,
            f_bot,
            state_shape,
            coordinates,
            mappings,
            coordinates_to_copy,
            mappings_to_copy,
            state_sub_idx,
            dt_grid,
            dt_grid_sub_top,
        };
        for (iter, shape) in plan.state_shape.iter().enumerate() {
            tracing::debug!(
                iter,
                nsub = shape.nsub,
                nrows = shape.nrows,
                combines = plan.mappings[iter].len(),
                copies = plan.mappings_to_copy[iter].len(),
                "fdmt plan level"
            );
        }
        Ok(plan)
    }

    pub fn niters(&self) -> usize {
        self.state_shape.len().saturating_sub(1)
    }

    pub fn nchans(&self) -> usize {
        self.sub_chans.first().map_or(0, Vec::len)
    }

    pub fn nsamps(&self) -> usize {
        self.nsamps
    }

    pub fn sub_chans(&self) -> &[Vec<Range<usize>>] {
        &self.sub_chans
    }

    pub fn f_top(&self) -> &[Vec<f64>] {
        &self.f_top
    }

    pub fn f_bot(&self) -> &[Vec<f64>] {
        &self.f_bot
    }

    pub fn state_shape(&self) -> &[StateShape] {
        &self.state_shape
    }

    pub fn coordinates(&self) -> &[Vec<Coord>] {
        &self.coordinates
    }

    pub fn mappings(&self) -> &[Vec<CoordMapping>] {
        &self.mappings
    }

    pub fn coordinates_to_copy(&self) -> &[Vec<Coord>] {
        &self.coordinates_to_copy
    }

    pub fn mappings_to_copy(&self) -> &[Vec<CoordMapping>] {
        &self.mappings_to_copy
    }

    pub fn state_sub_idx(&self) -> &[Vec<usize>] {
        &self.state_sub_idx
    }

    pub fn dt_grid(&self) -> &[Vec<DtGrid>] {
        &self.dt_grid
    }

    /// Per iteration and sub-band, the sweep of the upper portion for each
    /// trial: the delay asked of the upper child when merging, or the grid
    /// itself for a single channel or a carried sub-band.
    pub fn dt_grid_sub_top(&self) -> &[Vec<DtGrid>] {
        &self.dt_grid_sub_top
    }

    pub fn dt_grid_final(&self) -> &[usize] {
        self.dt_grid
            .last()
            .and_then(|level| level.first())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sub_row_start(&self, iter: usize, isub: usize) -> usize {
        self.state_sub_idx[iter][isub] / self.nsamps
    }

    pub fn calculate_memory_usage(&self) -> usize {
        self.state_shape
            .iter()
            .map(|shape| shape.len() * std::mem::size_of::<f32>())
            .sum()
    }

    /// Bytes of the two ping-pong state buffers one execution allocates.
    pub fn execution_buffer_bytes(&self) -> usize {
        let max_len = self.state_shape.iter().map(StateShape::len).max().unwrap_or(0);
        2 * max_len * std::mem::size_of::<f32>()
    }

    /// Per channel, the span of samples summed into final trial `idt`.
    pub fn channel_footprint(&self, idt: usize) -> Result<Vec<ChannelSpan>, FdmtError> {
        let ndt = self.dt_grid_final().len();
        if idt >= ndt {
            return Err(FdmtError::shape_mismatch("final delay index", [ndt], [idt]));
        }
        let mut spans = vec![ChannelSpan::default(); self.nchans()];
        self.trace_footprint(self.niters(), 0, idt, 0, &mut spans);
        Ok(spans)
    }

    fn trace_footprint(
        &self,
        iter: usize,
        isub: usize,
        idt: usize,
        base: usize,
        spans: &mut [ChannelSpan],
    ) {
        if iter == 0 {
            spans[isub] = ChannelSpan {
                offset: base,
                width: self.dt_grid[0][isub][idt],
            };
            return;
        }
        let row = self.sub_row_start(iter, isub) + idt;
        let ncombine = self.mappings[iter].len();
        if row < ncombine {
            let mapping = self.mappings[iter][row];
            self.trace_footprint(iter - 1, 2 * isub, mapping.head, base, spans);
            let tail_base = base + mapping.offset;
            self.trace_footprint(iter - 1, 2 * isub + 1, mapping.tail, tail_base, spans);
        } else {
            let mapping = self.mappings_to_copy[iter][row - ncombine];
            self.trace_footprint(iter - 1, 2 * isub, mapping.head, base, spans);
        }
    }
}
