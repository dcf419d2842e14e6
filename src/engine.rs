//! Execution engine: iteration-0 accumulation followed by one fold per
//! plan level, alternating between two state buffers.

use std::time::Instant;

use rayon::prelude::*;

use crate::config::InstrumentConfig;
use crate::controls;
use crate::dispersion::DispersionModel;
use crate::error::FdmtError;
use crate::kernels::{accumulate_channel_rows, add_offset_kernel, copy_kernel};
use crate::plan::FdmtPlan;
use crate::waterfall::{Dmt, Waterfall};

/// A built transform for one instrument configuration.
///
/// The plan is immutable once constructed, so one `Fdmt` may serve any
/// number of executions, concurrently or back to back.
#[derive(Debug, Clone)]
pub struct Fdmt {
    config: InstrumentConfig,
    model: DispersionModel,
    plan: FdmtPlan,
}

#[inline]
fn row(state: &[f32], idx: usize, nsamps: usize) -> &[f32] {
    &state[idx * nsamps..(idx + 1) * nsamps]
}

/// Cut `buf` into consecutive blocks of the given lengths.
fn split_blocks<'b>(mut buf: &'b mut [f32], lens: &[usize]) -> Vec<&'b mut [f32]> {
    let mut blocks = Vec::with_capacity(lens.len());
    for &len in lens {
        let (block, rest) = std::mem::take(&mut buf).split_at_mut(len);
        blocks.push(block);
        buf = rest;
    }
    blocks
}

impl Fdmt {
    pub fn new(config: InstrumentConfig) -> Result<Self, FdmtError> {
        let started = Instant::now();
        let plan = FdmtPlan::build(&config)?;
        let model = config.dispersion_model()?;
        tracing::info!(
            nchans = config.nchans,
            nsamps = config.nsamps,
            niters = plan.niters(),
            ndt = plan.dt_grid_final().len(),
            plan_bytes = plan.calculate_memory_usage(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
            "fdmt plan built"
        );
        Ok(Self {
            config,
            model,
            plan,
        })
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn plan(&self) -> &FdmtPlan {
        &self.plan
    }

    pub fn df(&self) -> f64 {
        self.config.df()
    }

    pub fn correction(&self) -> f64 {
        self.model.correction()
    }

    pub fn niters(&self) -> usize {
        self.plan.niters()
    }

    pub fn dt_grid_final(&self) -> &[usize] {
        self.plan.dt_grid_final()
    }

    /// Dispersion measure (pc cm^-3) of every final trial.
    pub fn dm_grid_final(&self) -> Vec<f64> {
        self.plan
            .dt_grid_final()
            .iter()
            .map(|&dt| self.model.dm_from_dt(dt))
            .collect()
    }

    /// Shape of the output of [`Fdmt::execute`].
    pub fn dmt_shape(&self) -> [usize; 2] {
        [self.plan.dt_grid_final().len(), self.config.nsamps]
    }

    fn check_waterfall(&self, waterfall: &Waterfall<'_>) -> Result<(), FdmtError> {
        let expected = [self.config.nchans, self.config.nsamps];
        if waterfall.shape() != expected {
            return Err(FdmtError::shape_mismatch(
                "waterfall",
                expected,
                waterfall.shape(),
            ));
        }
        Ok(())
    }

    fn check_ready(&self) -> Result<(), FdmtError> {
        if self.plan.dt_grid_final().is_empty() {
            return Err(FdmtError::UninitializedPlan);
        }
        Ok(())
    }

    /// Iteration-0 state: every channel's running sums for its delay grid,
    /// packed per `state_shape()[0]`.
    pub fn initialise(&self, waterfall: &Waterfall<'_>) -> Result<Vec<f32>, FdmtError> {
        self.check_waterfall(waterfall)?;
        let mut state = vec![0.0f32; self.plan.state_shape()[0].len()];
        controls::install(|| self.initialise_into(waterfall, &mut state))?;
        Ok(state)
    }

    fn initialise_into(&self, waterfall: &Waterfall<'_>, state: &mut [f32]) {
        let nsamps = self.config.nsamps;
        let grids = &self.plan.dt_grid()[0];
        let lens: Vec<usize> = grids.iter().map(|grid| grid.len() * nsamps).collect();
        split_blocks(state, &lens)
            .into_par_iter()
            .zip(grids.par_iter())
            .enumerate()
            .for_each(|(chan, (block, grid))| {
                accumulate_channel_rows(waterfall.channel(chan), grid, block);
            });
    }

    /// Run the full transform.
    pub fn execute(&self, waterfall: &Waterfall<'_>) -> Result<Dmt, FdmtError> {
        let [ndt, nsamps] = self.dmt_shape();
        let mut out = vec![0.0f32; ndt * nsamps];
        self.execute_into(waterfall, &mut out)?;
        Ok(Dmt::from_parts(out, ndt, nsamps))
    }

    /// Run the full transform, writing the `[ndt][nsamps]` result to `out`.
    pub fn execute_into(
        &self,
        waterfall: &Waterfall<'_>,
        out: &mut [f32],
    ) -> Result<(), FdmtError> {
        self.check_ready()?;
        self.check_waterfall(waterfall)?;
        self.check_output(out)?;
        controls::install(|| {
            let started = Instant::now();
            let (mut front, back) = self.allocate_buffers();
            let len0 = self.plan.state_shape()[0].len();
            self.initialise_into(waterfall, &mut front[..len0]);
            tracing::trace!(
                elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
                "fdmt initialised"
            );
            self.run_levels(front, back, out, started);
        })
    }

    /// Run the merge levels from a precomputed iteration-0 state.
    pub fn execute_initialised(&self, state0: &[f32]) -> Result<Dmt, FdmtError> {
        self.check_ready()?;
        let expected = self.plan.state_shape()[0].len();
        if state0.len() != expected {
            return Err(FdmtError::shape_mismatch(
                "iteration-0 state",
                [expected],
                [state0.len()],
            ));
        }
        let [ndt, nsamps] = self.dmt_shape();
        let mut out = vec![0.0f32; ndt * nsamps];
        controls::install(|| {
            let started = Instant::now();
            let (mut front, back) = self.allocate_buffers();
            front[..expected].copy_from_slice(state0);
            self.run_levels(front, back, &mut out, started);
        })?;
        Ok(Dmt::from_parts(out, ndt, nsamps))
    }

    fn check_output(&self, out: &[f32]) -> Result<(), FdmtError> {
        let [ndt, nsamps] = self.dmt_shape();
        if out.len() != ndt * nsamps {
            return Err(FdmtError::shape_mismatch(
                "dmt buffer",
                [ndt * nsamps],
                [out.len()],
            ));
        }
        Ok(())
    }

    fn allocate_buffers(&self) -> (Vec<f32>, Vec<f32>) {
        let max_len = self
            .plan
            .state_shape()
            .iter()
            .map(|shape| shape.len())
            .max()
            .unwrap_or(0);
        (vec![0.0f32; max_len], vec![0.0f32; max_len])
    }

    fn run_levels(
        &self,
        mut front: Vec<f32>,
        mut back: Vec<f32>,
        out: &mut [f32],
        started: Instant,
    ) {
        let shapes = self.plan.state_shape();
        for iter in 1..=self.plan.niters() {
            let prev_len = shapes[iter - 1].len();
            let next_len = shapes[iter].len();
            self.fold_level(iter, &front[..prev_len], &mut back[..next_len]);
            std::mem::swap(&mut front, &mut back);
            tracing::trace!(
                iter,
                rows = shapes[iter].nrows,
                elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
                "fdmt level folded"
            );
        }
        out.copy_from_slice(&front[..out.len()]);
        tracing::debug!(
            ndt = self.plan.dt_grid_final().len(),
            nsamps = self.config.nsamps,
            elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
            "fdmt executed"
        );
    }

    /// Fill iteration `iter` from iteration `iter - 1`. Combine rows lead
    /// the packed buffer, copy rows follow.
    fn fold_level(&self, iter: usize, prev: &[f32], next: &mut [f32]) {
        let nsamps = self.config.nsamps;
        let plan = &self.plan;
        let combines = &plan.mappings()[iter];
        let (combine_rows, copy_rows) = next.split_at_mut(combines.len() * nsamps);

        combine_rows
            .par_chunks_mut(nsamps)
            .zip(plan.coordinates()[iter].par_iter())
            .zip(combines.par_iter())
            .for_each(|((dest, &(isub, _)), mapping)| {
                let head = plan.sub_row_start(iter - 1, 2 * isub) + mapping.head;
                let tail = plan.sub_row_start(iter - 1, 2 * isub + 1) + mapping.tail;
                add_offset_kernel(
                    row(prev, head, nsamps),
                    row(prev, tail, nsamps),
                    mapping.offset,
                    dest,
                );
            });

        copy_rows
            .par_chunks_mut(nsamps)
            .zip(plan.coordinates_to_copy()[iter].par_iter())
            .zip(plan.mappings_to_copy()[iter].par_iter())
            .for_each(|((dest, &(isub, _)), mapping)| {
                let head = plan.sub_row_start(iter - 1, 2 * isub) + mapping.head;
                copy_kernel(row(prev, head, nsamps), dest);
            });
    }
}
