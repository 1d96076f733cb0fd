//! Frame scheduling and loop lifecycle.
//!
//! The scheduler owns the pipeline and its own cancellation flag, so two
//! simulations in one process cannot stop each other. The host drives it by
//! calling [`FrameScheduler::tick`] once per redraw and re-requesting a
//! redraw while the loop reports itself live.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::agents::Agent;
use crate::error::{PipelineError, SimulationError};
use crate::gpu::GpuContext;
use crate::params::{ColorizationParams, SimulationParams};
use crate::pipeline::SlimePipeline;

/// Shared run/cancel flag.
///
/// Cloned handles observe and control the same loop, so a callback scheduled
/// before `stop()` sees the cancellation when it finally runs.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    fn new() -> Self {
        Self::default()
    }

    fn start(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Build a pipeline and wrap it in a stopped scheduler.
pub async fn initialize_pipeline(
    ctx: Arc<GpuContext>,
    width: u32,
    height: u32,
    target_format: wgpu::TextureFormat,
) -> Result<FrameScheduler, PipelineError> {
    let pipeline = SlimePipeline::new(ctx.clone(), width, height, target_format).await?;
    Ok(FrameScheduler::new(ctx, pipeline))
}

/// Drives the pipeline one frame at a time until stopped or the device dies.
pub struct FrameScheduler {
    ctx: Arc<GpuContext>,
    pipeline: SlimePipeline,
    running: CancelFlag,
}

impl FrameScheduler {
    pub fn new(ctx: Arc<GpuContext>, pipeline: SlimePipeline) -> Self {
        Self {
            ctx,
            pipeline,
            running: CancelFlag::new(),
        }
    }

    pub fn pipeline(&self) -> &SlimePipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut SlimePipeline {
        &mut self.pipeline
    }

    /// Begin (or resume) ticking.
    pub fn start(&self) {
        self.running.start();
    }

    /// Cancel the loop. Idempotent, and safe before the first tick.
    pub fn stop(&self) {
        self.running.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    /// Run one frame into the given target.
    ///
    /// Returns `Ok(true)` when a frame was submitted and another tick should
    /// be scheduled, `Ok(false)` when the loop is stopped (a tick scheduled
    /// before cancellation is a no-op). Device loss stops the loop and is
    /// reported as an error; runtime GPU validation errors never panic here,
    /// they are logged by the device's uncaptured-error handler.
    pub fn tick(&mut self, target: &wgpu::TextureView) -> Result<bool, SimulationError> {
        if !self.running.is_running() {
            return Ok(false);
        }

        if self.ctx.device_lost() {
            self.running.stop();
            return Err(SimulationError::DeviceLost);
        }

        self.pipeline.tick_into(target);
        Ok(true)
    }

    pub fn apply_simulation_params(&mut self, params: SimulationParams) {
        self.pipeline.apply_simulation_params(params);
    }

    pub fn apply_colorization_params(&mut self, params: ColorizationParams) {
        self.pipeline.apply_colorization_params(params);
    }

    pub fn reinitialize_agents(&mut self, num_agents: u32, start_radius: f32) {
        self.pipeline.reinitialize_agents(num_agents, start_radius);
    }

    pub fn set_agents(&mut self, agents: &[Agent]) {
        self.pipeline.set_agents(agents);
    }

    pub fn clear_field(&self) {
        self.pipeline.clear_field();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_stopped() {
        let flag = CancelFlag::new();
        assert!(!flag.is_running());
    }

    #[test]
    fn test_stop_before_start_is_safe() {
        let flag = CancelFlag::new();
        flag.stop();
        assert!(!flag.is_running());
        flag.start();
        assert!(flag.is_running());
    }

    #[test]
    fn test_double_stop_is_idempotent() {
        let flag = CancelFlag::new();
        flag.start();
        flag.stop();
        flag.stop();
        assert!(!flag.is_running());
    }

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        flag.start();
        assert!(handle.is_running());
        handle.stop();
        assert!(!flag.is_running());
    }
}
