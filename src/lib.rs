//! GPU-resident slime mold simulation.
//!
//! Point agents deposit trail intensity onto a double-buffered 2D field; each
//! frame the field decays, is optionally blurred, is colorized and is drawn
//! as a fullscreen quad. All simulation state lives on the GPU; the CPU only
//! records the fixed four-stage command chain and uploads parameter changes.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use physarum::prelude::*;
//!
//! let ctx = Arc::new(pollster::block_on(GpuContext::headless())?);
//! let mut scheduler = pollster::block_on(initialize_pipeline(
//!     ctx,
//!     800,
//!     600,
//!     wgpu::TextureFormat::Rgba8Unorm,
//! ))?;
//! scheduler.start();
//! // call scheduler.tick(&target_view) once per frame
//! ```

pub mod agents;
pub mod error;
pub mod field;
pub mod gpu;
pub mod params;
pub mod pipeline;
pub mod scheduler;

pub mod prelude {
    pub use crate::agents::{Agent, AgentStore};
    pub use crate::error::{GpuError, PipelineError, SimulationError};
    pub use crate::field::FieldState;
    pub use crate::gpu::GpuContext;
    pub use crate::params::{ColorizationParams, SimulationParams, MAX_AGENTS};
    pub use crate::pipeline::SlimePipeline;
    pub use crate::scheduler::{initialize_pipeline, FrameScheduler};
}
