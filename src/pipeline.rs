//! The four-stage simulation pipeline.
//!
//! Owns the parameter store, agent store, field and stage objects, and
//! records one frame as a single submission: update agents, fade, blur and
//! present, with a field resolve between every pair of stages.

use std::sync::Arc;

use crate::agents::{Agent, AgentStore};
use crate::error::{GpuError, PipelineError};
use crate::field::{FieldState, FIELD_FORMAT};
use crate::gpu::{BlurTrailStage, FadeTrailStage, GpuContext, PresentStage, UpdateAgentsStage};
use crate::params::{ColorizationParams, ParamStore, SimulationParams};

pub struct SlimePipeline {
    ctx: Arc<GpuContext>,
    params: ParamStore,
    agents: AgentStore,
    field: FieldState,
    update_agents: UpdateAgentsStage,
    fade_trail: FadeTrailStage,
    blur_trail: BlurTrailStage,
    present: PresentStage,
    // Present duplicated against an offscreen target for frame export.
    export_present: PresentStage,
    export_texture: wgpu::Texture,
    export_view: wgpu::TextureView,
}

impl SlimePipeline {
    /// Build every GPU resource for a field of the given size.
    ///
    /// Construction runs inside a validation error scope; shader or layout
    /// mistakes surface here as [`PipelineError::Validation`] instead of
    /// asynchronous uncaptured errors later.
    pub async fn new(
        ctx: Arc<GpuContext>,
        width: u32,
        height: u32,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, PipelineError> {
        let device = &ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let simulation = SimulationParams::default();
        let colorization = ColorizationParams::default();
        let params = ParamStore::new(device, width, height, simulation, colorization);

        let agents = AgentStore::new(device);
        agents.reinitialize(
            &ctx.queue,
            width,
            height,
            simulation.num_agents,
            simulation.start_radius,
        );

        let field = FieldState::new(device, &ctx.queue, width, height);

        let update_agents =
            UpdateAgentsStage::new(device, params.simulation_buffer(), agents.buffer(), &field);
        let fade_trail = FadeTrailStage::new(device, params.simulation_buffer(), &field);
        let blur_trail = BlurTrailStage::new(device, params.colorization_buffer(), &field);
        let present = PresentStage::new(device, &field, target_format);
        let export_present = PresentStage::new(device, &field, FIELD_FORMAT);

        let export_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Export Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FIELD_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let export_view = export_texture.create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(error) = device.pop_error_scope().await {
            return Err(PipelineError::Validation(error.to_string()));
        }

        Ok(Self {
            ctx,
            params,
            agents,
            field,
            update_agents,
            fade_trail,
            blur_trail,
            present,
            export_present,
            export_texture,
            export_view,
        })
    }

    pub fn field(&self) -> &FieldState {
        &self.field
    }

    pub fn simulation_params(&self) -> &SimulationParams {
        self.params.simulation()
    }

    pub fn colorization_params(&self) -> &ColorizationParams {
        self.params.colorization()
    }

    /// Replace the simulation parameters wholesale.
    ///
    /// Values are taken as given; the configuration boundary clamps them with
    /// [`SimulationParams::clamped`] before calling in.
    pub fn apply_simulation_params(&mut self, params: SimulationParams) {
        self.params.set_simulation(&self.ctx.queue, params);
    }

    /// Replace the colorization parameters wholesale.
    pub fn apply_colorization_params(&mut self, params: ColorizationParams) {
        self.params.set_colorization(&self.ctx.queue, params);
    }

    /// Respawn the agent population and wipe the field for a clean restart.
    pub fn reinitialize_agents(&mut self, num_agents: u32, start_radius: f32) {
        let mut simulation = *self.params.simulation();
        simulation.num_agents = num_agents;
        simulation.start_radius = start_radius;
        self.params.set_simulation(&self.ctx.queue, simulation);

        self.agents.reinitialize(
            &self.ctx.queue,
            self.field.width(),
            self.field.height(),
            num_agents,
            start_radius,
        );
        self.field.clear(&self.ctx.queue);
    }

    /// Upload explicit agents and make them the active population.
    pub fn set_agents(&mut self, agents: &[Agent]) {
        let mut simulation = *self.params.simulation();
        simulation.num_agents = agents.len() as u32;
        self.params.set_simulation(&self.ctx.queue, simulation);
        self.agents.set_agents(&self.ctx.queue, agents);
    }

    /// Reset both field images to opaque black.
    pub fn clear_field(&self) {
        self.field.clear(&self.ctx.queue);
    }

    /// Record the resolve copy so the read image catches up with writes.
    pub fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        self.field.resolve(encoder);
    }

    pub fn encode_update_agents(&self, encoder: &mut wgpu::CommandEncoder) {
        self.update_agents
            .encode(encoder, self.params.simulation().num_agents);
    }

    pub fn encode_fade_trail(&self, encoder: &mut wgpu::CommandEncoder) {
        self.fade_trail
            .encode(encoder, self.field.width(), self.field.height());
    }

    pub fn encode_blur_trail(&self, encoder: &mut wgpu::CommandEncoder) {
        self.blur_trail
            .encode(encoder, self.field.width(), self.field.height());
    }

    pub fn encode_present(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        self.present.encode(encoder, target);
    }

    /// Record a full frame into the given target and submit it as one unit.
    pub fn tick_into(&self, target: &wgpu::TextureView) {
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.encode_update_agents(&mut encoder);
        self.field.resolve(&mut encoder);
        self.encode_fade_trail(&mut encoder);
        self.field.resolve(&mut encoder);
        self.encode_blur_trail(&mut encoder);
        self.field.resolve(&mut encoder);
        self.encode_present(&mut encoder, target);

        self.ctx.queue.submit(Some(encoder.finish()));
    }

    /// Render the present stage offscreen and read the pixels back.
    ///
    /// Returns tightly packed RGBA bytes, row padding stripped.
    pub fn read_back_frame(&self) -> Result<Vec<u8>, GpuError> {
        let width = self.field.width();
        let height = self.field.height();
        let padded_row = padded_bytes_per_row(width);

        let staging = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Export Staging Buffer"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Export Encoder"),
            });
        self.export_present.encode(&mut encoder, &self.export_view);
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.export_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.ctx
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;
        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for row in mapped.chunks_exact(padded_row as usize) {
            pixels.extend_from_slice(&row[..(width * 4) as usize]);
        }
        drop(mapped);
        staging.unmap();

        Ok(pixels)
    }
}

/// Rows in a texture-to-buffer copy are padded to 256 bytes.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(63), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(800), 3328);
        assert_eq!(padded_bytes_per_row(1024), 4096);
    }
}
