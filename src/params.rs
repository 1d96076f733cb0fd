//! Simulation and colorization parameters.
//!
//! Parameters are edited in user-facing units (degrees, 0-255 color channels)
//! and serialized to GPU-facing uniform structs in one transactional
//! `write_buffer` per change. Range clamping happens at the edit boundary via
//! [`SimulationParams::clamped`]; the pipeline itself never validates.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

/// Hard ceiling on the agent buffer, above the largest selectable count.
///
/// The buffer is allocated at this capacity once and never resized, so bind
/// groups survive live agent-count changes.
pub const MAX_AGENTS: u32 = 65_536;

/// Selectable agent count range (UI step: 10 000).
pub const NUM_AGENTS_RANGE: (u32, u32) = (1_000, 60_000);
/// Spawn radius range in pixels (UI step: 50).
pub const START_RADIUS_RANGE: (f32, f32) = (50.0, 250.0);
/// Deposit disc radius range in pixels (UI step: 1).
pub const AGENT_RADIUS_RANGE: (f32, f32) = (0.5, 1.5);
/// Per-frame step length range (UI step: 0.25).
pub const STEP_SIZE_RANGE: (f32, f32) = (0.0, 1.5);
/// Trail decay range (UI step: 0.005).
pub const DECAY_RANGE: (f32, f32) = (0.005, 0.02);
/// Sensor offset range in pixels (UI step: 2).
pub const SENSOR_OFFSET_RANGE: (f32, f32) = (0.0, 20.0);
/// Sensor angle range in degrees (UI step: 5).
pub const SENSOR_ANGLE_RANGE: (f32, f32) = (5.0, 180.0);
/// Rotation angle range in degrees (UI step: 5).
pub const ROTATION_ANGLE_RANGE: (f32, f32) = (5.0, 180.0);

/// Core simulation parameters, in edit-side units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationParams {
    /// Number of active agents (prefix of the fixed-capacity buffer).
    pub num_agents: u32,
    /// Agents spawn within this distance of the field center.
    pub start_radius: f32,
    /// Radius of the deposit disc, in pixels.
    pub agent_radius: f32,
    /// Distance an agent advances per frame, scaled by direction magnitude.
    pub step_size: f32,
    /// Per-frame multiplicative trail decay: intensity *= (1 - decay).
    pub decay: f32,
    /// Distance of the three sensors ahead of the agent, in pixels.
    pub sensor_offset: f32,
    /// Angle between the center sensor and each side sensor, in degrees.
    pub sensor_angle_deg: f32,
    /// Angle an agent turns toward a winning side sensor, in degrees.
    pub rotation_angle_deg: f32,
    /// Diffuse kernel width. Reserved, always 0.
    pub diffuse_width: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            num_agents: 20_000,
            start_radius: 100.0,
            agent_radius: 1.5,
            step_size: 0.75,
            decay: 0.005,
            sensor_offset: 8.0,
            sensor_angle_deg: 45.0,
            rotation_angle_deg: 45.0,
            diffuse_width: 0.0,
        }
    }
}

impl SimulationParams {
    /// Return a copy with every field clamped to its declared range.
    ///
    /// Intended for the configuration boundary; the pipeline accepts whatever
    /// it is handed.
    pub fn clamped(self) -> Self {
        Self {
            num_agents: self
                .num_agents
                .clamp(NUM_AGENTS_RANGE.0, NUM_AGENTS_RANGE.1),
            start_radius: self
                .start_radius
                .clamp(START_RADIUS_RANGE.0, START_RADIUS_RANGE.1),
            agent_radius: self
                .agent_radius
                .clamp(AGENT_RADIUS_RANGE.0, AGENT_RADIUS_RANGE.1),
            step_size: self.step_size.clamp(STEP_SIZE_RANGE.0, STEP_SIZE_RANGE.1),
            decay: self.decay.clamp(DECAY_RANGE.0, DECAY_RANGE.1),
            sensor_offset: self
                .sensor_offset
                .clamp(SENSOR_OFFSET_RANGE.0, SENSOR_OFFSET_RANGE.1),
            sensor_angle_deg: self
                .sensor_angle_deg
                .clamp(SENSOR_ANGLE_RANGE.0, SENSOR_ANGLE_RANGE.1),
            rotation_angle_deg: self
                .rotation_angle_deg
                .clamp(ROTATION_ANGLE_RANGE.0, ROTATION_ANGLE_RANGE.1),
            diffuse_width: self.diffuse_width,
        }
    }

    /// Serialize for the GPU. Angles become radians here.
    fn to_gpu(self, field_width: u32, field_height: u32) -> SimParamsGpu {
        SimParamsGpu {
            resolution: [field_width as f32, field_height as f32],
            agent_radius: self.agent_radius,
            step_size: self.step_size,
            decay: self.decay,
            sensor_offset: self.sensor_offset,
            sensor_angle: self.sensor_angle_deg.to_radians(),
            rotation_angle: self.rotation_angle_deg.to_radians(),
            diffuse_width: self.diffuse_width,
            num_agents: self.num_agents,
            _pad: [0; 2],
        }
    }
}

/// GPU layout of [`SimulationParams`]. Must match `SimParams` in the stage
/// shaders.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SimParamsGpu {
    resolution: [f32; 2],
    agent_radius: f32,
    step_size: f32,
    decay: f32,
    sensor_offset: f32,
    sensor_angle: f32,
    rotation_angle: f32,
    diffuse_width: f32,
    num_agents: u32,
    _pad: [u32; 2],
}

/// Colorization parameters, in edit-side units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorizationParams {
    /// Box-average the trail over the immediate neighborhood.
    pub blur_trail: bool,
    /// Modulate output by a gradient-derived shading term.
    pub enable_lighting: bool,
    /// Trail tint on a 0-255 scale, normalized before upload.
    pub slime_color: [u8; 3],
}

impl Default for ColorizationParams {
    fn default() -> Self {
        Self {
            blur_trail: false,
            enable_lighting: true,
            slime_color: [255, 0, 0],
        }
    }
}

impl ColorizationParams {
    fn to_gpu(self) -> ColorParamsGpu {
        ColorParamsGpu {
            blur_trail: self.blur_trail as u32,
            enable_lighting: self.enable_lighting as u32,
            _pad0: [0; 2],
            slime_color: [
                self.slime_color[0] as f32 / 255.0,
                self.slime_color[1] as f32 / 255.0,
                self.slime_color[2] as f32 / 255.0,
            ],
            _pad1: 0.0,
        }
    }
}

/// GPU layout of [`ColorizationParams`]. The color sits at offset 16 so the
/// WGSL `vec3<f32>` member lands on its natural 16-byte alignment.
#[repr(C)]
#[derive(Copy, Clone, Default, Pod, Zeroable)]
struct ColorParamsGpu {
    blur_trail: u32,
    enable_lighting: u32,
    _pad0: [u32; 2],
    slime_color: [f32; 3],
    _pad1: f32,
}

/// Owns the current parameter values and their uniform buffers.
pub struct ParamStore {
    simulation: SimulationParams,
    colorization: ColorizationParams,
    field_width: u32,
    field_height: u32,
    simulation_buffer: wgpu::Buffer,
    colorization_buffer: wgpu::Buffer,
}

impl ParamStore {
    pub fn new(
        device: &wgpu::Device,
        field_width: u32,
        field_height: u32,
        simulation: SimulationParams,
        colorization: ColorizationParams,
    ) -> Self {
        let simulation_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Simulation Params Buffer"),
            contents: bytemuck::bytes_of(&simulation.to_gpu(field_width, field_height)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let colorization_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Colorization Params Buffer"),
            contents: bytemuck::bytes_of(&colorization.to_gpu()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            simulation,
            colorization,
            field_width,
            field_height,
            simulation_buffer,
            colorization_buffer,
        }
    }

    pub fn simulation(&self) -> &SimulationParams {
        &self.simulation
    }

    pub fn colorization(&self) -> &ColorizationParams {
        &self.colorization
    }

    pub fn simulation_buffer(&self) -> &wgpu::Buffer {
        &self.simulation_buffer
    }

    pub fn colorization_buffer(&self) -> &wgpu::Buffer {
        &self.colorization_buffer
    }

    /// Replace the simulation parameters and upload the whole struct at once.
    pub fn set_simulation(&mut self, queue: &wgpu::Queue, params: SimulationParams) {
        self.simulation = params;
        queue.write_buffer(
            &self.simulation_buffer,
            0,
            bytemuck::bytes_of(&params.to_gpu(self.field_width, self.field_height)),
        );
    }

    /// Replace the colorization parameters and upload the whole struct at once.
    pub fn set_colorization(&mut self, queue: &wgpu::Queue, params: ColorizationParams) {
        self.colorization = params;
        queue.write_buffer(
            &self.colorization_buffer,
            0,
            bytemuck::bytes_of(&params.to_gpu()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_defaults() {
        let p = SimulationParams::default();
        assert_eq!(p.num_agents, 20_000);
        assert_eq!(p.start_radius, 100.0);
        assert_eq!(p.agent_radius, 1.5);
        assert_eq!(p.step_size, 0.75);
        assert_eq!(p.decay, 0.005);
        assert_eq!(p.sensor_offset, 8.0);
        assert_eq!(p.sensor_angle_deg, 45.0);
        assert_eq!(p.rotation_angle_deg, 45.0);
        assert_eq!(p.diffuse_width, 0.0);
    }

    #[test]
    fn test_colorization_defaults() {
        let p = ColorizationParams::default();
        assert!(!p.blur_trail);
        assert!(p.enable_lighting);
        assert_eq!(p.slime_color, [255, 0, 0]);
    }

    #[test]
    fn test_defaults_already_in_range() {
        let p = SimulationParams::default();
        assert_eq!(p.clamped(), p);
    }

    #[test]
    fn test_clamping() {
        let p = SimulationParams {
            num_agents: 1_000_000,
            start_radius: 0.0,
            agent_radius: 99.0,
            step_size: -1.0,
            decay: 1.0,
            sensor_offset: 300.0,
            sensor_angle_deg: 0.0,
            rotation_angle_deg: 720.0,
            diffuse_width: 0.0,
        }
        .clamped();

        assert_eq!(p.num_agents, 60_000);
        assert_eq!(p.start_radius, 50.0);
        assert_eq!(p.agent_radius, 1.5);
        assert_eq!(p.step_size, 0.0);
        assert_eq!(p.decay, 0.02);
        assert_eq!(p.sensor_offset, 20.0);
        assert_eq!(p.sensor_angle_deg, 5.0);
        assert_eq!(p.rotation_angle_deg, 180.0);
    }

    #[test]
    fn test_gpu_layout_sizes() {
        // WGSL mirrors depend on these exact sizes.
        assert_eq!(std::mem::size_of::<SimParamsGpu>(), 48);
        assert_eq!(std::mem::size_of::<ColorParamsGpu>(), 32);
    }

    #[test]
    fn test_angles_serialized_as_radians() {
        let gpu = SimulationParams::default().to_gpu(800, 600);
        assert_eq!(gpu.resolution, [800.0, 600.0]);
        assert!((gpu.sensor_angle - 45.0_f32.to_radians()).abs() < 1e-6);
        assert!((gpu.rotation_angle - 45.0_f32.to_radians()).abs() < 1e-6);
        assert_eq!(gpu.num_agents, 20_000);
    }

    #[test]
    fn test_color_normalized_at_offset_16() {
        let gpu = ColorizationParams {
            blur_trail: true,
            enable_lighting: false,
            slime_color: [255, 0, 51],
        }
        .to_gpu();

        assert_eq!(gpu.blur_trail, 1);
        assert_eq!(gpu.enable_lighting, 0);
        assert_eq!(bytemuck::offset_of!(ColorParamsGpu, slime_color), 16);
        assert!((gpu.slime_color[0] - 1.0).abs() < 1e-6);
        assert!((gpu.slime_color[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_capacity_exceeds_selectable_range() {
        assert!(MAX_AGENTS > NUM_AGENTS_RANGE.1);
    }
}
