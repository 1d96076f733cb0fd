//! Agent update stage: sense, steer, move, deposit.

use super::AGENT_WORKGROUP_SIZE;
use crate::field::FieldState;

/// Per-agent compute shader.
///
/// Each agent samples the resolved field at three sensor points ahead of its
/// heading, turns toward the strongest reading (ties go straight), advances
/// along its direction scaled by the step size, wraps at the field boundary
/// and stamps a full-intensity disc into the write image.
const SHADER: &str = r#"
struct SimParams {
    resolution: vec2<f32>,
    agent_radius: f32,
    step_size: f32,
    decay: f32,
    sensor_offset: f32,
    sensor_angle: f32,
    rotation_angle: f32,
    diffuse_width: f32,
    num_agents: u32,
    _pad: vec2<u32>,
}

struct Agent {
    position: vec2<f32>,
    direction: vec2<f32>,
}

@group(0) @binding(0)
var<uniform> params: SimParams;
@group(0) @binding(1)
var<storage, read_write> agents: array<Agent>;
@group(0) @binding(2)
var field_read: texture_2d<f32>;
@group(0) @binding(3)
var field_write: texture_storage_2d<rgba8unorm, write>;

fn wrap(p: vec2<f32>) -> vec2<f32> {
    return p - params.resolution * floor(p / params.resolution);
}

fn sense(pos: vec2<f32>, angle: f32) -> f32 {
    let dir = vec2<f32>(cos(angle), sin(angle));
    let sample_pos = wrap(pos + dir * params.sensor_offset);
    let texel = textureLoad(field_read, vec2<i32>(sample_pos), 0);
    return max(texel.r, max(texel.g, texel.b));
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let idx = id.x;
    if (idx >= params.num_agents) {
        return;
    }

    var agent = agents[idx];
    let heading = atan2(agent.direction.y, agent.direction.x);

    let center = sense(agent.position, heading);
    let left = sense(agent.position, heading + params.sensor_angle);
    let right = sense(agent.position, heading - params.sensor_angle);

    // Straight wins all ties, including a left/right tie over center.
    var turn = 0.0;
    if (center < left || center < right) {
        if (left > right) {
            turn = params.rotation_angle;
        } else if (right > left) {
            turn = -params.rotation_angle;
        }
    }

    let cs = cos(turn);
    let sn = sin(turn);
    let direction = vec2<f32>(
        agent.direction.x * cs - agent.direction.y * sn,
        agent.direction.x * sn + agent.direction.y * cs,
    );

    let position = wrap(agent.position + direction * params.step_size);

    agent.position = position;
    agent.direction = direction;
    agents[idx] = agent;

    let radius = i32(ceil(params.agent_radius));
    for (var dy = -radius; dy <= radius; dy++) {
        for (var dx = -radius; dx <= radius; dx++) {
            let offset = vec2<f32>(f32(dx), f32(dy));
            if (length(offset) <= params.agent_radius) {
                let coord = vec2<i32>(wrap(position + offset));
                textureStore(field_write, coord, vec4<f32>(1.0, 1.0, 1.0, 1.0));
            }
        }
    }
}
"#;

/// Compute pipeline and bindings for the agent update.
pub struct UpdateAgentsStage {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
}

impl UpdateAgentsStage {
    pub fn new(
        device: &wgpu::Device,
        sim_params_buffer: &wgpu::Buffer,
        agent_buffer: &wgpu::Buffer,
        field: &FieldState,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Update Agents Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Update Agents Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Update Agents Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: sim_params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: agent_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(field.read_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(field.write_view()),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Update Agents Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Update Agents Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            bind_group,
        }
    }

    /// Record one dispatch over the active agent prefix.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, num_agents: u32) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Update Agents Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(num_agents.div_ceil(AGENT_WORKGROUP_SIZE), 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_validates() {
        let module = naga::front::wgsl::parse_str(SHADER).expect("shader should parse");
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .expect("shader should validate");
    }
}
