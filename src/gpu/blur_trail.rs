//! Blur and colorization stage.
//!
//! Recovers trail intensity from the resolved field, optionally box-averages
//! it over the 3x3 neighborhood, applies a gradient-derived lighting term and
//! writes the slime-tinted result back into the write image.

use super::PIXEL_WORKGROUP_SIZE;
use crate::field::FieldState;

const SHADER: &str = r#"
struct ColorParams {
    blur_trail: u32,
    enable_lighting: u32,
    color: vec3<f32>,
}

@group(0) @binding(0)
var<uniform> params: ColorParams;
@group(0) @binding(1)
var field_read: texture_2d<f32>;
@group(0) @binding(2)
var field_write: texture_storage_2d<rgba8unorm, write>;

fn intensity(coord: vec2<i32>) -> f32 {
    let dims = vec2<i32>(textureDimensions(field_read));
    let clamped = clamp(coord, vec2<i32>(0, 0), dims - vec2<i32>(1, 1));
    let texel = textureLoad(field_read, clamped, 0);
    return max(texel.r, max(texel.g, texel.b));
}

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let dims = textureDimensions(field_read);
    if (id.x >= dims.x || id.y >= dims.y) {
        return;
    }

    let coord = vec2<i32>(id.xy);
    let center = intensity(coord);

    var value = center;
    if (params.blur_trail == 1u) {
        var sum = 0.0;
        for (var dy = -1; dy <= 1; dy++) {
            for (var dx = -1; dx <= 1; dx++) {
                sum += intensity(coord + vec2<i32>(dx, dy));
            }
        }
        value = sum / 9.0;
    }

    var shade = 1.0;
    if (params.enable_lighting == 1u) {
        let gx = intensity(coord + vec2<i32>(1, 0)) - center;
        let gy = intensity(coord + vec2<i32>(0, 1)) - center;
        let normal = normalize(vec3<f32>(-gx, -gy, 1.0));
        let light_dir = normalize(vec3<f32>(0.3, 0.3, 1.0));
        shade = clamp(dot(normal, light_dir), 0.0, 1.0);
    }

    textureStore(field_write, coord, vec4<f32>(params.color * value * shade, 1.0));
}
"#;

/// Compute pipeline and bindings for the blur/colorize pass.
pub struct BlurTrailStage {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
}

impl BlurTrailStage {
    pub fn new(
        device: &wgpu::Device,
        color_params_buffer: &wgpu::Buffer,
        field: &FieldState,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blur Trail Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blur Trail Bind Group Layout"),
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
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
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
            label: Some("Blur Trail Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: color_params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(field.read_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(field.write_view()),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blur Trail Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Blur Trail Pipeline"),
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

    /// Record one dispatch covering every pixel.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, width: u32, height: u32) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Blur Trail Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(
            width.div_ceil(PIXEL_WORKGROUP_SIZE),
            height.div_ceil(PIXEL_WORKGROUP_SIZE),
            1,
        );
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
