//! Double-buffered trail field.
//!
//! The field is a pair of equally sized `Rgba8Unorm` textures. The write role
//! is a storage texture the compute stages deposit into; the read role is a
//! sampled copy of it. A storage texture cannot be read and written within one
//! dispatch, so after every stage that wrote, [`FieldState::resolve`] copies
//! write to read before the next stage samples.

/// Texture format shared by both field roles and the read-back target.
pub const FIELD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Ping-pong trail textures with fixed roles.
pub struct FieldState {
    width: u32,
    height: u32,
    write_texture: wgpu::Texture,
    read_texture: wgpu::Texture,
    write_view: wgpu::TextureView,
    read_view: wgpu::TextureView,
}

impl FieldState {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) -> Self {
        let write_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Field Write Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FIELD_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let read_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Field Read Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FIELD_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let write_view = write_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let read_view = read_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let field = Self {
            width,
            height,
            write_texture,
            read_texture,
            write_view,
            read_view,
        };
        field.clear(queue);
        field
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Storage-texture view the compute stages write into.
    pub fn write_view(&self) -> &wgpu::TextureView {
        &self.write_view
    }

    /// Sampled view holding the last resolved copy of the write image.
    pub fn read_view(&self) -> &wgpu::TextureView {
        &self.read_view
    }

    /// Reset both images to opaque black.
    pub fn clear(&self, queue: &wgpu::Queue) {
        let black = opaque_black(self.width, self.height);
        for texture in [&self.write_texture, &self.read_texture] {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &black,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.width * 4),
                    rows_per_image: Some(self.height),
                },
                wgpu::Extent3d {
                    width: self.width,
                    height: self.height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    /// Record the write-to-read copy.
    ///
    /// Must run after every stage that wrote and before the next stage reads;
    /// skipping it leaves the read image silently stale. Idempotent when no
    /// write intervened.
    pub fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.write_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &self.read_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// RGBA bytes for a field-sized opaque black image.
fn opaque_black(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    for alpha in pixels.iter_mut().skip(3).step_by(4) {
        *alpha = 255;
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_black_pattern() {
        let pixels = opaque_black(4, 3);
        assert_eq!(pixels.len(), 4 * 3 * 4);
        for px in pixels.chunks_exact(4) {
            assert_eq!(px, [0, 0, 0, 255]);
        }
    }
}
