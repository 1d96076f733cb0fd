//! GPU device acquisition and the four pipeline stages.

mod blur_trail;
mod fade_trail;
mod present;
mod update_agents;

pub use blur_trail::BlurTrailStage;
pub use fade_trail::FadeTrailStage;
pub use present::PresentStage;
pub use update_agents::UpdateAgentsStage;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::GpuError;

/// Workgroup size for the per-agent compute stage.
pub const AGENT_WORKGROUP_SIZE: u32 = 64;
/// Workgroup edge length for the per-pixel compute stages.
pub const PIXEL_WORKGROUP_SIZE: u32 = 16;

/// Adapter, device and queue, plus device-loss monitoring.
///
/// Uncaptured validation errors are logged and the loop keeps running; device
/// loss sets a flag the scheduler polls so it can stop cleanly instead of
/// submitting into a dead device.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    device_lost: Arc<AtomicBool>,
}

impl GpuContext {
    /// Acquire a device compatible with the given surface.
    pub async fn new(
        instance: &wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await?;

        log::info!("using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let device_lost = Arc::new(AtomicBool::new(false));

        let lost = device_lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("device lost ({reason:?}): {message}");
            lost.store(true, Ordering::SeqCst);
        });

        device.on_uncaptured_error(Box::new(|error| {
            log::error!("uncaptured GPU error: {error}");
        }));

        Ok(Self {
            adapter,
            device,
            queue,
            device_lost,
        })
    }

    /// Acquire a device with no surface, for off-screen use.
    pub async fn headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        Self::new(&instance, None).await
    }

    /// Whether the device has been reported lost.
    pub fn device_lost(&self) -> bool {
        self.device_lost.load(Ordering::SeqCst)
    }
}
