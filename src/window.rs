use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use physarum::error::SimulationError;
use physarum::gpu::GpuContext;
use physarum::scheduler::{initialize_pipeline, FrameScheduler};

struct AppState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    ctx: Arc<GpuContext>,
    scheduler: FrameScheduler,
}

impl AppState {
    async fn new(window: Arc<Window>) -> Result<Self, SimulationError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;
        let ctx = Arc::new(GpuContext::new(&instance, Some(&surface)).await?);

        let surface_caps = surface.get_capabilities(&ctx.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&ctx.device, &config);

        let scheduler =
            initialize_pipeline(ctx.clone(), size.width, size.height, surface_format).await?;
        scheduler.start();

        Ok(Self {
            surface,
            config,
            ctx,
            scheduler,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.ctx.device, &self.config);
        }
    }

    fn save_frame(&self) {
        let pipeline = self.scheduler.pipeline();
        let (width, height) = (pipeline.field().width(), pipeline.field().height());
        match pipeline.read_back_frame() {
            Ok(pixels) => match image::RgbaImage::from_raw(width, height, pixels) {
                Some(img) => match img.save("physarum.png") {
                    Ok(()) => log::info!("saved frame to physarum.png"),
                    Err(e) => log::error!("failed to save frame: {e}"),
                },
                None => log::error!("read-back returned a short pixel buffer"),
            },
            Err(e) => log::error!("frame read-back failed: {e}"),
        }
    }
}

pub struct App {
    window: Option<Arc<Window>>,
    state: Option<AppState>,
}

impl App {
    pub fn new() -> Self {
        Self {
            window: None,
            state: None,
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window_attrs = Window::default_attributes()
                .with_title("Physarum")
                .with_inner_size(winit::dpi::LogicalSize::new(800, 600));

            let window = match event_loop.create_window(window_attrs) {
                Ok(window) => Arc::new(window),
                Err(e) => {
                    log::error!("failed to create window: {e}");
                    event_loop.exit();
                    return;
                }
            };
            self.window = Some(window.clone());

            match pollster::block_on(AppState::new(window)) {
                Ok(state) => self.state = Some(state),
                Err(e) => {
                    log::error!("failed to initialize GPU state: {e}");
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(state) = &self.state {
                    state.scheduler.stop();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(state) = &mut self.state {
                    state.resize(physical_size);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let Some(state) = &mut self.state else {
                    return;
                };
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Space) => {
                        if state.scheduler.is_running() {
                            state.scheduler.stop();
                        } else {
                            state.scheduler.start();
                            if let Some(window) = &self.window {
                                window.request_redraw();
                            }
                        }
                    }
                    PhysicalKey::Code(KeyCode::KeyR) => {
                        let params = *state.scheduler.pipeline().simulation_params();
                        state
                            .scheduler
                            .reinitialize_agents(params.num_agents, params.start_radius);
                    }
                    PhysicalKey::Code(KeyCode::KeyC) => {
                        state.scheduler.clear_field();
                    }
                    PhysicalKey::Code(KeyCode::KeyS) => {
                        state.save_frame();
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };

                let output = match state.surface.get_current_texture() {
                    Ok(output) => output,
                    Err(wgpu::SurfaceError::Lost) => {
                        state.resize(winit::dpi::PhysicalSize {
                            width: state.config.width,
                            height: state.config.height,
                        });
                        return;
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        event_loop.exit();
                        return;
                    }
                    Err(e) => {
                        log::warn!("surface error: {e:?}");
                        return;
                    }
                };
                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());

                match state.scheduler.tick(&view) {
                    Ok(true) => {
                        output.present();
                        if let Some(window) = &self.window {
                            window.request_redraw();
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        log::error!("simulation stopped: {e}");
                        event_loop.exit();
                    }
                }
            }
            _ => {}
        }
    }
}
