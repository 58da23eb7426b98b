//! Window surface that presents the effect chain.

use crate::driver::FrameRenderer;
use crate::error::SetupError;
use crate::frame::VideoFrame;
use crate::render::{EffectDraw, FrameGlobals, GpuContext, RenderGraph};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;
use winit::window::Window;

pub struct WindowCanvas {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    config: wgpu::SurfaceConfiguration,
    graph: RenderGraph,
}

impl WindowCanvas {
    /// Opens a device for `window`, configures its surface and builds the
    /// render graph. Fails if any program does not compile.
    pub fn new(window: Arc<Window>) -> Result<Self, SetupError> {
        let (gpu, surface) = GpuContext::for_window(window.clone())?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| SetupError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);
        info!("Surface {}x{} ({:?})", config.width, config.height, format);

        let graph = RenderGraph::new(
            gpu.device.clone(),
            gpu.queue.clone(),
            format,
            config.width,
            config.height,
        )?;

        Ok(Self {
            window,
            surface,
            device: gpu.device,
            config,
            graph,
        })
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
        self.graph.resize(size.width, size.height);
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl FrameRenderer for WindowCanvas {
    fn render(&mut self, frame: &VideoFrame, draws: &[EffectDraw], globals: FrameGlobals) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("Surface out of date, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                self.surface.get_current_texture()?
            }
            Err(e) => return Err(e.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.window.pre_present_notify();
        self.graph.render(&view, frame, draws, globals)?;
        output.present();
        Ok(())
    }

    fn release(&mut self) {
        self.graph.release();
        if let Err(e) = self
            .device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None }) {
            warn!("Device poll after release failed: {}", e);
        }
    }
}
