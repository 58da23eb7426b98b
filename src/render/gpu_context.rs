//! wgpu device bootstrap for a window surface.

use crate::error::SetupError;
use std::sync::Arc;
use tracing::info;
use winit::window::Window;

/// Device and queue shared by the render graph and the window surface.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
}

impl GpuContext {
    /// Opens a device able to present to `window` and returns it together
    /// with the window's surface.
    pub fn for_window(window: Arc<Window>) -> Result<(Self, wgpu::Surface<'static>), SetupError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| SetupError::Surface(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| SetupError::NoAdapter(e.to_string()))?;

        let adapter_info = adapter.get_info();
        info!("Using GPU adapter {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("ShaderDeck Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))
        .map_err(|e| SetupError::Device(e.to_string()))?;

        Ok((
            Self {
                device,
                queue,
                instance,
                adapter,
            },
            surface,
        ))
    }
}
