//! GPU-side surfaces whose size follows the canvas or the video.
//!
//! Every object here is released explicitly with `destroy` before it is
//! replaced; dropping alone would leave the memory to wgpu's deferred
//! cleanup.

use super::aspect::TexRange;
use crate::frame::{QuadVertex, VideoFrame};
use tracing::debug;
use wgpu::util::DeviceExt;

/// An offscreen color attachment that later passes can sample.
pub struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn destroy(self) {
        self.texture.destroy();
    }
}

/// The ping-pong pair, sized to the canvas.
pub struct TargetPair {
    targets: [RenderTarget; 2],
}

impl TargetPair {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        debug!("Creating render targets {}x{}", width, height);
        Self {
            targets: [
                RenderTarget::new(device, width, height, format, "Render Target A"),
                RenderTarget::new(device, width, height, format, "Render Target B"),
            ],
        }
    }

    pub fn view(&self, slot: usize) -> &wgpu::TextureView {
        self.targets[slot].view()
    }

    pub fn destroy(self) {
        let [a, b] = self.targets;
        a.destroy();
        b.destroy();
    }
}

/// Texture the current video frame is uploaded into. Uses the sRGB view of
/// the bytes when the targets are sRGB, so sampling and storing cancel out.
pub struct VideoTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl VideoTexture {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, srgb: bool) -> Self {
        debug!("Creating video texture {}x{}", width, height);
        let format = if srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Video Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn matches(&self, frame: &VideoFrame) -> bool {
        self.width == frame.width && self.height == frame.height
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Copies an RGBA frame of matching size into the texture.
    pub fn upload(&self, queue: &wgpu::Queue, frame: &VideoFrame) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn destroy(self) {
        self.texture.destroy();
    }
}

/// Creates a quad vertex buffer sampling `range`.
pub fn quad_buffer(device: &wgpu::Device, range: TexRange, label: &str) -> wgpu::Buffer {
    let vertices = QuadVertex::quad(range);
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    })
}
