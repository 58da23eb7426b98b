//! Video frame types.

use crate::render::aspect::TexRange;
use bytemuck::{Pod, Zeroable};

/// Supported pixel formats for video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// RGB with 8 bits per channel (24 bits per pixel)
    Rgb,
    /// RGBA with 8 bits per channel (32 bits per pixel)
    Rgba,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// A video frame containing image data.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format of the frame data
    pub format: PixelFormat,
    /// Presentation time in microseconds (if available)
    pub timestamp_us: Option<u64>,
    /// Raw pixel data
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Creates a black frame with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let size = (width as usize) * (height as usize) * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            timestamp_us: None,
            data: vec![0; size],
        }
    }

    /// Creates a video frame from existing data.
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            timestamp_us: None,
            data,
        }
    }

    pub fn with_timestamp_us(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = Some(timestamp_us);
        self
    }

    /// Whether `data` holds exactly one frame's worth of pixels.
    pub fn is_complete(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * self.format.bytes_per_pixel()
    }

    /// Converts this frame to RGBA format.
    pub fn to_rgba(&self) -> VideoFrame {
        if self.format == PixelFormat::Rgba {
            return self.clone();
        }

        let pixel_count = (self.width as usize) * (self.height as usize);
        let mut rgba_data = Vec::with_capacity(pixel_count * 4);
        for rgb in self.data.chunks_exact(3).take(pixel_count) {
            rgba_data.extend_from_slice(rgb);
            rgba_data.push(255);
        }

        VideoFrame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgba,
            timestamp_us: self.timestamp_us,
            data: rgba_data,
        }
    }
}

/// Vertex for rendering a full-screen quad.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl QuadVertex {
    /// Indices for the quad (two triangles).
    pub const INDICES: &'static [u16] = &[0, 1, 2, 2, 3, 0];

    /// Full-screen quad sampling `range`. Texture row 0 is the top edge.
    pub fn quad(range: TexRange) -> [QuadVertex; 4] {
        [
            QuadVertex { position: [-1.0, -1.0], tex_coords: [range.u0, range.v1] },
            QuadVertex { position: [1.0, -1.0], tex_coords: [range.u1, range.v1] },
            QuadVertex { position: [1.0, 1.0], tex_coords: [range.u1, range.v0] },
            QuadVertex { position: [-1.0, 1.0], tex_coords: [range.u0, range.v0] },
        ]
    }

    /// Returns the vertex buffer layout.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_rgba_conversion() {
        let rgb_data = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
        let frame = VideoFrame::from_data(2, 2, PixelFormat::Rgb, rgb_data);
        let rgba_frame = frame.to_rgba();

        assert_eq!(rgba_frame.format, PixelFormat::Rgba);
        assert_eq!(rgba_frame.data.len(), 16);
        // Check first pixel (red)
        assert_eq!(&rgba_frame.data[0..4], &[255, 0, 0, 255]);
        // Check second pixel (green)
        assert_eq!(&rgba_frame.data[4..8], &[0, 255, 0, 255]);
        assert!(rgba_frame.is_complete());
    }

    #[test]
    fn full_quad_maps_corners() {
        let quad = QuadVertex::quad(TexRange::FULL);
        assert_eq!(quad[0].tex_coords, [0.0, 1.0]);
        assert_eq!(quad[2].tex_coords, [1.0, 0.0]);
    }

    #[test]
    fn cropped_quad_uses_range() {
        let range = TexRange { u0: 0.25, u1: 0.75, v0: 0.0, v1: 1.0 };
        let quad = QuadVertex::quad(range);
        assert_eq!(quad[3].tex_coords, [0.25, 0.0]);
        assert_eq!(quad[1].tex_coords, [0.75, 1.0]);
    }

    #[test]
    fn short_buffers_are_incomplete() {
        let frame = VideoFrame::from_data(4, 4, PixelFormat::Rgba, vec![0; 10]);
        assert!(!frame.is_complete());
        assert!(VideoFrame::new(4, 4, PixelFormat::Rgb).is_complete());
    }
}
