//! wgpu executor for per-frame pass plans.

use super::aspect::{cover_tex_range, TexRange};
use super::params::{ParameterBridge, Uniform};
use super::plan::{plan_passes, PassSource, PassTarget};
use super::program::{
    compile_program, dynamic_uniforms, EffectUniforms, FRAGMENT_ENTRY, VERTEX_SHADER,
};
use super::targets::{quad_buffer, TargetPair, VideoTexture};
use super::{EffectDraw, FrameGlobals, ProgramId};
use crate::effects::EffectId;
use crate::error::SetupError;
use crate::frame::{PixelFormat, QuadVertex, VideoFrame};
use anyhow::{anyhow, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

/// A linked pipeline plus the uniform buffer its bind groups point at.
struct CompiledProgram {
    id: ProgramId,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
}

/// Compiled programs, render targets and geometry for the effect chain.
pub struct RenderGraph {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    video_program: CompiledProgram,
    passthrough_program: CompiledProgram,
    effect_programs: Vec<CompiledProgram>,
    quad_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    target_format: wgpu::TextureFormat,

    // Resources that follow the canvas or video size.
    canvas: (u32, u32),
    targets: Option<TargetPair>,
    video: Option<VideoTexture>,
    aspect_buffer: Option<wgpu::Buffer>,
    bind_groups: HashMap<(ProgramId, PassSource), wgpu::BindGroup>,

    bridge: ParameterBridge,
    released: bool,
}

impl RenderGraph {
    /// Compiles every program up front. Any compile or link failure aborts
    /// construction.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, SetupError> {
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Quad Vertex Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(VERTEX_SHADER)),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Effect Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Effect Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let link = |id: ProgramId| -> Result<CompiledProgram, SetupError> {
            let wgsl = compile_program(id)?;
            let label = id.to_string();
            let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(wgsl)),
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some("vs_main"),
                    buffers: &[QuadVertex::layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some(FRAGMENT_ENTRY),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Uniforms", label)),
                contents: bytemuck::cast_slice(&[EffectUniforms::default()]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

            debug!("Linked program {}", label);
            Ok(CompiledProgram {
                id,
                pipeline,
                uniform_buffer,
            })
        };

        let video_program = link(ProgramId::VideoSample)?;
        let passthrough_program = link(ProgramId::Passthrough)?;
        let effect_programs = EffectId::ALL
            .into_iter()
            .map(|id| link(ProgramId::Effect(id)))
            .collect::<Result<Vec<_>, _>>()?;
        info!("Compiled {} effect programs", effect_programs.len());

        let quad_buffer = quad_buffer(&device, TexRange::FULL, "Quad Vertex Buffer");
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(QuadVertex::INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Effect Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut graph = Self {
            device,
            queue,
            bind_group_layout,
            sampler,
            video_program,
            passthrough_program,
            effect_programs,
            quad_buffer,
            index_buffer,
            target_format,
            canvas: (0, 0),
            targets: None,
            video: None,
            aspect_buffer: None,
            bind_groups: HashMap::new(),
            bridge: ParameterBridge::new(),
            released: false,
        };
        graph.resize(width, height);
        Ok(graph)
    }

    /// Recreates the render targets and aspect buffer for a new canvas size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.released || (width, height) == self.canvas || width == 0 || height == 0 {
            return;
        }
        info!("Resizing render targets to {}x{}", width, height);
        self.canvas = (width, height);

        if let Some(old) = self.targets.take() {
            old.destroy();
        }
        self.targets = Some(TargetPair::new(&self.device, width, height, self.target_format));
        self.bind_groups
            .retain(|(_, source), _| *source == PassSource::Video);
        self.rebuild_aspect_buffer();
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    /// Uploads `frame` and draws it through `draws` onto `screen`.
    pub fn render(
        &mut self,
        screen: &wgpu::TextureView,
        frame: &VideoFrame,
        draws: &[EffectDraw],
        globals: FrameGlobals,
    ) -> Result<()> {
        if self.released {
            return Err(anyhow!("render graph used after release"));
        }

        let rgba = match frame.format {
            PixelFormat::Rgba => Cow::Borrowed(frame),
            PixelFormat::Rgb => Cow::Owned(frame.to_rgba()),
        };
        if !rgba.is_complete() {
            return Err(anyhow!(
                "frame data does not match {}x{}",
                rgba.width,
                rgba.height
            ));
        }
        self.ensure_video_texture(&rgba);
        if let Some(video) = &self.video {
            video.upload(&self.queue, &rgba);
        }

        let passes = plan_passes(draws);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Effect Chain Encoder"),
            });

        for (i, pass) in passes.iter().enumerate() {
            self.upload_uniforms(pass.program, globals, pass.intensity);
            self.ensure_bind_group(pass.program, pass.source)?;

            let target_view = match pass.target {
                PassTarget::Screen => screen,
                PassTarget::Target(slot) => self
                    .targets
                    .as_ref()
                    .ok_or_else(|| anyhow!("render targets missing"))?
                    .view(slot),
            };
            let vertex_buffer = match pass.source {
                PassSource::Video => self
                    .aspect_buffer
                    .as_ref()
                    .ok_or_else(|| anyhow!("aspect buffer missing"))?,
                PassSource::Target(_) => &self.quad_buffer,
            };
            let bind_group = self
                .bind_groups
                .get(&(pass.program, pass.source))
                .ok_or_else(|| anyhow!("bind group missing for {}", pass.program))?;

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&format!("Pass {} ({})", i, pass.program)),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(&self.program(pass.program).pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..6, 0, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Releases every GPU object owned by the graph. Later calls to
    /// [`Self::render`] fail.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        info!("Releasing render graph resources");
        self.released = true;
        self.bind_groups.clear();
        if let Some(targets) = self.targets.take() {
            targets.destroy();
        }
        if let Some(video) = self.video.take() {
            video.destroy();
        }
        if let Some(buffer) = self.aspect_buffer.take() {
            buffer.destroy();
        }
        self.quad_buffer.destroy();
        self.index_buffer.destroy();
        for program in self.all_programs() {
            program.uniform_buffer.destroy();
        }
        self.bridge.reset();
    }

    fn all_programs(&self) -> impl Iterator<Item = &CompiledProgram> {
        [&self.video_program, &self.passthrough_program]
            .into_iter()
            .chain(self.effect_programs.iter())
    }

    fn program(&self, id: ProgramId) -> &CompiledProgram {
        match id {
            ProgramId::VideoSample => &self.video_program,
            ProgramId::Passthrough => &self.passthrough_program,
            ProgramId::Effect(effect) => &self.effect_programs[effect.index()],
        }
    }

    fn ensure_video_texture(&mut self, frame: &VideoFrame) {
        if self.video.as_ref().is_some_and(|v| v.matches(frame)) {
            return;
        }
        info!("Video size is now {}x{}", frame.width, frame.height);
        if let Some(old) = self.video.take() {
            old.destroy();
        }
        self.video = Some(VideoTexture::new(
            &self.device,
            frame.width,
            frame.height,
            self.target_format.is_srgb(),
        ));
        self.bind_groups
            .retain(|(_, source), _| *source != PassSource::Video);
        self.rebuild_aspect_buffer();
    }

    fn rebuild_aspect_buffer(&mut self) {
        let video_size = self
            .video
            .as_ref()
            .map(|v| (v.width, v.height))
            .unwrap_or(self.canvas);
        let range = cover_tex_range(video_size, self.canvas);
        debug!("Aspect sample window {:?}", range);

        if let Some(old) = self.aspect_buffer.take() {
            old.destroy();
        }
        self.aspect_buffer = Some(quad_buffer(&self.device, range, "Aspect Vertex Buffer"));
    }

    fn upload_uniforms(&mut self, id: ProgramId, globals: FrameGlobals, intensity: Option<f32>) {
        let values: Vec<_> = dynamic_uniforms(id)
            .iter()
            .map(|&uniform| {
                let value = match uniform {
                    Uniform::Time => globals.time,
                    Uniform::Tempo => globals.bpm,
                    Uniform::Intensity => intensity.unwrap_or(1.0),
                };
                (uniform, value)
            })
            .collect();

        // Every pass binds, including those without dynamic uniforms.
        let writes = self.bridge.stage(id, &values);
        if writes.is_empty() {
            return;
        }
        let buffer = &self.program(id).uniform_buffer;
        for write in writes {
            self.queue.write_buffer(
                buffer,
                write.uniform.offset(),
                bytemuck::bytes_of(&write.value),
            );
        }
    }

    fn ensure_bind_group(&mut self, id: ProgramId, source: PassSource) -> Result<()> {
        if self.bind_groups.contains_key(&(id, source)) {
            return Ok(());
        }

        let view = match source {
            PassSource::Video => self
                .video
                .as_ref()
                .ok_or_else(|| anyhow!("video texture missing"))?
                .view(),
            PassSource::Target(slot) => self
                .targets
                .as_ref()
                .ok_or_else(|| anyhow!("render targets missing"))?
                .view(slot),
        };

        let program = self.program(id);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Bind Group", program.id)),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: program.uniform_buffer.as_entire_binding(),
                },
            ],
        });
        self.bind_groups.insert((id, source), bind_group);
        Ok(())
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        self.release();
    }
}
