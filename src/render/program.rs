//! Program templating and shader compilation.
//!
//! Effect bodies are GLSL fragments slotted into a fixed program template.
//! naga translates the result to WGSL and validates it before any GPU object
//! exists, so a broken effect fails setup with the full source and the
//! compiler diagnostic.

use super::params::Uniform;
use super::ProgramId;
use crate::effects::Stage;
use crate::error::SetupError;
use bytemuck::{Pod, Zeroable};
use naga::front::glsl::{Frontend, Options};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::ShaderStage;

/// Vertex stage shared by every program.
pub const VERTEX_SHADER: &str = r#"
struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) tex_coords: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coords: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(in.position, 0.0, 1.0);
    out.tex_coords = in.tex_coords;
    return out;
}
"#;

/// Entry point naga gives translated GLSL fragment shaders.
pub const FRAGMENT_ENTRY: &str = "main";

const PROGRAM_HEADER: &str = r#"#version 450

layout(location = 0) in vec2 v_tex_coords;
layout(location = 0) out vec4 out_color;

layout(set = 0, binding = 0) uniform texture2D t_image;
layout(set = 0, binding = 1) uniform sampler s_image;
layout(set = 0, binding = 2) uniform EffectParams {
    float time;
    float bpm;
    float intensity;
    float padding;
} params;

vec4 sample_image(vec2 uv) {
    return texture(sampler2D(t_image, s_image), uv);
}
"#;

const COPY_MAIN: &str = r#"
void main() {
    out_color = sample_image(v_tex_coords);
}
"#;

const MAPPING_MAIN: &str = r#"
void main() {
    out_color = sample_image(map_coord(v_tex_coords));
}
"#;

const COLOR_MAIN: &str = r#"
void main() {
    out_color = map_color(sample_image(v_tex_coords), v_tex_coords);
}
"#;

/// CPU mirror of the `EffectParams` block.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct EffectUniforms {
    pub time: f32,
    pub bpm: f32,
    pub intensity: f32,
    pub padding: f32,
}

/// Uniforms a program reads that change from frame to frame.
pub fn dynamic_uniforms(program: ProgramId) -> &'static [Uniform] {
    match program {
        ProgramId::VideoSample | ProgramId::Passthrough => &[],
        ProgramId::Effect(id) if id.has_intensity() => {
            &[Uniform::Time, Uniform::Tempo, Uniform::Intensity]
        }
        ProgramId::Effect(_) => &[Uniform::Time, Uniform::Tempo],
    }
}

/// Full GLSL source of `program`.
pub fn program_source(program: ProgramId) -> String {
    match program {
        ProgramId::VideoSample | ProgramId::Passthrough => {
            format!("{}{}", PROGRAM_HEADER, COPY_MAIN)
        }
        ProgramId::Effect(id) => {
            let def = id.definition();
            let main = match def.stage {
                Stage::Mapping => MAPPING_MAIN,
                Stage::Color => COLOR_MAIN,
            };
            format!("{}{}{}", PROGRAM_HEADER, def.body, main)
        }
    }
}

/// Translates a GLSL fragment program to validated WGSL.
pub fn glsl_to_wgsl(program: &str, glsl: &str) -> Result<String, SetupError> {
    let mut frontend = Frontend::default();
    let options = Options::from(ShaderStage::Fragment);
    let module = frontend
        .parse(&options, glsl)
        .map_err(|e| SetupError::ShaderCompile {
            program: program.to_string(),
            code: glsl.to_string(),
            log: e.emit_to_string(glsl),
        })?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    let info = validator
        .validate(&module)
        .map_err(|e| SetupError::ShaderLink {
            program: program.to_string(),
            code: glsl.to_string(),
            log: e.emit_to_string(glsl),
        })?;

    naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty()).map_err(
        |e| SetupError::ShaderLink {
            program: program.to_string(),
            code: glsl.to_string(),
            log: e.to_string(),
        },
    )
}

/// Templates and compiles `program`.
pub fn compile_program(program: ProgramId) -> Result<String, SetupError> {
    glsl_to_wgsl(&program.to_string(), &program_source(program))
}
