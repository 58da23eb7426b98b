//! GLSL bodies for the built-in effects.
//!
//! Bodies may read `params.time` (seconds), `params.bpm` and
//! `params.intensity`, and may call `sample_image(uv)`.

pub(super) const MIRROR: &str = r#"
vec2 map_coord(vec2 uv) {
    float x = mix(uv.x, 1.0 - uv.x, step(0.5, uv.x));
    return vec2(x, uv.y);
}
"#;

pub(super) const KALEIDOSCOPE: &str = r#"
vec2 map_coord(vec2 uv) {
    vec2 p = uv - vec2(0.5);
    float r = length(p);
    float slice = 6.28318530 / 6.0;
    float a = mod(atan(p.y, p.x), slice);
    a = abs(a - slice * 0.5);
    vec2 folded = vec2(cos(a), sin(a)) * r + vec2(0.5);
    return mix(uv, folded, params.intensity);
}
"#;

pub(super) const WAVE: &str = r#"
vec2 map_coord(vec2 uv) {
    float t = params.time * 3.0;
    vec2 offset = vec2(sin(uv.y * 20.0 + t), cos(uv.x * 20.0 + t));
    return uv + offset * 0.03 * params.intensity;
}
"#;

// Zooms in on every beat and relaxes until the next one.
pub(super) const ZOOM_PULSE: &str = r#"
vec2 map_coord(vec2 uv) {
    float beat = fract(params.time * params.bpm / 60.0);
    float pulse = pow(1.0 - beat, 2.0);
    float zoom = 1.0 - 0.2 * params.intensity * pulse;
    return (uv - vec2(0.5)) * zoom + vec2(0.5);
}
"#;

pub(super) const SWIRL: &str = r#"
vec2 map_coord(vec2 uv) {
    vec2 p = uv - vec2(0.5);
    float r = length(p);
    float angle = params.intensity * 8.0 * max(0.0, 0.5 - r);
    float s = sin(angle);
    float c = cos(angle);
    return vec2(p.x * c - p.y * s, p.x * s + p.y * c) + vec2(0.5);
}
"#;

pub(super) const PIXELATE: &str = r#"
vec2 map_coord(vec2 uv) {
    float cells = mix(480.0, 16.0, params.intensity);
    return (floor(uv * cells) + vec2(0.5)) / cells;
}
"#;

pub(super) const INVERT: &str = r#"
vec4 map_color(vec4 color, vec2 uv) {
    return vec4(vec3(1.0) - color.rgb, color.a);
}
"#;

pub(super) const GRAYSCALE: &str = r#"
vec4 map_color(vec4 color, vec2 uv) {
    float luma = dot(color.rgb, vec3(0.299, 0.587, 0.114));
    return vec4(mix(color.rgb, vec3(luma), params.intensity), color.a);
}
"#;

pub(super) const SEPIA: &str = r#"
vec4 map_color(vec4 color, vec2 uv) {
    vec3 c = color.rgb;
    vec3 toned = vec3(
        dot(c, vec3(0.393, 0.769, 0.189)),
        dot(c, vec3(0.349, 0.686, 0.168)),
        dot(c, vec3(0.272, 0.534, 0.131)));
    return vec4(mix(c, min(toned, vec3(1.0)), params.intensity), color.a);
}
"#;

pub(super) const POSTERIZE: &str = r#"
vec4 map_color(vec4 color, vec2 uv) {
    float levels = mix(24.0, 3.0, params.intensity);
    vec3 banded = floor(color.rgb * levels + vec3(0.5)) / levels;
    return vec4(clamp(banded, vec3(0.0), vec3(1.0)), color.a);
}
"#;

// Rotates hue about the grey axis, one half turn per beat at full intensity.
pub(super) const HUE_ROTATE: &str = r#"
vec4 map_color(vec4 color, vec2 uv) {
    float beats = params.time * params.bpm / 60.0;
    float angle = beats * 3.14159265 * params.intensity;
    vec3 k = vec3(0.57735027);
    float c = cos(angle);
    float s = sin(angle);
    vec3 rotated = color.rgb * c + cross(k, color.rgb) * s + k * dot(k, color.rgb) * (1.0 - c);
    return vec4(clamp(rotated, vec3(0.0), vec3(1.0)), color.a);
}
"#;

pub(super) const VIGNETTE: &str = r#"
vec4 map_color(vec4 color, vec2 uv) {
    float d = distance(uv, vec2(0.5));
    float shade = 1.0 - smoothstep(0.25, 0.75, d);
    return vec4(color.rgb * mix(1.0, shade, params.intensity), color.a);
}
"#;

pub(super) const RGB_SPLIT: &str = r#"
vec4 map_color(vec4 color, vec2 uv) {
    vec2 offset = vec2(0.015 * params.intensity, 0.0);
    float r = sample_image(uv + offset).r;
    float b = sample_image(uv - offset).b;
    return vec4(r, color.g, b, color.a);
}
"#;
