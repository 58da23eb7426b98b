//! Errors that abort pipeline setup.
//!
//! Nothing here is recoverable at runtime: a render graph that failed to
//! build cannot draw a single frame, so these propagate to whoever started
//! the pipeline.

use thiserror::Error;

/// Fatal failure while bringing up the GPU side of the pipeline.
#[derive(Debug, Error)]
pub enum SetupError {
    /// No adapter could drive the requested surface.
    #[error("no usable GPU adapter: {0}")]
    NoAdapter(String),

    /// The adapter refused to hand out a device.
    #[error("failed to open GPU device: {0}")]
    Device(String),

    /// The window surface could not be created or configured.
    #[error("failed to create presentation surface: {0}")]
    Surface(String),

    /// The GLSL front end rejected a templated program.
    #[error("shader compile failed for `{program}`:\n{log}\n--- program source ---\n{code}")]
    ShaderCompile {
        program: String,
        code: String,
        log: String,
    },

    /// The program parsed but did not validate (the equivalent of a link error).
    #[error("shader link failed for `{program}`:\n{log}\n--- program source ---\n{code}")]
    ShaderLink {
        program: String,
        code: String,
        log: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_carries_source_and_log() {
        let err = SetupError::ShaderCompile {
            program: "wave".into(),
            code: "void main() {".into(),
            log: "unexpected end of input".into(),
        };
        let text = err.to_string();
        assert!(text.contains("wave"));
        assert!(text.contains("unexpected end of input"));
        assert!(text.contains("void main() {"));
    }
}
