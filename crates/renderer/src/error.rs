/// Failures surfaced by the background pipeline.
///
/// `SurfaceUnavailable` and `ShaderCompile` are fatal during start-up: the
/// caller gets them synchronously and no frame is ever drawn.
/// `InvalidUniformValue` and `DrawFailure` are recoverable and never stop the
/// animation loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("rendering surface unavailable: {0}")]
    SurfaceUnavailable(String),
    #[error("fragment program failed to compile: {0}")]
    ShaderCompile(String),
    #[error("invalid value for uniform `{name}`: {reason}")]
    InvalidUniformValue { name: &'static str, reason: String },
    #[error("frame draw failed: {0}")]
    DrawFailure(String),
}

impl RenderError {
    /// Whether the pipeline can keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::InvalidUniformValue { .. } | RenderError::DrawFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fatal_and_recoverable_errors() {
        assert!(!RenderError::SurfaceUnavailable("no adapter".into()).is_recoverable());
        assert!(!RenderError::ShaderCompile("syntax".into()).is_recoverable());
        assert!(RenderError::DrawFailure("timeout".into()).is_recoverable());
        assert!(RenderError::InvalidUniformValue {
            name: "u_time",
            reason: "negative".into(),
        }
        .is_recoverable());
    }
}
