//! Engine error taxonomy
//!
//! Setup failures (missing backend, shader compilation) are fatal and
//! reported upward so the host can substitute a non-simulated visual.
//! Capability gaps are handled by configuration downgrade and never
//! surface here.

/// Result alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("GPU backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    #[error("Surface creation failed: {error}")]
    SurfaceCreation { error: String },

    #[error("Shader compilation failed: {stage}: {error}")]
    ShaderCompile { stage: String, error: String },

    #[error("Pipeline creation failed: {stage}: {error}")]
    PipelineCreation { stage: String, error: String },

    #[error("Field readback failed: {error}")]
    Readback { error: String },

    #[error("GPU out of memory")]
    OutOfMemory,
}

impl EngineError {
    pub fn backend(reason: impl Into<String>) -> Self {
        EngineError::BackendUnavailable {
            reason: reason.into(),
        }
    }
}
