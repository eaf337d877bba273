use thiserror::Error;

/// Library error type for backdrop blur operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A blur configuration was built without one of its required regions.
    #[error("blur configuration is missing the {0}")]
    MissingRegion(&'static str),

    /// An option value is outside the range the pipeline accepts.
    #[error("invalid blur option: {0}")]
    InvalidOption(String),

    /// A render controller was used after `destroy`.
    #[error("render controller used after destroy")]
    Destroyed,

    /// The detached blur entry point was called from a render thread.
    #[error("detached blur must not run on the render thread")]
    RenderThread,

    /// Blur radius below the minimum of 1.
    #[error("blur radius must be at least 1, got {0}")]
    InvalidRadius(u32),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    /// Rendering error reported by a host collaborator.
    #[error("render error: {0}")]
    Render(anyhow::Error),
}
