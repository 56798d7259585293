use thiserror::Error;

/// Which stage of a program build failed to compile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failures while composing, compiling or linking a GPU program.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to create {stage} shader object '{id}'")]
    ShaderAllocation { stage: ShaderStage, id: String },
    #[error("{stage} shader '{id}' failed to compile: {log}")]
    Compile {
        stage: ShaderStage,
        id: String,
        log: String,
        /// Source listing with the offending line marked with `>>`.
        annotated_source: String,
    },
    #[error("program '{program}' failed to link: {log}")]
    Link { program: String, log: String },
    #[error("failed to create program object '{0}'")]
    ProgramAllocation(String),
    #[error("{provider} source is missing required signature `{signature}`")]
    MissingSignature {
        provider: String,
        signature: &'static str,
    },
    #[error("fragment template is missing injection marker `{0}`")]
    MissingMarker(&'static str),
}

/// Failures on the audio input side. None of these are fatal to the visualizer.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio permission denied: {0}")]
    Permission(String),
    #[error("audio input unavailable: {0}")]
    Unavailable(String),
    #[error("audio source read failed: {0}")]
    Read(String),
}

/// Top-level error reported through the render loop's error callback.
#[derive(Debug, Error)]
pub enum VisualizerError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("uniform '{0}' could not be resolved")]
    UniformResolutionMiss(String),
    #[error("draw failed: {0}")]
    Draw(String),
    #[error("GPU context lost")]
    ContextLost,
    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl VisualizerError {
    /// Whether the render loop can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VisualizerError::UniformResolutionMiss(_) | VisualizerError::Audio(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VisualizerError>;
