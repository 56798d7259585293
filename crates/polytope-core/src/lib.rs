pub mod analysis;
pub mod composer;
pub mod config;
pub mod constants;
pub mod error;
pub mod gl;
pub mod mapper;
pub mod params;
pub mod providers;
pub mod render;
pub mod uniforms;

pub use analysis::{AnalysisSnapshot, AudioFeatureExtractor, PitchInfo, SpectrumSource};
pub use composer::ProgramComposer;
pub use config::{AnalysisConfig, ConfigError, VisualizerConfig};
pub use error::{AudioError, ComposeError, Result, ShaderStage, VisualizerError};
pub use gl::{FrameScheduler, Gl, RenderSurface, ShaderKind, UniformValue};
pub use mapper::{ColorParams, MappedParameters, MappingRule, MappingTable, ReactiveMapper};
pub use params::{ColorScheme, ColorSchemePatch, ParameterPatch, ParameterState, PatchValue};
pub use providers::{GeometryKind, ProjectionKind};
pub use render::{FrameInfo, RenderLoop};
pub use uniforms::{FlushReport, UniformSync};
