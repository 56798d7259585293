use crate::constants::*;
use crate::params::{ParameterPatch, PatchValue, GEOMETRY_TYPE, PROJECTION_METHOD};
use crate::providers::{GeometryKind, ProjectionKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisualizerConfig {
    pub program_name: String,
    pub default_geometry: GeometryKind,
    pub default_projection: ProjectionKind,
    /// Clamped to 8..=64 when the parameter state is built.
    pub data_channels: usize,
    pub initial_parameters: ParameterPatch,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
            default_geometry: GeometryKind::Hypercube,
            default_projection: ProjectionKind::Perspective,
            data_channels: MIN_DATA_CHANNELS,
            initial_parameters: ParameterPatch::new(),
        }
    }
}

impl VisualizerConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program_name.trim().is_empty() {
            return Err(ConfigError::Invalid("program name is empty".into()));
        }
        Ok(())
    }

    /// Default provider names followed by the configured overrides.
    pub fn initial_patch(&self) -> ParameterPatch {
        let mut patch = ParameterPatch::new()
            .set(GEOMETRY_TYPE, PatchValue::Text(self.default_geometry.name().into()))
            .set(
                PROJECTION_METHOD,
                PatchValue::Text(self.default_projection.name().into()),
            );
        patch.extend(self.initial_parameters.clone());
        patch
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisConfig {
    pub fft_size: usize,
    pub analyser_smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    pub bass_band: [f32; 2],
    pub mid_band: [f32; 2],
    pub high_band: [f32; 2],
    pub smoothing_alpha: f32,
    pub simulation_alpha: f32,
    pub pitch_skip_bins: usize,
    pub pitch_min_strength: f32,
    pub pitch_min_hz: f32,
    pub pitch_max_hz: f32,
    pub dominant_floor_hz: f32,
    pub in_tune_cents: i32,
    pub seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: FFT_SIZE,
            analyser_smoothing: ANALYSER_SMOOTHING,
            min_decibels: ANALYSER_MIN_DB,
            max_decibels: ANALYSER_MAX_DB,
            bass_band: BASS_BAND,
            mid_band: MID_BAND,
            high_band: HIGH_BAND,
            smoothing_alpha: BAND_SMOOTHING_ALPHA,
            simulation_alpha: SIMULATION_SMOOTHING_ALPHA,
            pitch_skip_bins: PITCH_SKIP_BINS,
            pitch_min_strength: PITCH_MIN_STRENGTH,
            pitch_min_hz: PITCH_MIN_HZ,
            pitch_max_hz: PITCH_MAX_HZ,
            dominant_floor_hz: DOMINANT_PITCH_FLOOR_HZ,
            in_tune_cents: IN_TUNE_CENTS,
            seed: 0x5EED,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(ConfigError::Invalid(format!(
                "fft size {} must be a power of two in 32..=32768",
                self.fft_size
            )));
        }
        for (name, alpha) in [
            ("smoothing alpha", self.smoothing_alpha),
            ("simulation alpha", self.simulation_alpha),
        ] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(ConfigError::Invalid(format!("{name} {alpha} not in (0, 1]")));
            }
        }
        if !(0.0..1.0).contains(&self.analyser_smoothing) {
            return Err(ConfigError::Invalid(format!(
                "analyser smoothing {} not in [0, 1)",
                self.analyser_smoothing
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(ConfigError::Invalid("min decibels must be below max".into()));
        }
        for (name, [lo, hi]) in [
            ("bass", self.bass_band),
            ("mid", self.mid_band),
            ("high", self.high_band),
        ] {
            if lo < 0.0 || lo >= hi {
                return Err(ConfigError::Invalid(format!("{name} band [{lo}, {hi}) is empty")));
            }
        }
        if self.pitch_min_hz >= self.pitch_max_hz {
            return Err(ConfigError::Invalid("pitch range is empty".into()));
        }
        Ok(())
    }
}
