//! Typed parameter store and the patch API that mutates it.

use crate::constants::{MAX_DATA_CHANNELS, MIN_DATA_CHANNELS};
use crate::gl::UniformValue;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use std::collections::BTreeMap;

pub const GEOMETRY_TYPE: &str = "geometryType";
pub const PROJECTION_METHOD: &str = "projectionMethod";
pub const COLOR_SCHEME: &str = "colorScheme";
pub const DATA_CHANNELS: &str = "dataChannels";
pub const TIME: &str = "time";
pub const RESOLUTION: &str = "resolution";

pub const U_TIME: &str = "u_time";
pub const U_PRIMARY_COLOR: &str = "u_primaryColor";
pub const U_SECONDARY_COLOR: &str = "u_secondaryColor";
pub const U_BACKGROUND_COLOR: &str = "u_backgroundColor";
pub const U_DATA_CHANNELS: &str = "u_dataChannels";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub primary: [f32; 3],
    pub secondary: [f32; 3],
    pub background: [f32; 3],
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            primary: [1.0, 0.2, 0.8],
            secondary: [0.2, 1.0, 1.0],
            background: [0.05, 0.0, 0.2],
        }
    }
}

/// Partial color update; absent members keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorSchemePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<[f32; 3]>,
}

/// A stored parameter value. The variant of a key never changes.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Channels(Vec<f32>),
    Colors(ColorScheme),
    Name(String),
}

impl ParamValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Float(_) => "float",
            ParamValue::Vec2(_) => "vec2",
            ParamValue::Vec3(_) => "vec3",
            ParamValue::Channels(_) => "float array",
            ParamValue::Colors(_) => "color scheme",
            ParamValue::Name(_) => "string",
        }
    }
}

/// An incoming, loosely shaped value. Coerced against the stored type on apply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchValue {
    Number(f32),
    Text(String),
    List(Vec<f32>),
    Colors(ColorSchemePatch),
    /// Any other JSON shape. Always rejected on apply, but keeps the rest of
    /// the patch deserializable.
    Other(serde_json::Value),
}

impl PatchValue {
    fn kind(&self) -> &'static str {
        match self {
            PatchValue::Number(_) => "number",
            PatchValue::Text(_) => "string",
            PatchValue::List(_) => "array",
            PatchValue::Colors(_) => "object",
            PatchValue::Other(_) => "other",
        }
    }
}

/// A batch of parameter writes applied through [`ParameterState::apply`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, PatchValue>", into = "BTreeMap<String, PatchValue>")]
pub struct ParameterPatch {
    entries: Vec<(String, PatchValue)>,
}

impl From<BTreeMap<String, PatchValue>> for ParameterPatch {
    fn from(map: BTreeMap<String, PatchValue>) -> Self {
        Self {
            entries: map.into_iter().collect(),
        }
    }
}

impl From<ParameterPatch> for BTreeMap<String, PatchValue> {
    fn from(patch: ParameterPatch) -> Self {
        patch.entries.into_iter().collect()
    }
}

impl ParameterPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn set(mut self, key: impl Into<String>, value: PatchValue) -> Self {
        self.entries.push((key.into(), value));
        self
    }

    pub fn float(self, key: impl Into<String>, value: f32) -> Self {
        self.set(key, PatchValue::Number(value))
    }

    pub fn floats(self, key: impl Into<String>, values: &[f32]) -> Self {
        self.set(key, PatchValue::List(values.to_vec()))
    }

    pub fn text(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, PatchValue::Text(value.into()))
    }

    pub fn colors(self, colors: ColorSchemePatch) -> Self {
        self.set(COLOR_SCHEME, PatchValue::Colors(colors))
    }

    pub fn push(&mut self, key: impl Into<String>, value: PatchValue) {
        self.entries.push((key.into(), value));
    }

    pub fn extend(&mut self, other: ParameterPatch) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[(String, PatchValue)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of applying a patch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchOutcome {
    /// Uniform names whose value changed.
    pub dirty_uniforms: Vec<String>,
    /// Geometry or projection identity changed.
    pub needs_rebuild: bool,
    pub rejected: usize,
    pub ignored: usize,
}

/// Flat typed parameter map.
#[derive(Clone, Debug)]
pub struct ParameterState {
    values: FnvHashMap<String, ParamValue>,
    keys: Vec<String>,
    channel_count: usize,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self::new(MIN_DATA_CHANNELS)
    }
}

impl ParameterState {
    /// Builds the default state with `channel_count` data channels (clamped to 8..=64).
    pub fn new(channel_count: usize) -> Self {
        let channel_count = channel_count.clamp(MIN_DATA_CHANNELS, MAX_DATA_CHANNELS);
        let mut state = Self {
            values: FnvHashMap::default(),
            keys: Vec::new(),
            channel_count,
        };
        for (key, value) in default_entries(channel_count) {
            state.keys.push(key.to_string());
            state.values.insert(key.to_string(), value);
        }
        state
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Parameter keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn float(&self, key: &str) -> Option<f32> {
        match self.values.get(key) {
            Some(ParamValue::Float(x)) => Some(*x),
            _ => None,
        }
    }

    pub fn vec2(&self, key: &str) -> Option<[f32; 2]> {
        match self.values.get(key) {
            Some(ParamValue::Vec2(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn vec3(&self, key: &str) -> Option<[f32; 3]> {
        match self.values.get(key) {
            Some(ParamValue::Vec3(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn name(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ParamValue::Name(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn geometry_type(&self) -> &str {
        self.name(GEOMETRY_TYPE).unwrap_or("")
    }

    pub fn projection_method(&self) -> &str {
        self.name(PROJECTION_METHOD).unwrap_or("")
    }

    pub fn color_scheme(&self) -> ColorScheme {
        match self.values.get(COLOR_SCHEME) {
            Some(ParamValue::Colors(c)) => c.clone(),
            _ => ColorScheme::default(),
        }
    }

    pub fn data_channels(&self) -> &[f32] {
        match self.values.get(DATA_CHANNELS) {
            Some(ParamValue::Channels(c)) => c,
            _ => &[],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Writes a float owned by the render loop (e.g. `time`). Returns whether it changed.
    pub fn set_float(&mut self, key: &str, value: f32) -> bool {
        match self.values.get_mut(key) {
            Some(ParamValue::Float(x)) if *x != value => {
                *x = value;
                true
            }
            _ => false,
        }
    }

    pub fn set_vec2(&mut self, key: &str, value: [f32; 2]) -> bool {
        match self.values.get_mut(key) {
            Some(ParamValue::Vec2(v)) if *v != value => {
                *v = value;
                true
            }
            _ => false,
        }
    }

    /// Applies every entry of `patch`. Unknown keys are skipped and type
    /// mismatches are logged; neither aborts the remaining entries.
    pub fn apply(&mut self, patch: &ParameterPatch) -> PatchOutcome {
        let mut outcome = PatchOutcome::default();
        for (key, incoming) in patch.entries() {
            let Some(current) = self.values.get_mut(key) else {
                log::debug!("[params] ignoring unknown key '{}'", key);
                outcome.ignored += 1;
                continue;
            };
            match coerce(current, incoming, self.channel_count) {
                Some(next) => {
                    if next == *current {
                        continue;
                    }
                    let dirty = changed_uniforms(key, current, &next);
                    *current = next;
                    outcome.dirty_uniforms.extend(dirty);
                    if key == GEOMETRY_TYPE || key == PROJECTION_METHOD {
                        outcome.needs_rebuild = true;
                    }
                }
                None => {
                    log::warn!(
                        "[params] '{}' expects {}, got {}; update ignored",
                        key,
                        current.kind(),
                        incoming.kind()
                    );
                    outcome.rejected += 1;
                }
            }
        }
        outcome
    }

    /// Current value for a uniform, dispatched by uniform name.
    pub fn uniform_value(&self, uniform: &str) -> Option<UniformValue<'_>> {
        let colors = || match self.values.get(COLOR_SCHEME) {
            Some(ParamValue::Colors(c)) => Some(c),
            _ => None,
        };
        match uniform {
            U_PRIMARY_COLOR => colors().map(|c| UniformValue::F3(c.primary)),
            U_SECONDARY_COLOR => colors().map(|c| UniformValue::F3(c.secondary)),
            U_BACKGROUND_COLOR => colors().map(|c| UniformValue::F3(c.background)),
            _ => {
                let key = uniform.strip_prefix("u_")?;
                match self.values.get(key)? {
                    ParamValue::Float(x) => Some(UniformValue::F1(*x)),
                    ParamValue::Vec2(v) => Some(UniformValue::F2(*v)),
                    ParamValue::Vec3(v) => Some(UniformValue::F3(*v)),
                    ParamValue::Channels(c) => Some(UniformValue::F1v(c)),
                    ParamValue::Colors(_) | ParamValue::Name(_) => None,
                }
            }
        }
    }

    /// Every uniform backed by this state, in declaration order.
    pub fn all_uniforms(&self) -> Vec<String> {
        self.keys
            .iter()
            .flat_map(|k| uniforms_for(k, &self.values[k]))
            .collect()
    }

    /// Uniform names a parameter fans out to.
    pub fn uniforms_of(&self, key: &str) -> SmallVec<[String; 3]> {
        match self.values.get(key) {
            Some(value) => uniforms_for(key, value),
            None => SmallVec::new(),
        }
    }
}

fn uniforms_for(key: &str, value: &ParamValue) -> SmallVec<[String; 3]> {
    match value {
        ParamValue::Name(_) => SmallVec::new(),
        ParamValue::Colors(_) => smallvec![
            U_PRIMARY_COLOR.to_string(),
            U_SECONDARY_COLOR.to_string(),
            U_BACKGROUND_COLOR.to_string(),
        ],
        _ => smallvec![format!("u_{key}")],
    }
}

fn changed_uniforms(key: &str, old: &ParamValue, new: &ParamValue) -> SmallVec<[String; 3]> {
    match (old, new) {
        (ParamValue::Colors(a), ParamValue::Colors(b)) => {
            let mut out = SmallVec::new();
            if a.primary != b.primary {
                out.push(U_PRIMARY_COLOR.to_string());
            }
            if a.secondary != b.secondary {
                out.push(U_SECONDARY_COLOR.to_string());
            }
            if a.background != b.background {
                out.push(U_BACKGROUND_COLOR.to_string());
            }
            out
        }
        _ => uniforms_for(key, new),
    }
}

fn coerce(current: &ParamValue, incoming: &PatchValue, channels: usize) -> Option<ParamValue> {
    match (current, incoming) {
        (ParamValue::Float(_), PatchValue::Number(x)) if x.is_finite() => {
            Some(ParamValue::Float(*x))
        }
        (ParamValue::Vec2(_), PatchValue::List(v)) if v.len() == 2 => {
            Some(ParamValue::Vec2([v[0], v[1]]))
        }
        (ParamValue::Vec3(_), PatchValue::List(v)) if v.len() == 3 => {
            Some(ParamValue::Vec3([v[0], v[1], v[2]]))
        }
        (ParamValue::Channels(_), PatchValue::List(v)) => {
            let mut next = vec![0.0; channels];
            let n = v.len().min(channels);
            next[..n].copy_from_slice(&v[..n]);
            Some(ParamValue::Channels(next))
        }
        (ParamValue::Colors(c), PatchValue::Colors(p)) => Some(ParamValue::Colors(ColorScheme {
            primary: p.primary.unwrap_or(c.primary),
            secondary: p.secondary.unwrap_or(c.secondary),
            background: p.background.unwrap_or(c.background),
        })),
        (ParamValue::Name(_), PatchValue::Text(s)) => Some(ParamValue::Name(s.clone())),
        _ => None,
    }
}

fn default_entries(channel_count: usize) -> Vec<(&'static str, ParamValue)> {
    use ParamValue::{Float as F, Name, Vec2 as V2, Vec3 as V3};
    vec![
        (TIME, F(0.0)),
        (RESOLUTION, V2([0.0, 0.0])),
        ("mouse", V2([0.5, 0.5])),
        (GEOMETRY_TYPE, Name("hypercube".into())),
        (PROJECTION_METHOD, Name("perspective".into())),
        ("dimension", F(4.0)),
        ("morphFactor", F(0.5)),
        ("rotationSpeed", F(0.2)),
        ("universeModifier", F(1.0)),
        ("patternIntensity", F(1.0)),
        ("gridDensity", F(8.0)),
        ("lineThickness", F(0.03)),
        ("shellWidth", F(0.025)),
        ("tetraThickness", F(0.035)),
        ("glitchIntensity", F(0.0)),
        ("colorShift", F(0.0)),
        (COLOR_SCHEME, ParamValue::Colors(ColorScheme::default())),
        (DATA_CHANNELS, ParamValue::Channels(vec![0.0; channel_count])),
        // perspective
        ("proj_perspective_baseDistance", F(2.5)),
        ("proj_perspective_morphFactorImpact", F(0.4)),
        ("proj_perspective_channelImpact", F(0.35)),
        ("proj_perspective_denomMin", F(0.1)),
        // stereographic
        ("proj_stereo_basePoleW", F(-1.5)),
        ("proj_stereo_channelImpact", F(0.4)),
        ("proj_stereo_epsilon", F(0.001)),
        ("proj_stereo_singularityScale", F(1000.0)),
        ("proj_stereo_morphFactorImpact", F(0.8)),
        // hypercube
        ("geom_hypercube_gridDensity_channel0Factor", F(0.7)),
        ("geom_hypercube_gridDensity_timeFactor", F(0.01)),
        ("geom_hypercube_lineThickness_channel1Factor", F(0.6)),
        ("geom_hypercube_wCoord_pCoeffs1", V3([1.4, -0.7, 1.5])),
        ("geom_hypercube_wCoord_timeFactor1", F(0.25)),
        ("geom_hypercube_wCoord_pLengthFactor", F(1.1)),
        ("geom_hypercube_wCoord_timeFactor2", F(0.35)),
        ("geom_hypercube_wCoord_channel1Factor", F(2.5)),
        ("geom_hypercube_wCoord_coeffs2", V3([0.4, 0.6, 0.6])),
        ("geom_hypercube_baseSpeedFactor", F(1.0)),
        ("geom_hypercube_rotXW_timeFactor", F(0.33)),
        ("geom_hypercube_rotXW_channel2Factor", F(0.25)),
        ("geom_hypercube_rotXW_morphFactor", F(0.45)),
        ("geom_hypercube_rotYZ_timeFactor", F(0.28)),
        ("geom_hypercube_rotYZ_channel1Factor", F(0.28)),
        ("geom_hypercube_rotYZ_morphFactor", F(0.0)),
        ("geom_hypercube_rotYZ_angleScale", F(1.1)),
        ("geom_hypercube_rotZW_timeFactor", F(0.25)),
        ("geom_hypercube_rotZW_channel0Factor", F(0.35)),
        ("geom_hypercube_rotZW_morphFactor", F(0.0)),
        ("geom_hypercube_rotZW_angleScale", F(0.9)),
        ("geom_hypercube_rotYW_timeFactor", F(-0.22)),
        ("geom_hypercube_rotYW_morphFactor", F(0.3)),
        ("geom_hypercube_finalLattice_minUniverseMod", F(0.1)),
        ("geom_hypercube_dimFactor_range", V2([3.0, 4.5])),
        // hypersphere
        ("geom_hsphere_density_gridFactor", F(0.7)),
        ("geom_hsphere_density_channel0Factor", F(0.5)),
        ("geom_hsphere_shellWidth_channel1Factor", F(1.5)),
        ("geom_hsphere_phase_tauFactor", F(6.28318)),
        ("geom_hsphere_phase_rotSpeedFactor", F(0.8)),
        ("geom_hsphere_phase_channel2Factor", F(3.0)),
        ("geom_hsphere_wCoord_radiusFactor", F(2.5)),
        ("geom_hsphere_wCoord_timeFactorCos", F(0.55)),
        ("geom_hsphere_wCoord_pCoeffs", V3([1.0, 1.3, -0.7])),
        ("geom_hsphere_wCoord_timeFactorSin", F(0.2)),
        ("geom_hsphere_wCoord_dimFactorOffset", F(0.5)),
        ("geom_hsphere_wCoord_morphFactor", F(0.5)),
        ("geom_hsphere_wCoord_channel1Factor", F(0.5)),
        ("geom_hsphere_baseSpeedFactor", F(0.85)),
        ("geom_hsphere_rotXW_timeFactor", F(0.38)),
        ("geom_hsphere_rotXW_channel2Factor", F(0.2)),
        ("geom_hsphere_rotXW_angleScale", F(1.05)),
        ("geom_hsphere_finalLattice_minUniverseMod", F(0.1)),
        ("geom_hsphere_dimFactor_range", V2([3.0, 4.5])),
        // simplex
        ("geom_simplex_density_gridFactor", F(0.65)),
        ("geom_simplex_density_channel0Factor", F(0.4)),
        ("geom_simplex_thickness_channel1Factor", F(0.7)),
        ("geom_simplex_pMod3D_timeFactor", F(0.005)),
        ("geom_simplex_wCoord_pCoeffsCos", V3([1.8, -1.5, 1.2])),
        ("geom_simplex_wCoord_timeFactorCos", F(0.24)),
        ("geom_simplex_wCoord_pLengthFactor", F(1.4)),
        ("geom_simplex_wCoord_timeFactorSin", F(0.18)),
        ("geom_simplex_wCoord_channel1Factor", F(2.0)),
        ("geom_simplex_wCoord_dimFactorOffset", F(0.45)),
        ("geom_simplex_wCoord_morphFactor", F(0.55)),
        ("geom_simplex_wCoord_channel2Factor", F(0.4)),
        ("geom_simplex_baseSpeedFactor", F(1.15)),
        ("geom_simplex_rotXW_timeFactor", F(0.28)),
        ("geom_simplex_rotXW_channel2Factor", F(0.25)),
        ("geom_simplex_rotXW_angleScale", F(0.95)),
        ("geom_simplex_pMod4D_timeFactor", F(0.008)),
        ("geom_simplex_finalLattice_minUniverseMod", F(0.1)),
        ("geom_simplex_dimFactor_range", V2([3.0, 4.5])),
        // duocylinder
        ("geom_duocyl_r1_base", F(0.6)),
        ("geom_duocyl_r1_morphFactor", F(0.4)),
        ("geom_duocyl_r2_base", F(0.3)),
        ("geom_duocyl_r2_channel0Factor", F(0.3)),
        ("geom_duocyl_shellWidth_channel1Factor", F(0.7)),
        ("geom_duocyl_fallback_pLengthFactor", F(8.0)),
        ("geom_duocyl_fallback_channel2Factor", F(5.0)),
        ("geom_duocyl_wCoord_len_pXY_Factor", F(1.8)),
        ("geom_duocyl_wCoord_timeFactorCos", F(0.4)),
        ("geom_duocyl_wCoord_pzFactor", F(1.2)),
        ("geom_duocyl_wCoord_pxFactor", F(0.5)),
        ("geom_duocyl_wCoord_timeFactorSin", F(0.25)),
        ("geom_duocyl_wCoord_dimFactorOffset", F(0.5)),
        ("geom_duocyl_wCoord_morphFactor", F(0.3)),
        ("geom_duocyl_wCoord_channel2Factor", F(0.2)),
        ("geom_duocyl_baseSpeedFactor", F(0.9)),
        ("geom_duocyl_rotXW_timeFactor", F(0.30)),
        ("geom_duocyl_rotXW_channel0Factor", F(0.3)),
        ("geom_duocyl_rotXW_angleScale", F(1.0)),
        ("geom_duocyl_finalLattice_minUniverseMod", F(0.1)),
        ("geom_duocyl_dimFactor_range", V2([3.5, 4.5])),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_count_is_clamped() {
        assert_eq!(ParameterState::new(2).data_channels().len(), 8);
        assert_eq!(ParameterState::new(200).data_channels().len(), 64);
        assert_eq!(ParameterState::new(16).data_channels().len(), 16);
    }

    #[test]
    fn every_float_key_has_one_uniform() {
        let state = ParameterState::default();
        assert_eq!(state.uniforms_of("gridDensity").as_slice(), ["u_gridDensity"]);
        assert!(state.uniforms_of(GEOMETRY_TYPE).is_empty());
        assert_eq!(state.uniforms_of(COLOR_SCHEME).len(), 3);
    }

    #[test]
    fn short_channel_patch_zero_fills() {
        let mut state = ParameterState::default();
        let patch = ParameterPatch::new().floats(DATA_CHANNELS, &[0.5, 0.25]);
        state.apply(&patch);
        let ch = state.data_channels();
        assert_eq!(ch.len(), 8);
        assert_eq!(&ch[..3], &[0.5, 0.25, 0.0]);
    }
}
