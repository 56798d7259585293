//! Turns analysis snapshots into visual parameter values through a table of
//! mapping rules, plus a pitch-derived color set.

use crate::analysis::AnalysisSnapshot;
use crate::config::ConfigError;
use crate::params::{ColorSchemePatch, ParameterPatch, DATA_CHANNELS};
use glam::Vec3;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use std::collections::BTreeMap;
use std::f32::consts::TAU;

/// A signal a mapping term can read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Source {
    None,
    Octave,
    /// Octave modulo 3.
    OctaveCycle,
    NotePosition,
    /// |cents| / 50
    Detune,
    /// cents / 50, signed
    Cents,
    Bass,
    Mid,
    High,
    Energy,
    Dissonance,
    Transient,
    BassTransient,
    MidTransient,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub source: Source,
    pub scale: f32,
    /// Added to the source before scaling.
    #[serde(default)]
    pub offset: f32,
}

impl Term {
    pub const fn new(source: Source, scale: f32) -> Self {
        Self {
            source,
            scale,
            offset: 0.0,
        }
    }

    pub const fn offset(source: Source, offset: f32, scale: f32) -> Self {
        Self {
            source,
            scale,
            offset,
        }
    }
}

/// `base_scale + Σ (source + offset) · scale`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factor {
    pub base_scale: f32,
    #[serde(default)]
    pub terms: SmallVec<[Term; 3]>,
}

impl Factor {
    pub fn new(base_scale: f32, terms: SmallVec<[Term; 3]>) -> Self {
        Self { base_scale, terms }
    }

    pub fn evaluate(&self, signals: &Signals) -> f32 {
        self.terms.iter().fold(self.base_scale, |acc, t| {
            acc + (signals.value(t.source) + t.offset) * t.scale
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MappingMode {
    /// `base · f`
    Multiplicative,
    /// `base + base · f + transient · gain`
    Additive {
        #[serde(rename = "transientGain", default = "default_transient_gain")]
        transient_gain: f32,
    },
    /// `base + f`
    Bipolar,
    /// `base · max(0.1, 2 − f)`
    Inverse,
}

fn default_transient_gain() -> f32 {
    0.3
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    pub mode: MappingMode,
    /// Used while a pitch is detected.
    pub pitched: Factor,
    /// Used in silence or when no pitch is detected.
    pub silent: Factor,
    pub min: f32,
    pub max: f32,
    #[serde(default = "default_pulse_source")]
    pub pulse_source: Source,
    #[serde(default)]
    pub pulse_threshold: f32,
}

fn default_pulse_source() -> Source {
    Source::None
}

impl MappingRule {
    pub fn apply(&self, base: f32, signals: &Signals) -> f32 {
        let factor = if signals.pitched {
            &self.pitched
        } else {
            &self.silent
        };
        let f = factor.evaluate(signals);
        let value = match self.mode {
            MappingMode::Multiplicative => base * f,
            MappingMode::Additive { transient_gain } => {
                base + base * f + signals.transient * transient_gain
            }
            MappingMode::Bipolar => base + f,
            MappingMode::Inverse => base * (2.0 - f).max(0.1),
        };
        value.max(self.min).min(self.max)
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if !(self.min <= self.max) {
            return Err(ConfigError::Invalid(format!(
                "rule '{name}' has min {} above max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Parameter name → rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable(pub BTreeMap<String, MappingRule>);

impl MappingTable {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let table: Self = serde_json::from_str(text)?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.0.iter().try_for_each(|(name, rule)| rule.validate(name))
    }

    pub fn get(&self, parameter: &str) -> Option<&MappingRule> {
        self.0.get(parameter)
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        use MappingMode::*;
        use Source::*;
        let rule = |mode: MappingMode,
                    pitched: Factor,
                    silent: Factor,
                    min: f32,
                    max: f32,
                    pulse_source: Source,
                    pulse_threshold: f32| MappingRule {
            mode,
            pitched,
            silent,
            min,
            max,
            pulse_source,
            pulse_threshold,
        };
        let glitch = Factor::new(0.0, smallvec![Term::new(High, 0.2)]);
        let shift = Factor::new(
            -0.18,
            smallvec![Term::new(Dissonance, 0.8), Term::new(Energy, 0.5)],
        );
        let rules = [
            (
                "morphFactor",
                rule(
                    Multiplicative,
                    Factor::new(
                        0.4,
                        smallvec![Term::new(Octave, 0.8 / 6.0), Term::new(Transient, 0.5)],
                    ),
                    Factor::new(0.8, smallvec![Term::new(Mid, 1.8), Term::new(Transient, 0.7)]),
                    0.0,
                    1.5,
                    Transient,
                    0.3,
                ),
            ),
            (
                "dimension",
                rule(
                    Multiplicative,
                    Factor::new(3.0, smallvec![Term::new(NotePosition, 2.0)]),
                    Factor::new(0.65, smallvec![Term::new(Bass, 0.6), Term::new(Mid, 0.3)]),
                    3.0,
                    5.0,
                    Bass,
                    0.4,
                ),
            ),
            (
                "rotationSpeed",
                rule(
                    Multiplicative,
                    Factor::new(0.2, smallvec![Term::new(Octave, 0.25), Term::new(Mid, 1.0)]),
                    Factor::new(0.8, smallvec![Term::new(Mid, 3.0), Term::new(High, 2.0)]),
                    0.0,
                    3.0,
                    Mid,
                    0.25,
                ),
            ),
            (
                "gridDensity",
                rule(
                    Multiplicative,
                    Factor::new(4.0, smallvec![Term::new(OctaveCycle, 3.0), Term::new(Bass, 6.0)]),
                    Factor::new(0.5, smallvec![Term::new(Bass, 2.2), Term::new(Transient, 0.7)]),
                    1.0,
                    25.0,
                    Bass,
                    0.4,
                ),
            ),
            (
                "lineThickness",
                rule(
                    Inverse,
                    Factor::new(1.5, smallvec![Term::offset(Octave, -2.0, -0.8 / 6.0)]),
                    Factor::new(1.5, smallvec![Term::new(High, -1.0), Term::new(Bass, 0.3)]),
                    0.002,
                    0.1,
                    High,
                    0.5,
                ),
            ),
            (
                "patternIntensity",
                rule(
                    Multiplicative,
                    Factor::new(0.7, smallvec![Term::new(Detune, 1.5), Term::new(Transient, 0.5)]),
                    Factor::new(0.8, smallvec![Term::new(Mid, 1.5), Term::new(Transient, 1.1)]),
                    0.0,
                    3.0,
                    Transient,
                    0.25,
                ),
            ),
            (
                "universeModifier",
                rule(
                    Multiplicative,
                    Factor::new(0.5, smallvec![Term::new(NotePosition, 1.5)]),
                    Factor::new(0.7, smallvec![Term::new(Bass, 1.2), Term::new(Dissonance, 0.4)]),
                    0.3,
                    2.5,
                    Bass,
                    0.4,
                ),
            ),
            (
                "glitchIntensity",
                rule(
                    Additive {
                        transient_gain: default_transient_gain(),
                    },
                    glitch.clone(),
                    glitch,
                    0.0,
                    0.15,
                    Transient,
                    0.2,
                ),
            ),
            (
                "colorShift",
                rule(Bipolar, shift.clone(), shift, -1.0, 1.0, Energy, 0.3),
            ),
        ];
        Self(
            rules
                .into_iter()
                .map(|(name, rule)| (name.to_string(), rule))
                .collect(),
        )
    }
}

/// Derived per-tick inputs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Signals {
    pub pitched: bool,
    pub octave: f32,
    pub note_position: f32,
    pub cents: f32,
    pub strength: f32,
    pub in_tune: bool,
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    pub energy: f32,
    pub dissonance: f32,
    pub transient: f32,
    pub bass_transient: f32,
    pub mid_transient: f32,
}

impl Signals {
    pub fn value(&self, source: Source) -> f32 {
        match source {
            Source::None => 0.0,
            Source::Octave => self.octave,
            Source::OctaveCycle => self.octave.rem_euclid(3.0),
            Source::NotePosition => self.note_position,
            Source::Detune => self.cents.abs() / 50.0,
            Source::Cents => self.cents / 50.0,
            Source::Bass => self.bass,
            Source::Mid => self.mid,
            Source::High => self.high,
            Source::Energy => self.energy,
            Source::Dissonance => self.dissonance,
            Source::Transient => self.transient,
            Source::BassTransient => self.bass_transient,
            Source::MidTransient => self.mid_transient,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorParams {
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub rgb_offset: f32,
}

impl ColorParams {
    /// Primary at the hue, secondary opposite it, background a dark tint.
    pub fn to_color_scheme(&self) -> ColorSchemePatch {
        let value = self.brightness.min(1.0);
        let split = Vec3::new(1.0, 0.0, -1.0) * (self.rgb_offset * 0.1);
        let primary = hsv_to_rgb(self.hue, self.saturation, value) + split;
        let secondary = hsv_to_rgb(self.hue + 0.5, self.saturation * 0.9, value * 0.9) - split;
        let background = hsv_to_rgb(self.hue + 0.6, self.saturation * 0.8, 0.1);
        let clamp = |c: Vec3| c.clamp(Vec3::ZERO, Vec3::ONE).to_array();
        ColorSchemePatch {
            primary: Some(clamp(primary)),
            secondary: Some(clamp(secondary)),
            background: Some(clamp(background)),
        }
    }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let channel = |n: f32| {
        let k = (n + h6) % 6.0;
        v - v * s * k.min(4.0 - k).clamp(0.0, 1.0)
    };
    Vec3::new(channel(5.0), channel(3.0), channel(1.0))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AudioLevels {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedParameters {
    /// Rule outputs by parameter name.
    pub values: BTreeMap<String, f32>,
    pub shell_width: f32,
    pub tetra_thickness: f32,
    pub projection_distance: f32,
    pub projection_angle: f32,
    pub audio_levels: AudioLevels,
    pub color: ColorParams,
    pub transient: f32,
    pub energy: f32,
    pub dissonance: f32,
}

impl MappedParameters {
    pub fn get(&self, parameter: &str) -> Option<f32> {
        self.values.get(parameter).copied()
    }

    /// Patch for the render loop. Channels 0..=3 carry bass, mid, high and transient.
    pub fn to_patch(&self) -> ParameterPatch {
        let mut patch = ParameterPatch::new();
        for (name, value) in &self.values {
            patch = patch.float(name.clone(), *value);
        }
        let AudioLevels { bass, mid, high } = self.audio_levels;
        patch
            .float("shellWidth", self.shell_width)
            .float("tetraThickness", self.tetra_thickness)
            .floats(
                DATA_CHANNELS,
                &[
                    bass,
                    mid,
                    high,
                    self.transient,
                    self.energy,
                    self.dissonance,
                ],
            )
            .colors(self.color.to_color_scheme())
    }
}

/// Slider values the rules scale from.
pub fn default_base_parameters() -> BTreeMap<String, f32> {
    [
        ("morphFactor", 0.7),
        ("dimension", 4.0),
        ("rotationSpeed", 0.5),
        ("gridDensity", 8.0),
        ("lineThickness", 0.03),
        ("patternIntensity", 1.3),
        ("universeModifier", 1.0),
        ("colorShift", 0.0),
        ("glitchIntensity", 0.02),
        ("shellWidth", 0.025),
        ("tetraThickness", 0.035),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub struct ReactiveMapper {
    rules: MappingTable,
    base: BTreeMap<String, f32>,
    last_high: f32,
    last_bass: f32,
    last_mid: f32,
    signals: Signals,
    rng: StdRng,
}

impl ReactiveMapper {
    pub fn new(rules: MappingTable, seed: u64) -> Self {
        Self {
            rules,
            base: default_base_parameters(),
            last_high: 0.0,
            last_bass: 0.0,
            last_mid: 0.0,
            signals: Signals::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn rules(&self) -> &MappingTable {
        &self.rules
    }

    pub fn replace_rules(&mut self, rules: MappingTable) -> Result<(), ConfigError> {
        rules.validate()?;
        self.rules = rules;
        Ok(())
    }

    /// Replaces or adds the rules named in `rules`, leaving the rest.
    pub fn update_rules(&mut self, rules: MappingTable) -> Result<(), ConfigError> {
        rules.validate()?;
        self.rules.0.extend(rules.0);
        Ok(())
    }

    pub fn base_parameters(&self) -> &BTreeMap<String, f32> {
        &self.base
    }

    /// Sets a slider value. Unknown names are added.
    pub fn set_base(&mut self, parameter: &str, value: f32) {
        self.base.insert(parameter.to_string(), value);
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// Maps one snapshot. `now_ms` drives the hue and angle drift in silence.
    pub fn process(&mut self, snapshot: &AnalysisSnapshot, now_ms: f64) -> MappedParameters {
        self.signals = self.derive_signals(snapshot);
        let s = &self.signals;

        let values = self
            .rules
            .0
            .iter()
            .filter_map(|(name, rule)| {
                let base = *self.base.get(name)?;
                Some((name.clone(), rule.apply(base, s)))
            })
            .collect();

        let base = |name: &str, fallback: f32| self.base.get(name).copied().unwrap_or(fallback);
        let shell_width = (base("shellWidth", 0.025) * (0.7 + s.mid * 1.8 + s.bass * 0.4))
            .clamp(0.005, 0.08);
        let tetra_thickness = (base("tetraThickness", 0.035)
            * (1.3 - s.high * 0.9 + s.bass * 0.3))
            .clamp(0.003, 0.1);

        let (projection_distance, projection_angle) = if s.pitched {
            (2.0 + (s.octave - 3.0) * 0.5, s.note_position * TAU)
        } else {
            (2.0 + s.bass, ((now_ms * 0.0005) % TAU as f64) as f32)
        };

        let jitter = self.rng.gen::<f32>();
        let color = color_params(s, now_ms, jitter);

        MappedParameters {
            values,
            shell_width,
            tetra_thickness,
            projection_distance,
            projection_angle,
            audio_levels: AudioLevels {
                bass: s.bass,
                mid: s.mid,
                high: s.high,
            },
            color,
            transient: s.transient,
            energy: s.energy,
            dissonance: s.dissonance,
        }
    }

    fn derive_signals(&mut self, snapshot: &AnalysisSnapshot) -> Signals {
        let bass = snapshot.smoothed_bass;
        let mid = snapshot.smoothed_mid;
        let high = snapshot.smoothed_high;

        let transient = (high - self.last_high).max(0.0) * 2.0;
        let bass_transient = (bass - self.last_bass).max(0.0) * 1.5;
        let mid_transient = (mid - self.last_mid).max(0.0) * 1.5;
        self.last_high = high * 0.8;
        self.last_bass = bass * 0.9;
        self.last_mid = mid * 0.9;

        let pitch = &snapshot.pitch;
        Signals {
            pitched: pitch.is_pitched(),
            octave: pitch.octave as f32,
            note_position: pitch.note_position().unwrap_or(0.0),
            cents: pitch.cents as f32,
            strength: pitch.strength,
            in_tune: pitch.is_in_tune,
            bass,
            mid,
            high,
            energy: (bass + mid) * 0.5,
            dissonance: mid * high * 2.0,
            transient,
            bass_transient,
            mid_transient,
        }
    }

    /// UI pulse level for a parameter from its rule's pulse source, in [0, 1].
    pub fn pulse_intensity(&self, parameter: &str) -> f32 {
        let Some(rule) = self.rules.get(parameter) else {
            return 0.0;
        };
        let s = &self.signals;
        let level = match rule.pulse_source {
            Source::Bass | Source::Mid | Source::High => s.value(rule.pulse_source) * 1.5,
            Source::Dissonance | Source::Energy => s.value(rule.pulse_source) * 1.2,
            Source::Transient => s.transient * 2.0,
            Source::BassTransient | Source::MidTransient => s.value(rule.pulse_source) * 2.0,
            _ => 0.0,
        };
        level.clamp(0.0, 1.0)
    }

    pub fn is_parameter_active(&self, parameter: &str) -> bool {
        self.rules
            .get(parameter)
            .is_some_and(|rule| self.pulse_intensity(parameter) > rule.pulse_threshold)
    }
}

fn color_params(s: &Signals, now_ms: f64, jitter: f32) -> ColorParams {
    if s.pitched {
        let audible = (1.0 - (s.octave - 4.5).abs() / 3.0).max(0.0);
        let rgb_offset = if s.in_tune {
            (jitter * 0.04 - 0.02) * s.strength
        } else {
            let intensity = s.cents.abs() / 50.0;
            s.cents / 50.0 * (1.0 + intensity * 2.0)
        };
        ColorParams {
            hue: (s.note_position + s.octave.rem_euclid(7.0) * 0.14).rem_euclid(1.0),
            saturation: 0.85 + s.strength * 0.15,
            brightness: 0.6 + audible * 0.6,
            rgb_offset,
        }
    } else {
        ColorParams {
            hue: ((now_ms * 0.0001) % 1.0) as f32,
            saturation: 0.9 + s.energy * 0.1,
            brightness: 0.5 + s.mid / (s.bass + s.high + 0.01) * 0.7 + s.high * 0.3,
            rgb_offset: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_primaries() {
        let close = |a: Vec3, b: Vec3| (a - b).abs().max_element() < 1e-4;
        assert!(close(hsv_to_rgb(0.0, 1.0, 1.0), Vec3::new(1.0, 0.0, 0.0)));
        assert!(close(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), Vec3::new(0.0, 1.0, 0.0)));
        assert!(close(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), Vec3::new(0.0, 0.0, 1.0)));
        assert!(close(hsv_to_rgb(0.25, 0.0, 0.5), Vec3::splat(0.5)));
    }

    #[test]
    fn inverse_mode_never_drops_below_a_tenth() {
        let rule = MappingRule {
            mode: MappingMode::Inverse,
            pitched: Factor::new(5.0, SmallVec::new()),
            silent: Factor::new(5.0, SmallVec::new()),
            min: 0.0,
            max: 10.0,
            pulse_source: Source::None,
            pulse_threshold: 0.0,
        };
        assert!((rule.apply(2.0, &Signals::default()) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn octave_cycle_wraps() {
        let s = Signals {
            octave: 5.0,
            ..Signals::default()
        };
        assert_eq!(s.value(Source::OctaveCycle), 2.0);
    }
}
