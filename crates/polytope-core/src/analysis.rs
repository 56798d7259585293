//! Band energies, pitch and the simulated fallback signal.

use crate::config::AnalysisConfig;
use crate::constants::{note_index, A4_HZ, A4_MIDI, NOTE_FREQUENCIES, NOTE_NAMES};
use crate::error::AudioError;
use rand::prelude::*;
use serde::Serialize;

/// Byte-scaled magnitude spectrum, shaped like a WebAudio `AnalyserNode`.
pub trait SpectrumSource {
    fn sample_rate(&self) -> f32;
    fn bin_count(&self) -> usize;
    /// Fills `out` (length `bin_count`) with magnitudes in 0..=255.
    fn fill_byte_frequency_data(&mut self, out: &mut [u8]) -> Result<(), AudioError>;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchInfo {
    /// 0 when no pitch was detected.
    pub frequency: f32,
    pub note: &'static str,
    pub octave: i32,
    pub cents: i32,
    pub is_in_tune: bool,
    pub strength: f32,
}

impl PitchInfo {
    pub fn none() -> Self {
        Self {
            frequency: 0.0,
            note: "None",
            octave: 0,
            cents: 0,
            is_in_tune: false,
            strength: 0.0,
        }
    }

    pub fn is_pitched(&self) -> bool {
        self.frequency > 0.0
    }

    /// Position of the note within the octave in [0, 1).
    pub fn note_position(&self) -> Option<f32> {
        note_index(self.note).map(|i| i as f32 / 12.0)
    }
}

impl Default for PitchInfo {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    pub smoothed_bass: f32,
    pub smoothed_mid: f32,
    pub smoothed_high: f32,
    pub pitch: PitchInfo,
    pub dominant_pitch_hz: f32,
    pub dominant_pitch_value: f32,
    pub simulated: bool,
}

pub struct AudioFeatureExtractor {
    config: AnalysisConfig,
    source: Option<Box<dyn SpectrumSource>>,
    spectrum: Vec<u8>,
    initialized: bool,
    simulating: bool,
    last_now_sec: f64,
    rng: StdRng,
    snapshot: AnalysisSnapshot,
}

impl AudioFeatureExtractor {
    pub fn new(config: AnalysisConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            source: None,
            spectrum: Vec::new(),
            initialized: false,
            simulating: false,
            last_now_sec: 0.0,
            rng,
            snapshot: AnalysisSnapshot::default(),
        }
    }

    /// Validates the configuration and prepares buffers.
    pub fn initialize(&mut self) -> bool {
        if self.initialized {
            return true;
        }
        if let Err(e) = self.config.validate() {
            log::error!("[audio] {}", e);
            return false;
        }
        self.spectrum = vec![0; self.config.bin_count()];
        self.initialized = true;
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Swaps to a live source, stops simulation and analyzes once.
    pub fn connect_source(&mut self, source: Box<dyn SpectrumSource>) -> bool {
        if !self.initialize() {
            return false;
        }
        if source.bin_count() == 0 || source.sample_rate() <= 0.0 {
            log::warn!("[audio] rejecting source with no bins or sample rate");
            self.start_simulation();
            return false;
        }
        self.spectrum = vec![0; source.bin_count()];
        self.source = Some(source);
        self.stop_simulation();
        log::info!("[audio] live source connected");
        let now = self.last_now_sec;
        self.analyze(now);
        true
    }

    /// Records a failed microphone request and falls back to simulation.
    pub fn connection_failed(&mut self, error: &AudioError) {
        log::warn!("[audio] {}; using simulated audio", error);
        self.start_simulation();
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn start_simulation(&mut self) {
        if !self.simulating {
            log::warn!("[audio] simulation started");
            self.simulating = true;
        }
    }

    pub fn stop_simulation(&mut self) {
        if self.simulating {
            log::info!("[audio] simulation stopped");
            self.simulating = false;
        }
    }

    pub fn is_simulating(&self) -> bool {
        self.simulating
    }

    pub fn snapshot(&self) -> &AnalysisSnapshot {
        &self.snapshot
    }

    /// One analysis tick at `now_sec`.
    ///
    /// A live source with signal always wins over simulation. An all-zero
    /// spectrum is analyzed as silence and switches simulation on for the
    /// following ticks.
    pub fn analyze(&mut self, now_sec: f64) -> &AnalysisSnapshot {
        self.last_now_sec = now_sec;
        if !self.initialized {
            return &self.snapshot;
        }

        let Some(source) = self.source.as_mut() else {
            self.start_simulation();
            self.simulate(now_sec);
            return &self.snapshot;
        };
        if self.spectrum.len() != source.bin_count() {
            self.spectrum = vec![0; source.bin_count()];
        }
        let sample_rate = source.sample_rate();
        if let Err(e) = source.fill_byte_frequency_data(&mut self.spectrum) {
            log::warn!("[audio] {}", e);
            self.start_simulation();
            self.simulate(now_sec);
            return &self.snapshot;
        }

        let silent = self.spectrum.iter().all(|&b| b == 0);
        if silent && self.simulating {
            self.simulate(now_sec);
            return &self.snapshot;
        }
        self.measure(sample_rate);
        if silent {
            self.start_simulation();
        } else {
            self.stop_simulation();
        }
        &self.snapshot
    }

    fn measure(&mut self, sample_rate: f32) {
        let cfg = &self.config;
        let bins = self.spectrum.len();
        let bin_hz = sample_rate / (2 * bins) as f32;

        let bass = band_average(&self.spectrum, bin_hz, cfg.bass_band);
        let mid = band_average(&self.spectrum, bin_hz, cfg.mid_band);
        let high = band_average(&self.spectrum, bin_hz, cfg.high_band);
        let alpha = cfg.smoothing_alpha;
        let s = &mut self.snapshot;
        s.bass = bass;
        s.mid = mid;
        s.high = high;
        s.smoothed_bass = smooth(s.smoothed_bass, bass, alpha);
        s.smoothed_mid = smooth(s.smoothed_mid, mid, alpha);
        s.smoothed_high = smooth(s.smoothed_high, high, alpha);
        s.pitch = detect_pitch(&self.spectrum, bin_hz, cfg);
        s.simulated = false;

        let floor = ((cfg.dominant_floor_hz / bin_hz).floor() as usize + 1).min(bins);
        match peak(&self.spectrum[floor..]) {
            Some((i, v)) if v > 0 => {
                s.dominant_pitch_hz = (floor + i) as f32 * bin_hz;
                s.dominant_pitch_value = v as f32 / 255.0;
            }
            _ => {
                s.dominant_pitch_hz = 0.0;
                s.dominant_pitch_value = 0.0;
            }
        }
    }

    fn simulate(&mut self, t: f64) {
        const NOTES: [&str; 7] = ["C", "E", "G", "B", "D", "F", "A"];
        const OCTAVES: [i32; 3] = [3, 4, 5];

        let note = NOTES[((t * 0.5).floor() as usize) % NOTES.len()];
        let octave = OCTAVES[((t * 0.2).floor() as usize) % OCTAVES.len()];
        let base = note_index(note).map_or(A4_HZ, |i| NOTE_FREQUENCIES[i]);
        let frequency = base * 2f32.powi(octave - 4);
        let mut cents = ((t * 0.3).sin() * 50.0).round() as i32;
        let is_in_tune = self.rng.gen::<f32>() < 0.3;
        if is_in_tune {
            cents = (cents as f32 * 0.3).round() as i32;
        }
        let strength = 0.8 + self.rng.gen::<f32>() * 0.2;

        let pulse = ((t * 0.8).sin() * 0.5 + 0.5) as f32;
        let bass = 0.3 + self.rng.gen::<f32>() * 0.3 + pulse * 0.3;
        let mid = 0.4 + self.rng.gen::<f32>() * 0.4 + pulse * 0.2;
        let high = 0.2 + self.rng.gen::<f32>() * 0.3 + pulse * 0.1;

        let alpha = self.config.simulation_alpha;
        let s = &mut self.snapshot;
        s.bass = bass;
        s.mid = mid;
        s.high = high;
        s.smoothed_bass = smooth(s.smoothed_bass, bass, alpha);
        s.smoothed_mid = smooth(s.smoothed_mid, mid, alpha);
        s.smoothed_high = smooth(s.smoothed_high, high, alpha);
        s.pitch = PitchInfo {
            frequency,
            note,
            octave,
            cents,
            is_in_tune,
            strength,
        };
        s.dominant_pitch_hz = frequency;
        s.dominant_pitch_value = strength;
        s.simulated = true;
    }

    /// Drops the source and stops simulation.
    pub fn dispose(&mut self) {
        self.source = None;
        self.simulating = false;
        self.initialized = false;
        self.snapshot = AnalysisSnapshot::default();
        log::info!("[audio] disposed");
    }
}

#[inline]
fn smooth(previous: f32, raw: f32, alpha: f32) -> f32 {
    previous * (1.0 - alpha) + raw * alpha
}

fn band_average(spectrum: &[u8], bin_hz: f32, [lo, hi]: [f32; 2]) -> f32 {
    let (sum, count) = spectrum
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let f = *i as f32 * bin_hz;
            f >= lo && f < hi
        })
        .fold((0.0f32, 0usize), |(sum, n), (_, &v)| (sum + v as f32 / 255.0, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// First maximum, as (index, value).
fn peak(values: &[u8]) -> Option<(usize, u8)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}

fn detect_pitch(spectrum: &[u8], bin_hz: f32, cfg: &AnalysisConfig) -> PitchInfo {
    let skip = cfg.pitch_skip_bins.min(spectrum.len());
    let Some((i, value)) = peak(&spectrum[skip..]) else {
        return PitchInfo::none();
    };
    let strength = value as f32 / 255.0;
    let frequency = (skip + i) as f32 * bin_hz;
    if strength < cfg.pitch_min_strength
        || frequency < cfg.pitch_min_hz
        || frequency > cfg.pitch_max_hz
    {
        return PitchInfo::none();
    }

    let semitones = 12.0 * (frequency / A4_HZ).log2();
    let rounded = semitones.round();
    let midi = A4_MIDI + rounded as i32;
    let cents = ((semitones - rounded) * 100.0).round() as i32;
    PitchInfo {
        frequency,
        note: NOTE_NAMES[midi.rem_euclid(12) as usize],
        octave: midi.div_euclid(12) - 1,
        cents,
        is_in_tune: cents.abs() <= cfg.in_tune_cents,
        strength,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_average_is_half_open() {
        // 10 Hz bins: bins 2..5 are [20, 50)
        let spectrum = [0, 0, 255, 255, 255, 0, 0, 0];
        assert!((band_average(&spectrum, 10.0, [20.0, 50.0]) - 1.0).abs() < 1e-6);
        assert!((band_average(&spectrum, 10.0, [20.0, 60.0]) - 0.75).abs() < 1e-6);
        assert_eq!(band_average(&spectrum, 10.0, [500.0, 600.0]), 0.0);
    }

    #[test]
    fn peak_prefers_the_lowest_index_on_ties() {
        assert_eq!(peak(&[1, 9, 3, 9]), Some((1, 9)));
        assert_eq!(peak(&[]), None);
    }

    #[test]
    fn weak_peak_is_not_a_pitch() {
        let mut spectrum = vec![0u8; 64];
        spectrum[20] = 20; // below 0.1 of full scale
        let pitch = detect_pitch(&spectrum, 22.0, &AnalysisConfig::default());
        assert_eq!(pitch, PitchInfo::none());
    }
}
