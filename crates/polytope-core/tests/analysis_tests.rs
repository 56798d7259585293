mod common;

use common::approx;
use polytope_core::{AnalysisConfig, AudioError, AudioFeatureExtractor, SpectrumSource};
use std::cell::RefCell;
use std::rc::Rc;

// 45056 Hz over 1024 bins puts every bin on a multiple of 22 Hz, so 440 Hz is bin 20.
const SAMPLE_RATE: f32 = 45056.0;
const BINS: usize = 1024;
const BIN_HZ: f32 = 22.0;

#[derive(Clone)]
struct ScriptedSpectrum {
    data: Rc<RefCell<Vec<u8>>>,
    fail: Rc<RefCell<bool>>,
}

impl ScriptedSpectrum {
    fn new() -> Self {
        Self {
            data: Rc::new(RefCell::new(vec![0; BINS])),
            fail: Rc::new(RefCell::new(false)),
        }
    }

    fn set_peak(&self, hz: f32, value: u8) {
        let mut data = self.data.borrow_mut();
        data.iter_mut().for_each(|b| *b = 0);
        data[(hz / BIN_HZ).round() as usize] = value;
    }

    fn fill_band(&self, lo_hz: f32, hi_hz: f32, value: u8) {
        let mut data = self.data.borrow_mut();
        for (i, b) in data.iter_mut().enumerate() {
            let f = i as f32 * BIN_HZ;
            if f >= lo_hz && f < hi_hz {
                *b = value;
            }
        }
    }
}

impl SpectrumSource for ScriptedSpectrum {
    fn sample_rate(&self) -> f32 {
        SAMPLE_RATE
    }

    fn bin_count(&self) -> usize {
        BINS
    }

    fn fill_byte_frequency_data(&mut self, out: &mut [u8]) -> Result<(), AudioError> {
        if *self.fail.borrow() {
            return Err(AudioError::Read("device unplugged".into()));
        }
        out.copy_from_slice(&self.data.borrow());
        Ok(())
    }
}

fn connected(source: &ScriptedSpectrum) -> AudioFeatureExtractor {
    let mut ex = AudioFeatureExtractor::new(AnalysisConfig::default());
    assert!(ex.initialize());
    assert!(ex.connect_source(Box::new(source.clone())));
    ex
}

#[test]
fn a4_peak_is_in_tune() {
    let source = ScriptedSpectrum::new();
    let mut ex = connected(&source);
    source.set_peak(440.0, 255);

    let pitch = ex.analyze(1.0).pitch.clone();
    assert_eq!(pitch.note, "A");
    assert_eq!(pitch.octave, 4);
    assert_eq!(pitch.cents, 0);
    assert!(pitch.is_in_tune);
    assert!(approx(pitch.frequency, 440.0));
    assert!(approx(pitch.strength, 1.0));
}

#[test]
fn a_sharp_peak_reads_within_half_a_semitone() {
    let source = ScriptedSpectrum::new();
    let mut ex = connected(&source);
    source.set_peak(466.16, 200);

    let pitch = ex.analyze(1.0).pitch.clone();
    assert_eq!(pitch.note, "A#");
    assert_eq!(pitch.octave, 4);
    assert!(pitch.cents.abs() <= 50);
    // the nearest bin is 462 Hz, 16 cents flat
    assert_eq!(pitch.cents, -16);
    assert!(!pitch.is_in_tune);
}

#[test]
fn peaks_outside_the_pitch_range_are_ignored() {
    let source = ScriptedSpectrum::new();
    let mut ex = connected(&source);
    source.set_peak(9000.0, 255);
    assert_eq!(ex.analyze(1.0).pitch.frequency, 0.0);
    assert_eq!(ex.snapshot().pitch.note, "None");
    // the dominant pitch has no upper bound
    assert!(ex.snapshot().dominant_pitch_hz > 8000.0);
}

#[test]
fn smoothing_converges_in_the_expected_number_of_ticks() {
    let source = ScriptedSpectrum::new();
    source.fill_band(20.0, 250.0, 204); // raw bass 0.8
    let mut ex = AudioFeatureExtractor::new(AnalysisConfig::default());
    ex.initialize();
    ex.connect_source(Box::new(source.clone()));

    let alpha = AnalysisConfig::default().smoothing_alpha;
    let ticks = ((0.01f32).ln() / (1.0 - alpha).ln()).ceil() as usize;
    assert_eq!(ticks, 29);

    // connect_source already ran one tick
    for t in 1..ticks {
        ex.analyze(t as f64 * 0.04);
    }
    let s = ex.snapshot();
    assert!(approx(s.bass, 0.8));
    assert!((s.smoothed_bass - 0.8).abs() <= 0.8 * 0.01);

    let mut short = AudioFeatureExtractor::new(AnalysisConfig::default());
    short.initialize();
    short.connect_source(Box::new(source.clone()));
    for t in 1..ticks - 1 {
        short.analyze(t as f64 * 0.04);
    }
    assert!((short.snapshot().smoothed_bass - 0.8).abs() > 0.8 * 0.01);
}

#[test]
fn silence_yields_no_pitch_and_starts_simulation() {
    let source = ScriptedSpectrum::new();
    let mut ex = AudioFeatureExtractor::new(AnalysisConfig::default());
    ex.initialize();
    ex.connect_source(Box::new(source.clone()));

    let snap = ex.snapshot();
    assert_eq!(snap.pitch.frequency, 0.0);
    assert!(!snap.simulated);
    assert!(ex.is_simulating());

    let snap = ex.analyze(2.0);
    assert!(snap.simulated);
    assert!(snap.pitch.frequency > 0.0);

    // live signal takes over again
    source.set_peak(440.0, 255);
    let snap = ex.analyze(2.04).clone();
    assert!(!snap.simulated);
    assert!(!ex.is_simulating());
    assert_eq!(snap.pitch.note, "A");
}

#[test]
fn denied_microphone_falls_back_to_simulation() {
    let mut ex = AudioFeatureExtractor::new(AnalysisConfig::default());
    assert!(ex.initialize());
    ex.connection_failed(&AudioError::Permission("NotAllowedError".into()));
    assert!(ex.is_simulating());

    let mut notes = Vec::new();
    for t in 0..8 {
        let snap = ex.analyze(t as f64 * 2.0);
        assert!(snap.simulated);
        assert!(snap.pitch.strength >= 0.8);
        assert!((3..=5).contains(&snap.pitch.octave));
        notes.push(snap.pitch.note);
    }
    // one note per two seconds through C E G B D F A
    assert_eq!(&notes[..7], &["C", "E", "G", "B", "D", "F", "A"]);
}

#[test]
fn read_failure_switches_to_simulation() {
    let source = ScriptedSpectrum::new();
    source.set_peak(440.0, 255);
    let mut ex = connected(&source);
    assert!(!ex.is_simulating());

    *source.fail.borrow_mut() = true;
    let snap = ex.analyze(1.0);
    assert!(snap.simulated);
    assert!(ex.is_simulating());
}

#[test]
fn band_energies_follow_their_ranges() {
    let source = ScriptedSpectrum::new();
    source.fill_band(4000.0, 12000.0, 255);
    let mut ex = connected(&source);
    let snap = ex.analyze(0.1);
    assert_eq!(snap.bass, 0.0);
    assert_eq!(snap.mid, 0.0);
    assert!(approx(snap.high, 1.0));
}

#[test]
fn uninitialized_extractor_refuses_nothing_but_does_nothing() {
    let mut ex = AudioFeatureExtractor::new(AnalysisConfig::default());
    let snap = ex.analyze(1.0);
    assert_eq!(snap.pitch.frequency, 0.0);
    assert!(!ex.is_simulating());

    let bad = AnalysisConfig {
        fft_size: 3000,
        ..AnalysisConfig::default()
    };
    assert!(!AudioFeatureExtractor::new(bad).initialize());
}

#[test]
fn dispose_detaches_and_stops_simulation() {
    let source = ScriptedSpectrum::new();
    let mut ex = connected(&source);
    ex.start_simulation();
    ex.dispose();
    assert!(!ex.has_source());
    assert!(!ex.is_simulating());
}
