mod common;

use common::approx;
use polytope_core::mapper::Source;
use polytope_core::{AnalysisSnapshot, MappingTable, ParameterState, PitchInfo, ReactiveMapper};

fn silent(bass: f32, mid: f32, high: f32) -> AnalysisSnapshot {
    AnalysisSnapshot {
        smoothed_bass: bass,
        smoothed_mid: mid,
        smoothed_high: high,
        ..AnalysisSnapshot::default()
    }
}

fn pitched(note: &'static str, octave: i32, cents: i32) -> AnalysisSnapshot {
    AnalysisSnapshot {
        smoothed_bass: 0.3,
        smoothed_mid: 0.3,
        smoothed_high: 0.3,
        pitch: PitchInfo {
            frequency: 440.0,
            note,
            octave,
            cents,
            is_in_tune: cents.abs() <= 15,
            strength: 0.9,
        },
        ..AnalysisSnapshot::default()
    }
}

#[test]
fn grid_density_in_silence_follows_bass_and_transient() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    let out = mapper.process(&silent(0.5, 0.2, 0.1), 0.0);

    let expected = (8.0 * (0.5 + 0.5 * 2.2 + out.transient * 0.7)).clamp(1.0, 25.0);
    assert!(approx(out.get("gridDensity").unwrap(), expected));
    // first tick: transient = high · 2
    assert!(approx(out.transient, 0.2));
}

#[test]
fn transients_decay_between_ticks() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    let first = mapper.process(&silent(0.0, 0.0, 0.5), 0.0).transient;
    let steady = mapper.process(&silent(0.0, 0.0, 0.5), 40.0).transient;
    assert!(approx(first, 1.0));
    // (0.5 - 0.4) · 2
    assert!(approx(steady, 0.2));
}

#[test]
fn every_output_stays_inside_its_rule_range() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 7);
    let inputs = [
        silent(1.0, 1.0, 1.0),
        silent(0.0, 0.0, 0.0),
        pitched("B", 8, 49),
        pitched("C", 0, -49),
    ];
    for (i, snap) in inputs.iter().enumerate() {
        let out = mapper.process(snap, i as f64 * 40.0);
        for (name, value) in &out.values {
            let rule = mapper.rules().get(name).unwrap();
            assert!(
                *value >= rule.min && *value <= rule.max,
                "{name} = {value} outside [{}, {}]",
                rule.min,
                rule.max
            );
        }
        assert!((0.005..=0.08).contains(&out.shell_width));
        assert!((0.003..=0.1).contains(&out.tetra_thickness));
    }
}

#[test]
fn pitched_color_uses_note_and_octave() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    let out = mapper.process(&pitched("A", 4, 0), 0.0);
    // 0.75 + 4 · 0.14 wraps to 0.31
    assert!(approx(out.color.hue, 0.31));
    assert!(approx(out.color.saturation, 0.85 + 0.9 * 0.15));
    assert!(approx(out.color.brightness, 0.6 + (1.0 - 0.5 / 3.0) * 0.6));
    assert!(out.color.rgb_offset.abs() <= 0.02);
    assert!(approx(out.projection_distance, 2.5));
    assert!(approx(out.projection_angle, 0.75 * std::f32::consts::TAU));
}

#[test]
fn detuned_notes_split_rgb_with_sign() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    let sharp = mapper.process(&pitched("E", 4, 40), 0.0).color.rgb_offset;
    let flat = mapper.process(&pitched("E", 4, -40), 0.0).color.rgb_offset;
    assert!(approx(sharp, 0.8 * (1.0 + 0.8 * 2.0)));
    assert!(approx(flat, -sharp));
}

#[test]
fn silence_keeps_color_alive() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    let out = mapper.process(&silent(0.0, 0.0, 0.0), 2500.0);
    assert!(approx(out.color.hue, 0.25));
    assert!(out.color.saturation >= 0.9);
    assert!(out.color.brightness >= 0.5);
    let scheme = out.color.to_color_scheme();
    let primary = scheme.primary.unwrap();
    assert!(primary.iter().any(|c| *c > 0.1));
}

#[test]
fn pulse_feedback_reads_the_rule_source() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    mapper.process(&silent(0.5, 0.1, 0.0), 0.0);
    // gridDensity pulses on bass: 0.5 · 1.5
    assert!(approx(mapper.pulse_intensity("gridDensity"), 0.75));
    assert!(mapper.is_parameter_active("gridDensity"));
    // rotationSpeed pulses on mid: 0.15 < 0.25
    assert!(!mapper.is_parameter_active("rotationSpeed"));
    assert_eq!(mapper.pulse_intensity("noSuchParameter"), 0.0);
}

#[test]
fn rules_can_be_updated_per_parameter_from_json() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    let update = MappingTable::from_json(
        r#"{
            "gridDensity": {
                "mode": { "kind": "multiplicative" },
                "pitched": { "baseScale": 1.0 },
                "silent": { "baseScale": 2.0, "terms": [{ "source": "high", "scale": 1.0 }] },
                "min": 0.0,
                "max": 100.0,
                "pulseSource": "high"
            }
        }"#,
    )
    .unwrap();
    mapper.update_rules(update).unwrap();
    assert_eq!(mapper.rules().0.len(), 9);
    assert_eq!(mapper.rules().get("gridDensity").unwrap().pulse_source, Source::High);

    let out = mapper.process(&silent(0.0, 0.0, 0.5), 0.0);
    assert!(approx(out.get("gridDensity").unwrap(), 8.0 * 2.5));
    // untouched rules still apply
    assert!(out.get("morphFactor").is_some());

    let inverted = MappingTable::from_json(
        r#"{ "x": { "mode": { "kind": "bipolar" }, "pitched": { "baseScale": 0 },
                    "silent": { "baseScale": 0 }, "min": 1.0, "max": 0.0 } }"#,
    );
    assert!(inverted.is_err());
}

#[test]
fn mapped_patch_applies_cleanly() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    let out = mapper.process(&pitched("G", 5, 10), 0.0);
    let mut state = ParameterState::default();
    let outcome = state.apply(&out.to_patch());

    assert_eq!(outcome.rejected, 0);
    assert_eq!(outcome.ignored, 0);
    assert!(approx(state.float("gridDensity").unwrap(), out.get("gridDensity").unwrap()));
    assert!(approx(state.data_channels()[0], 0.3));
    assert!(approx(state.data_channels()[3], out.transient));
}

#[test]
fn glitch_adds_high_band_and_transient_on_top_of_base() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    // 0.02 + 0.02 · (0.1 · 0.2) + 0.2 · 0.3
    let first = mapper.process(&silent(0.0, 0.0, 0.1), 0.0);
    assert!(approx(first.get("glitchIntensity").unwrap(), 0.0804));
    // transient falls to (0.1 - 0.08) · 2
    let held = mapper.process(&silent(0.0, 0.0, 0.1), 40.0);
    assert!(approx(held.get("glitchIntensity").unwrap(), 0.0324));

    let mut loud = ReactiveMapper::new(MappingTable::default(), 1);
    let out = loud.process(&silent(0.0, 0.0, 0.5), 0.0);
    assert!(approx(out.get("glitchIntensity").unwrap(), 0.15));
}

#[test]
fn color_shift_swings_both_ways_around_base() {
    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    // dissonance 0.6, energy 0.5: (0.6 - 0.1) · 0.8 + (0.5 - 0.2) · 0.5
    let busy = mapper.process(&silent(0.4, 0.6, 0.5), 0.0);
    assert!(approx(busy.dissonance, 0.6));
    assert!(approx(busy.get("colorShift").unwrap(), 0.55));

    let mut quiet = ReactiveMapper::new(MappingTable::default(), 1);
    let out = quiet.process(&silent(0.0, 0.0, 0.0), 0.0);
    assert!(approx(out.get("colorShift").unwrap(), -0.18));
}

#[test]
fn line_thickness_thins_as_octave_drops() {
    let thickness = |octave| {
        let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
        mapper.process(&pitched("A", octave, 0), 0.0).get("lineThickness").unwrap()
    };
    // 0.03 · (2 - (1.5 - (octave - 2) · 0.8 / 6))
    assert!(approx(thickness(1), 0.011));
    assert!(approx(thickness(4), 0.023));
    assert!(approx(thickness(8), 0.039));

    let mut mapper = ReactiveMapper::new(MappingTable::default(), 1);
    let bright = mapper.process(&silent(0.0, 0.0, 1.0), 0.0);
    // silent factor 1.5 - high + bass · 0.3
    assert!(approx(bright.get("lineThickness").unwrap(), 0.045));
}
