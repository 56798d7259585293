// Shared tuning constants used by the core and both frontends.

// Full-screen quad drawn as a 4-vertex triangle strip
pub const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
pub const QUAD_VERTEX_COUNT: i32 = 4;
pub const QUAD_COMPONENTS: i32 = 2; // vec2 a_position

// Shader composition
pub const GEOMETRY_MARKER: &str = "//__GEOMETRY_CODE_INJECTION_POINT__";
pub const PROJECTION_MARKER: &str = "//__PROJECTION_CODE_INJECTION_POINT__";
pub const GEOMETRY_SIGNATURE: &str = "float calculateLattice(vec3";
pub const PROJECTION_SIGNATURE: &str = "vec3 project4Dto3D(vec4";
pub const POSITION_ATTRIBUTE: &str = "a_position";
pub const DEFAULT_PROGRAM_NAME: &str = "maleficarumViz";
pub const BASE_VERTEX_SHADER_NAME: &str = "base-vertex";

// Data channel array bounds
pub const MIN_DATA_CHANNELS: usize = 8;
pub const MAX_DATA_CHANNELS: usize = 64; // matches u_dataChannels[64] in base.frag

// Analyser setup
pub const FFT_SIZE: usize = 2048;
pub const ANALYSER_SMOOTHING: f32 = 0.4; // platform-side temporal smoothing
pub const ANALYSER_MIN_DB: f32 = -100.0;
pub const ANALYSER_MAX_DB: f32 = -30.0;

// Band edges in Hz, half-open [low, high)
pub const BASS_BAND: [f32; 2] = [20.0, 250.0];
pub const MID_BAND: [f32; 2] = [250.0, 4000.0];
pub const HIGH_BAND: [f32; 2] = [4000.0, 12000.0];

// Exponential smoothing of band energies
pub const BAND_SMOOTHING_ALPHA: f32 = 0.15;
pub const SIMULATION_SMOOTHING_ALPHA: f32 = 0.2;

// Pitch detection
pub const PITCH_SKIP_BINS: usize = 5; // DC-adjacent bins ignored
pub const PITCH_MIN_STRENGTH: f32 = 0.1;
pub const PITCH_MIN_HZ: f32 = 20.0;
pub const PITCH_MAX_HZ: f32 = 8000.0;
pub const DOMINANT_PITCH_FLOOR_HZ: f32 = 80.0;
pub const IN_TUNE_CENTS: i32 = 15;
pub const A4_HZ: f32 = 440.0;
pub const A4_MIDI: i32 = 69;

// Analysis tick (web setInterval and native analysis thread)
pub const ANALYSIS_INTERVAL_MS: u32 = 40; // ~25 Hz

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

// Fourth-octave reference frequencies, same order as NOTE_NAMES
pub const NOTE_FREQUENCIES: [f32; 12] = [
    261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.00, 415.30, 440.00, 466.16, 493.88,
];

// Position of each note along the color wheel, same order as NOTE_NAMES
pub const NOTE_HUES: [f32; 12] = [
    0.0, 0.083, 0.167, 0.25, 0.333, 0.417, 0.5, 0.583, 0.667, 0.75, 0.833, 0.917,
];

/// Index of a note name in `NOTE_NAMES`, if it is one.
#[inline]
pub fn note_index(name: &str) -> Option<usize> {
    NOTE_NAMES.iter().position(|n| *n == name)
}
