// DOM element ids used by index.html
pub const CANVAS_ID: &str = "viz-canvas";
pub const GEOMETRY_SELECT_ID: &str = "geometry-select";
pub const PROJECTION_SELECT_ID: &str = "projection-select";
pub const STATUS_ID: &str = "audio-status";
// Optional <script type="application/json"> blocks overriding the defaults
pub const VISUALIZER_CONFIG_ID: &str = "visualizer-config";
pub const MAPPING_CONFIG_ID: &str = "mapping-config";

// Canvas backing store
pub const MAX_DEVICE_PIXEL_RATIO: f64 = 2.0; // caps fill cost on dense displays

// Silent sink keeps the analyser pulled by the audio graph without playback
pub const SINK_GAIN: f32 = 0.0;

// DOMException names that mean the user (or policy) refused the microphone
pub const PERMISSION_ERROR_NAMES: [&str; 3] =
    ["NotAllowedError", "SecurityError", "PermissionDeniedError"];

/// Backing-store size for a CSS box at the given device pixel ratio.
#[inline]
pub fn backing_size_for(css_width: f64, css_height: f64, device_pixel_ratio: f64) -> (u32, u32) {
    let dpr = device_pixel_ratio.clamp(1.0, MAX_DEVICE_PIXEL_RATIO);
    let w = (css_width * dpr).floor().max(1.0) as u32;
    let h = (css_height * dpr).floor().max(1.0) as u32;
    (w, h)
}

/// Pointer position mapped into `[0, 1]^2` with y pointing up, as `u_mouse` expects.
#[inline]
pub fn pointer_uv(
    client_x: f64,
    client_y: f64,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
) -> [f32; 2] {
    if width <= 0.0 || height <= 0.0 {
        return [0.5, 0.5];
    }
    let u = ((client_x - left) / width).clamp(0.0, 1.0);
    let v = 1.0 - ((client_y - top) / height).clamp(0.0, 1.0);
    [u as f32, v as f32]
}

#[inline]
pub fn is_permission_error(name: &str) -> bool {
    PERMISSION_ERROR_NAMES.contains(&name)
}
