//! The frame loop: time, resize, rebuild, uniform flush and the quad draw.

use crate::composer::ProgramComposer;
use crate::config::VisualizerConfig;
use crate::constants::{POSITION_ATTRIBUTE, QUAD_COMPONENTS, QUAD_VERTEX_COUNT, QUAD_VERTICES};
use crate::error::{Result, VisualizerError};
use crate::gl::{FrameScheduler, Gl, RenderSurface, NO_ERROR};
use crate::params::{ParameterPatch, ParameterState, RESOLUTION, TIME};
use crate::uniforms::{FlushReport, UniformSync};
use std::ops::ControlFlow;

/// Passed to the per-frame render callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInfo {
    pub time: f32,
    pub delta_time: f32,
    pub resolution: [f32; 2],
}

type ErrorHandler = Box<dyn FnMut(&VisualizerError)>;
type RenderCallback = Box<dyn FnMut(&FrameInfo) -> ControlFlow<()>>;

pub struct RenderLoop<G: Gl, S: RenderSurface> {
    gl: G,
    surface: S,
    scheduler: Box<dyn FrameScheduler>,
    composer: ProgramComposer<G>,
    sync: UniformSync,
    program_name: String,
    quad: Option<G::Buffer>,
    position_attribute: Option<u32>,
    running: bool,
    frame_handle: Option<i32>,
    start_time_ms: f64,
    last_time: f32,
    delta_time: f32,
    last_flush: FlushReport,
    on_error: Option<ErrorHandler>,
    on_render: Option<RenderCallback>,
}

impl<G: Gl, S: RenderSurface> RenderLoop<G, S> {
    /// Validates collaborators and creates the quad buffer. No program is built
    /// until [`start`](Self::start).
    pub fn new(
        gl: G,
        surface: S,
        scheduler: Box<dyn FrameScheduler>,
        config: &VisualizerConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| VisualizerError::Configuration(e.to_string()))?;
        if gl.is_context_lost() {
            return Err(VisualizerError::Configuration(
                "GPU context is not usable".into(),
            ));
        }

        let quad = gl.create_buffer().ok_or_else(|| {
            VisualizerError::Configuration("failed to create the quad vertex buffer".into())
        })?;
        gl.bind_array_buffer(Some(&quad));
        gl.array_buffer_data(&QUAD_VERTICES);
        gl.set_blend_alpha();

        let mut state = ParameterState::new(config.data_channels);
        let outcome = state.apply(&config.initial_patch());
        if outcome.rejected > 0 || outcome.ignored > 0 {
            log::warn!(
                "[render] {} initial parameter(s) rejected, {} unknown",
                outcome.rejected,
                outcome.ignored
            );
        }
        let mut sync = UniformSync::new(state);
        sync.request_rebuild();

        Ok(Self {
            gl,
            surface,
            scheduler,
            composer: ProgramComposer::new(config.default_geometry, config.default_projection),
            sync,
            program_name: config.program_name.clone(),
            quad: Some(quad),
            position_attribute: None,
            running: false,
            frame_handle: None,
            start_time_ms: 0.0,
            last_time: 0.0,
            delta_time: 0.0,
            last_flush: FlushReport::default(),
            on_error: None,
            on_render: None,
        })
    }

    pub fn set_error_handler(&mut self, handler: impl FnMut(&VisualizerError) + 'static) {
        self.on_error = Some(Box::new(handler));
    }

    /// Runs after every successful draw. Returning `Break` stops the loop.
    pub fn set_render_callback(
        &mut self,
        callback: impl FnMut(&FrameInfo) -> ControlFlow<()> + 'static,
    ) {
        self.on_render = Some(Box::new(callback));
    }

    pub fn gl(&self) -> &G {
        &self.gl
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn composer(&self) -> &ProgramComposer<G> {
        &self.composer
    }

    pub fn parameters(&self) -> &ParameterState {
        self.sync.state()
    }

    pub fn uniforms(&self) -> &UniformSync {
        &self.sync
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn last_flush(&self) -> FlushReport {
        self.last_flush
    }

    /// Last-write-wins partial update. Geometry or projection changes rebuild
    /// on the next frame.
    pub fn update_parameters(&mut self, patch: &ParameterPatch) {
        if self.sync.update_parameters(patch) {
            log::info!(
                "[render] rebuild requested for {} / {}",
                self.sync.state().geometry_type(),
                self.sync.state().projection_method()
            );
        }
    }

    /// Starts the loop with `now_ms` as the time origin.
    pub fn start(&mut self, now_ms: f64) {
        if self.running {
            return;
        }
        if self.gl.is_context_lost() {
            log::warn!("[render] start ignored: GPU context lost");
            return;
        }
        self.start_time_ms = now_ms;
        self.last_time = 0.0;
        self.delta_time = 0.0;

        if self.sync.needs_rebuild() || self.composer.current_program().is_none() {
            if let Err(e) = self.rebuild() {
                self.report(&e);
                return;
            }
        }
        let (w, h) = self.surface.backing_size();
        self.gl.viewport(0, 0, w as i32, h as i32);
        self.sync
            .state_mut()
            .set_vec2(RESOLUTION, [w as f32, h as f32]);
        self.sync.mark_all_dirty();

        self.running = true;
        self.frame_handle = Some(self.scheduler.request_frame());
        log::info!("[render] started");
    }

    /// Cancels the pending frame. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(handle) = self.frame_handle.take() {
            self.scheduler.cancel_frame(handle);
        }
        if self.running {
            self.running = false;
            log::info!("[render] stopped");
        }
    }

    /// Draws one frame. Returns whether another frame was scheduled.
    pub fn render(&mut self, timestamp_ms: f64) -> bool {
        self.frame_handle = None;
        if !self.running {
            return false;
        }
        if self.gl.is_context_lost() {
            self.stop();
            self.report(&VisualizerError::ContextLost);
            return false;
        }

        let time = ((timestamp_ms - self.start_time_ms) / 1000.0) as f32;
        self.delta_time = (time - self.last_time).max(0.0);
        self.last_time = time;
        self.sync.state_mut().set_float(TIME, time);
        self.sync.mark_dirty(TIME);

        self.resize_if_needed();

        if self.sync.needs_rebuild() {
            if let Err(e) = self.rebuild() {
                self.stop();
                self.report(&e);
                return false;
            }
        }

        if let Err(e) = self.draw() {
            self.stop();
            self.report(&e);
            return false;
        }

        let info = FrameInfo {
            time,
            delta_time: self.delta_time,
            resolution: self.sync.state().vec2(RESOLUTION).unwrap_or([0.0, 0.0]),
        };
        let flow = match self.on_render.as_mut() {
            Some(callback) => callback(&info),
            None => ControlFlow::Continue(()),
        };
        if flow.is_break() {
            self.stop();
        }

        if self.running {
            self.frame_handle = Some(self.scheduler.request_frame());
        }
        self.running
    }

    fn resize_if_needed(&mut self) {
        let display = self.surface.display_size();
        if display == self.surface.backing_size() {
            return;
        }
        let (w, h) = display;
        self.surface.set_backing_size(w, h);
        self.gl.viewport(0, 0, w as i32, h as i32);
        self.sync
            .state_mut()
            .set_vec2(RESOLUTION, [w as f32, h as f32]);
        self.sync.mark_dirty(RESOLUTION);
        log::debug!("[render] resized to {}x{}", w, h);
    }

    fn rebuild(&mut self) -> Result<()> {
        let geometry = self.sync.state().geometry_type().to_string();
        let projection = self.sync.state().projection_method().to_string();
        self.composer
            .build(&self.gl, &self.program_name, &geometry, &projection)?;
        self.composer.use_program(&self.gl, Some(&self.program_name));
        self.sync.clear_rebuild();
        self.sync.mark_all_dirty();

        self.position_attribute = self
            .composer
            .attribute_location(&self.gl, POSITION_ATTRIBUTE);
        match self.position_attribute {
            Some(index) => {
                self.gl.bind_array_buffer(self.quad.as_ref());
                self.gl.enable_vertex_attrib_array(index);
                self.gl.vertex_attrib_pointer_f32(index, QUAD_COMPONENTS);
            }
            None => log::warn!(
                "[render] program '{}' has no '{}' attribute; skipping draws",
                self.program_name,
                POSITION_ATTRIBUTE
            ),
        }
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        self.last_flush = self.sync.flush(&self.gl, &mut self.composer);

        let [r, g, b] = self.sync.state().color_scheme().background;
        self.gl.clear_color(r, g, b, 1.0);
        self.gl.clear_color_buffer();

        let Some(index) = self.position_attribute else {
            return Ok(());
        };
        self.gl.bind_array_buffer(self.quad.as_ref());
        self.gl.vertex_attrib_pointer_f32(index, QUAD_COMPONENTS);
        self.gl.draw_triangle_strip(0, QUAD_VERTEX_COUNT);

        match self.gl.get_error() {
            NO_ERROR => Ok(()),
            code => Err(VisualizerError::Draw(format!("GL error 0x{code:04x}"))),
        }
    }

    fn report(&mut self, error: &VisualizerError) {
        log::error!("[render] {}", error);
        if let Some(handler) = self.on_error.as_mut() {
            handler(error);
        }
    }

    /// Stops and releases the quad buffer, programs and shaders.
    pub fn dispose(&mut self) {
        self.stop();
        if let Some(quad) = self.quad.take() {
            self.gl.bind_array_buffer(None);
            self.gl.delete_buffer(&quad);
        }
        self.composer.dispose(&self.gl);
        self.position_attribute = None;
        self.sync.request_rebuild();
        log::info!("[render] disposed");
    }
}
