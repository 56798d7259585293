//! The GPU, canvas and frame-scheduling seams.
//!
//! The core never talks to a browser or driver directly. The web frontend
//! implements these traits over `WebGl2RenderingContext`, the native frontend
//! over a logging recorder, and the tests over an in-memory fake.

/// Shader object kind passed to [`Gl::create_shader`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

/// A value ready for one of the typed uniform upload calls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue<'a> {
    F1(f32),
    F2([f32; 2]),
    F3([f32; 3]),
    F1v(&'a [f32]),
}

/// `GL_NO_ERROR`
pub const NO_ERROR: u32 = 0;

/// Minimal subset of a WebGL2-style context used by the composer and render loop.
///
/// Handles are associated types so that each backend keeps its native objects.
pub trait Gl {
    type Shader: Clone;
    type Program: Clone + PartialEq;
    type Buffer: Clone;
    type UniformLocation: Clone;

    fn is_context_lost(&self) -> bool;
    /// Returns and clears the pending error flag, `NO_ERROR` when clean.
    fn get_error(&self) -> u32;

    fn create_shader(&self, kind: ShaderKind) -> Option<Self::Shader>;
    fn shader_source(&self, shader: &Self::Shader, source: &str);
    fn compile_shader(&self, shader: &Self::Shader);
    fn shader_compiled(&self, shader: &Self::Shader) -> bool;
    fn shader_info_log(&self, shader: &Self::Shader) -> String;
    fn delete_shader(&self, shader: &Self::Shader);

    fn create_program(&self) -> Option<Self::Program>;
    fn attach_shader(&self, program: &Self::Program, shader: &Self::Shader);
    fn detach_shader(&self, program: &Self::Program, shader: &Self::Shader);
    fn link_program(&self, program: &Self::Program);
    fn program_linked(&self, program: &Self::Program) -> bool;
    fn program_info_log(&self, program: &Self::Program) -> String;
    fn delete_program(&self, program: &Self::Program);
    fn use_program(&self, program: Option<&Self::Program>);

    fn uniform_location(&self, program: &Self::Program, name: &str)
        -> Option<Self::UniformLocation>;
    /// Attribute index, or `None` where GL would return -1.
    fn attrib_location(&self, program: &Self::Program, name: &str) -> Option<u32>;

    fn uniform1f(&self, location: &Self::UniformLocation, x: f32);
    fn uniform2fv(&self, location: &Self::UniformLocation, v: &[f32; 2]);
    fn uniform3fv(&self, location: &Self::UniformLocation, v: &[f32; 3]);
    fn uniform1fv(&self, location: &Self::UniformLocation, v: &[f32]);

    fn create_buffer(&self) -> Option<Self::Buffer>;
    fn bind_array_buffer(&self, buffer: Option<&Self::Buffer>);
    /// Uploads static vertex data into the bound array buffer.
    fn array_buffer_data(&self, data: &[f32]);
    fn delete_buffer(&self, buffer: &Self::Buffer);
    fn enable_vertex_attrib_array(&self, index: u32);
    /// Tightly packed `FLOAT` attribute at offset 0.
    fn vertex_attrib_pointer_f32(&self, index: u32, components: i32);
    fn draw_triangle_strip(&self, first: i32, count: i32);

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear_color_buffer(&self);
    fn set_blend_alpha(&self);

    /// Dispatches a typed upload for `value`.
    fn upload(&self, location: &Self::UniformLocation, value: UniformValue<'_>) {
        match value {
            UniformValue::F1(x) => self.uniform1f(location, x),
            UniformValue::F2(v) => self.uniform2fv(location, &v),
            UniformValue::F3(v) => self.uniform3fv(location, &v),
            UniformValue::F1v(v) => self.uniform1fv(location, v),
        }
    }
}

/// The drawing surface the loop renders into.
pub trait RenderSurface {
    /// Displayed (CSS) size in pixels.
    fn display_size(&self) -> (u32, u32);
    /// Backing-store size in pixels.
    fn backing_size(&self) -> (u32, u32);
    fn set_backing_size(&mut self, width: u32, height: u32);
}

/// Host frame callback scheduling (e.g. `requestAnimationFrame`).
pub trait FrameScheduler {
    /// Requests the next frame callback and returns its handle.
    fn request_frame(&mut self) -> i32;
    fn cancel_frame(&mut self, handle: i32);
}
