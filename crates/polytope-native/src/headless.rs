//! A GPU-less backend for driving the render loop from the terminal.

use polytope_core::gl::{FrameScheduler, Gl, RenderSurface, ShaderKind, NO_ERROR};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct GlStats {
    pub compiles: Cell<u32>,
    pub links: Cell<u32>,
    pub uploads: Cell<u32>,
    pub draws: Cell<u32>,
}

/// Accepts every call, compiles and links everything, and logs at `trace`.
#[derive(Clone, Default)]
pub struct LogGl {
    next_id: Rc<Cell<u32>>,
    pub stats: Rc<GlStats>,
}

impl LogGl {
    fn id(&self) -> u32 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }
}

fn bump(c: &Cell<u32>) {
    c.set(c.get() + 1);
}

impl Gl for LogGl {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type UniformLocation = String;

    fn is_context_lost(&self) -> bool {
        false
    }

    fn get_error(&self) -> u32 {
        NO_ERROR
    }

    fn create_shader(&self, kind: ShaderKind) -> Option<u32> {
        let id = self.id();
        log::trace!("[gl] create {:?} shader {}", kind, id);
        Some(id)
    }

    fn shader_source(&self, shader: &u32, source: &str) {
        log::trace!("[gl] shader {} source: {} bytes", shader, source.len());
    }

    fn compile_shader(&self, _shader: &u32) {
        bump(&self.stats.compiles);
    }

    fn shader_compiled(&self, _shader: &u32) -> bool {
        true
    }

    fn shader_info_log(&self, _shader: &u32) -> String {
        String::new()
    }

    fn delete_shader(&self, shader: &u32) {
        log::trace!("[gl] delete shader {}", shader);
    }

    fn create_program(&self) -> Option<u32> {
        Some(self.id())
    }

    fn attach_shader(&self, _program: &u32, _shader: &u32) {}

    fn detach_shader(&self, _program: &u32, _shader: &u32) {}

    fn link_program(&self, program: &u32) {
        bump(&self.stats.links);
        log::debug!("[gl] link program {}", program);
    }

    fn program_linked(&self, _program: &u32) -> bool {
        true
    }

    fn program_info_log(&self, _program: &u32) -> String {
        String::new()
    }

    fn delete_program(&self, program: &u32) {
        log::trace!("[gl] delete program {}", program);
    }

    fn use_program(&self, program: Option<&u32>) {
        log::trace!("[gl] use program {:?}", program);
    }

    fn uniform_location(&self, _program: &u32, name: &str) -> Option<String> {
        Some(name.to_string())
    }

    fn attrib_location(&self, _program: &u32, _name: &str) -> Option<u32> {
        Some(0)
    }

    fn uniform1f(&self, location: &String, x: f32) {
        bump(&self.stats.uploads);
        log::trace!("[gl] {} = {}", location, x);
    }

    fn uniform2fv(&self, location: &String, v: &[f32; 2]) {
        bump(&self.stats.uploads);
        log::trace!("[gl] {} = {:?}", location, v);
    }

    fn uniform3fv(&self, location: &String, v: &[f32; 3]) {
        bump(&self.stats.uploads);
        log::trace!("[gl] {} = {:?}", location, v);
    }

    fn uniform1fv(&self, location: &String, v: &[f32]) {
        bump(&self.stats.uploads);
        log::trace!("[gl] {} = {:?}", location, v);
    }

    fn create_buffer(&self) -> Option<u32> {
        Some(self.id())
    }

    fn bind_array_buffer(&self, _buffer: Option<&u32>) {}

    fn array_buffer_data(&self, data: &[f32]) {
        log::trace!("[gl] buffer data: {} floats", data.len());
    }

    fn delete_buffer(&self, _buffer: &u32) {}

    fn enable_vertex_attrib_array(&self, _index: u32) {}

    fn vertex_attrib_pointer_f32(&self, _index: u32, _components: i32) {}

    fn draw_triangle_strip(&self, _first: i32, _count: i32) {
        bump(&self.stats.draws);
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        log::debug!("[gl] viewport {} {} {} {}", x, y, width, height);
    }

    fn clear_color(&self, _r: f32, _g: f32, _b: f32, _a: f32) {}

    fn clear_color_buffer(&self) {}

    fn set_blend_alpha(&self) {}
}

pub struct FixedSurface {
    size: (u32, u32),
    backing: (u32, u32),
}

impl FixedSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width.max(1), height.max(1)),
            backing: (0, 0),
        }
    }
}

impl RenderSurface for FixedSurface {
    fn display_size(&self) -> (u32, u32) {
        self.size
    }

    fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.backing = (width, height);
    }
}

/// Hands out handles; the caller drives `render` itself.
#[derive(Default)]
pub struct ManualScheduler {
    next: i32,
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> i32 {
        self.next += 1;
        self.next
    }

    fn cancel_frame(&mut self, _handle: i32) {}
}
