// In-memory stand-ins for the GPU, canvas and frame scheduler.
#![allow(dead_code)]

use polytope_core::{FrameScheduler, Gl, RenderSurface, ShaderKind};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub const INVALID_OPERATION: u32 = 0x0502;

#[derive(Clone, Debug, PartialEq)]
pub enum Upload {
    F1(f32),
    F2([f32; 2]),
    F3([f32; 3]),
    F1v(Vec<f32>),
}

#[derive(Default)]
pub struct GlLog {
    next_id: u32,
    pub shader_kinds: HashMap<u32, ShaderKind>,
    pub shader_sources: HashMap<u32, String>,
    pub compiles: usize,
    pub links: usize,
    pub deleted_shaders: Vec<u32>,
    pub deleted_programs: Vec<u32>,
    pub deleted_buffers: Vec<u32>,
    pub detaches: usize,
    pub attached: HashSet<(u32, u32)>,
    pub use_program_calls: Vec<Option<u32>>,
    pub bound_program: Option<u32>,
    pub uniform_queries: usize,
    pub uploads: Vec<(String, Upload)>,
    pub viewports: Vec<(i32, i32, i32, i32)>,
    pub draws: usize,
    pub clears: usize,

    // failure injection
    pub fail_fragment_compile: Option<String>,
    pub fail_link: Option<String>,
    pub context_lost: bool,
    pub pending_error: u32,
    pub missing_uniforms: HashSet<String>,
    pub missing_attribute: bool,
    pub fail_buffer: bool,
}

impl GlLog {
    fn id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn uploads_of(&self, name: &str) -> usize {
        self.uploads.iter().filter(|(n, _)| n == name).count()
    }

    pub fn last_upload(&self, name: &str) -> Option<&Upload> {
        self.uploads
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, u)| u)
    }

    pub fn uniform_calls(&self) -> usize {
        self.uploads.len()
    }
}

#[derive(Clone, Default)]
pub struct FakeGl {
    pub log: Rc<RefCell<GlLog>>,
}

impl FakeGl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> std::cell::Ref<'_, GlLog> {
        self.log.borrow()
    }

    pub fn log_mut(&self) -> std::cell::RefMut<'_, GlLog> {
        self.log.borrow_mut()
    }

    fn record(&self, name: &str, upload: Upload) {
        self.log.borrow_mut().uploads.push((name.to_string(), upload));
    }
}

impl Gl for FakeGl {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type UniformLocation = String;

    fn is_context_lost(&self) -> bool {
        self.log.borrow().context_lost
    }

    fn get_error(&self) -> u32 {
        std::mem::take(&mut self.log.borrow_mut().pending_error)
    }

    fn create_shader(&self, kind: ShaderKind) -> Option<u32> {
        let mut log = self.log.borrow_mut();
        let id = log.id();
        log.shader_kinds.insert(id, kind);
        Some(id)
    }

    fn shader_source(&self, shader: &u32, source: &str) {
        self.log
            .borrow_mut()
            .shader_sources
            .insert(*shader, source.to_string());
    }

    fn compile_shader(&self, _shader: &u32) {
        self.log.borrow_mut().compiles += 1;
    }

    fn shader_compiled(&self, shader: &u32) -> bool {
        let log = self.log.borrow();
        !(log.fail_fragment_compile.is_some()
            && log.shader_kinds.get(shader) == Some(&ShaderKind::Fragment))
    }

    fn shader_info_log(&self, _shader: &u32) -> String {
        self.log
            .borrow()
            .fail_fragment_compile
            .clone()
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: &u32) {
        self.log.borrow_mut().deleted_shaders.push(*shader);
    }

    fn create_program(&self) -> Option<u32> {
        Some(self.log.borrow_mut().id())
    }

    fn attach_shader(&self, program: &u32, shader: &u32) {
        self.log.borrow_mut().attached.insert((*program, *shader));
    }

    fn detach_shader(&self, program: &u32, shader: &u32) {
        let mut log = self.log.borrow_mut();
        log.detaches += 1;
        if !log.attached.remove(&(*program, *shader)) {
            log.pending_error = INVALID_OPERATION;
        }
    }

    fn link_program(&self, _program: &u32) {
        self.log.borrow_mut().links += 1;
    }

    fn program_linked(&self, _program: &u32) -> bool {
        self.log.borrow().fail_link.is_none()
    }

    fn program_info_log(&self, _program: &u32) -> String {
        self.log.borrow().fail_link.clone().unwrap_or_default()
    }

    fn delete_program(&self, program: &u32) {
        self.log.borrow_mut().deleted_programs.push(*program);
    }

    fn use_program(&self, program: Option<&u32>) {
        let mut log = self.log.borrow_mut();
        log.use_program_calls.push(program.copied());
        log.bound_program = program.copied();
    }

    fn uniform_location(&self, _program: &u32, name: &str) -> Option<String> {
        let mut log = self.log.borrow_mut();
        log.uniform_queries += 1;
        if log.missing_uniforms.contains(name) {
            None
        } else {
            Some(name.to_string())
        }
    }

    fn attrib_location(&self, _program: &u32, _name: &str) -> Option<u32> {
        if self.log.borrow().missing_attribute {
            None
        } else {
            Some(0)
        }
    }

    fn uniform1f(&self, location: &String, x: f32) {
        self.record(location, Upload::F1(x));
    }

    fn uniform2fv(&self, location: &String, v: &[f32; 2]) {
        self.record(location, Upload::F2(*v));
    }

    fn uniform3fv(&self, location: &String, v: &[f32; 3]) {
        self.record(location, Upload::F3(*v));
    }

    fn uniform1fv(&self, location: &String, v: &[f32]) {
        self.record(location, Upload::F1v(v.to_vec()));
    }

    fn create_buffer(&self) -> Option<u32> {
        let mut log = self.log.borrow_mut();
        if log.fail_buffer {
            return None;
        }
        Some(log.id())
    }

    fn bind_array_buffer(&self, _buffer: Option<&u32>) {}

    fn array_buffer_data(&self, _data: &[f32]) {}

    fn delete_buffer(&self, buffer: &u32) {
        self.log.borrow_mut().deleted_buffers.push(*buffer);
    }

    fn enable_vertex_attrib_array(&self, _index: u32) {}

    fn vertex_attrib_pointer_f32(&self, _index: u32, _components: i32) {}

    fn draw_triangle_strip(&self, _first: i32, _count: i32) {
        self.log.borrow_mut().draws += 1;
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.log.borrow_mut().viewports.push((x, y, width, height));
    }

    fn clear_color(&self, _r: f32, _g: f32, _b: f32, _a: f32) {}

    fn clear_color_buffer(&self) {
        self.log.borrow_mut().clears += 1;
    }

    fn set_blend_alpha(&self) {}
}

pub struct FakeSurface {
    pub display: (u32, u32),
    pub backing: (u32, u32),
    pub resizes: usize,
}

impl FakeSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            display: (width, height),
            backing: (width, height),
            resizes: 0,
        }
    }
}

impl RenderSurface for FakeSurface {
    fn display_size(&self) -> (u32, u32) {
        self.display
    }

    fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.backing = (width, height);
        self.resizes += 1;
    }
}

#[derive(Default)]
pub struct SchedulerLog {
    pub requests: usize,
    pub cancels: Vec<i32>,
}

#[derive(Clone, Default)]
pub struct FakeScheduler {
    pub log: Rc<RefCell<SchedulerLog>>,
}

impl FrameScheduler for FakeScheduler {
    fn request_frame(&mut self) -> i32 {
        let mut log = self.log.borrow_mut();
        log.requests += 1;
        log.requests as i32
    }

    fn cancel_frame(&mut self, handle: i32) {
        self.log.borrow_mut().cancels.push(handle);
    }
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}
