use polytope_core::gl::{Gl, RenderSurface, ShaderKind};
use web_sys as web;
use web_sys::WebGl2RenderingContext as GL;

use crate::constants::backing_size_for;

/// `Gl` over a browser WebGL2 context.
#[derive(Clone)]
pub struct WebGl {
    ctx: GL,
}

impl WebGl {
    pub fn new(ctx: GL) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &GL {
        &self.ctx
    }
}

impl Gl for WebGl {
    type Shader = web::WebGlShader;
    type Program = web::WebGlProgram;
    type Buffer = web::WebGlBuffer;
    type UniformLocation = web::WebGlUniformLocation;

    fn is_context_lost(&self) -> bool {
        self.ctx.is_context_lost()
    }

    fn get_error(&self) -> u32 {
        self.ctx.get_error()
    }

    fn create_shader(&self, kind: ShaderKind) -> Option<Self::Shader> {
        let ty = match kind {
            ShaderKind::Vertex => GL::VERTEX_SHADER,
            ShaderKind::Fragment => GL::FRAGMENT_SHADER,
        };
        self.ctx.create_shader(ty)
    }

    fn shader_source(&self, shader: &Self::Shader, source: &str) {
        self.ctx.shader_source(shader, source);
    }

    fn compile_shader(&self, shader: &Self::Shader) {
        self.ctx.compile_shader(shader);
    }

    fn shader_compiled(&self, shader: &Self::Shader) -> bool {
        self.ctx
            .get_shader_parameter(shader, GL::COMPILE_STATUS)
            .as_bool()
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: &Self::Shader) -> String {
        self.ctx.get_shader_info_log(shader).unwrap_or_default()
    }

    fn delete_shader(&self, shader: &Self::Shader) {
        self.ctx.delete_shader(Some(shader));
    }

    fn create_program(&self) -> Option<Self::Program> {
        self.ctx.create_program()
    }

    fn attach_shader(&self, program: &Self::Program, shader: &Self::Shader) {
        self.ctx.attach_shader(program, shader);
    }

    fn detach_shader(&self, program: &Self::Program, shader: &Self::Shader) {
        self.ctx.detach_shader(program, shader);
    }

    fn link_program(&self, program: &Self::Program) {
        self.ctx.link_program(program);
    }

    fn program_linked(&self, program: &Self::Program) -> bool {
        self.ctx
            .get_program_parameter(program, GL::LINK_STATUS)
            .as_bool()
            .unwrap_or(false)
    }

    fn program_info_log(&self, program: &Self::Program) -> String {
        self.ctx.get_program_info_log(program).unwrap_or_default()
    }

    fn delete_program(&self, program: &Self::Program) {
        self.ctx.delete_program(Some(program));
    }

    fn use_program(&self, program: Option<&Self::Program>) {
        self.ctx.use_program(program);
    }

    fn uniform_location(
        &self,
        program: &Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        self.ctx.get_uniform_location(program, name)
    }

    fn attrib_location(&self, program: &Self::Program, name: &str) -> Option<u32> {
        let index = self.ctx.get_attrib_location(program, name);
        (index >= 0).then_some(index as u32)
    }

    fn uniform1f(&self, location: &Self::UniformLocation, x: f32) {
        self.ctx.uniform1f(Some(location), x);
    }

    fn uniform2fv(&self, location: &Self::UniformLocation, v: &[f32; 2]) {
        self.ctx.uniform2fv_with_f32_array(Some(location), v);
    }

    fn uniform3fv(&self, location: &Self::UniformLocation, v: &[f32; 3]) {
        self.ctx.uniform3fv_with_f32_array(Some(location), v);
    }

    fn uniform1fv(&self, location: &Self::UniformLocation, v: &[f32]) {
        self.ctx.uniform1fv_with_f32_array(Some(location), v);
    }

    fn create_buffer(&self) -> Option<Self::Buffer> {
        self.ctx.create_buffer()
    }

    fn bind_array_buffer(&self, buffer: Option<&Self::Buffer>) {
        self.ctx.bind_buffer(GL::ARRAY_BUFFER, buffer);
    }

    fn array_buffer_data(&self, data: &[f32]) {
        self.ctx.buffer_data_with_u8_array(
            GL::ARRAY_BUFFER,
            bytemuck::cast_slice(data),
            GL::STATIC_DRAW,
        );
    }

    fn delete_buffer(&self, buffer: &Self::Buffer) {
        self.ctx.delete_buffer(Some(buffer));
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.ctx.enable_vertex_attrib_array(index);
    }

    fn vertex_attrib_pointer_f32(&self, index: u32, components: i32) {
        self.ctx
            .vertex_attrib_pointer_with_i32(index, components, GL::FLOAT, false, 0, 0);
    }

    fn draw_triangle_strip(&self, first: i32, count: i32) {
        self.ctx.draw_arrays(GL::TRIANGLE_STRIP, first, count);
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.ctx.viewport(x, y, width, height);
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.ctx.clear_color(r, g, b, a);
    }

    fn clear_color_buffer(&self) {
        self.ctx.clear(GL::COLOR_BUFFER_BIT);
    }

    fn set_blend_alpha(&self) {
        self.ctx.enable(GL::BLEND);
        self.ctx.blend_func(GL::SRC_ALPHA, GL::ONE_MINUS_SRC_ALPHA);
    }
}

/// The canvas as a render surface; display size is its CSS box times the pixel ratio.
pub struct CanvasSurface {
    canvas: web::HtmlCanvasElement,
}

impl CanvasSurface {
    pub fn new(canvas: web::HtmlCanvasElement) -> Self {
        Self { canvas }
    }

    pub fn canvas(&self) -> &web::HtmlCanvasElement {
        &self.canvas
    }
}

impl RenderSurface for CanvasSurface {
    fn display_size(&self) -> (u32, u32) {
        let dpr = web::window().map(|w| w.device_pixel_ratio()).unwrap_or(1.0);
        backing_size_for(
            self.canvas.client_width() as f64,
            self.canvas.client_height() as f64,
            dpr,
        )
    }

    fn backing_size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }
}
