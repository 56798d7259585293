//! Assembles, compiles and links the visualizer program from the fragment
//! template plus one geometry and one projection provider.

use crate::constants::{
    BASE_VERTEX_SHADER_NAME, GEOMETRY_MARKER, GEOMETRY_SIGNATURE, PROJECTION_MARKER,
    PROJECTION_SIGNATURE,
};
use crate::error::{ComposeError, ShaderStage};
use crate::gl::{Gl, ShaderKind};
use crate::providers::{GeometryKind, ProjectionKind, BASE_FRAGMENT_TEMPLATE, BASE_VERTEX_SHADER};
use fnv::FnvHashMap;

struct ProgramEntry<G: Gl> {
    program: G::Program,
    vertex: G::Shader,
    fragment: G::Shader,
    vertex_id: String,
    fragment_id: String,
    // Misses are cached as None until the program is replaced.
    uniforms: FnvHashMap<String, Option<G::UniformLocation>>,
    attributes: FnvHashMap<String, Option<u32>>,
}

pub struct ProgramComposer<G: Gl> {
    default_geometry: GeometryKind,
    default_projection: ProjectionKind,
    shaders: FnvHashMap<String, G::Shader>,
    programs: FnvHashMap<String, ProgramEntry<G>>,
    current: Option<String>,
}

impl<G: Gl> ProgramComposer<G> {
    pub fn new(default_geometry: GeometryKind, default_projection: ProjectionKind) -> Self {
        Self {
            default_geometry,
            default_projection,
            shaders: FnvHashMap::default(),
            programs: FnvHashMap::default(),
            current: None,
        }
    }

    pub fn resolve_geometry(&self, name: &str) -> GeometryKind {
        GeometryKind::resolve(name, self.default_geometry)
    }

    pub fn resolve_projection(&self, name: &str) -> ProjectionKind {
        ProjectionKind::resolve(name, self.default_projection)
    }

    /// Fragment source for a combination, without touching the GPU.
    pub fn compose_fragment_source(
        &self,
        geometry_name: &str,
        projection_name: &str,
    ) -> Result<String, ComposeError> {
        let geometry = self.resolve_geometry(geometry_name);
        let projection = self.resolve_projection(projection_name);
        compose_fragment(
            BASE_FRAGMENT_TEMPLATE,
            geometry.name(),
            geometry.source(),
            projection.name(),
            projection.source(),
        )
    }

    /// Builds (or rebuilds) `program_name` from the named providers.
    ///
    /// Any previous program under the same name is deleted first. Shader
    /// objects are reused across builds, so revisiting a combination only links.
    pub fn build(
        &mut self,
        gl: &G,
        program_name: &str,
        geometry_name: &str,
        projection_name: &str,
    ) -> Result<G::Program, ComposeError> {
        let geometry = self.resolve_geometry(geometry_name);
        let projection = self.resolve_projection(projection_name);
        let was_current = self.current.as_deref() == Some(program_name);

        if let Some(old) = self.programs.remove(program_name) {
            self.release_program(gl, &old);
        }

        let result = self.link(gl, program_name, geometry, projection);
        match &result {
            Ok(program) if was_current => gl.use_program(Some(program)),
            Err(_) if was_current => {
                gl.use_program(None);
                self.current = None;
            }
            _ => {}
        }
        result
    }

    fn link(
        &mut self,
        gl: &G,
        program_name: &str,
        geometry: GeometryKind,
        projection: ProjectionKind,
    ) -> Result<G::Program, ComposeError> {
        let vertex = self.shader(
            gl,
            BASE_VERTEX_SHADER_NAME,
            ShaderStage::Vertex,
            || Ok(BASE_VERTEX_SHADER.to_string()),
        )?;
        let fragment_id = format!("fragment-{}-{}", geometry.name(), projection.name());
        let fragment = self.shader(gl, &fragment_id, ShaderStage::Fragment, || {
            compose_fragment(
                BASE_FRAGMENT_TEMPLATE,
                geometry.name(),
                geometry.source(),
                projection.name(),
                projection.source(),
            )
        })?;

        let program = gl
            .create_program()
            .ok_or_else(|| ComposeError::ProgramAllocation(program_name.to_string()))?;
        gl.attach_shader(&program, &vertex);
        gl.attach_shader(&program, &fragment);
        gl.link_program(&program);

        if !gl.program_linked(&program) {
            let log = gl.program_info_log(&program);
            log::error!("[composer] link failed for '{}': {}", program_name, log);
            gl.detach_shader(&program, &vertex);
            gl.detach_shader(&program, &fragment);
            // Shaders still attached to another live program stay cached
            for id in [BASE_VERTEX_SHADER_NAME, fragment_id.as_str()] {
                if self.shader_in_use(id) {
                    continue;
                }
                if let Some(shader) = self.shaders.remove(id) {
                    gl.delete_shader(&shader);
                }
            }
            gl.delete_program(&program);
            return Err(ComposeError::Link {
                program: program_name.to_string(),
                log,
            });
        }

        log::info!(
            "[composer] linked '{}' ({} / {})",
            program_name,
            geometry.name(),
            projection.name()
        );
        self.programs.insert(
            program_name.to_string(),
            ProgramEntry {
                program: program.clone(),
                vertex,
                fragment,
                vertex_id: BASE_VERTEX_SHADER_NAME.to_string(),
                fragment_id,
                uniforms: FnvHashMap::default(),
                attributes: FnvHashMap::default(),
            },
        );
        Ok(program)
    }

    fn shader(
        &mut self,
        gl: &G,
        id: &str,
        stage: ShaderStage,
        source: impl FnOnce() -> Result<String, ComposeError>,
    ) -> Result<G::Shader, ComposeError> {
        if let Some(shader) = self.shaders.get(id) {
            return Ok(shader.clone());
        }
        let source = source()?;
        let kind = match stage {
            ShaderStage::Vertex => ShaderKind::Vertex,
            ShaderStage::Fragment => ShaderKind::Fragment,
        };
        let shader = gl
            .create_shader(kind)
            .ok_or_else(|| ComposeError::ShaderAllocation {
                stage,
                id: id.to_string(),
            })?;
        gl.shader_source(&shader, &source);
        gl.compile_shader(&shader);
        if !gl.shader_compiled(&shader) {
            let log = gl.shader_info_log(&shader);
            let annotated_source = annotate_source(&source, error_line(&log));
            log::error!(
                "[composer] {} shader '{}' failed to compile: {}\n{}",
                stage,
                id,
                log,
                annotated_source
            );
            gl.delete_shader(&shader);
            return Err(ComposeError::Compile {
                stage,
                id: id.to_string(),
                log,
                annotated_source,
            });
        }
        self.shaders.insert(id.to_string(), shader.clone());
        Ok(shader)
    }

    fn shader_in_use(&self, id: &str) -> bool {
        self.programs
            .values()
            .any(|e| e.vertex_id == id || e.fragment_id == id)
    }

    fn release_program(&self, gl: &G, entry: &ProgramEntry<G>) {
        gl.detach_shader(&entry.program, &entry.vertex);
        gl.detach_shader(&entry.program, &entry.fragment);
        gl.delete_program(&entry.program);
    }

    /// Binds the named program, or unbinds with `None`. Returns false for an unknown name.
    pub fn use_program(&mut self, gl: &G, name: Option<&str>) -> bool {
        match name {
            None => {
                gl.use_program(None);
                self.current = None;
                true
            }
            Some(name) => match self.programs.get(name) {
                Some(entry) => {
                    gl.use_program(Some(&entry.program));
                    self.current = Some(name.to_string());
                    true
                }
                None => {
                    log::warn!("[composer] no program named '{}'", name);
                    false
                }
            },
        }
    }

    pub fn current_program_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_program(&self) -> Option<&G::Program> {
        let name = self.current.as_deref()?;
        self.programs.get(name).map(|e| &e.program)
    }

    pub fn has_program(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn cached_shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Location of `name` in the current program.
    pub fn uniform_location(&mut self, gl: &G, name: &str) -> Option<G::UniformLocation> {
        let current = self.current.as_deref()?;
        let entry = self.programs.get_mut(current)?;
        if let Some(cached) = entry.uniforms.get(name) {
            return cached.clone();
        }
        let location = gl.uniform_location(&entry.program, name);
        entry.uniforms.insert(name.to_string(), location.clone());
        location
    }

    /// Attribute index of `name` in the current program.
    pub fn attribute_location(&mut self, gl: &G, name: &str) -> Option<u32> {
        let current = self.current.as_deref()?;
        let entry = self.programs.get_mut(current)?;
        if let Some(cached) = entry.attributes.get(name) {
            return *cached;
        }
        let location = gl.attrib_location(&entry.program, name);
        entry.attributes.insert(name.to_string(), location);
        location
    }

    /// Unbinds and deletes every program and cached shader.
    pub fn dispose(&mut self, gl: &G) {
        gl.use_program(None);
        self.current = None;
        for (_, entry) in std::mem::take(&mut self.programs) {
            self.release_program(gl, &entry);
        }
        for (_, shader) in self.shaders.drain() {
            gl.delete_shader(&shader);
        }
    }
}

/// Injects both providers into `template` after checking signatures and markers.
pub fn compose_fragment(
    template: &str,
    geometry_name: &str,
    geometry_source: &str,
    projection_name: &str,
    projection_source: &str,
) -> Result<String, ComposeError> {
    if !geometry_source.contains(GEOMETRY_SIGNATURE) {
        return Err(ComposeError::MissingSignature {
            provider: geometry_name.to_string(),
            signature: GEOMETRY_SIGNATURE,
        });
    }
    if !projection_source.contains(PROJECTION_SIGNATURE) {
        return Err(ComposeError::MissingSignature {
            provider: projection_name.to_string(),
            signature: PROJECTION_SIGNATURE,
        });
    }
    for marker in [PROJECTION_MARKER, GEOMETRY_MARKER] {
        if !template.contains(marker) {
            return Err(ComposeError::MissingMarker(marker));
        }
    }
    // Projection goes first: geometries call project4Dto3D.
    Ok(template
        .replacen(PROJECTION_MARKER, projection_source, 1)
        .replacen(GEOMETRY_MARKER, geometry_source, 1))
}

/// Line number from a driver log such as `ERROR: 0:42: 'foo' : undeclared`.
fn error_line(log: &str) -> Option<usize> {
    let rest = &log[log.find("ERROR: ")? + "ERROR: ".len()..];
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = rest.strip_prefix(':')?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn annotate_source(source: &str, error_line: Option<usize>) -> String {
    let mut out = String::with_capacity(source.len() + source.len() / 4);
    for (i, line) in source.lines().enumerate() {
        let number = i + 1;
        let mark = if Some(number) == error_line { ">> " } else { "   " };
        out.push_str(&format!("{mark}{number:>4}: {line}\n"));
    }
    out
}
