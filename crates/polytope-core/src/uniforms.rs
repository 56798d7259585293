//! Dirty tracking and upload of parameter-backed uniforms.

use crate::composer::ProgramComposer;
use crate::gl::Gl;
use crate::params::{ParameterPatch, ParameterState, PatchOutcome, U_TIME};
use fnv::FnvHashSet;

/// What one flush did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub uploaded: usize,
    /// Names that missed and were carried into the next frame.
    pub deferred: usize,
}

pub struct UniformSync {
    state: ParameterState,
    dirty: FnvHashSet<String>,
    needs_rebuild: bool,
}

impl UniformSync {
    pub fn new(state: ParameterState) -> Self {
        Self {
            state,
            dirty: FnvHashSet::default(),
            needs_rebuild: false,
        }
    }

    pub fn state(&self) -> &ParameterState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ParameterState {
        &mut self.state
    }

    /// Applies a partial update. Returns true when the program must be rebuilt.
    pub fn update_parameters(&mut self, patch: &ParameterPatch) -> bool {
        let PatchOutcome {
            dirty_uniforms,
            needs_rebuild,
            ..
        } = self.state.apply(patch);
        self.dirty.extend(dirty_uniforms);
        self.needs_rebuild |= needs_rebuild;
        needs_rebuild
    }

    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    pub fn request_rebuild(&mut self) {
        self.needs_rebuild = true;
    }

    pub fn clear_rebuild(&mut self) {
        self.needs_rebuild = false;
    }

    /// Marks every uniform a parameter fans out to.
    pub fn mark_dirty(&mut self, parameter: &str) {
        self.dirty.extend(self.state.uniforms_of(parameter));
    }

    /// Replaces the dirty set with every known uniform, dropping carried misses.
    pub fn mark_all_dirty(&mut self) {
        self.dirty.clear();
        self.dirty.extend(self.state.all_uniforms());
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_dirty(&self, uniform: &str) -> bool {
        self.dirty.contains(uniform)
    }

    /// Uploads every dirty uniform to the composer's current program.
    ///
    /// Location misses are carried into the next frame, except `u_time`,
    /// which the render loop marks again every frame. Without a current
    /// program nothing is uploaded and the whole set is kept.
    pub fn flush<G: Gl>(&mut self, gl: &G, composer: &mut ProgramComposer<G>) -> FlushReport {
        let mut report = FlushReport::default();
        if self.dirty.is_empty() || composer.current_program().is_none() {
            return report;
        }
        let mut next = FnvHashSet::default();
        for name in self.dirty.drain() {
            let Some(value) = self.state.uniform_value(&name) else {
                continue;
            };
            match composer.uniform_location(gl, &name) {
                Some(location) => {
                    gl.upload(&location, value);
                    report.uploaded += 1;
                }
                None if name == U_TIME => {}
                None => {
                    next.insert(name);
                }
            }
        }
        report.deferred = next.len();
        if report.deferred > 0 {
            log::debug!("[uniforms] {} uniform(s) deferred", report.deferred);
        }
        self.dirty = next;
        report
    }
}
