//! Geometry and projection GLSL providers.
//!
//! The sets are closed. Lookup by name is case-insensitive, accepts a few
//! aliases and falls back to a default with a warning instead of failing.

use serde::{Deserialize, Serialize};

pub static BASE_VERTEX_SHADER: &str = include_str!("../shaders/base.vert");
pub static BASE_FRAGMENT_TEMPLATE: &str = include_str!("../shaders/base.frag");

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    #[default]
    Hypercube,
    Hypersphere,
    Simplex,
    Duocylinder,
}

impl GeometryKind {
    pub const ALL: [GeometryKind; 4] = [
        GeometryKind::Hypercube,
        GeometryKind::Hypersphere,
        GeometryKind::Simplex,
        GeometryKind::Duocylinder,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::Hypercube => "hypercube",
            GeometryKind::Hypersphere => "hypersphere",
            GeometryKind::Simplex => "simplex",
            GeometryKind::Duocylinder => "duocylinder",
        }
    }

    /// GLSL providing `float calculateLattice(vec3 p)`.
    pub fn source(self) -> &'static str {
        match self {
            GeometryKind::Hypercube => include_str!("../shaders/geometry/hypercube.glsl"),
            GeometryKind::Hypersphere => include_str!("../shaders/geometry/hypersphere.glsl"),
            GeometryKind::Simplex => include_str!("../shaders/geometry/simplex.glsl"),
            GeometryKind::Duocylinder => include_str!("../shaders/geometry/duocylinder.glsl"),
        }
    }

    /// Exact match on canonical names and aliases, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "hypercube" | "tesseract" => Some(GeometryKind::Hypercube),
            "hypersphere" | "hsphere" => Some(GeometryKind::Hypersphere),
            "simplex" | "hypertetrahedron" | "tetra" => Some(GeometryKind::Simplex),
            "duocylinder" | "duocyl" => Some(GeometryKind::Duocylinder),
            _ => None,
        }
    }

    /// Like [`parse`](Self::parse) but never fails.
    pub fn resolve(name: &str, default: GeometryKind) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            log::warn!(
                "[composer] unknown geometry '{}', using '{}'",
                name,
                default.name()
            );
            default
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    #[default]
    Perspective,
    Orthographic,
    Stereographic,
}

impl ProjectionKind {
    pub const ALL: [ProjectionKind; 3] = [
        ProjectionKind::Perspective,
        ProjectionKind::Orthographic,
        ProjectionKind::Stereographic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProjectionKind::Perspective => "perspective",
            ProjectionKind::Orthographic => "orthographic",
            ProjectionKind::Stereographic => "stereographic",
        }
    }

    /// GLSL providing `vec3 project4Dto3D(vec4 p)`.
    pub fn source(self) -> &'static str {
        match self {
            ProjectionKind::Perspective => include_str!("../shaders/projection/perspective.glsl"),
            ProjectionKind::Orthographic => {
                include_str!("../shaders/projection/orthographic.glsl")
            }
            ProjectionKind::Stereographic => {
                include_str!("../shaders/projection/stereographic.glsl")
            }
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "perspective" | "persp" => Some(ProjectionKind::Perspective),
            "orthographic" | "ortho" => Some(ProjectionKind::Orthographic),
            "stereographic" | "stereo" => Some(ProjectionKind::Stereographic),
            _ => None,
        }
    }

    pub fn resolve(name: &str, default: ProjectionKind) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            log::warn!(
                "[composer] unknown projection '{}', using '{}'",
                name,
                default.name()
            );
            default
        })
    }
}
