mod common;

use common::{FakeGl, INVALID_OPERATION};
use polytope_core::{
    ComposeError, GeometryKind, ProgramComposer, ProjectionKind, ShaderKind, ShaderStage,
};

fn composer() -> ProgramComposer<FakeGl> {
    ProgramComposer::new(GeometryKind::Hypercube, ProjectionKind::Perspective)
}

#[test]
fn revisiting_a_combination_links_without_compiling() {
    let gl = FakeGl::new();
    let mut c = composer();

    c.build(&gl, "viz", "hypercube", "perspective").unwrap();
    assert_eq!(gl.log().compiles, 2);
    assert_eq!(gl.log().links, 1);

    c.build(&gl, "viz", "duocylinder", "stereographic").unwrap();
    // novel fragment only; the vertex shader is shared
    assert_eq!(gl.log().compiles, 3);
    assert_eq!(gl.log().links, 2);

    c.build(&gl, "viz", "hypercube", "perspective").unwrap();
    assert_eq!(gl.log().compiles, 3);
    assert_eq!(gl.log().links, 3);
    assert_eq!(c.cached_shader_count(), 3);
}

#[test]
fn aliases_share_the_canonical_cache_entry() {
    let gl = FakeGl::new();
    let mut c = composer();
    c.build(&gl, "viz", "simplex", "orthographic").unwrap();
    c.build(&gl, "viz", "HyperTetrahedron", "ORTHO").unwrap();
    assert_eq!(gl.log().compiles, 2);
}

#[test]
fn unknown_names_fall_back_to_defaults() {
    let gl = FakeGl::new();
    let mut c = composer();
    c.build(&gl, "viz", "klein-bottle", "fisheye").unwrap();
    let src = c.compose_fragment_source("hypercube", "perspective").unwrap();
    let log = gl.log();
    assert!(log.shader_sources.values().any(|s| *s == src));
}

#[test]
fn rebuilding_over_a_program_deletes_the_old_one() {
    let gl = FakeGl::new();
    let mut c = composer();
    let first = c.build(&gl, "viz", "hypercube", "perspective").unwrap();
    let second = c.build(&gl, "viz", "hypersphere", "perspective").unwrap();
    assert_ne!(first, second);
    let log = gl.log();
    assert_eq!(log.deleted_programs, vec![first]);
    assert_eq!(log.detaches, 2);
}

#[test]
fn compile_failure_is_annotated_and_not_cached() {
    let gl = FakeGl::new();
    gl.log_mut().fail_fragment_compile =
        Some("ERROR: 0:3: 'u_nope' : undeclared identifier".into());
    let mut c = composer();

    let err = c.build(&gl, "viz", "hypercube", "perspective").unwrap_err();
    match err {
        ComposeError::Compile {
            stage,
            annotated_source,
            ..
        } => {
            assert_eq!(stage, ShaderStage::Fragment);
            let marked: Vec<&str> = annotated_source
                .lines()
                .filter(|l| l.starts_with(">> "))
                .collect();
            assert_eq!(marked.len(), 1);
            assert!(marked[0].starts_with(">>    3: "));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!c.has_program("viz"));
    assert_eq!(gl.log().deleted_shaders.len(), 1);

    // a later attempt compiles the fragment again
    gl.log_mut().fail_fragment_compile = None;
    c.build(&gl, "viz", "hypercube", "perspective").unwrap();
    assert_eq!(gl.log().compiles, 3);
}

#[test]
fn link_failure_tears_down_shaders_and_program() {
    let gl = FakeGl::new();
    gl.log_mut().fail_link = Some("varying mismatch".into());
    let mut c = composer();

    let err = c.build(&gl, "viz", "hypercube", "perspective").unwrap_err();
    assert!(matches!(err, ComposeError::Link { .. }));
    let log = gl.log();
    assert_eq!(log.detaches, 2);
    assert_eq!(log.deleted_shaders.len(), 2);
    assert_eq!(log.deleted_programs.len(), 1);
    drop(log);
    assert_eq!(c.cached_shader_count(), 0);
    assert!(!c.has_program("viz"));
}

#[test]
fn link_failure_keeps_shaders_other_programs_hold() {
    let gl = FakeGl::new();
    let mut c = composer();
    let a = c.build(&gl, "a", "hypercube", "perspective").unwrap();

    gl.log_mut().fail_link = Some("varying mismatch".into());
    assert!(c.build(&gl, "b", "simplex", "perspective").is_err());
    {
        let log = gl.log();
        // only the simplex fragment goes; the shared vertex shader stays
        assert_eq!(log.deleted_shaders.len(), 1);
        assert_eq!(
            log.shader_kinds.get(&log.deleted_shaders[0]),
            Some(&ShaderKind::Fragment)
        );
    }
    assert_eq!(c.cached_shader_count(), 2);
    assert!(c.has_program("a"));

    gl.log_mut().fail_link = None;
    c.build(&gl, "b", "simplex", "perspective").unwrap();
    c.dispose(&gl);
    let log = gl.log();
    assert_ne!(log.pending_error, INVALID_OPERATION);
    assert!(log.attached.is_empty());
    assert!(log.deleted_programs.contains(&a));
}

#[test]
fn rebuilding_the_current_program_rebinds_or_unbinds() {
    let gl = FakeGl::new();
    let mut c = composer();
    c.build(&gl, "viz", "hypercube", "perspective").unwrap();
    assert!(c.use_program(&gl, Some("viz")));

    let next = c.build(&gl, "viz", "hypersphere", "stereographic").unwrap();
    assert_eq!(gl.log().bound_program, Some(next));
    assert_eq!(c.current_program_name(), Some("viz"));

    gl.log_mut().fail_link = Some("nope".into());
    assert!(c.build(&gl, "viz", "simplex", "perspective").is_err());
    assert_eq!(gl.log().bound_program, None);
    assert_eq!(c.current_program_name(), None);
}

#[test]
fn location_lookups_are_cached_including_misses() {
    let gl = FakeGl::new();
    gl.log_mut().missing_uniforms.insert("u_unused".into());
    let mut c = composer();
    c.build(&gl, "viz", "hypercube", "perspective").unwrap();
    assert!(c.uniform_location(&gl, "u_time").is_none(), "nothing bound yet");
    c.use_program(&gl, Some("viz"));

    assert!(c.uniform_location(&gl, "u_time").is_some());
    assert!(c.uniform_location(&gl, "u_time").is_some());
    assert!(c.uniform_location(&gl, "u_unused").is_none());
    assert!(c.uniform_location(&gl, "u_unused").is_none());
    assert_eq!(gl.log().uniform_queries, 2);
}

#[test]
fn dispose_releases_everything() {
    let gl = FakeGl::new();
    let mut c = composer();
    c.build(&gl, "viz", "hypercube", "perspective").unwrap();
    c.build(&gl, "alt", "duocylinder", "perspective").unwrap();
    c.use_program(&gl, Some("viz"));
    c.dispose(&gl);

    let log = gl.log();
    assert_eq!(log.deleted_programs.len(), 2);
    assert_eq!(log.deleted_shaders.len(), 3);
    assert_eq!(log.bound_program, None);
    drop(log);
    assert!(c.current_program().is_none());
}

#[test]
fn composed_source_declares_the_data_channel_array() {
    let c = composer();
    for g in GeometryKind::ALL {
        for p in ProjectionKind::ALL {
            let src = c.compose_fragment_source(g.name(), p.name()).unwrap();
            assert!(src.contains("uniform float u_dataChannels[64];"));
            assert!(src.contains("void main()"));
        }
    }
}
