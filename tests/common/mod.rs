//! Common utilities for renderer integration tests.
//!
//! Every test runs against the recording [`DummyBackend`], so assertions are made
//! on the exact calls the renderer issued.

#![allow(dead_code)]

use retained_graphics::backend::{ShaderStage, UniformLocation, VertexFormat};
use retained_graphics::resources::{IndexData, VertexLayout};
use retained_graphics::shader::ShaderReflection;
use retained_graphics::{DummyBackend, ObjectPassDesc, Renderer, ValueType};

// ============================================================================
// Locations
// ============================================================================

pub const COLOR: UniformLocation = UniformLocation {
    group: 0,
    binding: 0,
    offset: 0,
};

pub const TRANSFORM: UniformLocation = UniformLocation {
    group: 0,
    binding: 1,
    offset: 0,
};

pub const EXPOSURE: UniformLocation = UniformLocation {
    group: 1,
    binding: 0,
    offset: 0,
};

// ============================================================================
// Setup
// ============================================================================

/// Install a test logger. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A renderer with:
/// - program `S` declaring `color: vec4` and `transform: mat4`
/// - program `post` declaring `exposure: float`
/// - vertex buffer `quad` (positions) and index buffer `quad`
/// - registry pass `P`
pub fn renderer() -> Renderer<DummyBackend> {
    init_logging();
    let mut renderer = Renderer::new(DummyBackend::new());

    renderer
        .add_program(
            "S",
            &[("vs".into(), ShaderStage::Vertex), ("fs".into(), ShaderStage::Fragment)],
            ShaderReflection::new()
                .with_input("color", COLOR, ValueType::Vec4)
                .with_input("transform", TRANSFORM, ValueType::Mat4)
                .with_attribute("position", 0, VertexFormat::Float32x3),
        )
        .unwrap();
    renderer
        .add_program(
            "post",
            &[("fs".into(), ShaderStage::Fragment)],
            ShaderReflection::new()
                .with_input("exposure", EXPOSURE, ValueType::Float)
                .with_attribute("position", 0, VertexFormat::Float32x3),
        )
        .unwrap();

    let quad: [[f32; 3]; 4] = [
        [-1.0, -1.0, 0.0],
        [1.0, -1.0, 0.0],
        [1.0, 1.0, 0.0],
        [-1.0, 1.0, 0.0],
    ];
    renderer
        .create_vertex_buffer(
            "quad",
            bytemuck::cast_slice(quad.as_slice()),
            VertexLayout::packed(&[("position", VertexFormat::Float32x3)]),
        )
        .unwrap();
    renderer
        .create_index_buffer("quad", &IndexData::U16(vec![0, 1, 2, 2, 3, 0]))
        .unwrap();

    renderer.add_pass_to_back("P").unwrap();
    renderer
}

/// Add object `object` drawn with program `S` in registry pass `pass`.
pub fn add_quad(renderer: &mut Renderer<DummyBackend>, object: &str, pass: &str) {
    if !renderer.has_object(object) {
        renderer.add_object(object).unwrap();
    }
    renderer
        .add_object_pass(object, pass, ObjectPassDesc::new("S", "quad", "quad"))
        .unwrap();
}
