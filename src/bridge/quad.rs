//! The fullscreen-quad path.
//!
//! Procedural shaders draw six vertices covering NDC `[-1, 1]²` and compute
//! every pixel in the fragment stage. The built-in vertex sources here are
//! the default pair for shaders that only ship a fragment stage.

use crate::backend::{
    Backend, BufferDesc, BufferHandle, VertexArray, VertexAttribute, VertexBufferDesc,
    VertexFormat,
};

/// Built-in WGSL vertex stage (`vs_main`).
pub const FULLSCREEN_WGSL: &str = include_str!("shaders/fullscreen.wgsl");

/// Built-in GLSL vertex stage for the GL tiers.
pub const FULLSCREEN_GLSL_VERT: &str = include_str!("shaders/fullscreen.vert");

/// Two triangles covering NDC, counter-clockwise.
pub const QUAD_VERTICES: [f32; 12] = [
    -1.0, -1.0, //
    1.0, -1.0, //
    1.0, 1.0, //
    -1.0, -1.0, //
    1.0, 1.0, //
    -1.0, 1.0, //
];

/// Vertices per quad draw.
pub const QUAD_VERTEX_COUNT: u32 = 6;

/// Creates the quad vertex buffer and its vertex-array description.
pub fn create_quad(backend: &mut dyn Backend) -> (BufferHandle, VertexArray) {
    let buffer = backend.create_buffer(&BufferDesc {
        data: Some(bytemuck::cast_slice(&QUAD_VERTICES).to_vec()),
        label: Some("Fullscreen Quad".to_string()),
        ..BufferDesc::default()
    });
    let vao = VertexArray::new(
        vec![VertexBufferDesc {
            buffer,
            stride: 8,
            step_instance: false,
            attributes: vec![VertexAttribute {
                location: 0,
                format: VertexFormat::Float32x2,
                offset: 0,
            }],
        }],
        None,
        Some("Fullscreen Quad".to_string()),
    );
    (buffer, vao)
}
