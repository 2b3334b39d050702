//! Backend Abstraction
//!
//! One backend-neutral interface over the WebGPU and WebGL-class tiers.
//! A [`Backend`] executes primitive GPU operations: clear, state changes,
//! resource binds, uniform uploads, draws. Everything above it (command
//! buffers, bridges, the orchestrator) talks only to this trait, so the
//! same recorded work runs on either tier or on a test double.
//!
//! GPU objects are described CPU-side ([`ShaderProgram`], [`Texture2d`],
//! [`VertexArray`], [`RenderTarget`]) and realized lazily on first bind.
//! Binds by descriptor register the object under its id; the id-based bind
//! family exists for command-buffer replay, where only ids survive
//! serialization.

pub mod shader;
pub mod target;
pub mod texture;
pub mod uniforms;
pub mod vertex;
pub mod webgpu;

pub use shader::{ShaderError, ShaderProgram, ShaderSources};
pub use target::{ColorAttachmentDesc, RenderTarget, RenderTargetDesc};
pub use texture::{FilterMode, SamplerOptions, Texture2d, TextureDescriptor, TextureFormat, WrapMode};
pub use uniforms::{UniformStore, UniformType, UniformValue};
pub use vertex::{
    BufferDesc, BufferHandle, BufferUsage, IndexFormat, VertexArray, VertexAttribute,
    VertexBufferDesc, VertexFormat,
};
pub use webgpu::{WgpuBackend, WgpuBackendOptions};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::state::RenderState;

/// Which GPU tier a backend ended up on after feature-detection fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Full WebGPU-class tier: WGSL shaders, standard limits.
    WebGpu,
    /// GL tier constrained to WebGL 2 downlevel limits: GLSL shaders.
    WebGl2,
    /// GL tier constrained to baseline downlevel limits.
    WebGl,
}

impl BackendKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::WebGpu => "webgpu",
            BackendKind::WebGl2 => "webgl2",
            BackendKind::WebGl => "webgl",
        }
    }

    /// True for the tiers that consume GLSL sources.
    #[must_use]
    pub fn is_gl(self) -> bool {
        matches!(self, BackendKind::WebGl2 | BackendKind::WebGl)
    }
}

bitflags! {
    /// Which aspects of the current target a clear touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

// Serialized as the raw bit pattern, part of the command wire format.
impl Serialize for ClearFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for ClearFlags {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        Ok(ClearFlags::from_bits_truncate(bits))
    }
}

/// A clear operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClearRequest {
    pub flags: ClearFlags,
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearRequest {
    fn default() -> Self {
        Self {
            flags: ClearFlags::COLOR | ClearFlags::DEPTH,
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

impl ClearRequest {
    #[must_use]
    pub fn color_only(color: [f32; 4]) -> Self {
        Self {
            flags: ClearFlags::COLOR,
            color,
            ..Self::default()
        }
    }
}

/// 4D-to-screen projection parameters, shipped as a dedicated command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub kind: ProjectionKind,
    pub dimension: f32,
    pub fov: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    Perspective,
    Stereographic,
}

/// Per-backend counters. State tracking keeps every counter at or below
/// what an untracked backend would produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStats {
    pub draw_calls: u64,
    pub triangles: u64,
    pub state_changes: u64,
    pub shader_switches: u64,
    pub texture_binds: u64,
    pub buffer_uploads: u64,
}

/// The backend-neutral GPU execution interface.
///
/// All methods are infallible at the signature level: GPU-facing failures
/// are recorded on the affected object or logged, never raised (see the
/// error-handling contract in [`crate::errors`]).
pub trait Backend {
    fn kind(&self) -> BackendKind;

    // ---- Frame boundaries --------------------------------------------------

    /// Acquires the frame's output target. Draws before `begin_frame` are
    /// dropped with a warning.
    fn begin_frame(&mut self);
    /// Presents the frame.
    fn end_frame(&mut self);
    fn resize(&mut self, width: u32, height: u32);

    // ---- Pipeline state ----------------------------------------------------

    fn clear(&mut self, request: &ClearRequest);
    /// Applies only the difference from the currently tracked state.
    fn set_state(&mut self, state: &RenderState);
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn set_scissor(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn push_state(&mut self);
    fn pop_state(&mut self);

    // ---- Shaders and uniforms ----------------------------------------------

    /// Compiles (or re-compiles) a program and caches the result under the
    /// program's name and id. Compile/link failures are stored on the
    /// program and `false` is returned; nothing is thrown.
    fn compile_shader(&mut self, program: &mut ShaderProgram) -> bool;
    /// Binds a previously compiled program by name. Unknown or broken
    /// programs leave the current binding untouched and return `false`.
    fn bind_shader(&mut self, name: &str) -> bool;
    /// Stages one uniform for the next draw. Re-uploads of an unchanged
    /// value are skipped; type mismatches against the program's reflection
    /// are dropped with a single log line.
    fn set_uniform(&mut self, name: &str, value: &UniformValue);
    fn set_rotor(&mut self, rotor: [f32; 8]);
    fn set_projection(&mut self, projection: &Projection);

    // ---- Resource binds ----------------------------------------------------

    /// Lazily realizes the texture GPU-side, registers it under its id, and
    /// binds it to `slot`.
    fn bind_texture(&mut self, texture: &Texture2d, slot: u32);
    /// Re-binds a texture previously registered by [`Backend::bind_texture`].
    fn bind_texture_id(&mut self, id: u64, slot: u32);
    fn bind_vertex_array(&mut self, vao: &VertexArray);
    fn bind_vertex_array_id(&mut self, id: u64);
    fn bind_index_buffer(&mut self, buffer: &BufferHandle, format: IndexFormat);
    /// Binds an offscreen target, or `None` for the default drawing buffer.
    fn bind_render_target(&mut self, target: Option<&RenderTarget>);
    fn bind_render_target_id(&mut self, id: Option<u64>);

    // ---- Draws -------------------------------------------------------------

    fn draw(&mut self, vertex_count: u32, first_vertex: u32);
    fn draw_indexed(&mut self, index_count: u32, first_index: u32);
    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32);
    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32);

    // ---- Buffers -----------------------------------------------------------

    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferHandle;
    fn update_buffer(&mut self, buffer: &BufferHandle, data: &[u8], offset: u64);
    fn delete_buffer(&mut self, buffer: &BufferHandle);

    // ---- Lifecycle and stats -----------------------------------------------

    fn stats(&self) -> RenderStats;
    fn reset_stats(&mut self);
    fn dispose(&mut self);
}
