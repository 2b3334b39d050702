//! Commands and Command Buffers
//!
//! Draw work is recorded as a closed set of command variants, sorted for
//! minimal state churn, replayed against any [`Backend`], and serialized
//! to JSON or a framed binary payload for FFI transport.
//!
//! [`Backend`]: crate::backend::Backend

pub mod buffer;
pub mod encode;
pub mod pool;

pub use buffer::{BufferStats, CommandBuffer, ExecutionReport, SortMode};
pub use pool::CommandBufferPool;

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::backend::{
    Backend, BufferHandle, ClearRequest, IndexFormat, Projection, UniformValue,
};
use crate::state::{BlendMode, DepthState, RenderState};

/// Opaque host callback, replayable in-process but never serializable.
#[derive(Clone)]
pub struct CustomCommand(Rc<dyn Fn(&mut dyn Backend)>);

impl CustomCommand {
    #[must_use]
    pub fn new(callback: impl Fn(&mut dyn Backend) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn invoke(&self, backend: &mut dyn Backend) {
        (self.0)(backend);
    }
}

impl Default for CustomCommand {
    fn default() -> Self {
        Self(Rc::new(|_| {}))
    }
}

impl std::fmt::Debug for CustomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CustomCommand(..)")
    }
}

impl PartialEq for CustomCommand {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// The closed command set.
///
/// Resources are referenced by id so commands survive serialization; the
/// executing backend resolves ids against objects realized earlier in the
/// session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Command {
    Clear(ClearRequest),
    SetState(RenderState),
    SetViewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    SetScissor {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    BindShader {
        name: String,
    },
    BindTexture {
        texture: u64,
        slot: u32,
    },
    BindVertexArray {
        vao: u64,
    },
    BindIndexBuffer {
        buffer: BufferHandle,
        format: IndexFormat,
    },
    BindRenderTarget {
        target: Option<u64>,
    },
    SetUniform {
        name: String,
        value: UniformValue,
    },
    SetUniforms {
        uniforms: BTreeMap<String, UniformValue>,
    },
    SetRotor {
        rotor: [f32; 8],
    },
    SetProjection(Projection),
    Draw {
        vertex_count: u32,
        first_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        first_index: u32,
    },
    DrawInstanced {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
    },
    SetBlendMode {
        mode: BlendMode,
    },
    SetDepthState(DepthState),
    PushState,
    PopState,
    Custom {
        #[serde(skip)]
        callback: CustomCommand,
    },
}

impl Command {
    /// Default execution priority: higher runs first under state sorting.
    #[must_use]
    pub fn default_priority(&self) -> i32 {
        match self {
            Command::Clear(_) => 1000,
            Command::BindRenderTarget { .. } => 950,
            Command::SetState(_)
            | Command::SetViewport { .. }
            | Command::SetScissor { .. }
            | Command::SetBlendMode { .. }
            | Command::SetDepthState(_) => 900,
            Command::BindShader { .. } => 800,
            Command::BindTexture { .. } => 700,
            Command::BindVertexArray { .. } | Command::BindIndexBuffer { .. } => 600,
            Command::SetUniform { .. }
            | Command::SetUniforms { .. }
            | Command::SetRotor { .. }
            | Command::SetProjection(_) => 500,
            Command::Draw { .. }
            | Command::DrawIndexed { .. }
            | Command::DrawInstanced { .. }
            | Command::DrawIndexedInstanced { .. }
            | Command::PushState
            | Command::PopState
            | Command::Custom { .. } => 0,
        }
    }

    #[must_use]
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Command::Draw { .. }
                | Command::DrawIndexed { .. }
                | Command::DrawInstanced { .. }
                | Command::DrawIndexedInstanced { .. }
        )
    }

    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            Command::SetState(_)
                | Command::SetViewport { .. }
                | Command::SetScissor { .. }
                | Command::SetBlendMode { .. }
                | Command::SetDepthState(_)
                | Command::PushState
                | Command::PopState
        )
    }

    /// Triangles this command contributes to the buffer stats.
    #[must_use]
    pub fn triangle_count(&self) -> u64 {
        match self {
            Command::Draw { vertex_count, .. } => u64::from(vertex_count / 3),
            Command::DrawIndexed { index_count, .. } => u64::from(index_count / 3),
            Command::DrawInstanced {
                vertex_count,
                instance_count,
            } => u64::from(vertex_count / 3) * u64::from(*instance_count),
            Command::DrawIndexedInstanced {
                index_count,
                instance_count,
            } => u64::from(index_count / 3) * u64::from(*instance_count),
            _ => 0,
        }
    }

    /// Dispatches this command to a backend.
    pub fn execute(&self, backend: &mut dyn Backend) {
        match self {
            Command::Clear(request) => backend.clear(request),
            Command::SetState(state) => backend.set_state(state),
            Command::SetViewport {
                x,
                y,
                width,
                height,
            } => backend.set_viewport(*x, *y, *width, *height),
            Command::SetScissor {
                x,
                y,
                width,
                height,
            } => backend.set_scissor(*x, *y, *width, *height),
            Command::BindShader { name } => {
                backend.bind_shader(name);
            }
            Command::BindTexture { texture, slot } => backend.bind_texture_id(*texture, *slot),
            Command::BindVertexArray { vao } => backend.bind_vertex_array_id(*vao),
            Command::BindIndexBuffer { buffer, format } => {
                backend.bind_index_buffer(buffer, *format);
            }
            Command::BindRenderTarget { target } => backend.bind_render_target_id(*target),
            Command::SetUniform { name, value } => backend.set_uniform(name, value),
            Command::SetUniforms { uniforms } => {
                for (name, value) in uniforms {
                    backend.set_uniform(name, value);
                }
            }
            Command::SetRotor { rotor } => backend.set_rotor(*rotor),
            Command::SetProjection(projection) => backend.set_projection(projection),
            Command::Draw {
                vertex_count,
                first_vertex,
            } => backend.draw(*vertex_count, *first_vertex),
            Command::DrawIndexed {
                index_count,
                first_index,
            } => backend.draw_indexed(*index_count, *first_index),
            Command::DrawInstanced {
                vertex_count,
                instance_count,
            } => backend.draw_instanced(*vertex_count, *instance_count),
            Command::DrawIndexedInstanced {
                index_count,
                instance_count,
            } => backend.draw_indexed_instanced(*index_count, *instance_count),
            Command::SetBlendMode { mode } => {
                let mut state = RenderState::transparent();
                state.blend = mode.as_blend_state();
                backend.set_state(&state);
            }
            Command::SetDepthState(depth) => {
                let mut state = RenderState::opaque();
                state.depth = depth.clone();
                backend.set_state(&state);
            }
            Command::PushState => backend.push_state(),
            Command::PopState => backend.pop_state(),
            Command::Custom { callback } => callback.invoke(backend),
        }
    }
}

/// One recorded command with its ordering metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    /// Monotonic per-buffer id, allocated at record time.
    pub id: u64,
    /// Orders commands inside one priority band, ascending.
    pub sort_key: i64,
    /// Coarse phase; higher runs first. Defaults per the command variant.
    pub priority: i32,
    /// View depth for the distance sort modes.
    pub depth: Option<f32>,
    pub label: Option<String>,
    /// Recording timestamp, carried through serialization.
    pub timestamp_ms: f64,
    pub command: Command,
}
