//! Command buffer: recording, sorting, execution.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::backend::{
    Backend, BufferHandle, ClearRequest, IndexFormat, Projection, UniformValue,
};
use crate::errors::{Result, Vib3Error};
use crate::state::{BlendMode, DepthState, RenderState};
use crate::utils::time::now_ms;

use super::{Command, CustomCommand, RecordedCommand};

/// How `sort()` orders the recorded commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Stable submission order.
    #[default]
    None,
    /// Descending priority, then ascending sort key.
    State,
    /// Non-draw commands by priority first, then draws by ascending depth.
    FrontToBack,
    /// Non-draw commands by priority first, then draws by descending depth.
    BackToFront,
    /// Caller-supplied comparator (must be a strict weak ordering).
    Custom,
}

/// Cumulative recording statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStats {
    pub command_count: u64,
    pub draw_calls: u64,
    pub state_changes: u64,
    pub triangles: u64,
}

/// Stats plus the wall-clock cost of one profiled execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionReport {
    pub stats: BufferStats,
    pub execution_time_ms: f64,
}

type Comparator = Box<dyn FnMut(&RecordedCommand, &RecordedCommand) -> Ordering>;

/// A reusable, sortable, serializable sequence of commands.
pub struct CommandBuffer {
    commands: Vec<RecordedCommand>,
    sort_mode: SortMode,
    comparator: Option<Comparator>,
    sealed: bool,
    version: u64,
    sorted: bool,
    next_command_id: u64,
    stats: BufferStats,
    // Ordering metadata applied to the next recorded command.
    pending_sort_key: i64,
    pending_depth: Option<f32>,
    pending_label: Option<String>,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sort_mode(SortMode::None)
    }

    #[must_use]
    pub fn with_sort_mode(sort_mode: SortMode) -> Self {
        Self {
            commands: Vec::new(),
            sort_mode,
            comparator: None,
            sealed: false,
            version: 0,
            sorted: false,
            next_command_id: 1,
            stats: BufferStats::default(),
            pending_sort_key: 0,
            pending_depth: None,
            pending_label: None,
        }
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Appends one command. Fails on a sealed buffer.
    pub fn record(&mut self, command: Command) -> Result<&mut Self> {
        if self.sealed {
            return Err(Vib3Error::BufferSealed);
        }
        let priority = command.default_priority();
        if command.is_draw() {
            self.stats.draw_calls += 1;
        }
        if command.is_state_change() {
            self.stats.state_changes += 1;
        }
        self.stats.triangles += command.triangle_count();
        self.stats.command_count += 1;

        self.commands.push(RecordedCommand {
            id: self.next_command_id,
            sort_key: self.pending_sort_key,
            priority,
            depth: self.pending_depth.take(),
            label: self.pending_label.take(),
            timestamp_ms: now_ms(),
            command,
        });
        self.next_command_id += 1;
        self.touch();
        Ok(self)
    }

    /// Sets the sort key attached to subsequently recorded commands.
    pub fn sort_key(&mut self, key: i64) -> &mut Self {
        self.pending_sort_key = key;
        self
    }

    /// Attaches a view depth to the next recorded command.
    pub fn depth(&mut self, depth: f32) -> &mut Self {
        self.pending_depth = Some(depth);
        self
    }

    /// Attaches a debug label to the next recorded command.
    pub fn label(&mut self, label: impl Into<String>) -> &mut Self {
        self.pending_label = Some(label.into());
        self
    }

    // ---- Typed recorders ---------------------------------------------------

    pub fn clear(&mut self, request: ClearRequest) -> Result<&mut Self> {
        self.record(Command::Clear(request))
    }

    pub fn set_state(&mut self, state: RenderState) -> Result<&mut Self> {
        self.record(Command::SetState(state))
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) -> Result<&mut Self> {
        self.record(Command::SetViewport {
            x,
            y,
            width,
            height,
        })
    }

    pub fn set_scissor(&mut self, x: i32, y: i32, width: u32, height: u32) -> Result<&mut Self> {
        self.record(Command::SetScissor {
            x,
            y,
            width,
            height,
        })
    }

    /// Binds the pipeline identified by shader name.
    pub fn set_pipeline(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        self.record(Command::BindShader { name: name.into() })
    }

    pub fn bind_texture(&mut self, texture: u64, slot: u32) -> Result<&mut Self> {
        self.record(Command::BindTexture { texture, slot })
    }

    pub fn bind_vertex_array(&mut self, vao: u64) -> Result<&mut Self> {
        self.record(Command::BindVertexArray { vao })
    }

    pub fn bind_index_buffer(
        &mut self,
        buffer: BufferHandle,
        format: IndexFormat,
    ) -> Result<&mut Self> {
        self.record(Command::BindIndexBuffer { buffer, format })
    }

    pub fn bind_render_target(&mut self, target: Option<u64>) -> Result<&mut Self> {
        self.record(Command::BindRenderTarget { target })
    }

    pub fn set_uniform(
        &mut self,
        name: impl Into<String>,
        value: UniformValue,
    ) -> Result<&mut Self> {
        self.record(Command::SetUniform {
            name: name.into(),
            value,
        })
    }

    pub fn set_uniforms(
        &mut self,
        uniforms: impl IntoIterator<Item = (String, UniformValue)>,
    ) -> Result<&mut Self> {
        self.record(Command::SetUniforms {
            uniforms: uniforms.into_iter().collect(),
        })
    }

    pub fn set_rotor(&mut self, rotor: [f32; 8]) -> Result<&mut Self> {
        self.record(Command::SetRotor { rotor })
    }

    pub fn set_projection(&mut self, projection: Projection) -> Result<&mut Self> {
        self.record(Command::SetProjection(projection))
    }

    pub fn draw(&mut self, vertex_count: u32) -> Result<&mut Self> {
        self.record(Command::Draw {
            vertex_count,
            first_vertex: 0,
        })
    }

    pub fn draw_indexed(&mut self, index_count: u32) -> Result<&mut Self> {
        self.record(Command::DrawIndexed {
            index_count,
            first_index: 0,
        })
    }

    pub fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32) -> Result<&mut Self> {
        self.record(Command::DrawInstanced {
            vertex_count,
            instance_count,
        })
    }

    pub fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
    ) -> Result<&mut Self> {
        self.record(Command::DrawIndexedInstanced {
            index_count,
            instance_count,
        })
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) -> Result<&mut Self> {
        self.record(Command::SetBlendMode { mode })
    }

    pub fn set_depth_state(&mut self, depth: DepthState) -> Result<&mut Self> {
        self.record(Command::SetDepthState(depth))
    }

    pub fn push_state(&mut self) -> Result<&mut Self> {
        self.record(Command::PushState)
    }

    pub fn pop_state(&mut self) -> Result<&mut Self> {
        self.record(Command::PopState)
    }

    /// Records an opaque host callback. The buffer stops being serializable.
    pub fn custom(&mut self, callback: impl Fn(&mut dyn Backend) + 'static) -> Result<&mut Self> {
        self.record(Command::Custom {
            callback: CustomCommand::new(callback),
        })
    }

    // ========================================================================
    // Sealing, sorting, execution
    // ========================================================================

    /// Freezes the buffer; further recording fails with `BufferSealed`.
    pub fn seal(&mut self) {
        if !self.sealed {
            self.sealed = true;
            self.version += 1;
        }
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Clears commands and stats, reopening the buffer for recording.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.stats = BufferStats::default();
        self.sealed = false;
        self.sorted = false;
        self.next_command_id = 1;
        self.pending_sort_key = 0;
        self.pending_depth = None;
        self.pending_label = None;
        self.version += 1;
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        if self.sort_mode != mode {
            self.sort_mode = mode;
            self.touch();
        }
    }

    /// Installs the comparator used by [`SortMode::Custom`].
    pub fn set_comparator(
        &mut self,
        comparator: impl FnMut(&RecordedCommand, &RecordedCommand) -> Ordering + 'static,
    ) {
        self.comparator = Some(Box::new(comparator));
        self.touch();
    }

    /// Sorts in place according to the sort mode. Idempotent until the next
    /// mutation.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        match self.sort_mode {
            SortMode::None => {}
            SortMode::State => {
                self.commands
                    .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.sort_key.cmp(&b.sort_key)));
            }
            SortMode::FrontToBack => Self::sort_by_depth(&mut self.commands, true),
            SortMode::BackToFront => Self::sort_by_depth(&mut self.commands, false),
            SortMode::Custom => {
                if let Some(comparator) = &mut self.comparator {
                    self.commands.sort_by(|a, b| comparator(a, b));
                }
            }
        }
        self.sorted = true;
    }

    /// Partition into non-draw and draw commands; non-draw sorted by
    /// descending priority come first, draws sorted by depth follow.
    fn sort_by_depth(commands: &mut Vec<RecordedCommand>, front_to_back: bool) {
        let (mut setup, mut draws): (Vec<_>, Vec<_>) =
            commands.drain(..).partition(|c| !c.command.is_draw());
        setup.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.sort_key.cmp(&b.sort_key)));
        draws.sort_by(|a, b| {
            let (da, db) = if front_to_back {
                // Unknown depth draws last.
                (a.depth.unwrap_or(f32::MAX), b.depth.unwrap_or(f32::MAX))
            } else {
                (b.depth.unwrap_or(f32::MAX), a.depth.unwrap_or(f32::MAX))
            };
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        });
        commands.extend(setup);
        commands.extend(draws);
    }

    /// Sorts if needed, then replays every command against the backend.
    pub fn execute(&mut self, backend: &mut dyn Backend) -> BufferStats {
        self.sort();
        for recorded in &self.commands {
            recorded.command.execute(backend);
        }
        self.stats
    }

    /// [`CommandBuffer::execute`] wrapped in a monotonic clock.
    pub fn execute_with_profiling(&mut self, backend: &mut dyn Backend) -> ExecutionReport {
        let start = now_ms();
        let stats = self.execute(backend);
        ExecutionReport {
            stats,
            execution_time_ms: now_ms() - start,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn stats(&self) -> BufferStats {
        self.stats
    }

    /// Bumped on every mutation (record, seal, reset, sort-mode change).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[must_use]
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// True if the buffer holds a `Custom` command and therefore cannot be
    /// serialized.
    #[must_use]
    pub fn has_custom_commands(&self) -> bool {
        self.commands
            .iter()
            .any(|c| matches!(c.command, Command::Custom { .. }))
    }

    pub(crate) fn restore(
        commands: Vec<RecordedCommand>,
        sort_mode: SortMode,
        sealed: bool,
        stats: BufferStats,
    ) -> Self {
        let next_command_id = commands.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        Self {
            commands,
            sort_mode,
            comparator: None,
            sealed,
            version: 0,
            sorted: false,
            next_command_id,
            stats,
            pending_sort_key: 0,
            pending_depth: None,
            pending_label: None,
        }
    }

    fn touch(&mut self) {
        self.version += 1;
        self.sorted = false;
    }
}
