//! Shared test double: a recording backend that honors the state-tracking
//! contract without touching a GPU.
#![allow(dead_code)]

use vib3::backend::{
    Backend, BackendKind, BufferDesc, BufferHandle, BufferUsage, ClearRequest, IndexFormat,
    Projection, RenderStats, ShaderProgram, Texture2d, UniformValue, VertexArray,
};
use vib3::backend::uniforms::{StageOutcome, UniformStore};
use vib3::bridge::vib3_uniform_type;
use vib3::state::RenderState;

/// Records every operation as a line in `log` and mirrors the real
/// backend's dedup counters.
pub struct RecordingBackend {
    pub kind: BackendKind,
    pub stats: RenderStats,
    pub log: Vec<String>,
    tracked_state: Option<RenderState>,
    current_program: Option<String>,
    programs: Vec<String>,
    store: UniformStore,
    next_buffer_id: u64,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            kind: BackendKind::WebGpu,
            stats: RenderStats::default(),
            log: Vec::new(),
            tracked_state: None,
            current_program: None,
            programs: Vec::new(),
            store: UniformStore::new(),
            next_buffer_id: 1,
        }
    }

    /// Pre-registers a program name so `bind_shader` succeeds.
    pub fn with_program(mut self, name: &str) -> Self {
        self.programs.push(name.to_string());
        self
    }

    pub fn log_str(&self) -> String {
        self.log.join(";")
    }
}

impl Backend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn begin_frame(&mut self) {
        self.log.push("begin_frame".to_string());
    }

    fn end_frame(&mut self) {
        self.log.push("end_frame".to_string());
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.log.push(format!("resize({width},{height})"));
    }

    fn clear(&mut self, request: &ClearRequest) {
        self.log.push(format!("clear({:?})", request.flags));
    }

    fn set_state(&mut self, state: &RenderState) {
        if self.tracked_state.as_ref() == Some(state) {
            return;
        }
        self.tracked_state = Some(state.clone());
        self.stats.state_changes += 1;
        self.log.push("set_state".to_string());
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.log.push(format!("set_viewport({x},{y},{width},{height})"));
    }

    fn set_scissor(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.log.push(format!("set_scissor({x},{y},{width},{height})"));
    }

    fn push_state(&mut self) {
        self.log.push("push_state".to_string());
    }

    fn pop_state(&mut self) {
        self.log.push("pop_state".to_string());
    }

    fn compile_shader(&mut self, program: &mut ShaderProgram) -> bool {
        self.programs.push(program.name.clone());
        self.log.push(format!("compile_shader({})", program.name));
        true
    }

    fn bind_shader(&mut self, name: &str) -> bool {
        if self.current_program.as_deref() == Some(name) {
            return true;
        }
        if !self.programs.iter().any(|p| p == name) {
            self.log.push(format!("bind_shader_missing({name})"));
            return false;
        }
        self.current_program = Some(name.to_string());
        self.stats.shader_switches += 1;
        self.log.push(format!("bind_shader({name})"));
        true
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        let declared = vib3_uniform_type(name);
        if self.store.stage(name, value, declared) == StageOutcome::Upload {
            self.stats.buffer_uploads += 1;
            self.log.push(format!("set_uniform({name})"));
        }
    }

    fn set_rotor(&mut self, _rotor: [f32; 8]) {
        self.log.push("set_rotor".to_string());
    }

    fn set_projection(&mut self, _projection: &Projection) {
        self.log.push("set_projection".to_string());
    }

    fn bind_texture(&mut self, texture: &Texture2d, slot: u32) {
        self.stats.texture_binds += 1;
        self.log.push(format!("bind_texture({},{slot})", texture.id()));
    }

    fn bind_texture_id(&mut self, id: u64, slot: u32) {
        self.stats.texture_binds += 1;
        self.log.push(format!("bind_texture({id},{slot})"));
    }

    fn bind_vertex_array(&mut self, vao: &VertexArray) {
        self.log.push(format!("bind_vao({})", vao.id()));
    }

    fn bind_vertex_array_id(&mut self, id: u64) {
        self.log.push(format!("bind_vao({id})"));
    }

    fn bind_index_buffer(&mut self, buffer: &BufferHandle, format: IndexFormat) {
        self.log.push(format!("bind_index({},{format:?})", buffer.id));
    }

    fn bind_render_target(&mut self, target: Option<&vib3::backend::RenderTarget>) {
        self.log.push(format!("bind_target({:?})", target.map(|t| t.id())));
    }

    fn bind_render_target_id(&mut self, id: Option<u64>) {
        self.log.push(format!("bind_target({id:?})"));
    }

    fn draw(&mut self, vertex_count: u32, _first_vertex: u32) {
        self.stats.draw_calls += 1;
        self.stats.triangles += u64::from(vertex_count / 3);
        self.log.push(format!("draw({vertex_count})"));
    }

    fn draw_indexed(&mut self, index_count: u32, _first_index: u32) {
        self.stats.draw_calls += 1;
        self.stats.triangles += u64::from(index_count / 3);
        self.log.push(format!("draw_indexed({index_count})"));
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32) {
        self.stats.draw_calls += 1;
        self.stats.triangles += u64::from(vertex_count / 3) * u64::from(instance_count);
        self.log.push(format!("draw_instanced({vertex_count},{instance_count})"));
    }

    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32) {
        self.stats.draw_calls += 1;
        self.stats.triangles += u64::from(index_count / 3) * u64::from(instance_count);
        self.log
            .push(format!("draw_indexed_instanced({index_count},{instance_count})"));
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferHandle {
        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.log.push(format!("create_buffer({id})"));
        BufferHandle {
            id,
            usage: desc.usage.unwrap_or(BufferUsage::Vertex),
            size: desc.data.as_ref().map_or(0, Vec::len) as u64,
        }
    }

    fn update_buffer(&mut self, buffer: &BufferHandle, _data: &[u8], _offset: u64) {
        self.stats.buffer_uploads += 1;
        self.log.push(format!("update_buffer({})", buffer.id));
    }

    fn delete_buffer(&mut self, buffer: &BufferHandle) {
        self.log.push(format!("delete_buffer({})", buffer.id));
    }

    fn stats(&self) -> RenderStats {
        self.stats
    }

    fn reset_stats(&mut self) {
        self.stats = RenderStats::default();
    }

    fn dispose(&mut self) {
        self.log.push("dispose".to_string());
    }
}
