//! Unified Render Bridge
//!
//! The per-surface facade: selects a backend with tiered fallback, compiles
//! parallel GLSL/WGSL shaders, routes uniforms into the packed VIB3 block,
//! and drives the fullscreen-quad draw path. A bridge exclusively owns its
//! backend, its program cache, its quad geometry, and its uniform staging.

pub mod multi;
pub mod quad;
pub mod vib3;

pub use multi::{FrameOptions, MultiCanvasStack};
pub use vib3::{Vib3Uniforms, scalar_slot, vib3_schema, vib3_uniform_type};

use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::backend::{
    Backend, BackendKind, BufferHandle, ClearRequest, RenderStats, ShaderError, ShaderProgram,
    ShaderSources, UniformValue, VertexArray, WgpuBackend, WgpuBackendOptions,
};
use crate::errors::Result;
use crate::registry::Diagnostics;
use crate::state::RenderState;
use crate::utils::time::now_ms;

/// Bridge creation options; forwarded to backend selection.
pub type BridgeOptions = WgpuBackendOptions;

/// Per-render options.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Clear the target before the quad draw.
    pub clear: bool,
    pub clear_color: [f32; 4],
    /// Shader time in seconds; falls back to the bridge's own clock.
    pub time: Option<f32>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            clear: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            time: None,
        }
    }
}

/// One canvas-sized rendering facade.
pub struct RenderBridge {
    backend: WgpuBackend,
    programs: FxHashMap<String, ShaderProgram>,
    quad_buffer: BufferHandle,
    quad_vao: VertexArray,
    /// Staged full-record update, applied before the pending pairs.
    pending_params: Option<crate::params::VisualParams>,
    /// Staged name/value pairs, applied (and cleared) by the next render.
    pending: Vec<(String, UniformValue)>,
    width: u32,
    height: u32,
    pixel_ratio: f32,
    created_ms: f64,
    warned_broken: FxHashSet<String>,
}

impl RenderBridge {
    /// Creates a bridge on a surface target, performing backend selection
    /// with silent fallback (observable via [`RenderBridge::backend_type`]).
    pub async fn create(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        options: &BridgeOptions,
    ) -> Result<Self> {
        let mut backend = WgpuBackend::create(target, width, height, options).await?;
        let (quad_buffer, quad_vao) = quad::create_quad(&mut backend);
        Ok(Self {
            backend,
            programs: FxHashMap::default(),
            quad_buffer,
            quad_vao,
            pending_params: None,
            pending: Vec::new(),
            width,
            height,
            pixel_ratio: 1.0,
            created_ms: now_ms(),
            warned_broken: FxHashSet::default(),
        })
    }

    #[must_use]
    pub fn backend_type(&self) -> BackendKind {
        self.backend.kind()
    }

    // ========================================================================
    // Shaders
    // ========================================================================

    /// Compiles a named procedural shader from its parallel sources.
    ///
    /// Missing vertex stages default to the built-in fullscreen-quad
    /// stages. On the WebGPU tier a missing WGSL fragment fails (`false`)
    /// without throwing; the error is inspectable via
    /// [`RenderBridge::shader_error`].
    pub fn compile_shader(&mut self, name: &str, sources: ShaderSources) -> bool {
        let mut sources = sources;
        if sources.glsl_vertex.is_none() && sources.glsl_fragment.is_some() {
            sources.glsl_vertex = Some(quad::FULLSCREEN_GLSL_VERT.to_string());
        }
        // WGSL fragments pair with the built-in vertex inside the backend.
        let mut program = ShaderProgram::new(name, sources);
        let ok = self.backend.compile_shader(&mut program);
        self.programs.insert(name.to_string(), program);
        if ok {
            self.warned_broken.remove(name);
        }
        ok
    }

    /// The stored failure of a named shader, if its last compile failed.
    #[must_use]
    pub fn shader_error(&self, name: &str) -> Option<&ShaderError> {
        self.programs.get(name).and_then(ShaderProgram::error)
    }

    #[must_use]
    pub fn has_shader(&self, name: &str) -> bool {
        self.programs.get(name).is_some_and(ShaderProgram::is_valid)
    }

    // ========================================================================
    // Uniforms
    // ========================================================================

    /// Stages a resolved parameter record; applied on the next render.
    pub fn set_params(&mut self, params: &crate::params::VisualParams) {
        self.pending_params = Some(params.clone());
    }

    /// Stages named uniform values; applied on the next render, after any
    /// staged parameter record (so explicit pairs win).
    pub fn set_uniforms(&mut self, uniforms: impl IntoIterator<Item = (String, UniformValue)>) {
        self.pending.extend(uniforms);
    }

    pub fn set_uniform(&mut self, name: impl Into<String>, value: UniformValue) {
        self.pending.push((name.into(), value));
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Clears and draws one alpha-blended fullscreen quad with the named
    /// shader. A missing or broken shader draws nothing (the clear still
    /// happens) and returns `false`.
    pub fn render(&mut self, shader: &str, options: &RenderOptions) -> bool {
        self.backend.begin_frame();
        if options.clear {
            self.backend.clear(&ClearRequest::color_only(options.clear_color));
        }

        let usable = self.programs.get(shader).is_some_and(ShaderProgram::is_valid);
        if !usable {
            if self.warned_broken.insert(shader.to_string()) {
                warn!("render('{shader}'): shader missing or broken; layer draws nothing");
            }
            self.pending_params = None;
            self.pending.clear();
            self.backend.end_frame();
            return false;
        }

        self.backend.set_state(&RenderState::transparent());
        self.backend
            .set_viewport(0, 0, self.drawing_width(), self.drawing_height());
        self.backend.bind_shader(shader);

        let time = options
            .time
            .unwrap_or_else(|| ((now_ms() - self.created_ms) / 1000.0) as f32);
        self.backend
            .set_uniform("u_time", &UniformValue::Float(time));
        self.backend.set_uniform(
            "u_resolution",
            &UniformValue::Vec2(glam::Vec2::new(
                self.drawing_width() as f32,
                self.drawing_height() as f32,
            )),
        );
        if let Some(params) = self.pending_params.take() {
            for (name, value) in params_to_uniforms(&params) {
                self.backend.set_uniform(name, &value);
            }
        }
        for (name, value) in self.pending.drain(..) {
            self.backend.set_uniform(&name, &value);
        }

        self.backend.bind_vertex_array(&self.quad_vao);
        self.backend.draw(quad::QUAD_VERTEX_COUNT, 0);
        self.backend.end_frame();
        true
    }

    /// Resizes the drawing buffer to `floor(w · pr) × floor(h · pr)`.
    pub fn resize(&mut self, width: u32, height: u32, pixel_ratio: f32) {
        self.width = width;
        self.height = height;
        self.pixel_ratio = if pixel_ratio > 0.0 { pixel_ratio } else { 1.0 };
        self.backend
            .resize(self.drawing_width(), self.drawing_height());
    }

    #[must_use]
    pub fn drawing_width(&self) -> u32 {
        ((self.width as f32) * self.pixel_ratio).floor().max(1.0) as u32
    }

    #[must_use]
    pub fn drawing_height(&self) -> u32 {
        ((self.height as f32) * self.pixel_ratio).floor().max(1.0) as u32
    }

    // ========================================================================
    // Observability and lifecycle
    // ========================================================================

    #[must_use]
    pub fn stats(&self) -> RenderStats {
        self.backend.stats()
    }

    pub fn reset_stats(&mut self) {
        self.backend.reset_stats();
    }

    #[must_use]
    pub fn resource_diagnostics(&self) -> Diagnostics {
        self.backend.registry().diagnostics()
    }

    /// Drops every program, the quad geometry and the backend's resources.
    pub fn dispose(&mut self) {
        self.programs.clear();
        let quad = self.quad_buffer;
        self.backend.delete_buffer(&quad);
        self.backend.dispose();
    }
}

/// The uniform pairs of one resolved parameter record, in slot order.
#[must_use]
pub fn params_to_uniforms(
    params: &crate::params::VisualParams,
) -> Vec<(&'static str, UniformValue)> {
    vec![
        ("u_geometry", UniformValue::Float(params.geometry_type.index() as f32)),
        ("u_rot4dXY", UniformValue::Float(params.rot4d_xy)),
        ("u_rot4dXZ", UniformValue::Float(params.rot4d_xz)),
        ("u_rot4dYZ", UniformValue::Float(params.rot4d_yz)),
        ("u_rot4dXW", UniformValue::Float(params.rot4d_xw)),
        ("u_rot4dYW", UniformValue::Float(params.rot4d_yw)),
        ("u_rot4dZW", UniformValue::Float(params.rot4d_zw)),
        ("u_dimension", UniformValue::Float(params.dimension)),
        ("u_gridDensity", UniformValue::Float(params.grid_density)),
        ("u_morphFactor", UniformValue::Float(params.morph_factor)),
        ("u_chaos", UniformValue::Float(params.chaos)),
        ("u_speed", UniformValue::Float(params.speed)),
        ("u_hue", UniformValue::Float(params.hue)),
        ("u_intensity", UniformValue::Float(params.intensity)),
        ("u_saturation", UniformValue::Float(params.saturation)),
        ("u_mouseIntensity", UniformValue::Float(params.mouse_intensity)),
        ("u_clickIntensity", UniformValue::Float(params.click_intensity)),
        ("u_bass", UniformValue::Float(params.bass)),
        ("u_mid", UniformValue::Float(params.mid)),
        ("u_high", UniformValue::Float(params.high)),
        ("u_layerScale", UniformValue::Float(params.layer_scale)),
        ("u_layerOpacity", UniformValue::Float(params.layer_opacity)),
        (
            "u_layerColor",
            UniformValue::Vec3(glam::Vec3::from_array(params.layer_color)),
        ),
        ("u_densityMult", UniformValue::Float(params.density_mult)),
        ("u_speedMult", UniformValue::Float(params.speed_mult)),
    ]
}
