//! Shader program descriptors.
//!
//! A [`ShaderProgram`] is the CPU-side identity of one procedural shader:
//! its name, its parallel GLSL/WGSL sources, and — after a compile attempt —
//! either a cached uniform reflection or a stored error. Compile and link
//! failures never escape the backend; they land here and are inspected.

use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use super::uniforms::UniformType;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Parallel source text for both backend tiers.
///
/// The GL tiers link `glsl_vertex` + `glsl_fragment`; the WebGPU tier
/// requires `wgsl_fragment` (there is no GLSL-to-WGSL transpile) and pairs
/// it with `wgsl_vertex` or the built-in fullscreen-quad vertex stage.
#[derive(Debug, Clone, Default)]
pub struct ShaderSources {
    pub glsl_vertex: Option<String>,
    pub glsl_fragment: Option<String>,
    pub wgsl_vertex: Option<String>,
    pub wgsl_fragment: Option<String>,
}

impl ShaderSources {
    #[must_use]
    pub fn glsl(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            glsl_vertex: Some(vertex.into()),
            glsl_fragment: Some(fragment.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn wgsl_fragment(fragment: impl Into<String>) -> Self {
        Self {
            wgsl_fragment: Some(fragment.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_glsl(&self) -> bool {
        self.glsl_vertex.is_some() && self.glsl_fragment.is_some()
    }

    #[must_use]
    pub fn has_wgsl(&self) -> bool {
        self.wgsl_fragment.is_some()
    }
}

/// A stored shader failure. Which shader stage failed is recorded for
/// compile errors; link and pipeline failures are program-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    Compile { stage: ShaderStage, log: String },
    Link { log: String },
    PipelineCreate { log: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderError::Compile { stage, log } => {
                let stage = match stage {
                    ShaderStage::Vertex => "vertex",
                    ShaderStage::Fragment => "fragment",
                };
                write!(f, "{stage} compile error: {log}")
            }
            ShaderError::Link { log } => write!(f, "link error: {log}"),
            ShaderError::PipelineCreate { log } => write!(f, "pipeline creation error: {log}"),
        }
    }
}

/// One named shader program.
#[derive(Debug)]
pub struct ShaderProgram {
    pub name: String,
    pub sources: ShaderSources,
    /// Monotonic identity, part of the backend's pipeline cache key.
    id: u64,
    error: Option<ShaderError>,
    /// Uniform reflection filled in by the backend after a successful
    /// compile: name to declared type.
    uniforms: FxHashMap<String, UniformType>,
}

impl ShaderProgram {
    #[must_use]
    pub fn new(name: impl Into<String>, sources: ShaderSources) -> Self {
        Self {
            name: name.into(),
            sources,
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            error: None,
            uniforms: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The stored failure, if the last compile attempt failed.
    #[must_use]
    pub fn error(&self) -> Option<&ShaderError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn set_error(&mut self, error: ShaderError) {
        self.error = Some(error);
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }

    /// Declared type of a uniform, if reflection knows it.
    #[must_use]
    pub fn uniform_type(&self, name: &str) -> Option<UniformType> {
        self.uniforms.get(name).copied()
    }

    #[must_use]
    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.keys().map(String::as_str)
    }

    pub(crate) fn set_reflection(&mut self, uniforms: FxHashMap<String, UniformType>) {
        self.uniforms = uniforms;
    }
}
