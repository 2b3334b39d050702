//! Uniform values and the per-program staging store.
//!
//! Uniform values arrive dynamically typed from callers; the backend
//! dispatches on an explicit tag instead of inspecting payload shapes.
//! [`UniformStore`] holds the staged values for the current program,
//! skipping re-uploads of unchanged values and dropping type mismatches
//! with a single log line per uniform name.

use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Tagged uniform payload covering every scalar, vector, square-matrix and
/// sampler type the shaders use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
    Int(i32),
    Bool(bool),
    /// Texture slot index.
    Sampler(u32),
}

impl UniformValue {
    #[must_use]
    pub fn kind(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat2(_) => UniformType::Mat2,
            UniformValue::Mat3(_) => UniformType::Mat3,
            UniformValue::Mat4(_) => UniformType::Mat4,
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Bool(_) => UniformType::Bool,
            UniformValue::Sampler(_) => UniformType::Sampler,
        }
    }

    /// Scalar view used when packing the fixed uniform block.
    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            UniformValue::Float(v) => Some(*v),
            UniformValue::Int(v) => Some(*v as f32),
            UniformValue::Bool(v) => Some(f32::from(u8::from(*v))),
            _ => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

/// The type tag alone, as stored in shader reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
    Int,
    Bool,
    Sampler,
}

/// Outcome of staging one uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// New or changed; must be uploaded.
    Upload,
    /// Identical to the previously staged value; skipped.
    Unchanged,
    /// Declared type differs; dropped.
    TypeMismatch,
}

/// Staged uniform values for one program.
#[derive(Debug, Default)]
pub struct UniformStore {
    values: FxHashMap<String, UniformValue>,
    mismatch_warned: FxHashSet<String>,
}

impl UniformStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `value` under `name`, checking against the program's declared
    /// type when reflection knows one.
    pub fn stage(
        &mut self,
        name: &str,
        value: &UniformValue,
        declared: Option<UniformType>,
    ) -> StageOutcome {
        if let Some(declared) = declared
            && declared != value.kind()
        {
            if self.mismatch_warned.insert(name.to_string()) {
                warn!(
                    "uniform '{name}' expects {declared:?}, got {:?}; dropped",
                    value.kind()
                );
            }
            return StageOutcome::TypeMismatch;
        }

        match self.values.get(name) {
            Some(previous) if previous == value => StageOutcome::Unchanged,
            _ => {
                self.values.insert(name.to_string(), value.clone());
                StageOutcome::Upload
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Forgets staged values (but not the mismatch log marks), forcing the
    /// next stage of every name to upload.
    pub fn invalidate(&mut self) {
        self.values.clear();
    }
}
