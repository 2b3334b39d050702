//! Vertex input descriptors and CPU-visible buffer handles.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_VAO_ID: AtomicU64 = AtomicU64::new(1);

/// How an index buffer's entries are sized; drives the byte offset of
/// `first_index` in indexed draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexFormat {
    U16,
    #[default]
    U32,
}

impl IndexFormat {
    #[must_use]
    pub fn byte_size(self) -> u64 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }

    #[must_use]
    pub fn as_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::U16 => wgpu::IndexFormat::Uint16,
            IndexFormat::U32 => wgpu::IndexFormat::Uint32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferUsage {
    Vertex,
    Index,
}

impl BufferUsage {
    #[must_use]
    pub fn as_wgpu(self) -> wgpu::BufferUsages {
        match self {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            BufferUsage::Index => wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        }
    }
}

/// Creation request for a vertex or index buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferDesc {
    pub usage: Option<BufferUsage>,
    pub data: Option<Vec<u8>>,
    /// Size in bytes when created empty; ignored if `data` is present.
    pub size: Option<u64>,
    /// Hint that the contents will be rewritten often.
    pub dynamic: bool,
    pub label: Option<String>,
}

impl BufferDesc {
    #[must_use]
    pub fn vertex(data: Vec<u8>) -> Self {
        Self {
            usage: Some(BufferUsage::Vertex),
            data: Some(data),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn index(data: Vec<u8>) -> Self {
        Self {
            usage: Some(BufferUsage::Index),
            data: Some(data),
            ..Self::default()
        }
    }
}

/// Lightweight handle to a backend-owned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferHandle {
    pub id: u64,
    pub usage: BufferUsage,
    pub size: u64,
}

/// Per-attribute vertex layout entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    #[must_use]
    pub fn as_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        }
    }

    #[must_use]
    pub fn byte_size(self) -> u32 {
        match self {
            VertexFormat::Float32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// One bound vertex buffer with its layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexBufferDesc {
    pub buffer: BufferHandle,
    pub stride: u32,
    /// Advance per instance instead of per vertex.
    pub step_instance: bool,
    pub attributes: Vec<VertexAttribute>,
}

/// A vertex-array description: buffers, layouts, optional index buffer.
/// Realized lazily by the backend on first bind.
#[derive(Debug, Clone)]
pub struct VertexArray {
    id: u64,
    pub buffers: Vec<VertexBufferDesc>,
    pub index: Option<(BufferHandle, IndexFormat)>,
    pub label: Option<String>,
}

impl VertexArray {
    #[must_use]
    pub fn new(
        buffers: Vec<VertexBufferDesc>,
        index: Option<(BufferHandle, IndexFormat)>,
        label: Option<String>,
    ) -> Self {
        Self {
            id: NEXT_VAO_ID.fetch_add(1, Ordering::Relaxed),
            buffers,
            index,
            label,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}
