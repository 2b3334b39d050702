//! Texture descriptors.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// The fixed set of texture formats the core supports on both tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    #[default]
    Rgba8,
    Rgba16f,
    Rgba32f,
    Rgb8,
    Rg8,
    R8,
    Depth32f,
    Depth24Stencil8,
}

impl TextureFormat {
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32f | TextureFormat::Depth24Stencil8)
    }

    /// Bytes per texel, for registry byte accounting.
    #[must_use]
    pub fn bytes_per_texel(self) -> u64 {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rg8 => 2,
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 | TextureFormat::Depth32f | TextureFormat::Depth24Stencil8 => 4,
            TextureFormat::Rgba16f => 8,
            TextureFormat::Rgba32f => 16,
        }
    }

    /// `Rgb8` has no packed wgpu equivalent and widens to `Rgba8`.
    #[must_use]
    pub fn as_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8 | TextureFormat::Rgb8 => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba16f => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32f => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
            TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
            TextureFormat::Depth32f => wgpu::TextureFormat::Depth32Float,
            TextureFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

impl FilterMode {
    #[must_use]
    pub fn as_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

impl WrapMode {
    #[must_use]
    pub fn as_wgpu(self) -> wgpu::AddressMode {
        match self {
            WrapMode::Clamp => wgpu::AddressMode::ClampToEdge,
            WrapMode::Repeat => wgpu::AddressMode::Repeat,
            WrapMode::Mirror => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

/// Sampling parameters attached to a texture or target attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplerOptions {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
}

/// CPU-side texture description; the GPU object is created on first bind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub sampler: SamplerOptions,
}

impl TextureDescriptor {
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * self.format.bytes_per_texel()
    }
}

/// One 2D texture plus its optional initial pixel data.
#[derive(Debug, Clone)]
pub struct Texture2d {
    id: u64,
    pub desc: TextureDescriptor,
    /// Tightly packed pixel rows; `None` for attachment-only textures.
    pub data: Option<Vec<u8>>,
    pub label: Option<String>,
}

impl Texture2d {
    #[must_use]
    pub fn new(desc: TextureDescriptor, data: Option<Vec<u8>>, label: Option<String>) -> Self {
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            desc,
            data,
            label,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}
