//! Offscreen render target descriptors.

use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::texture::{SamplerOptions, TextureFormat};

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// One color attachment of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorAttachmentDesc {
    pub format: TextureFormat,
    pub sampler: SamplerOptions,
}

impl Default for ColorAttachmentDesc {
    fn default() -> Self {
        Self {
            format: TextureFormat::Rgba8,
            sampler: SamplerOptions::default(),
        }
    }
}

/// Logical description of an offscreen framebuffer. The GPU-side textures
/// and views are created on first bind.
#[derive(Debug, Clone)]
pub struct RenderTargetDesc {
    pub width: u32,
    pub height: u32,
    pub color: SmallVec<[ColorAttachmentDesc; 4]>,
    pub depth: Option<TextureFormat>,
    pub samples: u32,
}

impl RenderTargetDesc {
    #[must_use]
    pub fn simple(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            color: SmallVec::from_slice(&[ColorAttachmentDesc {
                format,
                sampler: SamplerOptions::default(),
            }]),
            depth: None,
            samples: 1,
        }
    }

    /// Total attachment bytes, for registry accounting.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        let texels = u64::from(self.width) * u64::from(self.height) * u64::from(self.samples.max(1));
        let color: u64 = self
            .color
            .iter()
            .map(|c| texels * c.format.bytes_per_texel())
            .sum();
        let depth = self
            .depth
            .map_or(0, |d| texels * d.bytes_per_texel());
        color + depth
    }
}

/// A logical offscreen framebuffer.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    id: u64,
    pub desc: RenderTargetDesc,
    pub label: Option<String>,
}

impl RenderTarget {
    #[must_use]
    pub fn new(desc: RenderTargetDesc, label: Option<String>) -> Self {
        Self {
            id: NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed),
            desc,
            label,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}
