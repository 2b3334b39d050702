//! Render State
//!
//! A complete GPU pipeline configuration as a pure value type: blend, depth,
//! stencil, rasterizer, viewport and color mask. Two render states compare
//! by value so backends can elide redundant state changes. A `RenderState`
//! owns nothing GPU-side; the wgpu backend folds it into its pipeline key
//! and rebuilds the corresponding `wgpu` descriptor fragments on demand.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;

// ============================================================================
// Closed enumerations
// ============================================================================

/// Blend factors, the common subset expressible on WebGL 2 and WebGPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    SrcAlphaSaturate,
}

impl BlendFactor {
    #[must_use]
    pub fn as_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcColor => wgpu::BlendFactor::Src,
            BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
            BlendFactor::DstColor => wgpu::BlendFactor::Dst,
            BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
            BlendFactor::ConstantColor => wgpu::BlendFactor::Constant,
            BlendFactor::OneMinusConstantColor => wgpu::BlendFactor::OneMinusConstant,
            BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
        }
    }
}

/// Depth/stencil comparison functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    Lequal,
    Greater,
    Notequal,
    Gequal,
    Always,
}

impl CompareFunction {
    #[must_use]
    pub fn as_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::Lequal => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::Notequal => wgpu::CompareFunction::NotEqual,
            CompareFunction::Gequal => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

/// Stencil operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Incr,
    IncrWrap,
    Decr,
    DecrWrap,
    Invert,
}

impl StencilOp {
    #[must_use]
    pub fn as_wgpu(self) -> wgpu::StencilOperation {
        match self {
            StencilOp::Keep => wgpu::StencilOperation::Keep,
            StencilOp::Zero => wgpu::StencilOperation::Zero,
            StencilOp::Replace => wgpu::StencilOperation::Replace,
            StencilOp::Incr => wgpu::StencilOperation::IncrementClamp,
            StencilOp::IncrWrap => wgpu::StencilOperation::IncrementWrap,
            StencilOp::Decr => wgpu::StencilOperation::DecrementClamp,
            StencilOp::DecrWrap => wgpu::StencilOperation::DecrementWrap,
            StencilOp::Invert => wgpu::StencilOperation::Invert,
        }
    }
}

/// Face culling modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    FrontAndBack,
}

impl CullMode {
    /// `FrontAndBack` has no wgpu equivalent; it culls everything, which the
    /// backend realizes by skipping the draw.
    #[must_use]
    pub fn as_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullMode::None | CullMode::FrontAndBack => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        }
    }
}

/// Coarse blend selection used by the dedicated blend-mode command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    None,
    Alpha,
    Additive,
    Premultiplied,
}

impl BlendMode {
    /// Expands to the full blend sub-record.
    #[must_use]
    pub fn as_blend_state(self) -> BlendState {
        match self {
            BlendMode::None => BlendState::default(),
            BlendMode::Alpha => BlendState::alpha(),
            BlendMode::Additive => BlendState::additive(),
            BlendMode::Premultiplied => BlendState {
                enabled: true,
                src_rgb: BlendFactor::One,
                dst_rgb: BlendFactor::OneMinusSrcAlpha,
                src_alpha: BlendFactor::One,
                dst_alpha: BlendFactor::OneMinusSrcAlpha,
                color: None,
            },
        }
    }
}

// ============================================================================
// Sub-records
// ============================================================================

/// Alpha blending configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlendState {
    pub enabled: bool,
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    /// Constant blend color, used by the `Constant*` factors.
    pub color: Option<[f32; 4]>,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src_rgb: BlendFactor::One,
            dst_rgb: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            color: None,
        }
    }
}

impl BlendState {
    /// Standard premultiplied-style alpha blending.
    #[must_use]
    pub fn alpha() -> Self {
        Self {
            enabled: true,
            src_rgb: BlendFactor::SrcAlpha,
            dst_rgb: BlendFactor::OneMinusSrcAlpha,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::OneMinusSrcAlpha,
            color: None,
        }
    }

    /// Additive light accumulation.
    #[must_use]
    pub fn additive() -> Self {
        Self {
            enabled: true,
            src_rgb: BlendFactor::SrcAlpha,
            dst_rgb: BlendFactor::One,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::One,
            color: None,
        }
    }

    #[must_use]
    pub fn as_wgpu(&self) -> Option<wgpu::BlendState> {
        if !self.enabled {
            return None;
        }
        Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: self.src_rgb.as_wgpu(),
                dst_factor: self.dst_rgb.as_wgpu(),
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: self.src_alpha.as_wgpu(),
                dst_factor: self.dst_alpha.as_wgpu(),
                operation: wgpu::BlendOperation::Add,
            },
        })
    }
}

/// Depth test configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepthState {
    pub test_enabled: bool,
    pub write_enabled: bool,
    pub compare: CompareFunction,
    pub near: f32,
    pub far: f32,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test_enabled: true,
            write_enabled: true,
            compare: CompareFunction::Less,
            near: 0.0,
            far: 1.0,
        }
    }
}

/// Stencil test configuration. Applied to both faces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StencilState {
    pub enabled: bool,
    pub reference: u32,
    pub mask: u32,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            enabled: false,
            reference: 0,
            mask: 0xFF,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
        }
    }
}

/// Rasterizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RasterizerState {
    pub cull_mode: CullMode,
    pub front_face_ccw: bool,
    pub scissor_enabled: bool,
    /// Scissor rect `[x, y, w, h]`, only honored while `scissor_enabled`.
    pub scissor: [i32; 4],
    pub line_width: f32,
    pub depth_bias_constant: f32,
    pub depth_bias_slope: f32,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::None,
            front_face_ccw: true,
            scissor_enabled: false,
            scissor: [0, 0, 0, 0],
            line_width: 1.0,
            depth_bias_constant: 0.0,
            depth_bias_slope: 0.0,
        }
    }
}

/// Viewport rectangle in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Per-channel color write mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl Default for ColorMask {
    fn default() -> Self {
        Self {
            r: true,
            g: true,
            b: true,
            a: true,
        }
    }
}

impl ColorMask {
    #[must_use]
    pub fn as_wgpu(self) -> wgpu::ColorWrites {
        let mut writes = wgpu::ColorWrites::empty();
        if self.r {
            writes |= wgpu::ColorWrites::RED;
        }
        if self.g {
            writes |= wgpu::ColorWrites::GREEN;
        }
        if self.b {
            writes |= wgpu::ColorWrites::BLUE;
        }
        if self.a {
            writes |= wgpu::ColorWrites::ALPHA;
        }
        writes
    }
}

// ============================================================================
// RenderState
// ============================================================================

/// One complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderState {
    pub blend: BlendState,
    pub depth: DepthState,
    pub stencil: StencilState,
    pub rasterizer: RasterizerState,
    /// Zero-sized viewport means "use the current drawing buffer size".
    pub viewport: Viewport,
    pub color_mask: ColorMask,
}

impl RenderState {
    /// Solid geometry: no blending, depth test + write.
    #[must_use]
    pub fn opaque() -> Self {
        Self::default()
    }

    /// Standard alpha-blended geometry; depth test without write.
    #[must_use]
    pub fn transparent() -> Self {
        Self {
            blend: BlendState::alpha(),
            depth: DepthState {
                write_enabled: false,
                ..DepthState::default()
            },
            ..Self::default()
        }
    }

    /// Additive accumulation; depth test without write.
    #[must_use]
    pub fn additive() -> Self {
        Self {
            blend: BlendState::additive(),
            depth: DepthState {
                write_enabled: false,
                ..DepthState::default()
            },
            ..Self::default()
        }
    }

    /// Line rendering with alpha blending.
    #[must_use]
    pub fn wireframe() -> Self {
        Self {
            blend: BlendState::alpha(),
            rasterizer: RasterizerState {
                line_width: 1.5,
                ..RasterizerState::default()
            },
            ..Self::default()
        }
    }

    /// 4D lattice geometry: back-face culling stays off because projected
    /// cells invert their winding as they rotate through the W axis.
    #[must_use]
    pub fn geometry4d() -> Self {
        Self {
            depth: DepthState {
                compare: CompareFunction::Lequal,
                ..DepthState::default()
            },
            ..Self::default()
        }
    }

    /// Alpha-blended 4D geometry.
    #[must_use]
    pub fn transparent4d() -> Self {
        Self {
            blend: BlendState::alpha(),
            depth: DepthState {
                compare: CompareFunction::Lequal,
                write_enabled: false,
                ..DepthState::default()
            },
            ..Self::default()
        }
    }

    /// Forwards this state through the backend's state tracker.
    pub fn apply(&self, backend: &mut dyn Backend) {
        backend.set_state(self);
    }

    /// Stable hash of every pipeline-relevant field, used as part of the
    /// backend's pipeline cache key. Float fields hash by bit pattern.
    #[must_use]
    pub fn pipeline_key(&self) -> u64 {
        let mut h = FxHasher::default();
        self.blend.enabled.hash(&mut h);
        self.blend.src_rgb.hash(&mut h);
        self.blend.dst_rgb.hash(&mut h);
        self.blend.src_alpha.hash(&mut h);
        self.blend.dst_alpha.hash(&mut h);
        self.depth.test_enabled.hash(&mut h);
        self.depth.write_enabled.hash(&mut h);
        self.depth.compare.hash(&mut h);
        self.stencil.enabled.hash(&mut h);
        self.stencil.fail_op.hash(&mut h);
        self.stencil.depth_fail_op.hash(&mut h);
        self.stencil.pass_op.hash(&mut h);
        self.rasterizer.cull_mode.hash(&mut h);
        self.rasterizer.front_face_ccw.hash(&mut h);
        self.rasterizer.depth_bias_constant.to_bits().hash(&mut h);
        self.rasterizer.depth_bias_slope.to_bits().hash(&mut h);
        self.color_mask.as_wgpu().bits().hash(&mut h);
        h.finish()
    }

    /// Primitive-state fragment for wgpu pipeline creation.
    #[must_use]
    pub fn as_wgpu_primitive(&self, topology: wgpu::PrimitiveTopology) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            topology,
            front_face: if self.rasterizer.front_face_ccw {
                wgpu::FrontFace::Ccw
            } else {
                wgpu::FrontFace::Cw
            },
            cull_mode: self.rasterizer.cull_mode.as_wgpu(),
            ..Default::default()
        }
    }

    /// Depth-stencil fragment for wgpu pipeline creation, `None` when the
    /// target has no depth attachment.
    #[must_use]
    pub fn as_wgpu_depth_stencil(
        &self,
        format: Option<wgpu::TextureFormat>,
    ) -> Option<wgpu::DepthStencilState> {
        let format = format?;
        let stencil_face = if self.stencil.enabled {
            wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Always,
                fail_op: self.stencil.fail_op.as_wgpu(),
                depth_fail_op: self.stencil.depth_fail_op.as_wgpu(),
                pass_op: self.stencil.pass_op.as_wgpu(),
            }
        } else {
            wgpu::StencilFaceState::IGNORE
        };
        Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: Some(self.depth.write_enabled),
            depth_compare: Some(if self.depth.test_enabled {
                self.depth.compare.as_wgpu()
            } else {
                wgpu::CompareFunction::Always
            }),
            stencil: wgpu::StencilState {
                front: stencil_face,
                back: stencil_face,
                read_mask: self.stencil.mask,
                write_mask: self.stencil.mask,
            },
            bias: wgpu::DepthBiasState {
                constant: self.rasterizer.depth_bias_constant as i32,
                slope_scale: self.rasterizer.depth_bias_slope,
                clamp: 0.0,
            },
        })
    }
}
