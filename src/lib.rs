#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod accent;
pub mod backend;
pub mod bridge;
pub mod command;
pub mod errors;
pub mod layers;
pub mod params;
pub mod registry;
pub mod state;
pub mod utils;

pub use accent::{AccentSystem, AccentVar};
pub use backend::{
    Backend, BackendKind, ClearFlags, ClearRequest, RenderStats, ShaderProgram, ShaderSources,
    UniformType, UniformValue, WgpuBackend, WgpuBackendOptions,
};
pub use bridge::{
    BridgeOptions, FrameOptions, MultiCanvasStack, RenderBridge, RenderOptions, Vib3Uniforms,
};
pub use command::{Command, CommandBuffer, CommandBufferPool, SortMode};
pub use errors::{Result, Vib3Error};
pub use layers::{Layer, LayerGraph, LayerPresetManager, Relationship};
pub use params::{Channel, GeometryType, ParamContext, ParamSource, VisualParams};
pub use registry::{ResourceKind, ResourceRegistry};
pub use state::RenderState;
