//! Multi-canvas orchestrator.
//!
//! Owns up to five bridges keyed by layer, plus the relationship graph that
//! derives every follower layer's parameters from the keystone each frame.
//! Layers render strictly in z-stack order, back to front; per-layer
//! uniform overrides win over both graph output and shared parameters.

use log::warn;
use rustc_hash::FxHashMap;

use crate::backend::UniformValue;
use crate::errors::Result;
use crate::layers::{Layer, LayerGraph};
use crate::params::VisualParams;

use super::{BridgeOptions, RenderBridge, RenderOptions};

/// The deprecated per-layer multiplier table, used when no graph is
/// installed: (opacity, density multiplier) per layer.
pub const LEGACY_LAYER_TABLE: [(Layer, f32, f32); 5] = [
    (Layer::Background, 0.2, 0.4),
    (Layer::Shadow, 0.4, 0.8),
    (Layer::Content, 0.8, 1.0),
    (Layer::Highlight, 0.6, 1.5),
    (Layer::Accent, 0.3, 2.5),
];

/// Per-`render_all` options.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameOptions {
    /// Frame time in milliseconds; without it the internal counter
    /// advances by one 16 ms step.
    pub time_ms: Option<f64>,
    pub clear_color: Option<[f32; 4]>,
}

/// Resolves one layer's parameters: graph output when a graph exists,
/// otherwise the legacy multiplier fallback.
#[must_use]
pub fn resolve_layer_params(
    graph: Option<&mut LayerGraph>,
    shared: &VisualParams,
    layer: Layer,
    frame_time_ms: f64,
) -> VisualParams {
    match graph {
        Some(graph) => graph.resolve(shared, layer, frame_time_ms),
        None => {
            let (_, opacity, density_mult) = LEGACY_LAYER_TABLE
                .iter()
                .copied()
                .find(|(l, _, _)| *l == layer)
                .expect("every layer has a legacy row");
            let mut params = shared.clone();
            params.layer_opacity = opacity;
            params.density_mult = density_mult;
            params
        }
    }
}

/// Resolves the whole stack in z order. Keystone parameters are read once,
/// so mid-iteration changes cannot affect already-resolved layers.
#[must_use]
pub fn resolve_stack(
    graph: Option<&mut LayerGraph>,
    shared: &VisualParams,
    frame_time_ms: f64,
) -> Vec<(Layer, VisualParams)> {
    let mut graph = graph;
    Layer::Z_ORDER
        .iter()
        .map(|&layer| {
            (
                layer,
                resolve_layer_params(graph.as_deref_mut(), shared, layer, frame_time_ms),
            )
        })
        .collect()
}

/// The five-layer stack facade.
pub struct MultiCanvasStack {
    bridges: FxHashMap<Layer, RenderBridge>,
    graph: Option<LayerGraph>,
    shared: VisualParams,
    overrides: FxHashMap<Layer, Vec<(String, UniformValue)>>,
    frame_time_ms: f64,
    initialized: bool,
}

impl MultiCanvasStack {
    /// Initializes one bridge per supplied surface. Initialization succeeds
    /// partially: a layer whose bridge fails is logged and skipped, and the
    /// stack counts as initialized if at least one layer lives.
    pub async fn initialize(
        surfaces: Vec<(Layer, wgpu::SurfaceTarget<'static>, u32, u32)>,
        options: &BridgeOptions,
        profile: Option<&str>,
    ) -> Result<Self> {
        let mut bridges = FxHashMap::default();
        for (layer, target, width, height) in surfaces {
            match RenderBridge::create(target, width, height, options).await {
                Ok(bridge) => {
                    bridges.insert(layer, bridge);
                }
                Err(e) => warn!("layer '{layer}' failed to initialize: {e}"),
            }
        }

        let graph = match profile {
            Some(name) => Some(LayerGraph::from_profile(name)?),
            None => None,
        };

        let initialized = !bridges.is_empty();
        Ok(Self {
            bridges,
            graph,
            shared: VisualParams::default(),
            overrides: FxHashMap::default(),
            frame_time_ms: 0.0,
            initialized,
        })
    }

    /// A stack with no bridges, usable for headless graph work.
    #[must_use]
    pub fn headless(graph: Option<LayerGraph>) -> Self {
        Self {
            bridges: FxHashMap::default(),
            graph,
            shared: VisualParams::default(),
            overrides: FxHashMap::default(),
            frame_time_ms: 0.0,
            initialized: false,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.bridges.len()
    }

    #[must_use]
    pub fn bridge(&self, layer: Layer) -> Option<&RenderBridge> {
        self.bridges.get(&layer)
    }

    pub fn bridge_mut(&mut self, layer: Layer) -> Option<&mut RenderBridge> {
        self.bridges.get_mut(&layer)
    }

    // ========================================================================
    // Graph access
    // ========================================================================

    #[must_use]
    pub fn graph(&self) -> Option<&LayerGraph> {
        self.graph.as_ref()
    }

    pub fn graph_mut(&mut self) -> Option<&mut LayerGraph> {
        self.graph.as_mut()
    }

    /// Installs (or removes) the relationship graph.
    pub fn set_graph(&mut self, graph: Option<LayerGraph>) {
        self.graph = graph;
    }

    // ========================================================================
    // Shaders and parameters
    // ========================================================================

    /// Compiles the same shader on every live bridge; returns how many
    /// layers accepted it.
    pub fn compile_shader_all(
        &mut self,
        name: &str,
        sources: &crate::backend::ShaderSources,
    ) -> usize {
        let mut accepted = 0;
        for bridge in self.bridges.values_mut() {
            if bridge.compile_shader(name, sources.clone()) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Sets the keystone parameter record driving the whole stack.
    pub fn set_keystone_params(&mut self, params: VisualParams) {
        self.shared = params;
    }

    /// Alias for [`MultiCanvasStack::set_keystone_params`].
    pub fn set_shared_params(&mut self, params: VisualParams) {
        self.set_keystone_params(params);
    }

    #[must_use]
    pub fn keystone_params(&self) -> &VisualParams {
        &self.shared
    }

    /// Per-layer uniform overrides; these win over graph output and shared
    /// parameters.
    pub fn set_layer_uniforms(
        &mut self,
        layer: Layer,
        uniforms: impl IntoIterator<Item = (String, UniformValue)>,
    ) {
        self.overrides.entry(layer).or_default().extend(uniforms);
    }

    pub fn clear_layer_uniforms(&mut self, layer: Layer) {
        self.overrides.remove(&layer);
    }

    // ========================================================================
    // Frame loop
    // ========================================================================

    /// Renders every live layer once, in z order. Returns how many layers
    /// drew successfully.
    pub fn render_all(&mut self, default_shader: &str, options: &FrameOptions) -> usize {
        self.frame_time_ms = options.time_ms.unwrap_or(self.frame_time_ms + 16.0);
        let frame_time = self.frame_time_ms;

        let resolved = resolve_stack(self.graph.as_mut(), &self.shared, frame_time);

        let mut drew = 0;
        for (layer, params) in resolved {
            let Some(bridge) = self.bridges.get_mut(&layer) else {
                continue;
            };
            let shader = self
                .graph
                .as_ref()
                .and_then(|graph| graph.layer_shader(layer))
                .unwrap_or(default_shader)
                .to_string();

            bridge.set_params(&params);
            if let Some(overrides) = self.overrides.get(&layer) {
                bridge.set_uniforms(overrides.iter().cloned());
            }
            let render_options = RenderOptions {
                clear: true,
                clear_color: options.clear_color.unwrap_or([0.0, 0.0, 0.0, 0.0]),
                time: Some((frame_time / 1000.0) as f32),
            };
            if bridge.render(&shader, &render_options) {
                drew += 1;
            }
        }
        drew
    }

    #[must_use]
    pub fn frame_time_ms(&self) -> f64 {
        self.frame_time_ms
    }

    /// Resizes every live bridge.
    pub fn resize_all(&mut self, width: u32, height: u32, pixel_ratio: f32) {
        for bridge in self.bridges.values_mut() {
            bridge.resize(width, height, pixel_ratio);
        }
    }

    /// Disposes every bridge and drops the graph.
    pub fn dispose(&mut self) {
        for bridge in self.bridges.values_mut() {
            bridge.dispose();
        }
        self.bridges.clear();
        self.graph = None;
        self.initialized = false;
    }
}
