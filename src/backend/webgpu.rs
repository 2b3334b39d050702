//! wgpu-based backend.
//!
//! One implementation serves all three tiers: the WebGPU tier runs with
//! standard limits and WGSL shaders; the WebGL 2 and baseline tiers run on
//! the same device constrained to downlevel limits, consuming GLSL through
//! wgpu's naga frontend. Tier selection happens once at creation with
//! silent fallback; callers observe the outcome only through
//! [`Backend::kind`].
//!
//! Every draw is recorded into its own encoder and submitted immediately.
//! A pending clear is folded into the next pass's load op (or flushed as an
//! empty pass at frame end), so `clear + draw` costs a single pass.

use std::borrow::Cow;

use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};
#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

use crate::bridge::quad::FULLSCREEN_WGSL;
use crate::bridge::vib3::{Vib3Uniforms, vib3_schema, vib3_uniform_type};
use crate::errors::{Result, Vib3Error};
use crate::registry::{RegisterOptions, ResourceKind, ResourceRegistry};
use crate::state::{CullMode, RenderState};

use super::shader::{ShaderError, ShaderProgram, ShaderStage};
use super::target::RenderTarget;
use super::texture::Texture2d;
use super::uniforms::{StageOutcome, UniformStore, UniformValue};
use super::vertex::{BufferDesc, BufferHandle, BufferUsage, IndexFormat, VertexArray};
use super::{Backend, BackendKind, ClearFlags, ClearRequest, Projection, RenderStats};

/// Maximum sampled textures a single draw can bind.
const MAX_TEXTURE_SLOTS: usize = 4;

/// Creation options for [`WgpuBackend`].
#[derive(Debug, Clone)]
pub struct WgpuBackendOptions {
    /// Try the WebGPU tier first; `false` starts at the WebGL 2 tier.
    pub prefer_webgpu: bool,
    pub power_preference: wgpu::PowerPreference,
    /// Budget for adapter/device acquisition. Once exceeded, remaining
    /// high tiers are skipped in favor of the fallback chain's tail.
    pub time_budget: Option<Duration>,
    pub debug: bool,
}

impl Default for WgpuBackendOptions {
    fn default() -> Self {
        Self {
            prefer_webgpu: true,
            power_preference: wgpu::PowerPreference::HighPerformance,
            time_budget: None,
            debug: false,
        }
    }
}

/// One compiled program: both stage modules plus per-program uniform
/// tracking state.
struct CompiledProgram {
    id: u64,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    vertex_entry: &'static str,
    fragment_entry: &'static str,
    /// Cleared when pipeline creation for this program fails; draws with an
    /// invalid program are dropped.
    valid: bool,
    store: UniformStore,
}

struct RealizedTexture {
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct RealizedTarget {
    color_views: Vec<wgpu::TextureView>,
    depth_view: Option<wgpu::TextureView>,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    width: u32,
    height: u32,
}

#[derive(Clone, Copy)]
enum DrawKind {
    Arrays {
        vertex_count: u32,
        first_vertex: u32,
        instances: u32,
    },
    Indexed {
        index_count: u32,
        first_index: u32,
        instances: u32,
    },
}

/// The wgpu execution backend. Owns the device, queue, surface, resource
/// registry and all lazily realized GPU objects.
pub struct WgpuBackend {
    kind: BackendKind,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,

    registry: ResourceRegistry,
    stats: RenderStats,

    // ---- Tracked state ----
    tracked_state: RenderState,
    state_initialized: bool,
    state_stack: Vec<(RenderState, (i32, i32, u32, u32), Option<(i32, i32, u32, u32)>)>,
    viewport: (i32, i32, u32, u32),
    scissor: Option<(i32, i32, u32, u32)>,

    // ---- Programs and uniforms ----
    programs: FxHashMap<String, CompiledProgram>,
    current_program: Option<String>,
    /// Staging store used while no program is bound.
    default_store: UniformStore,
    block: Vib3Uniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_layout: wgpu::BindGroupLayout,

    // ---- Textures ----
    textures: FxHashMap<u64, RealizedTexture>,
    bound_textures: [Option<u64>; MAX_TEXTURE_SLOTS],
    texture_layouts: FxHashMap<usize, wgpu::BindGroupLayout>,
    texture_bind_group: Option<wgpu::BindGroup>,
    textures_dirty: bool,

    // ---- Geometry ----
    buffers: FxHashMap<u64, wgpu::Buffer>,
    next_buffer_id: u64,
    vaos: FxHashMap<u64, VertexArray>,
    current_vao: Option<u64>,
    current_index: Option<(BufferHandle, IndexFormat)>,

    // ---- Targets ----
    targets: FxHashMap<u64, RealizedTarget>,
    current_target: Option<u64>,

    // ---- Pipelines ----
    pipelines: FxHashMap<u64, wgpu::RenderPipeline>,
    pipeline_layouts: FxHashMap<usize, wgpu::PipelineLayout>,

    // ---- Frame ----
    surface_texture: Option<wgpu::SurfaceTexture>,
    surface_view: Option<wgpu::TextureView>,
    pending_clear: Option<ClearRequest>,

    warned_missing_programs: FxHashSet<String>,
    warned_no_frame: bool,
}

impl WgpuBackend {
    /// Acquires a device with tiered fallback and configures the surface.
    pub async fn create(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        options: &WgpuBackendOptions,
    ) -> Result<Self> {
        let started = Instant::now();
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(target)
            .map_err(|e| Vib3Error::SurfaceCreateFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| {
                warn!("adapter request failed: {e}");
                Vib3Error::BackendUnavailable
            })?;

        let budget_left = |started: Instant| {
            options
                .time_budget
                .is_none_or(|budget| started.elapsed() < budget)
        };

        // A GL adapter can never provide the WebGPU tier, whatever the
        // caller preferred.
        let adapter_is_gl = adapter.get_info().backend == wgpu::Backend::Gl;

        let mut acquired: Option<(wgpu::Device, wgpu::Queue, BackendKind)> = None;
        if options.prefer_webgpu && !adapter_is_gl && budget_left(started) {
            match Self::request_device(&adapter, wgpu::Limits::default()).await {
                Ok((device, queue)) => acquired = Some((device, queue, BackendKind::WebGpu)),
                Err(e) => debug!("WebGPU tier unavailable ({e}); falling back"),
            }
        }
        if acquired.is_none() {
            let limits = wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
            match Self::request_device(&adapter, limits).await {
                Ok((device, queue)) => acquired = Some((device, queue, BackendKind::WebGl2)),
                Err(e) => debug!("WebGL2 tier unavailable ({e}); falling back"),
            }
        }
        if acquired.is_none() {
            let limits = wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits());
            match Self::request_device(&adapter, limits).await {
                Ok((device, queue)) => acquired = Some((device, queue, BackendKind::WebGl)),
                Err(e) => warn!("baseline tier unavailable: {e}"),
            }
        }
        let Some((device, queue, kind)) = acquired else {
            return Err(Vib3Error::BackendUnavailable);
        };

        let mut config = surface
            .get_default_config(&adapter, width.max(1), height.max(1))
            .ok_or_else(|| {
                Vib3Error::SurfaceCreateFailed("surface not supported by adapter".to_string())
            })?;
        config.present_mode = wgpu::PresentMode::AutoVsync;
        surface.configure(&device, &config);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("VIB3 Uniform Block"),
            size: std::mem::size_of::<Vib3Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("VIB3 Block Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("VIB3 Block Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let mut registry = ResourceRegistry::new();
        {
            let buffer = uniform_buffer.clone();
            registry.register(
                ResourceKind::Buffer,
                u64::MAX,
                move || buffer.destroy(),
                RegisterOptions::labeled(
                    std::mem::size_of::<Vib3Uniforms>() as u64,
                    "VIB3 Uniform Block",
                ),
            );
        }

        debug!("backend initialized on tier '{}'", kind.name());

        Ok(Self {
            kind,
            device,
            queue,
            surface,
            config,
            registry,
            stats: RenderStats::default(),
            tracked_state: RenderState::opaque(),
            state_initialized: false,
            state_stack: Vec::new(),
            viewport: (0, 0, width.max(1), height.max(1)),
            scissor: None,
            programs: FxHashMap::default(),
            current_program: None,
            default_store: UniformStore::new(),
            block: Vib3Uniforms::new(),
            uniform_buffer,
            uniform_bind_group,
            uniform_layout,
            textures: FxHashMap::default(),
            bound_textures: [None; MAX_TEXTURE_SLOTS],
            texture_layouts: FxHashMap::default(),
            texture_bind_group: None,
            textures_dirty: false,
            buffers: FxHashMap::default(),
            next_buffer_id: 1,
            vaos: FxHashMap::default(),
            current_vao: None,
            current_index: None,
            targets: FxHashMap::default(),
            current_target: None,
            pipelines: FxHashMap::default(),
            pipeline_layouts: FxHashMap::default(),
            surface_texture: None,
            surface_view: None,
            pending_clear: None,
            warned_missing_programs: FxHashSet::default(),
            warned_no_frame: false,
        })
    }

    async fn request_device(
        adapter: &wgpu::Adapter,
        limits: wgpu::Limits,
    ) -> std::result::Result<(wgpu::Device, wgpu::Queue), wgpu::RequestDeviceError> {
        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
    }

    /// Registry diagnostics access for the owning bridge.
    #[must_use]
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    // ========================================================================
    // Shader compilation
    // ========================================================================

    fn create_module_checked(
        &self,
        label: &str,
        source: wgpu::ShaderSource<'_>,
    ) -> std::result::Result<wgpu::ShaderModule, String> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source,
        });
        match pollster::block_on(scope.pop()) {
            Some(error) => Err(error.to_string()),
            None => Ok(module),
        }
    }

    fn compile_wgsl(&self, program: &ShaderProgram) -> std::result::Result<CompiledProgram, ShaderError> {
        let Some(fragment) = program.sources.wgsl_fragment.as_deref() else {
            return Err(ShaderError::Compile {
                stage: ShaderStage::Fragment,
                log: "WGSL fragment source required on the WebGPU tier".to_string(),
            });
        };
        let vertex = program.sources.wgsl_vertex.as_deref().unwrap_or(FULLSCREEN_WGSL);

        let vertex_module = self
            .create_module_checked(
                &format!("{} (vs)", program.name),
                wgpu::ShaderSource::Wgsl(Cow::Borrowed(vertex)),
            )
            .map_err(|log| ShaderError::Compile {
                stage: ShaderStage::Vertex,
                log,
            })?;
        let fragment_module = self
            .create_module_checked(
                &format!("{} (fs)", program.name),
                wgpu::ShaderSource::Wgsl(Cow::Borrowed(fragment)),
            )
            .map_err(|log| ShaderError::Compile {
                stage: ShaderStage::Fragment,
                log,
            })?;

        Ok(CompiledProgram {
            id: program.id(),
            vertex_module,
            fragment_module,
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            valid: true,
            store: UniformStore::new(),
        })
    }

    fn compile_glsl(&self, program: &ShaderProgram) -> std::result::Result<CompiledProgram, ShaderError> {
        let (Some(vertex), Some(fragment)) = (
            program.sources.glsl_vertex.as_deref(),
            program.sources.glsl_fragment.as_deref(),
        ) else {
            return Err(ShaderError::Link {
                log: "GLSL vertex and fragment sources required on the GL tiers".to_string(),
            });
        };

        let vertex_module = self
            .create_module_checked(
                &format!("{} (vs)", program.name),
                wgpu::ShaderSource::Glsl {
                    shader: Cow::Borrowed(vertex),
                    stage: wgpu::naga::ShaderStage::Vertex,
                    defines: Default::default(),
                },
            )
            .map_err(|log| ShaderError::Compile {
                stage: ShaderStage::Vertex,
                log,
            })?;
        let fragment_module = self
            .create_module_checked(
                &format!("{} (fs)", program.name),
                wgpu::ShaderSource::Glsl {
                    shader: Cow::Borrowed(fragment),
                    stage: wgpu::naga::ShaderStage::Fragment,
                    defines: Default::default(),
                },
            )
            .map_err(|log| ShaderError::Compile {
                stage: ShaderStage::Fragment,
                log,
            })?;

        Ok(CompiledProgram {
            id: program.id(),
            vertex_module,
            fragment_module,
            vertex_entry: "main",
            fragment_entry: "main",
            valid: true,
            store: UniformStore::new(),
        })
    }

    // ========================================================================
    // Lazy realization
    // ========================================================================

    fn realize_texture(&mut self, texture: &Texture2d) {
        if self.textures.contains_key(&texture.id()) {
            return;
        }
        let desc = &texture.desc;
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: texture.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.as_wgpu(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if let Some(error) = pollster::block_on(scope.pop()) {
            warn!("texture '{}' creation failed: {error}", texture.id());
            return;
        }

        if let Some(data) = &texture.data {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &gpu_texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(desc.width * desc.format.bytes_per_texel() as u32),
                    rows_per_image: Some(desc.height),
                },
                wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: texture.label.as_deref(),
            address_mode_u: desc.sampler.wrap_u.as_wgpu(),
            address_mode_v: desc.sampler.wrap_v.as_wgpu(),
            mag_filter: desc.sampler.mag_filter.as_wgpu(),
            min_filter: desc.sampler.min_filter.as_wgpu(),
            ..Default::default()
        });

        {
            let gpu_texture = gpu_texture.clone();
            self.registry.register(
                ResourceKind::Texture,
                texture.id(),
                move || gpu_texture.destroy(),
                RegisterOptions {
                    bytes: desc.byte_size(),
                    label: texture.label.clone(),
                },
            );
        }
        self.textures.insert(texture.id(), RealizedTexture { view, sampler });
    }

    fn realize_target(&mut self, target: &RenderTarget) {
        if self.targets.contains_key(&target.id()) {
            return;
        }
        let desc = &target.desc;
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut color_views = Vec::with_capacity(desc.color.len());
        let mut color_format = wgpu::TextureFormat::Rgba8Unorm;
        let mut bytes = 0u64;
        for (i, attachment) in desc.color.iter().enumerate() {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("target {} color {i}", target.id())),
                size: wgpu::Extent3d {
                    width: desc.width.max(1),
                    height: desc.height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: desc.samples.max(1),
                dimension: wgpu::TextureDimension::D2,
                format: attachment.format.as_wgpu(),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            if i == 0 {
                color_format = attachment.format.as_wgpu();
            }
            bytes += u64::from(desc.width) * u64::from(desc.height)
                * attachment.format.bytes_per_texel();
            color_views.push(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        }

        let (depth_view, depth_format) = match desc.depth {
            Some(format) => {
                let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&format!("target {} depth", target.id())),
                    size: wgpu::Extent3d {
                        width: desc.width.max(1),
                        height: desc.height.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: desc.samples.max(1),
                    dimension: wgpu::TextureDimension::D2,
                    format: format.as_wgpu(),
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                });
                bytes += u64::from(desc.width) * u64::from(desc.height)
                    * format.bytes_per_texel();
                (
                    Some(texture.create_view(&wgpu::TextureViewDescriptor::default())),
                    Some(format.as_wgpu()),
                )
            }
            None => (None, None),
        };

        if let Some(error) = pollster::block_on(scope.pop()) {
            // The wgpu error text carries the completeness status name.
            warn!("render target {} incomplete: {error}", target.id());
            return;
        }

        self.registry.register(
            ResourceKind::Framebuffer,
            target.id(),
            || {},
            RegisterOptions {
                bytes,
                label: target.label.clone(),
            },
        );
        self.targets.insert(
            target.id(),
            RealizedTarget {
                color_views,
                depth_view,
                color_format,
                depth_format,
                width: desc.width,
                height: desc.height,
            },
        );
    }

    // ========================================================================
    // Draw plumbing
    // ========================================================================

    fn current_color_format(&self) -> wgpu::TextureFormat {
        self.current_target
            .and_then(|id| self.targets.get(&id))
            .map_or(self.config.format, |t| t.color_format)
    }

    fn current_depth_format(&self) -> Option<wgpu::TextureFormat> {
        self.current_target
            .and_then(|id| self.targets.get(&id))
            .and_then(|t| t.depth_format)
    }

    fn bound_texture_count(&self) -> usize {
        self.bound_textures
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |i| i + 1)
    }

    fn ensure_texture_layout(&mut self, count: usize) {
        if count == 0 || self.texture_layouts.contains_key(&count) {
            return;
        }
        let mut entries = Vec::with_capacity(count * 2);
        for slot in 0..count {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: (slot * 2) as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: (slot * 2 + 1) as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Texture Slots Layout"),
                entries: &entries,
            });
        self.texture_layouts.insert(count, layout);
    }

    fn ensure_texture_bind_group(&mut self) {
        if !self.textures_dirty {
            return;
        }
        self.textures_dirty = false;
        let count = self.bound_texture_count();
        if count == 0 {
            self.texture_bind_group = None;
            return;
        }
        self.ensure_texture_layout(count);
        let layout = &self.texture_layouts[&count];

        let mut entries = Vec::with_capacity(count * 2);
        for slot in 0..count {
            let Some(realized) = self.bound_textures[slot]
                .and_then(|id| self.textures.get(&id))
            else {
                warn!("texture slot {slot} is empty; bind group skipped");
                self.texture_bind_group = None;
                return;
            };
            entries.push(wgpu::BindGroupEntry {
                binding: (slot * 2) as u32,
                resource: wgpu::BindingResource::TextureView(&realized.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: (slot * 2 + 1) as u32,
                resource: wgpu::BindingResource::Sampler(&realized.sampler),
            });
        }
        self.texture_bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texture Slots"),
            layout,
            entries: &entries,
        }));
    }

    fn ensure_pipeline_layout(&mut self, texture_count: usize) {
        if self.pipeline_layouts.contains_key(&texture_count) {
            return;
        }
        self.ensure_texture_layout(texture_count);
        let mut layouts: Vec<Option<&wgpu::BindGroupLayout>> = vec![Some(&self.uniform_layout)];
        if texture_count > 0 {
            layouts.push(Some(&self.texture_layouts[&texture_count]));
        }
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &layouts,
                immediate_size: 0,
            });
        self.pipeline_layouts.insert(texture_count, layout);
    }

    fn pipeline_key(&self, program_id: u64, texture_count: usize, has_vao: bool) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut h = rustc_hash::FxHasher::default();
        program_id.hash(&mut h);
        self.tracked_state.pipeline_key().hash(&mut h);
        self.current_color_format().hash(&mut h);
        self.current_depth_format().hash(&mut h);
        texture_count.hash(&mut h);
        has_vao.hash(&mut h);
        if has_vao {
            if let Some(vao) = self.current_vao.and_then(|id| self.vaos.get(&id)) {
                vao.buffers.hash(&mut h);
            }
        }
        h.finish()
    }

    fn ensure_pipeline(&mut self, program_name: &str, key: u64, texture_count: usize) -> bool {
        if self.pipelines.contains_key(&key) {
            return true;
        }
        self.ensure_pipeline_layout(texture_count);

        let Some(program) = self.programs.get(program_name) else {
            return false;
        };

        let current_vao = self.current_vao.and_then(|id| self.vaos.get(&id));
        let mut attribute_storage: Vec<Vec<wgpu::VertexAttribute>> = Vec::new();
        if let Some(vao) = current_vao {
            for buffer in &vao.buffers {
                attribute_storage.push(
                    buffer
                        .attributes
                        .iter()
                        .map(|a| wgpu::VertexAttribute {
                            format: a.format.as_wgpu(),
                            offset: u64::from(a.offset),
                            shader_location: a.location,
                        })
                        .collect(),
                );
            }
        }
        let mut vertex_layouts: Vec<wgpu::VertexBufferLayout<'_>> = Vec::new();
        if let Some(vao) = current_vao {
            for (buffer, attributes) in vao.buffers.iter().zip(&attribute_storage) {
                vertex_layouts.push(wgpu::VertexBufferLayout {
                    array_stride: u64::from(buffer.stride),
                    step_mode: if buffer.step_instance {
                        wgpu::VertexStepMode::Instance
                    } else {
                        wgpu::VertexStepMode::Vertex
                    },
                    attributes,
                });
            }
        }

        let blend = self.tracked_state.blend.as_wgpu();
        let color_target = Some(wgpu::ColorTargetState {
            format: self.current_color_format(),
            blend,
            write_mask: self.tracked_state.color_mask.as_wgpu(),
        });
        let depth_stencil = self
            .tracked_state
            .as_wgpu_depth_stencil(self.current_depth_format());
        let primitive = self
            .tracked_state
            .as_wgpu_primitive(wgpu::PrimitiveTopology::TriangleList);

        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program_name),
                layout: Some(&self.pipeline_layouts[&texture_count]),
                vertex: wgpu::VertexState {
                    module: &program.vertex_module,
                    entry_point: Some(program.vertex_entry),
                    buffers: &vertex_layouts,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment_module,
                    entry_point: Some(program.fragment_entry),
                    targets: &[color_target],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive,
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
        if let Some(error) = pollster::block_on(scope.pop()) {
            warn!("pipeline creation for '{program_name}' failed: {error}");
            if let Some(program) = self.programs.get_mut(program_name) {
                program.valid = false;
            }
            return false;
        }

        self.registry.register(
            ResourceKind::Pipeline,
            key,
            || {},
            RegisterOptions::labeled(0, program_name),
        );
        self.pipelines.insert(key, pipeline);
        true
    }

    /// Consumes the pending clear into the next pass's load ops.
    fn take_clear_load_ops(&mut self) -> (wgpu::LoadOp<wgpu::Color>, wgpu::LoadOp<f32>) {
        match self.pending_clear.take() {
            Some(request) => {
                let color = if request.flags.contains(ClearFlags::COLOR) {
                    wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(request.color[0]),
                        g: f64::from(request.color[1]),
                        b: f64::from(request.color[2]),
                        a: f64::from(request.color[3]),
                    })
                } else {
                    wgpu::LoadOp::Load
                };
                let depth = if request.flags.contains(ClearFlags::DEPTH) {
                    wgpu::LoadOp::Clear(request.depth)
                } else {
                    wgpu::LoadOp::Load
                };
                (color, depth)
            }
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        }
    }

    fn draw_internal(&mut self, kind: DrawKind) {
        if self.current_target.is_none() && self.surface_view.is_none() {
            if !self.warned_no_frame {
                warn!("draw issued outside begin_frame/end_frame; dropped");
                self.warned_no_frame = true;
            }
            return;
        }
        if self.tracked_state.rasterizer.cull_mode == CullMode::FrontAndBack {
            // Everything is culled; nothing to record.
            return;
        }
        let Some(program_name) = self.current_program.clone() else {
            return;
        };
        if !self.programs.get(&program_name).is_some_and(|p| p.valid) {
            return;
        }

        self.ensure_texture_bind_group();
        let texture_count = if self.texture_bind_group.is_some() {
            self.bound_texture_count()
        } else {
            0
        };
        let has_vao = self.current_vao.is_some();
        let key = self.pipeline_key(
            self.programs[&program_name].id,
            texture_count,
            has_vao,
        );
        if !self.ensure_pipeline(&program_name, key, texture_count) {
            return;
        }

        self.queue
            .write_buffer(&self.uniform_buffer, 0, self.block.as_bytes());
        self.stats.buffer_uploads += 1;

        let (target_view, depth_view) = match self.current_target.and_then(|id| self.targets.get(&id)) {
            Some(target) => (
                target.color_views[0].clone(),
                target.depth_view.clone(),
            ),
            None => (
                self.surface_view.clone().expect("frame view checked above"),
                None,
            ),
        };
        let (load, depth_load) = self.take_clear_load_ops();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vib3 draw"),
            });
        {
            let depth_attachment =
                depth_view
                    .as_ref()
                    .map(|view| wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: depth_load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    });
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("vib3 pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: depth_attachment,
                ..Default::default()
            });

            pass.set_pipeline(&self.pipelines[&key]);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            if let Some(texture_group) = &self.texture_bind_group {
                pass.set_bind_group(1, texture_group, &[]);
            }

            let (vx, vy, vw, vh) = self.viewport;
            if vw > 0 && vh > 0 {
                pass.set_viewport(vx as f32, vy as f32, vw as f32, vh as f32, 0.0, 1.0);
            }
            if let Some((sx, sy, sw, sh)) = self.scissor {
                pass.set_scissor_rect(sx.max(0) as u32, sy.max(0) as u32, sw, sh);
            }

            if let Some(vao) = self.current_vao.and_then(|id| self.vaos.get(&id)) {
                for (i, vb) in vao.buffers.iter().enumerate() {
                    if let Some(buffer) = self.buffers.get(&vb.buffer.id) {
                        pass.set_vertex_buffer(i as u32, buffer.slice(..));
                    }
                }
            }

            match kind {
                DrawKind::Arrays {
                    vertex_count,
                    first_vertex,
                    instances,
                } => {
                    pass.draw(first_vertex..first_vertex + vertex_count, 0..instances);
                    self.stats.triangles +=
                        u64::from(vertex_count / 3) * u64::from(instances);
                }
                DrawKind::Indexed {
                    index_count,
                    first_index,
                    instances,
                } => {
                    let index = self
                        .current_index
                        .or_else(|| {
                            self.current_vao
                                .and_then(|id| self.vaos.get(&id))
                                .and_then(|vao| vao.index)
                        });
                    let Some((handle, format)) = index else {
                        warn!("indexed draw without an index buffer; dropped");
                        return;
                    };
                    let Some(buffer) = self.buffers.get(&handle.id) else {
                        warn!("indexed draw with an unknown index buffer; dropped");
                        return;
                    };
                    pass.set_index_buffer(buffer.slice(..), format.as_wgpu());
                    pass.draw_indexed(first_index..first_index + index_count, 0, 0..instances);
                    self.stats.triangles +=
                        u64::from(index_count / 3) * u64::from(instances);
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.stats.draw_calls += 1;
    }

    /// Records a pass whose only effect is the pending clear.
    fn flush_pending_clear(&mut self) {
        if self.pending_clear.is_none() {
            return;
        }
        let Some(view) = self
            .current_target
            .and_then(|id| self.targets.get(&id))
            .map(|t| t.color_views[0].clone())
            .or_else(|| self.surface_view.clone())
        else {
            self.pending_clear = None;
            return;
        };
        let (load, _depth_load) = self.take_clear_load_ops();
        if matches!(load, wgpu::LoadOp::Load) {
            return;
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vib3 clear"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("vib3 clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl Backend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn begin_frame(&mut self) {
        self.registry.begin_frame();
        if self.surface_texture.is_some() {
            return;
        }
        match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture)
            | wgpu::CurrentSurfaceTexture::Suboptimal(texture) => {
                self.surface_view =
                    Some(texture.texture.create_view(&wgpu::TextureViewDescriptor::default()));
                self.surface_texture = Some(texture);
                self.warned_no_frame = false;
            }
            e => warn!("surface acquire failed: {e:?}"),
        }
    }

    fn end_frame(&mut self) {
        self.flush_pending_clear();
        self.surface_view = None;
        if let Some(texture) = self.surface_texture.take() {
            texture.present();
        }
        self.registry.end_frame();
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.viewport = (0, 0, width, height);
    }

    fn clear(&mut self, request: &ClearRequest) {
        self.pending_clear = Some(*request);
    }

    fn set_state(&mut self, state: &RenderState) {
        if self.state_initialized && self.tracked_state == *state {
            return;
        }
        self.tracked_state = state.clone();
        self.state_initialized = true;
        if state.viewport.width > 0 && state.viewport.height > 0 {
            self.viewport = (
                state.viewport.x,
                state.viewport.y,
                state.viewport.width,
                state.viewport.height,
            );
        }
        self.scissor = state.rasterizer.scissor_enabled.then(|| {
            let [x, y, w, h] = state.rasterizer.scissor;
            (x, y, w.max(0) as u32, h.max(0) as u32)
        });
        self.stats.state_changes += 1;
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = (x, y, width, height);
    }

    fn set_scissor(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.scissor = Some((x, y, width, height));
    }

    fn push_state(&mut self) {
        self.state_stack
            .push((self.tracked_state.clone(), self.viewport, self.scissor));
    }

    fn pop_state(&mut self) {
        if let Some((state, viewport, scissor)) = self.state_stack.pop() {
            self.set_state(&state);
            self.viewport = viewport;
            self.scissor = scissor;
        }
    }

    fn compile_shader(&mut self, program: &mut ShaderProgram) -> bool {
        program.clear_error();
        let compiled = if self.kind.is_gl() {
            self.compile_glsl(program)
        } else {
            self.compile_wgsl(program)
        };
        match compiled {
            Ok(compiled) => {
                program.set_reflection(
                    vib3_schema()
                        .into_iter()
                        .map(|(name, ty)| (name.to_string(), ty))
                        .collect(),
                );
                self.registry.register(
                    ResourceKind::Program,
                    program.id(),
                    || {},
                    RegisterOptions::labeled(0, program.name.clone()),
                );
                self.programs.insert(program.name.clone(), compiled);
                self.warned_missing_programs.remove(&program.name);
                true
            }
            Err(error) => {
                warn!("shader '{}': {error}", program.name);
                program.set_error(error);
                false
            }
        }
    }

    fn bind_shader(&mut self, name: &str) -> bool {
        if self.current_program.as_deref() == Some(name) {
            return true;
        }
        if self.programs.get(name).is_some_and(|p| p.valid) {
            self.current_program = Some(name.to_string());
            self.stats.shader_switches += 1;
            true
        } else {
            if self.warned_missing_programs.insert(name.to_string()) {
                warn!("bind_shader('{name}'): program unknown or broken; draws will be skipped");
            }
            false
        }
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        // Programs that consume the block share one reflection table.
        let declared = if self.current_program.is_some() {
            vib3_uniform_type(name)
        } else {
            None
        };
        let store = match self.current_program.as_deref() {
            Some(name) => match self.programs.get_mut(name) {
                Some(program) => &mut program.store,
                None => &mut self.default_store,
            },
            None => &mut self.default_store,
        };
        if store.stage(name, value, declared) == StageOutcome::Upload {
            self.block.set(name, value);
        }
    }

    fn set_rotor(&mut self, rotor: [f32; 8]) {
        self.block.set_rotor(rotor);
    }

    fn set_projection(&mut self, projection: &Projection) {
        self.block.set_projection(projection);
    }

    fn bind_texture(&mut self, texture: &Texture2d, slot: u32) {
        self.realize_texture(texture);
        self.bind_texture_id(texture.id(), slot);
    }

    fn bind_texture_id(&mut self, id: u64, slot: u32) {
        let slot = slot as usize;
        if slot >= MAX_TEXTURE_SLOTS {
            warn!("texture slot {slot} exceeds the {MAX_TEXTURE_SLOTS}-slot limit");
            return;
        }
        if !self.textures.contains_key(&id) {
            warn!("bind_texture_id({id}): texture was never realized");
            return;
        }
        if self.bound_textures[slot] != Some(id) {
            self.bound_textures[slot] = Some(id);
            self.textures_dirty = true;
            self.stats.texture_binds += 1;
        }
    }

    fn bind_vertex_array(&mut self, vao: &VertexArray) {
        if !self.vaos.contains_key(&vao.id()) {
            self.registry.register(
                ResourceKind::VertexArray,
                vao.id(),
                || {},
                RegisterOptions {
                    bytes: 0,
                    label: vao.label.clone(),
                },
            );
            self.vaos.insert(vao.id(), vao.clone());
        }
        self.bind_vertex_array_id(vao.id());
    }

    fn bind_vertex_array_id(&mut self, id: u64) {
        if !self.vaos.contains_key(&id) {
            warn!("bind_vertex_array_id({id}): vertex array was never realized");
            return;
        }
        self.current_vao = Some(id);
    }

    fn bind_index_buffer(&mut self, buffer: &BufferHandle, format: IndexFormat) {
        self.current_index = Some((*buffer, format));
    }

    fn bind_render_target(&mut self, target: Option<&RenderTarget>) {
        match target {
            Some(target) => {
                self.realize_target(target);
                self.bind_render_target_id(Some(target.id()));
            }
            None => self.bind_render_target_id(None),
        }
    }

    fn bind_render_target_id(&mut self, id: Option<u64>) {
        if let Some(id) = id
            && !self.targets.contains_key(&id)
        {
            warn!("bind_render_target_id({id}): target was never realized");
            return;
        }
        if self.current_target != id {
            // A pending clear belongs to the previous target; flush it there.
            self.flush_pending_clear();
        }
        self.current_target = id;
        if let Some(target) = id.and_then(|id| self.targets.get(&id)) {
            self.viewport = (0, 0, target.width, target.height);
        }
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) {
        self.draw_internal(DrawKind::Arrays {
            vertex_count,
            first_vertex,
            instances: 1,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) {
        self.draw_internal(DrawKind::Indexed {
            index_count,
            first_index,
            instances: 1,
        });
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32) {
        self.draw_internal(DrawKind::Arrays {
            vertex_count,
            first_vertex: 0,
            instances: instance_count,
        });
    }

    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32) {
        self.draw_internal(DrawKind::Indexed {
            index_count,
            first_index: 0,
            instances: instance_count,
        });
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferHandle {
        let usage = desc.usage.unwrap_or(BufferUsage::Vertex);
        let size = desc
            .data
            .as_ref()
            .map_or(desc.size.unwrap_or(0), |d| d.len() as u64)
            .max(4);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size,
            usage: usage.as_wgpu(),
            mapped_at_creation: false,
        });
        if let Some(data) = &desc.data {
            self.queue.write_buffer(&buffer, 0, data);
            self.stats.buffer_uploads += 1;
        }

        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        {
            let buffer = buffer.clone();
            self.registry.register(
                ResourceKind::Buffer,
                id,
                move || buffer.destroy(),
                RegisterOptions {
                    bytes: size,
                    label: desc.label.clone(),
                },
            );
        }
        self.buffers.insert(id, buffer);

        BufferHandle { id, usage, size }
    }

    fn update_buffer(&mut self, buffer: &BufferHandle, data: &[u8], offset: u64) {
        let Some(gpu_buffer) = self.buffers.get(&buffer.id) else {
            warn!("update_buffer({}) on an unknown buffer", buffer.id);
            return;
        };
        self.queue.write_buffer(gpu_buffer, offset, data);
        self.stats.buffer_uploads += 1;
    }

    fn delete_buffer(&mut self, buffer: &BufferHandle) {
        if self.buffers.remove(&buffer.id).is_some() {
            self.registry.dispose(ResourceKind::Buffer, buffer.id);
        }
    }

    fn stats(&self) -> RenderStats {
        self.stats
    }

    fn reset_stats(&mut self) {
        self.stats = RenderStats::default();
    }

    fn dispose(&mut self) {
        self.pipelines.clear();
        self.pipeline_layouts.clear();
        self.programs.clear();
        self.texture_bind_group = None;
        self.textures.clear();
        self.vaos.clear();
        self.targets.clear();
        self.buffers.clear();
        self.registry.dispose_all();
    }
}
