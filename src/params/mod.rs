//! Parameter Model
//!
//! The ordered record of named scalar channels that drives every layer.
//! Field order is a contract with the packed shader uniform block
//! ([`crate::bridge::Vib3Uniforms`]); reordering is not permitted.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// The closed set of procedural 4D lattice geometries.
///
/// Shipped to shaders as its index in slot `u_geometry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeometryType {
    #[default]
    Tesseract,
    Hypersphere,
    Hypertetra,
    Torus4d,
    KleinBottle,
    Fractal,
    Wave,
    Crystal,
}

impl GeometryType {
    pub const ALL: [GeometryType; 8] = [
        GeometryType::Tesseract,
        GeometryType::Hypersphere,
        GeometryType::Hypertetra,
        GeometryType::Torus4d,
        GeometryType::KleinBottle,
        GeometryType::Fractal,
        GeometryType::Wave,
        GeometryType::Crystal,
    ];

    #[must_use]
    pub fn index(self) -> u32 {
        Self::ALL.iter().position(|g| *g == self).unwrap_or(0) as u32
    }

    #[must_use]
    pub fn from_index(index: u32) -> Self {
        Self::ALL.get(index as usize).copied().unwrap_or_default()
    }
}

/// Identity of one scalar parameter channel.
///
/// Used by relationship configs (`symmetry`, `complement`) to name the
/// channel they operate on, and by the smoothing layer to look up per-channel
/// time constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Hue,
    Saturation,
    Intensity,
    Chaos,
    Speed,
    Dimension,
    MorphFactor,
    GridDensity,
    Rot4dXy,
    Rot4dXz,
    Rot4dYz,
    Rot4dXw,
    Rot4dYw,
    Rot4dZw,
    MouseIntensity,
    ClickIntensity,
    Bass,
    Mid,
    High,
}

impl Channel {
    /// Every scalar channel, in the declaration order of [`VisualParams`].
    pub const ALL: [Channel; 19] = [
        Channel::Hue,
        Channel::Saturation,
        Channel::Intensity,
        Channel::Chaos,
        Channel::Speed,
        Channel::Dimension,
        Channel::MorphFactor,
        Channel::GridDensity,
        Channel::Rot4dXy,
        Channel::Rot4dXz,
        Channel::Rot4dYz,
        Channel::Rot4dXw,
        Channel::Rot4dYw,
        Channel::Rot4dZw,
        Channel::MouseIntensity,
        Channel::ClickIntensity,
        Channel::Bass,
        Channel::Mid,
        Channel::High,
    ];

    /// Legal value range. Hue additionally wraps rather than clamps.
    #[must_use]
    pub fn range(self) -> (f32, f32) {
        match self {
            Channel::Hue => (0.0, 360.0),
            Channel::Speed => (0.1, 3.0),
            Channel::Dimension => (3.0, 4.5),
            Channel::MorphFactor => (0.0, 2.0),
            Channel::GridDensity => (0.6, 7.5),
            Channel::Rot4dXy
            | Channel::Rot4dXz
            | Channel::Rot4dYz
            | Channel::Rot4dXw
            | Channel::Rot4dYw
            | Channel::Rot4dZw => (-std::f32::consts::TAU, std::f32::consts::TAU),
            _ => (0.0, 1.0),
        }
    }

    /// Midpoint of the legal range; the default mirror center for
    /// `complement` couplings.
    #[must_use]
    pub fn midpoint(self) -> f32 {
        let (lo, hi) = self.range();
        (lo + hi) * 0.5
    }

    /// True for the angular channel that wraps modulo 360 instead of clamping.
    #[must_use]
    pub fn wraps(self) -> bool {
        matches!(self, Channel::Hue)
    }

    /// Clamps (or wraps) `value` into the channel's legal range.
    #[must_use]
    pub fn clamp(self, value: f32) -> f32 {
        if self.wraps() {
            value.rem_euclid(360.0)
        } else {
            let (lo, hi) = self.range();
            value.clamp(lo, hi)
        }
    }

    /// Reads this channel out of a parameter record.
    #[must_use]
    pub fn get(self, params: &VisualParams) -> f32 {
        match self {
            Channel::Hue => params.hue,
            Channel::Saturation => params.saturation,
            Channel::Intensity => params.intensity,
            Channel::Chaos => params.chaos,
            Channel::Speed => params.speed,
            Channel::Dimension => params.dimension,
            Channel::MorphFactor => params.morph_factor,
            Channel::GridDensity => params.grid_density,
            Channel::Rot4dXy => params.rot4d_xy,
            Channel::Rot4dXz => params.rot4d_xz,
            Channel::Rot4dYz => params.rot4d_yz,
            Channel::Rot4dXw => params.rot4d_xw,
            Channel::Rot4dYw => params.rot4d_yw,
            Channel::Rot4dZw => params.rot4d_zw,
            Channel::MouseIntensity => params.mouse_intensity,
            Channel::ClickIntensity => params.click_intensity,
            Channel::Bass => params.bass,
            Channel::Mid => params.mid,
            Channel::High => params.high,
        }
    }

    /// Writes this channel into a parameter record.
    pub fn set(self, params: &mut VisualParams, value: f32) {
        match self {
            Channel::Hue => params.hue = value,
            Channel::Saturation => params.saturation = value,
            Channel::Intensity => params.intensity = value,
            Channel::Chaos => params.chaos = value,
            Channel::Speed => params.speed = value,
            Channel::Dimension => params.dimension = value,
            Channel::MorphFactor => params.morph_factor = value,
            Channel::GridDensity => params.grid_density = value,
            Channel::Rot4dXy => params.rot4d_xy = value,
            Channel::Rot4dXz => params.rot4d_xz = value,
            Channel::Rot4dYz => params.rot4d_yz = value,
            Channel::Rot4dXw => params.rot4d_xw = value,
            Channel::Rot4dYw => params.rot4d_yw = value,
            Channel::Rot4dZw => params.rot4d_zw = value,
            Channel::MouseIntensity => params.mouse_intensity = value,
            Channel::ClickIntensity => params.click_intensity = value,
            Channel::Bass => params.bass = value,
            Channel::Mid => params.mid = value,
            Channel::High => params.high = value,
        }
    }
}

/// One complete parameter record: the keystone input and the per-layer
/// resolved output share this shape.
///
/// Declaration order matches the packed uniform block slot order and must
/// not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualParams {
    /// Base hue in degrees, wraps modulo 360.
    pub hue: f32,
    pub saturation: f32,
    pub intensity: f32,
    pub chaos: f32,
    pub speed: f32,
    /// 4D projection dimension blend, 3.0 (pure 3D) .. 4.5.
    pub dimension: f32,
    pub morph_factor: f32,
    pub grid_density: f32,
    pub geometry_type: GeometryType,
    // Six 4D rotation plane angles, radians.
    pub rot4d_xy: f32,
    pub rot4d_xz: f32,
    pub rot4d_yz: f32,
    pub rot4d_xw: f32,
    pub rot4d_yw: f32,
    pub rot4d_zw: f32,
    // Interaction scalars, fed in from outside the core.
    pub mouse_intensity: f32,
    pub click_intensity: f32,
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    // Per-layer output channels. The keystone carries their defaults.
    pub layer_opacity: f32,
    pub layer_scale: f32,
    pub density_mult: f32,
    pub speed_mult: f32,
    pub layer_color: [f32; 3],
}

impl Default for VisualParams {
    fn default() -> Self {
        Self {
            hue: 200.0,
            saturation: 0.8,
            intensity: 0.5,
            chaos: 0.2,
            speed: 1.0,
            dimension: 3.8,
            morph_factor: 1.0,
            grid_density: 3.0,
            geometry_type: GeometryType::Tesseract,
            rot4d_xy: 0.0,
            rot4d_xz: 0.0,
            rot4d_yz: 0.0,
            rot4d_xw: 0.0,
            rot4d_yw: 0.0,
            rot4d_zw: 0.0,
            mouse_intensity: 0.0,
            click_intensity: 0.0,
            bass: 0.0,
            mid: 0.0,
            high: 0.0,
            layer_opacity: 1.0,
            layer_scale: 1.0,
            density_mult: 1.0,
            speed_mult: 1.0,
            layer_color: [1.0, 1.0, 1.0],
        }
    }
}

impl VisualParams {
    /// Magnitude of the W-plane rotation vector `(xw, yw, zw)`.
    #[must_use]
    pub fn rot4d_w_magnitude(&self) -> f32 {
        (self.rot4d_xw * self.rot4d_xw
            + self.rot4d_yw * self.rot4d_yw
            + self.rot4d_zw * self.rot4d_zw)
            .sqrt()
    }
}

/// Read-only view of a parameter source.
///
/// The accent system and the orchestrator borrow their inputs through this
/// interface; they never own or mutate the host's parameters.
pub trait ParamSource {
    fn snapshot(&self) -> VisualParams;
}

impl ParamSource for VisualParams {
    fn snapshot(&self) -> VisualParams {
        self.clone()
    }
}

/// Process-wide parameter context shared between the host UI and the core.
///
/// Replaces the source's window-global mutable state: one lock-guarded
/// parameter record plus a single atomic flag for interaction capture.
pub struct ParamContext {
    inner: RwLock<VisualParams>,
    interactions_enabled: AtomicBool,
}

impl Default for ParamContext {
    fn default() -> Self {
        Self::new(VisualParams::default())
    }
}

impl ParamContext {
    #[must_use]
    pub fn new(params: VisualParams) -> Self {
        Self {
            inner: RwLock::new(params),
            interactions_enabled: AtomicBool::new(true),
        }
    }

    /// Replaces the whole record.
    pub fn set(&self, params: VisualParams) {
        *self.inner.write() = params;
    }

    /// Mutates the record in place.
    pub fn update(&self, f: impl FnOnce(&mut VisualParams)) {
        f(&mut self.inner.write());
    }

    #[must_use]
    pub fn interactions_enabled(&self) -> bool {
        self.interactions_enabled.load(Ordering::Relaxed)
    }

    pub fn set_interactions_enabled(&self, enabled: bool) {
        self.interactions_enabled.store(enabled, Ordering::Relaxed);
    }
}

impl ParamSource for ParamContext {
    fn snapshot(&self) -> VisualParams {
        self.inner.read().clone()
    }
}
