//! The packed VIB3 uniform block.
//!
//! Every procedural shader receives the same 256-byte block: 64 little-endian
//! `f32` slots bound as a single uniform buffer. The slot assignments for
//! slots 0..=31 are a wire contract shared with the shader sources and must
//! not be re-ordered. Slots 32..=44 carry the rotor and projection extension
//! values inside the padding region; 45..=63 stay zero.

use bytemuck::{Pod, Zeroable};

use crate::backend::uniforms::{UniformType, UniformValue};
use crate::params::VisualParams;

/// Total `f32` slots in the block (256 bytes).
pub const VIB3_SLOT_COUNT: usize = 64;

/// First slot of the 8-float geometric-algebra rotor.
pub const VIB3_ROTOR_BASE: usize = 32;

/// First slot of the projection record:
/// kind (0 = perspective, 1 = stereographic), dimension, fov, near, far.
pub const VIB3_PROJECTION_BASE: usize = 40;

/// Slot index of a scalar uniform name, `None` for names outside the block.
#[must_use]
pub fn scalar_slot(name: &str) -> Option<usize> {
    let slot = match name {
        "u_time" => 0,
        "u_geometry" => 4,
        "u_rot4dXY" => 5,
        "u_rot4dXZ" => 6,
        "u_rot4dYZ" => 7,
        "u_rot4dXW" => 8,
        "u_rot4dYW" => 9,
        "u_rot4dZW" => 10,
        "u_dimension" => 11,
        "u_gridDensity" => 12,
        "u_morphFactor" => 13,
        "u_chaos" => 14,
        "u_speed" => 15,
        "u_hue" => 16,
        "u_intensity" => 17,
        "u_saturation" => 18,
        "u_mouseIntensity" => 19,
        "u_clickIntensity" => 20,
        "u_bass" => 21,
        "u_mid" => 22,
        "u_high" => 23,
        "u_layerScale" => 24,
        "u_layerOpacity" => 25,
        "u_densityMult" => 30,
        "u_speedMult" => 31,
        _ => return None,
    };
    Some(slot)
}

/// Declared type of one block uniform, `None` for names outside the block.
#[must_use]
pub fn vib3_uniform_type(name: &str) -> Option<UniformType> {
    if scalar_slot(name).is_some() {
        return Some(UniformType::Float);
    }
    match name {
        "u_resolution" => Some(UniformType::Vec2),
        "u_layerColor" => Some(UniformType::Vec3),
        _ => None,
    }
}

/// The uniform schema of the block: every addressable name with its type.
/// Backends use this as the reflection table for programs that consume the
/// block.
#[must_use]
pub fn vib3_schema() -> Vec<(&'static str, UniformType)> {
    let mut schema: Vec<(&'static str, UniformType)> = [
        "u_time",
        "u_geometry",
        "u_rot4dXY",
        "u_rot4dXZ",
        "u_rot4dYZ",
        "u_rot4dXW",
        "u_rot4dYW",
        "u_rot4dZW",
        "u_dimension",
        "u_gridDensity",
        "u_morphFactor",
        "u_chaos",
        "u_speed",
        "u_hue",
        "u_intensity",
        "u_saturation",
        "u_mouseIntensity",
        "u_clickIntensity",
        "u_bass",
        "u_mid",
        "u_high",
        "u_layerScale",
        "u_layerOpacity",
        "u_densityMult",
        "u_speedMult",
    ]
    .into_iter()
    .map(|name| (name, UniformType::Float))
    .collect();
    schema.push(("u_resolution", UniformType::Vec2));
    schema.push(("u_layerColor", UniformType::Vec3));
    schema
}

/// The block itself. `Pod`, so `bytemuck::bytes_of` yields exactly the
/// 256 bytes the GPU sees.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vib3Uniforms {
    slots: [f32; VIB3_SLOT_COUNT],
}

impl Default for Vib3Uniforms {
    fn default() -> Self {
        Self {
            slots: [0.0; VIB3_SLOT_COUNT],
        }
    }
}

impl Vib3Uniforms {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Packs a resolved parameter record plus the frame scalars.
    #[must_use]
    pub fn from_params(params: &VisualParams, time_s: f32, resolution: (f32, f32)) -> Self {
        let mut block = Self::default();
        block.set_time(time_s);
        block.set_resolution(resolution.0, resolution.1);
        block.apply_params(params);
        block
    }

    pub fn set_time(&mut self, time_s: f32) {
        self.slots[0] = time_s;
    }

    pub fn set_resolution(&mut self, width: f32, height: f32) {
        self.slots[2] = width;
        self.slots[3] = height;
    }

    /// Writes every parameter channel into its contract slot.
    pub fn apply_params(&mut self, params: &VisualParams) {
        self.slots[4] = params.geometry_type.index() as f32;
        self.slots[5] = params.rot4d_xy;
        self.slots[6] = params.rot4d_xz;
        self.slots[7] = params.rot4d_yz;
        self.slots[8] = params.rot4d_xw;
        self.slots[9] = params.rot4d_yw;
        self.slots[10] = params.rot4d_zw;
        self.slots[11] = params.dimension;
        self.slots[12] = params.grid_density;
        self.slots[13] = params.morph_factor;
        self.slots[14] = params.chaos;
        self.slots[15] = params.speed;
        self.slots[16] = params.hue;
        self.slots[17] = params.intensity;
        self.slots[18] = params.saturation;
        self.slots[19] = params.mouse_intensity;
        self.slots[20] = params.click_intensity;
        self.slots[21] = params.bass;
        self.slots[22] = params.mid;
        self.slots[23] = params.high;
        self.slots[24] = params.layer_scale;
        self.slots[25] = params.layer_opacity;
        self.slots[27] = params.layer_color[0];
        self.slots[28] = params.layer_color[1];
        self.slots[29] = params.layer_color[2];
        self.slots[30] = params.density_mult;
        self.slots[31] = params.speed_mult;
    }

    /// Applies one named uniform. Returns `false` for names outside the
    /// block or values whose shape does not fit the slot.
    pub fn set(&mut self, name: &str, value: &UniformValue) -> bool {
        if let Some(slot) = scalar_slot(name) {
            if let Some(v) = value.as_f32() {
                self.slots[slot] = v;
                return true;
            }
            return false;
        }
        match (name, value) {
            ("u_resolution", UniformValue::Vec2(v)) => {
                self.slots[2] = v.x;
                self.slots[3] = v.y;
                true
            }
            ("u_layerColor", UniformValue::Vec3(v)) => {
                self.slots[27] = v.x;
                self.slots[28] = v.y;
                self.slots[29] = v.z;
                true
            }
            _ => false,
        }
    }

    pub fn set_rotor(&mut self, rotor: [f32; 8]) {
        self.slots[VIB3_ROTOR_BASE..VIB3_ROTOR_BASE + 8].copy_from_slice(&rotor);
    }

    pub fn set_projection(&mut self, projection: &crate::backend::Projection) {
        use crate::backend::ProjectionKind;
        let base = VIB3_PROJECTION_BASE;
        self.slots[base] = match projection.kind {
            ProjectionKind::Perspective => 0.0,
            ProjectionKind::Stereographic => 1.0,
        };
        self.slots[base + 1] = projection.dimension;
        self.slots[base + 2] = projection.fov.unwrap_or(60.0);
        self.slots[base + 3] = projection.near.unwrap_or(0.1);
        self.slots[base + 4] = projection.far.unwrap_or(100.0);
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> f32 {
        self.slots[index]
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
