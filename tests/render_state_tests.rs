//! Render State Tests
//!
//! Tests for:
//! - Preset constructors: opaque, transparent, additive, wireframe,
//!   geometry4d, transparent4d
//! - Value equality driving state-change elision
//! - Pipeline-key stability across clones and sensitivity to field changes
//! - wgpu conversion fragments

mod common;

use common::RecordingBackend;
use vib3::backend::Backend;
use vib3::state::{
    BlendFactor, BlendMode, ColorMask, CompareFunction, CullMode, RenderState,
};

// ============================================================================
// Preset Tests
// ============================================================================

#[test]
fn opaque_preset_has_no_blending() {
    let state = RenderState::opaque();
    assert!(!state.blend.enabled);
    assert!(state.depth.test_enabled);
    assert!(state.depth.write_enabled);
}

#[test]
fn transparent_preset_blends_without_depth_write() {
    let state = RenderState::transparent();
    assert!(state.blend.enabled);
    assert_eq!(state.blend.src_rgb, BlendFactor::SrcAlpha);
    assert_eq!(state.blend.dst_rgb, BlendFactor::OneMinusSrcAlpha);
    assert!(state.depth.test_enabled);
    assert!(!state.depth.write_enabled);
}

#[test]
fn additive_preset_accumulates() {
    let state = RenderState::additive();
    assert!(state.blend.enabled);
    assert_eq!(state.blend.dst_rgb, BlendFactor::One);
    assert!(!state.depth.write_enabled);
}

#[test]
fn geometry4d_presets_keep_culling_off() {
    // Projected 4D cells invert winding under W rotation, so culling must
    // stay disabled on both 4D presets.
    assert_eq!(RenderState::geometry4d().rasterizer.cull_mode, CullMode::None);
    assert_eq!(
        RenderState::transparent4d().rasterizer.cull_mode,
        CullMode::None
    );
    assert_eq!(
        RenderState::geometry4d().depth.compare,
        CompareFunction::Lequal
    );
    assert!(!RenderState::transparent4d().depth.write_enabled);
}

#[test]
fn wireframe_preset_widens_lines() {
    let state = RenderState::wireframe();
    assert!(state.blend.enabled);
    assert!(state.rasterizer.line_width > 1.0);
}

// ============================================================================
// Equality and Elision Tests
// ============================================================================

#[test]
fn states_compare_by_value() {
    assert_eq!(RenderState::opaque(), RenderState::opaque());
    assert_eq!(RenderState::transparent(), RenderState::transparent());
    assert_ne!(RenderState::opaque(), RenderState::transparent());
}

#[test]
fn identical_set_state_is_elided() {
    let mut backend = RecordingBackend::new();
    let state = RenderState::transparent();

    state.apply(&mut backend);
    let after_first = backend.stats().state_changes;
    state.apply(&mut backend);
    state.apply(&mut backend);

    assert_eq!(after_first, 1);
    assert_eq!(
        backend.stats().state_changes,
        1,
        "re-applying an identical state must not emit GPU state changes"
    );
}

#[test]
fn changed_state_is_applied() {
    let mut backend = RecordingBackend::new();
    RenderState::opaque().apply(&mut backend);
    RenderState::transparent().apply(&mut backend);
    RenderState::opaque().apply(&mut backend);
    assert_eq!(backend.stats().state_changes, 3);
}

// ============================================================================
// Pipeline Key Tests
// ============================================================================

#[test]
fn pipeline_key_is_stable_across_clones() {
    let a = RenderState::transparent4d();
    let b = a.clone();
    assert_eq!(a.pipeline_key(), b.pipeline_key());
}

#[test]
fn pipeline_key_differs_between_presets() {
    assert_ne!(
        RenderState::opaque().pipeline_key(),
        RenderState::transparent().pipeline_key()
    );
    assert_ne!(
        RenderState::additive().pipeline_key(),
        RenderState::transparent().pipeline_key()
    );
}

#[test]
fn pipeline_key_ignores_viewport() {
    // The viewport is dynamic pass state, not pipeline state.
    let mut a = RenderState::opaque();
    a.viewport.width = 800;
    a.viewport.height = 600;
    assert_eq!(a.pipeline_key(), RenderState::opaque().pipeline_key());
}

// ============================================================================
// Conversion Tests
// ============================================================================

#[test]
fn disabled_blend_converts_to_none() {
    assert!(RenderState::opaque().blend.as_wgpu().is_none());
    assert!(RenderState::transparent().blend.as_wgpu().is_some());
}

#[test]
fn front_and_back_culling_has_no_wgpu_face() {
    assert_eq!(CullMode::FrontAndBack.as_wgpu(), None);
    assert_eq!(CullMode::Back.as_wgpu(), Some(wgpu::Face::Back));
}

#[test]
fn color_mask_converts_to_write_flags() {
    let mask = ColorMask {
        r: true,
        g: false,
        b: true,
        a: false,
    };
    let writes = mask.as_wgpu();
    assert!(writes.contains(wgpu::ColorWrites::RED));
    assert!(!writes.contains(wgpu::ColorWrites::GREEN));
}

#[test]
fn depth_stencil_requires_a_format() {
    let state = RenderState::opaque();
    assert!(state.as_wgpu_depth_stencil(None).is_none());
    let ds = state
        .as_wgpu_depth_stencil(Some(wgpu::TextureFormat::Depth32Float))
        .unwrap();
    assert_eq!(ds.depth_write_enabled, Some(true));
    assert_eq!(ds.depth_compare, Some(wgpu::CompareFunction::Less));
}

#[test]
fn blend_mode_expands_to_blend_state() {
    assert!(!BlendMode::None.as_blend_state().enabled);
    assert_eq!(
        BlendMode::Alpha.as_blend_state().src_rgb,
        BlendFactor::SrcAlpha
    );
    assert_eq!(
        BlendMode::Premultiplied.as_blend_state().src_rgb,
        BlendFactor::One
    );
}
