//! Accent System Tests
//!
//! Tests for:
//! - The literal derivation scenario from the parameter record used across
//!   the stack (spec scenario 3)
//! - Purity: equal inputs yield identical output maps
//! - Input clamping before derivation
//! - Formatting: fixed fractional digits per unit family
//! - Smoothing behavior of update()

use vib3::accent::{AccentSystem, AccentVar, RHYTHM_EASE};
use vib3::params::VisualParams;

fn scenario_params() -> VisualParams {
    VisualParams {
        hue: 200.0,
        saturation: 0.7,
        intensity: 0.7,
        chaos: 0.2,
        speed: 1.0,
        dimension: 3.5,
        morph_factor: 0.5,
        rot4d_xw: 0.0,
        rot4d_yw: 0.0,
        rot4d_zw: 0.0,
        ..VisualParams::default()
    }
}

fn get<'a>(vars: &'a [AccentVar], name: &str) -> &'a str {
    vars.iter()
        .find(|v| v.name == name)
        .unwrap_or_else(|| panic!("missing property {name}"))
        .value
        .as_str()
}

// ============================================================================
// Literal Derivation Scenario
// ============================================================================

#[test]
fn scenario_derivation_matches_expected_values() {
    let vars = AccentSystem::derive(&scenario_params());

    assert_eq!(get(&vars, "--accent-hue"), "200.0");
    assert_eq!(get(&vars, "--accent-complement"), "20.0");
    assert_eq!(get(&vars, "--accent-harmonic"), "337.5");
    assert_eq!(get(&vars, "--glass-depth"), "0.595");
    assert_eq!(get(&vars, "--glass-blur"), "16.0px");
    assert_eq!(get(&vars, "--energy-intensity"), "0.050");
    assert_eq!(get(&vars, "--energy-pulse"), "2.40s");
    assert_eq!(get(&vars, "--depth-shadow"), "24.0px");
    assert_eq!(get(&vars, "--depth-shadow-alpha"), "0.367");
    assert_eq!(get(&vars, "--depth-radius"), "16.0px");
    assert_eq!(get(&vars, "--rhythm-duration"), "1.07s");
}

#[test]
fn chromatic_wheel_offsets() {
    let vars = AccentSystem::derive(&scenario_params());
    assert_eq!(get(&vars, "--accent-split-warm"), "350.0");
    assert_eq!(get(&vars, "--accent-split-cool"), "50.0");
    assert_eq!(get(&vars, "--accent-analogous-a"), "260.0");
    assert_eq!(get(&vars, "--accent-analogous-b"), "140.0");
    assert_eq!(get(&vars, "--accent-saturation"), "0.700");
}

#[test]
fn glass_and_energy_track_the_complement() {
    let vars = AccentSystem::derive(&scenario_params());
    let complement = get(&vars, "--accent-complement").to_string();
    assert_eq!(get(&vars, "--glass-tint"), complement);
    assert_eq!(get(&vars, "--energy-hue"), complement);
}

#[test]
fn energy_intensity_saturates_with_rotation() {
    let mut params = scenario_params();
    params.rot4d_xw = 10.0; // magnitude 10 > 6 saturates the ratio
    let vars = AccentSystem::derive(&params);
    assert_eq!(get(&vars, "--energy-intensity"), "0.200");
}

#[test]
fn rhythm_ease_is_fixed() {
    let vars = AccentSystem::derive(&scenario_params());
    assert_eq!(get(&vars, "--rhythm-ease"), "cubic-bezier(0.23, 1, 0.32, 1)");
    assert_eq!(get(&vars, "--rhythm-ease"), RHYTHM_EASE);
}

#[test]
fn depth_lift_follows_morph() {
    let mut params = scenario_params();
    params.morph_factor = 1.5;
    let vars = AccentSystem::derive(&params);
    assert_eq!(get(&vars, "--depth-lift"), "3.0px");
    assert_eq!(get(&vars, "--depth-radius"), "24.0px");
}

// ============================================================================
// Purity (property 10)
// ============================================================================

#[test]
fn derive_is_pure() {
    let params = scenario_params();
    let a = AccentSystem::derive(&params);
    let b = AccentSystem::derive(&params);
    assert_eq!(a, b, "equal inputs must yield byte-identical maps");
}

#[test]
fn derive_emits_a_fixed_property_set_in_order() {
    let params = scenario_params();
    let names: Vec<&str> = AccentSystem::derive(&params)
        .iter()
        .map(|v| v.name)
        .collect();
    assert_eq!(names.len(), 20);
    assert_eq!(names[0], "--accent-hue");
    assert_eq!(names[names.len() - 1], "--rhythm-ease");

    // Order is part of the surface: a different record keeps the order.
    let other = VisualParams::default();
    let other_names: Vec<&str> = AccentSystem::derive(&other).iter().map(|v| v.name).collect();
    assert_eq!(names, other_names);
}

// ============================================================================
// Clamping
// ============================================================================

#[test]
fn out_of_range_inputs_are_clamped_before_derivation() {
    let mut params = scenario_params();
    params.intensity = 7.0;
    params.chaos = -3.0;
    params.speed = 99.0;
    params.dimension = 0.0;

    let vars = AccentSystem::derive(&params);
    // intensity clamps to 1: 0.35 + 1*0.35
    assert_eq!(get(&vars, "--glass-depth"), "0.700");
    // chaos clamps to 0: 12 + 0*20
    assert_eq!(get(&vars, "--glass-blur"), "12.0px");
    // speed clamps to 3: 0.8 + 0*2.4
    assert_eq!(get(&vars, "--energy-pulse"), "0.80s");
    // dimension clamps to 3: 8 + 1.5*16
    assert_eq!(get(&vars, "--depth-shadow"), "32.0px");
}

#[test]
fn hue_wraps_instead_of_clamping() {
    let mut params = scenario_params();
    params.hue = 560.0; // wraps to 200
    let vars = AccentSystem::derive(&params);
    assert_eq!(get(&vars, "--accent-hue"), "200.0");

    params.hue = -60.0; // wraps to 300
    let vars = AccentSystem::derive(&params);
    assert_eq!(get(&vars, "--accent-hue"), "300.0");
}

// ============================================================================
// Smoothing
// ============================================================================

#[test]
fn update_snaps_on_the_first_call() {
    let mut accent = AccentSystem::new();
    let vars = accent.update(&scenario_params(), 0.0);
    assert_eq!(get(&vars, "--accent-hue"), "200.0");
}

#[test]
fn update_smooths_toward_changed_inputs() {
    let mut accent = AccentSystem::new();
    let mut params = scenario_params();
    accent.update(&params, 0.0);

    params.intensity = 0.0;
    // One 16 ms step with tau = 0.12 s covers ~12.5% of the step.
    let vars = accent.update(&params, 16.0);
    let depth: f32 = get(&vars, "--glass-depth")
        .parse()
        .expect("unitless ratio");
    let settled = 0.35;
    let start = 0.595;
    assert!(
        depth < start && depth > settled,
        "expected a partial move from {start} toward {settled}, got {depth}"
    );
}

#[test]
fn update_converges_to_derive_output() {
    let mut accent = AccentSystem::new();
    let mut params = scenario_params();
    accent.update(&params, 0.0);

    params.hue = 80.0;
    params.intensity = 0.1;
    let mut t = 0.0;
    let mut last = Vec::new();
    // Several seconds at 60 Hz swamp every tau in the table.
    for _ in 0..600 {
        t += 16.0;
        last = accent.update(&params, t);
    }
    assert_eq!(last, AccentSystem::derive(&params));
}

#[test]
fn reset_forgets_smoothing_history() {
    let mut accent = AccentSystem::new();
    let mut params = scenario_params();
    accent.update(&params, 0.0);

    params.hue = 10.0;
    accent.reset();
    let vars = accent.update(&params, 1000.0);
    assert_eq!(get(&vars, "--accent-hue"), "10.0", "post-reset update snaps");
}
