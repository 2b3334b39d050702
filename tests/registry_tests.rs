//! Resource Registry Tests
//!
//! Tests for:
//! - register/release/dispose bookkeeping and the null-handle no-op
//! - Peak tracking (the two-buffers-plus-texture scenario)
//! - The lifetime invariants: current == allocations - deallocations,
//!   peak >= current
//! - Frame deltas, leak detection, event history, diagnostics export
//! - Disposer failure containment and double-dispose behavior

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vib3::registry::{
    HistoryFilter, RegisterOptions, ResourceEventAction, ResourceKind, ResourceRegistry,
};

fn register_bytes(registry: &mut ResourceRegistry, kind: ResourceKind, handle: u64, bytes: u64) {
    registry.register(kind, handle, || {}, RegisterOptions::bytes(bytes));
}

// ============================================================================
// Registration Tests
// ============================================================================

#[test]
fn register_tracks_counts_and_bytes() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Buffer, 1, 1024);
    register_bytes(&mut registry, ResourceKind::Texture, 2, 4096);

    assert_eq!(registry.current_resources(), 2);
    assert_eq!(registry.current_bytes(), 5120);
    assert!(registry.contains(ResourceKind::Buffer, 1));
    assert!(registry.contains(ResourceKind::Texture, 2));
}

#[test]
fn register_null_handle_is_a_noop() {
    let mut registry = ResourceRegistry::new();
    let entry = registry.register(ResourceKind::Buffer, 0, || {}, RegisterOptions::bytes(64));
    assert!(entry.is_none());
    assert_eq!(registry.current_resources(), 0);
}

#[test]
fn entry_ids_are_monotonic() {
    let mut registry = ResourceRegistry::new();
    let first = registry
        .register(ResourceKind::Buffer, 1, || {}, RegisterOptions::default())
        .map(|e| e.id)
        .unwrap();
    let second = registry
        .register(ResourceKind::Buffer, 2, || {}, RegisterOptions::default())
        .map(|e| e.id)
        .unwrap();
    assert!(second > first);
}

// ============================================================================
// Disposal Tests
// ============================================================================

#[test]
fn dispose_runs_the_disposer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ResourceRegistry::new();
    {
        let calls = calls.clone();
        registry.register(
            ResourceKind::Buffer,
            7,
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
            },
            RegisterOptions::bytes(16),
        );
    }
    assert!(registry.dispose(ResourceKind::Buffer, 7));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.current_resources(), 0);
}

#[test]
fn release_skips_the_disposer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ResourceRegistry::new();
    {
        let calls = calls.clone();
        registry.register(
            ResourceKind::Buffer,
            7,
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
            },
            RegisterOptions::bytes(16),
        );
    }
    assert!(registry.release(ResourceKind::Buffer, 7));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "release must not dispose");
    assert_eq!(registry.current_resources(), 0);
}

#[test]
fn double_dispose_is_not_fatal() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Texture, 3, 128);
    assert!(registry.dispose(ResourceKind::Texture, 3));
    assert!(!registry.dispose(ResourceKind::Texture, 3));
    assert_eq!(registry.current_resources(), 0);
}

#[test]
fn panicking_disposer_is_contained() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut registry = ResourceRegistry::new();
    registry.register(
        ResourceKind::Shader,
        9,
        || panic!("driver refused"),
        RegisterOptions::bytes(8),
    );
    // Must not propagate.
    assert!(registry.dispose(ResourceKind::Shader, 9));
    assert_eq!(registry.current_resources(), 0);
}

#[test]
fn dispose_kind_clears_one_bucket_and_marks_it() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Buffer, 1, 10);
    register_bytes(&mut registry, ResourceKind::Buffer, 2, 10);
    register_bytes(&mut registry, ResourceKind::Texture, 3, 10);

    assert_eq!(registry.dispose_kind(ResourceKind::Buffer), 2);
    assert_eq!(registry.current_resources(), 1);
    assert_eq!(registry.disposed_kinds(), vec![ResourceKind::Buffer]);
}

#[test]
fn dispose_all_empties_the_registry() {
    let mut registry = ResourceRegistry::new();
    for handle in 1..=5 {
        register_bytes(&mut registry, ResourceKind::Buffer, handle, 100);
    }
    registry.dispose_all();
    assert_eq!(registry.current_resources(), 0);
    assert_eq!(registry.current_bytes(), 0);
}

// ============================================================================
// Peak Tracking Tests (spec scenario: 1 KB + 1 KB, dispose, + 4 KB)
// ============================================================================

#[test]
fn peak_tracking_scenario() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Buffer, 1, 1024);
    register_bytes(&mut registry, ResourceKind::Buffer, 2, 1024);
    assert!(registry.dispose(ResourceKind::Buffer, 1));
    register_bytes(&mut registry, ResourceKind::Texture, 3, 4096);

    assert_eq!(registry.peak_bytes(), 5120);
    assert_eq!(registry.current_bytes(), 5120);

    assert!(registry.dispose(ResourceKind::Texture, 3));
    assert_eq!(registry.current_bytes(), 1024);
    assert_eq!(registry.peak_bytes(), 5120, "peaks never shrink");
}

#[test]
fn peaks_never_drop_below_current() {
    let mut registry = ResourceRegistry::new();
    for step in 0..20u64 {
        register_bytes(&mut registry, ResourceKind::Buffer, step + 1, 64);
        if step % 3 == 0 {
            registry.dispose(ResourceKind::Buffer, step + 1);
        }
        assert!(registry.peak_resources() >= registry.current_resources());
        assert!(registry.peak_bytes() >= registry.current_bytes());
    }
}

#[test]
fn reset_peak_stats_drops_to_current() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Buffer, 1, 2048);
    register_bytes(&mut registry, ResourceKind::Buffer, 2, 2048);
    registry.dispose(ResourceKind::Buffer, 2);

    registry.reset_peak_stats();
    assert_eq!(registry.peak_bytes(), 2048);
    assert_eq!(registry.peak_resources(), 1);
}

// ============================================================================
// Lifetime Invariant Tests
// ============================================================================

#[test]
fn allocations_minus_deallocations_equals_current() {
    let mut registry = ResourceRegistry::new();
    // A mixed sequence of register/release/dispose.
    for handle in 1..=10 {
        register_bytes(&mut registry, ResourceKind::Buffer, handle, 32);
    }
    registry.release(ResourceKind::Buffer, 2);
    registry.dispose(ResourceKind::Buffer, 4);
    registry.dispose_kind(ResourceKind::Buffer);
    register_bytes(&mut registry, ResourceKind::Texture, 99, 256);

    let diagnostics = registry.diagnostics();
    assert_eq!(
        diagnostics.lifetime.total_allocations - diagnostics.lifetime.total_deallocations,
        registry.current_resources() as u64
    );
    assert_eq!(diagnostics.lifetime.net, 1);
}

// ============================================================================
// Frame Delta Tests
// ============================================================================

#[test]
fn frame_delta_reflects_in_frame_changes() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Buffer, 1, 100);

    registry.begin_frame();
    register_bytes(&mut registry, ResourceKind::Buffer, 2, 50);
    register_bytes(&mut registry, ResourceKind::Buffer, 3, 50);
    registry.dispose(ResourceKind::Buffer, 1);
    registry.end_frame();

    let delta = registry.frame_delta();
    assert_eq!(delta.resources, 1);
    assert_eq!(delta.bytes, 0);
}

// ============================================================================
// Leak Detection Tests
// ============================================================================

#[test]
fn young_entries_are_not_leaks() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Buffer, 1, 64);
    assert!(registry.detect_leaks(None).is_empty());
}

#[test]
fn old_entries_are_reported_with_metadata() {
    let mut registry = ResourceRegistry::new();
    registry.register(
        ResourceKind::Texture,
        1,
        || {},
        RegisterOptions::labeled(512, "suspect"),
    );
    // Zero threshold makes every live entry "old".
    let leaks = registry.detect_leaks(Some(0.0));
    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].kind, ResourceKind::Texture);
    assert_eq!(leaks[0].bytes, 512);
    assert_eq!(leaks[0].label.as_deref(), Some("suspect"));
}

// ============================================================================
// History and Diagnostics Tests
// ============================================================================

#[test]
fn history_records_allocs_and_frees() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Buffer, 1, 10);
    registry.dispose(ResourceKind::Buffer, 1);

    let all = registry.history(&HistoryFilter::default());
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].action, ResourceEventAction::Alloc);
    assert_eq!(all[1].action, ResourceEventAction::Free);
}

#[test]
fn history_filters_by_kind_action_and_limit() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Buffer, 1, 10);
    register_bytes(&mut registry, ResourceKind::Texture, 2, 10);
    registry.dispose(ResourceKind::Buffer, 1);

    let frees = registry.history(&HistoryFilter {
        action: Some(ResourceEventAction::Free),
        ..HistoryFilter::default()
    });
    assert_eq!(frees.len(), 1);

    let textures = registry.history(&HistoryFilter {
        kind: Some(ResourceKind::Texture),
        ..HistoryFilter::default()
    });
    assert_eq!(textures.len(), 1);

    let limited = registry.history(&HistoryFilter {
        limit: Some(1),
        ..HistoryFilter::default()
    });
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].action, ResourceEventAction::Free, "limit keeps newest");
}

#[test]
fn history_is_trimmed_to_its_limit() {
    let mut registry = ResourceRegistry::with_history_limit(4);
    for handle in 1..=10 {
        register_bytes(&mut registry, ResourceKind::Buffer, handle, 1);
    }
    assert_eq!(registry.history(&HistoryFilter::default()).len(), 4);
}

#[test]
fn diagnostics_export_is_valid_json() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Buffer, 1, 333);
    let json = registry.export_diagnostics_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["currentBytes"], 333);
    assert_eq!(value["lifetime"]["totalAllocations"], 1);
}

#[test]
fn summary_string_mentions_live_kinds() {
    let mut registry = ResourceRegistry::new();
    register_bytes(&mut registry, ResourceKind::Framebuffer, 1, 64);
    let summary = registry.summary_string();
    assert!(summary.contains("framebuffer"));
    assert!(summary.contains("1 live"));
}
