//! Resource Registry
//!
//! Tracks every live GPU object by kind, owns the disposer closures that
//! free them, and keeps the accounting needed for leak detection and
//! capacity planning: current/peak counts and bytes, per-frame deltas, and
//! lifetime allocation totals.
//!
//! The registry is owned by exactly one backend; entries are never shared
//! across backends. Disposers must be idempotent — a double dispose logs a
//! warning and is otherwise harmless.

mod diagnostics;

pub use diagnostics::{
    Diagnostics, FrameDelta, HistoryFilter, LeakReport, LifetimeStats, ResourceEvent,
    ResourceEventAction,
};

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};

use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

use crate::utils::time::now_ms;

/// Default age after which a live entry counts as a suspected leak.
pub const DEFAULT_LEAK_AGE_MS: f64 = 60_000.0;

/// Default cap on the retained event history.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// The kinds of GPU object the registry distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Buffer,
    Texture,
    Shader,
    Program,
    VertexArray,
    Framebuffer,
    Renderbuffer,
    Sampler,
    Pipeline,
    BindGroup,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::Buffer,
        ResourceKind::Texture,
        ResourceKind::Shader,
        ResourceKind::Program,
        ResourceKind::VertexArray,
        ResourceKind::Framebuffer,
        ResourceKind::Renderbuffer,
        ResourceKind::Sampler,
        ResourceKind::Pipeline,
        ResourceKind::BindGroup,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::Texture => "texture",
            ResourceKind::Shader => "shader",
            ResourceKind::Program => "program",
            ResourceKind::VertexArray => "vao",
            ResourceKind::Framebuffer => "framebuffer",
            ResourceKind::Renderbuffer => "renderbuffer",
            ResourceKind::Sampler => "sampler",
            ResourceKind::Pipeline => "pipeline",
            ResourceKind::BindGroup => "bind_group",
        }
    }
}

/// Options for [`ResourceRegistry::register`].
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// GPU-side size estimate, counted into the byte statistics.
    pub bytes: u64,
    /// Debug label surfaced in diagnostics and leak reports.
    pub label: Option<String>,
}

impl RegisterOptions {
    #[must_use]
    pub fn bytes(bytes: u64) -> Self {
        Self { bytes, label: None }
    }

    #[must_use]
    pub fn labeled(bytes: u64, label: impl Into<String>) -> Self {
        Self {
            bytes,
            label: Some(label.into()),
        }
    }
}

/// One tracked GPU object.
pub struct ResourceEntry {
    pub kind: ResourceKind,
    /// Opaque non-zero backend handle.
    pub handle: u64,
    disposer: Option<Box<dyn FnMut() + Send>>,
    pub bytes: u64,
    pub label: Option<String>,
    pub created_at: Instant,
    /// Monotonic id, unique across the registry's lifetime.
    pub id: u64,
}

impl std::fmt::Debug for ResourceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceEntry")
            .field("kind", &self.kind)
            .field("handle", &self.handle)
            .field("bytes", &self.bytes)
            .field("label", &self.label)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Per-backend tracker for every live GPU object.
pub struct ResourceRegistry {
    buckets: FxHashMap<ResourceKind, FxHashMap<u64, ResourceEntry>>,
    next_id: u64,

    current_resources: usize,
    current_bytes: u64,
    peak_resources: usize,
    peak_bytes: u64,
    peak_by_kind: FxHashMap<ResourceKind, usize>,

    frame_start: Option<(usize, u64)>,
    frame_delta: FrameDelta,

    total_allocations: u64,
    total_deallocations: u64,

    disposed_kinds: FxHashSet<ResourceKind>,

    history: VecDeque<ResourceEvent>,
    history_limit: usize,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    #[must_use]
    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            buckets: FxHashMap::default(),
            next_id: 1,
            current_resources: 0,
            current_bytes: 0,
            peak_resources: 0,
            peak_bytes: 0,
            peak_by_kind: FxHashMap::default(),
            frame_start: None,
            frame_delta: FrameDelta::default(),
            total_allocations: 0,
            total_deallocations: 0,
            disposed_kinds: FxHashSet::default(),
            history: VecDeque::new(),
            history_limit,
        }
    }

    // ========================================================================
    // Registration and disposal
    // ========================================================================

    /// Tracks a new GPU object. A zero handle is rejected (no-op, `None`).
    pub fn register(
        &mut self,
        kind: ResourceKind,
        handle: u64,
        disposer: impl FnMut() + Send + 'static,
        options: RegisterOptions,
    ) -> Option<&ResourceEntry> {
        if handle == 0 {
            warn!("register({}) called with a null handle; ignored", kind.name());
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;

        let entry = ResourceEntry {
            kind,
            handle,
            disposer: Some(Box::new(disposer)),
            bytes: options.bytes,
            label: options.label,
            created_at: Instant::now(),
            id,
        };

        self.current_resources += 1;
        self.current_bytes += entry.bytes;
        self.total_allocations += 1;
        self.push_event(kind, ResourceEventAction::Alloc, entry.bytes, entry.label.clone());

        let bucket = self.buckets.entry(kind).or_default();
        bucket.insert(handle, entry);
        let bucket_len = bucket.len();

        self.peak_resources = self.peak_resources.max(self.current_resources);
        self.peak_bytes = self.peak_bytes.max(self.current_bytes);
        let peak = self.peak_by_kind.entry(kind).or_insert(0);
        *peak = (*peak).max(bucket_len);

        self.buckets.get(&kind).and_then(|b| b.get(&handle))
    }

    /// Stops tracking without calling the disposer (the caller already freed
    /// the GPU object).
    pub fn release(&mut self, kind: ResourceKind, handle: u64) -> bool {
        self.take(kind, handle).is_some()
    }

    /// Calls the disposer, then stops tracking. Disposer failures are logged
    /// and never propagated.
    pub fn dispose(&mut self, kind: ResourceKind, handle: u64) -> bool {
        let Some(mut entry) = self.take(kind, handle) else {
            warn!(
                "dispose({}, {handle}) on an untracked handle (double dispose?)",
                kind.name()
            );
            return false;
        };
        Self::run_disposer(&mut entry);
        true
    }

    /// Disposes every entry of one kind; returns how many were disposed.
    pub fn dispose_kind(&mut self, kind: ResourceKind) -> usize {
        let Some(bucket) = self.buckets.remove(&kind) else {
            self.disposed_kinds.insert(kind);
            return 0;
        };
        let count = bucket.len();
        for (_, mut entry) in bucket {
            self.current_resources -= 1;
            self.current_bytes -= entry.bytes;
            self.total_deallocations += 1;
            self.push_event(kind, ResourceEventAction::Free, entry.bytes, entry.label.clone());
            Self::run_disposer(&mut entry);
        }
        self.disposed_kinds.insert(kind);
        count
    }

    /// Disposes everything. Used at shutdown.
    pub fn dispose_all(&mut self) {
        for kind in ResourceKind::ALL {
            self.dispose_kind(kind);
        }
    }

    // ========================================================================
    // Frame sampling
    // ========================================================================

    /// Samples the current counters at the start of a frame.
    pub fn begin_frame(&mut self) {
        self.frame_start = Some((self.current_resources, self.current_bytes));
    }

    /// Computes the frame delta against the `begin_frame` sample.
    pub fn end_frame(&mut self) {
        if let Some((resources, bytes)) = self.frame_start.take() {
            self.frame_delta = FrameDelta {
                resources: self.current_resources as i64 - resources as i64,
                bytes: self.current_bytes as i64 - bytes as i64,
            };
        }
    }

    // ========================================================================
    // Observability
    // ========================================================================

    /// Entries alive longer than `age_threshold_ms` (default one minute).
    #[must_use]
    pub fn detect_leaks(&self, age_threshold_ms: Option<f64>) -> Vec<LeakReport> {
        let threshold = age_threshold_ms.unwrap_or(DEFAULT_LEAK_AGE_MS);
        let mut leaks: Vec<LeakReport> = self
            .buckets
            .values()
            .flat_map(FxHashMap::values)
            .filter_map(|entry| {
                let age_ms = entry.created_at.elapsed().as_secs_f64() * 1000.0;
                (age_ms > threshold).then(|| LeakReport {
                    kind: entry.kind,
                    label: entry.label.clone(),
                    bytes: entry.bytes,
                    age_ms,
                    id: entry.id,
                })
            })
            .collect();
        leaks.sort_by(|a, b| a.id.cmp(&b.id));
        leaks
    }

    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            current_resources: self.current_resources,
            current_bytes: self.current_bytes,
            peak_resources: self.peak_resources,
            peak_bytes: self.peak_bytes,
            peak_by_kind: self
                .peak_by_kind
                .iter()
                .map(|(k, v)| (k.name().to_string(), *v))
                .collect(),
            frame_delta: self.frame_delta,
            lifetime: LifetimeStats {
                total_allocations: self.total_allocations,
                total_deallocations: self.total_deallocations,
                net: self.total_allocations as i64 - self.total_deallocations as i64,
            },
        }
    }

    /// Filtered view of the retained event history, newest last.
    #[must_use]
    pub fn history(&self, filter: &HistoryFilter) -> Vec<ResourceEvent> {
        let events = self
            .history
            .iter()
            .filter(|e| filter.kind.is_none_or(|k| e.kind == k))
            .filter(|e| filter.action.is_none_or(|a| e.action == a))
            .cloned()
            .collect::<Vec<_>>();
        match filter.limit {
            Some(limit) if events.len() > limit => events[events.len() - limit..].to_vec(),
            _ => events,
        }
    }

    pub fn export_diagnostics_json(&self) -> crate::errors::Result<String> {
        Ok(serde_json::to_string_pretty(&self.diagnostics())?)
    }

    /// One-line-per-kind human-readable summary.
    #[must_use]
    pub fn summary_string(&self) -> String {
        use std::fmt::Write;
        let mut out = format!(
            "resources: {} live / {} peak, {} B live / {} B peak\n",
            self.current_resources, self.peak_resources, self.current_bytes, self.peak_bytes
        );
        for kind in ResourceKind::ALL {
            let live = self.buckets.get(&kind).map_or(0, FxHashMap::len);
            let peak = self.peak_by_kind.get(&kind).copied().unwrap_or(0);
            if live > 0 || peak > 0 {
                let _ = writeln!(out, "  {:<12} {live} live / {peak} peak", kind.name());
            }
        }
        out
    }

    /// Resets the peak high-watermarks to the current values.
    pub fn reset_peak_stats(&mut self) {
        self.peak_resources = self.current_resources;
        self.peak_bytes = self.current_bytes;
        for (kind, peak) in &mut self.peak_by_kind {
            *peak = self.buckets.get(kind).map_or(0, FxHashMap::len);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn current_resources(&self) -> usize {
        self.current_resources
    }

    #[must_use]
    pub fn current_bytes(&self) -> u64 {
        self.current_bytes
    }

    #[must_use]
    pub fn peak_resources(&self) -> usize {
        self.peak_resources
    }

    #[must_use]
    pub fn peak_bytes(&self) -> u64 {
        self.peak_bytes
    }

    #[must_use]
    pub fn frame_delta(&self) -> FrameDelta {
        self.frame_delta
    }

    #[must_use]
    pub fn contains(&self, kind: ResourceKind, handle: u64) -> bool {
        self.buckets.get(&kind).is_some_and(|b| b.contains_key(&handle))
    }

    /// Kinds that have gone through a whole-kind disposal.
    #[must_use]
    pub fn disposed_kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<_> = self.disposed_kinds.iter().copied().collect();
        kinds.sort_by_key(|k| k.name());
        kinds
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn take(&mut self, kind: ResourceKind, handle: u64) -> Option<ResourceEntry> {
        let entry = self.buckets.get_mut(&kind)?.remove(&handle)?;
        self.current_resources -= 1;
        self.current_bytes -= entry.bytes;
        self.total_deallocations += 1;
        self.push_event(kind, ResourceEventAction::Free, entry.bytes, entry.label.clone());
        Some(entry)
    }

    fn run_disposer(entry: &mut ResourceEntry) {
        if let Some(mut disposer) = entry.disposer.take() {
            let outcome = catch_unwind(AssertUnwindSafe(|| disposer()));
            if outcome.is_err() {
                warn!(
                    "disposer for {} '{}' failed; continuing",
                    entry.kind.name(),
                    entry.label.as_deref().unwrap_or("<unlabeled>")
                );
            }
        }
    }

    fn push_event(
        &mut self,
        kind: ResourceKind,
        action: ResourceEventAction,
        bytes: u64,
        label: Option<String>,
    ) {
        if self.history_limit == 0 {
            return;
        }
        self.history.push_back(ResourceEvent {
            timestamp_ms: now_ms(),
            kind,
            action,
            bytes,
            label,
        });
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }
}
