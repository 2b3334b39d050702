//! Registry diagnostics value types.

use serde::{Deserialize, Serialize};

use super::ResourceKind;

/// Net change in live resources across one `begin_frame`/`end_frame` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDelta {
    pub resources: i64,
    pub bytes: i64,
}

/// Lifetime allocation totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeStats {
    pub total_allocations: u64,
    pub total_deallocations: u64,
    /// `total_allocations - total_deallocations`; equals the live count.
    pub net: i64,
}

/// Snapshot of every registry counter, exportable as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub current_resources: usize,
    pub current_bytes: u64,
    pub peak_resources: usize,
    pub peak_bytes: u64,
    pub peak_by_kind: std::collections::BTreeMap<String, usize>,
    pub frame_delta: FrameDelta,
    pub lifetime: LifetimeStats,
}

/// One suspected leak: a live entry older than the detection threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakReport {
    pub kind: ResourceKind,
    pub label: Option<String>,
    pub bytes: u64,
    pub age_ms: f64,
    pub id: u64,
}

/// Allocation or deallocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceEventAction {
    Alloc,
    Free,
}

/// One entry of the retained event history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEvent {
    pub timestamp_ms: f64,
    pub kind: ResourceKind,
    pub action: ResourceEventAction,
    pub bytes: u64,
    pub label: Option<String>,
}

/// Filter for [`super::ResourceRegistry::history`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryFilter {
    pub kind: Option<ResourceKind>,
    pub action: Option<ResourceEventAction>,
    pub limit: Option<usize>,
}
