//! Resource session types
//!
//! A session is keyed by (account, resource kind); at most one may be
//! running per key. State lives in the ephemeral store, created on start,
//! read every billing tick, deleted on stop or auto-termination.

use serde::{Deserialize, Serialize};

/// Billable compute resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Gpu,
}

impl ResourceKind {
    /// Stable lowercase name, used in store keys and billing reasons
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Gpu => "gpu",
        }
    }

    /// All billable kinds, one scheduler loop each
    pub fn all() -> [ResourceKind; 2] {
        [ResourceKind::Cpu, ResourceKind::Gpu]
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(ResourceKind::Cpu),
            "gpu" => Ok(ResourceKind::Gpu),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// Ephemeral state of a running session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Running flag; stored entries always start true
    pub running: bool,
    /// Session start (Unix seconds)
    pub started_at: i64,
    /// Executor-assigned handle (container name)
    pub handle: String,
}

impl SessionState {
    pub fn new(started_at: i64, handle: impl Into<String>) -> Self {
        Self {
            running: true,
            started_at,
            handle: handle.into(),
        }
    }

    /// Whole billable minutes for a session of `elapsed_secs` duration.
    ///
    /// Partial minutes always round up, never down, so a session is never
    /// undercharged; the minimum charge is one minute.
    pub fn billable_minutes(elapsed_secs: i64) -> u64 {
        let secs = elapsed_secs.max(0) as u64;
        secs.div_ceil(60).max(1)
    }
}
