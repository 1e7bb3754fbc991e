//! Long-running analytical task bookkeeping (spec §3, C12).

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    RouteAnalysis,
    FleetPerf,
    Demand,
    Sla,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub params: serde_json::Value,
    pub status: JobStatus,
    pub started_at: Instant,
    pub ended_at: Option<Instant>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, JobStatus::Running)
    }
}
