//! Job registry (C12, spec §4.11): tracks in-flight and recently-terminal automation
//! jobs, bounding history so memory doesn't grow unbounded across a long-running
//! process.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use crate::domain::job::{Job, JobKind, JobStatus};

const MAX_TERMINAL_HISTORY: usize = 50;

pub struct JobRegistry {
    running: Mutex<Vec<Job>>,
    terminal: Mutex<VecDeque<Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        JobRegistry { running: Mutex::new(Vec::new()), terminal: Mutex::new(VecDeque::new()) }
    }

    pub fn start(&self, job: Job) {
        self.running.lock().unwrap().push(job);
    }

    /// Count of jobs of `kind` currently running — callers use this against an
    /// engine's `concurrency` cap before starting a new one.
    pub fn running_count(&self, kind: JobKind) -> usize {
        self.running.lock().unwrap().iter().filter(|j| j.kind == kind).count()
    }

    /// Moves a running job to terminal state, evicting the oldest terminal entry once
    /// history exceeds [`MAX_TERMINAL_HISTORY`].
    pub fn finish(&self, job_id: &str, status: JobStatus, result: Option<serde_json::Value>, error: Option<String>) {
        let mut running = self.running.lock().unwrap();
        if let Some(pos) = running.iter().position(|j| j.id == job_id) {
            let mut job = running.remove(pos);
            job.status = status;
            job.result = result;
            job.error = error;
            job.ended_at = Some(Instant::now());

            let mut terminal = self.terminal.lock().unwrap();
            terminal.push_back(job);
            while terminal.len() > MAX_TERMINAL_HISTORY {
                terminal.pop_front();
            }
        }
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        if let Some(job) = self.running.lock().unwrap().iter().find(|j| j.id == job_id) {
            return Some(job.clone());
        }
        self.terminal.lock().unwrap().iter().find(|j| j.id == job_id).cloned()
    }

    pub fn history(&self) -> Vec<Job> {
        self.terminal.lock().unwrap().iter().cloned().collect()
    }

    pub fn running(&self) -> Vec<Job> {
        self.running.lock().unwrap().clone()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        JobRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, kind: JobKind) -> Job {
        Job { id: id.to_string(), kind, params: serde_json::json!({}), status: JobStatus::Running, started_at: Instant::now(), ended_at: None, result: None, error: None }
    }

    #[test]
    fn running_count_tracks_kind() {
        let reg = JobRegistry::new();
        reg.start(job("j1", JobKind::RouteAnalysis));
        reg.start(job("j2", JobKind::RouteAnalysis));
        reg.start(job("j3", JobKind::Sla));
        assert_eq!(reg.running_count(JobKind::RouteAnalysis), 2);
        assert_eq!(reg.running_count(JobKind::Sla), 1);
    }

    #[test]
    fn finish_moves_job_to_terminal_history() {
        let reg = JobRegistry::new();
        reg.start(job("j1", JobKind::RouteAnalysis));
        reg.finish("j1", JobStatus::Completed, Some(serde_json::json!({"ok": true})), None);

        assert_eq!(reg.running_count(JobKind::RouteAnalysis), 0);
        let found = reg.get("j1").expect("job moved to terminal history");
        assert_eq!(found.status, JobStatus::Completed);
    }

    #[test]
    fn terminal_history_is_bounded() {
        let reg = JobRegistry::new();
        for i in 0..(MAX_TERMINAL_HISTORY + 10) {
            let id = format!("j{i}");
            reg.start(job(&id, JobKind::RouteAnalysis));
            reg.finish(&id, JobStatus::Completed, None, None);
        }
        assert_eq!(reg.history().len(), MAX_TERMINAL_HISTORY);
    }
}
