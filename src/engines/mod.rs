//! Automation Control Plane (C10-C11, spec §4.9-§4.10): four long-running engines
//! ticking on independent schedules, each wrapping one external dependency call per
//! queued order behind a circuit breaker, with automatic degraded-mode throttling.

pub mod batching;
pub mod dispatch;
pub mod route_reopt;
pub mod sla;
pub mod supervisor;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::breaker::CircuitBreaker;
use crate::config::EngineConfig;
use crate::deps::ExternalDependency;
use crate::domain::job::{Job, JobKind, JobStatus};
use crate::events::{EventHub, EventKind};
use crate::registry::JobRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineName {
    Dispatch,
    Batching,
    RouteReopt,
    Sla,
}

impl EngineName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineName::Dispatch => "dispatch",
            EngineName::Batching => "batching",
            EngineName::RouteReopt => "route_reopt",
            EngineName::Sla => "sla",
        }
    }

    /// Each engine's per-tick unit of work is tracked in the job registry under the
    /// matching analytical job kind (§4.9/§4.11): dispatch -> fleet performance,
    /// batching -> demand grouping, route_reopt -> route analysis, sla -> SLA.
    pub fn job_kind(&self) -> JobKind {
        match self {
            EngineName::Dispatch => JobKind::FleetPerf,
            EngineName::Batching => JobKind::Demand,
            EngineName::RouteReopt => JobKind::RouteAnalysis,
            EngineName::Sla => JobKind::Sla,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TickOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

const DEGRADE_AFTER_BAD_TICKS: usize = 2;
const BAD_TICK_FAILURE_RATIO: f64 = 0.9;
const RECOVER_AFTER_GOOD_TICKS: usize = 10;

/// Halves effective concurrency after two consecutive ticks with >=90% failure, and
/// restores it after ten consecutive ticks with no failures (§4.9 degraded mode).
pub struct DegradedTracker {
    base_concurrency: usize,
    effective: AtomicUsize,
    consecutive_bad_ticks: AtomicUsize,
    consecutive_good_ticks: AtomicUsize,
    degraded: AtomicBool,
}

impl DegradedTracker {
    pub fn new(base_concurrency: usize) -> Self {
        let base = base_concurrency.max(1);
        DegradedTracker {
            base_concurrency: base,
            effective: AtomicUsize::new(base),
            consecutive_bad_ticks: AtomicUsize::new(0),
            consecutive_good_ticks: AtomicUsize::new(0),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.effective.load(Ordering::SeqCst)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Folds one tick's outcome in, returning `true` if the degraded state just flipped.
    pub fn record_tick(&self, outcome: TickOutcome) -> bool {
        let total = outcome.succeeded + outcome.failed;
        if total == 0 {
            return false;
        }
        let failure_ratio = outcome.failed as f64 / total as f64;

        if failure_ratio >= BAD_TICK_FAILURE_RATIO {
            self.consecutive_good_ticks.store(0, Ordering::SeqCst);
            let bad = self.consecutive_bad_ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if bad >= DEGRADE_AFTER_BAD_TICKS && !self.degraded.swap(true, Ordering::SeqCst) {
                let halved = (self.base_concurrency / 2).max(1);
                self.effective.store(halved, Ordering::SeqCst);
                return true;
            }
            false
        } else {
            self.consecutive_bad_ticks.store(0, Ordering::SeqCst);
            if self.degraded.load(Ordering::SeqCst) {
                let good = self.consecutive_good_ticks.fetch_add(1, Ordering::SeqCst) + 1;
                if good >= RECOVER_AFTER_GOOD_TICKS {
                    self.effective.store(self.base_concurrency, Ordering::SeqCst);
                    self.degraded.store(false, Ordering::SeqCst);
                    self.consecutive_good_ticks.store(0, Ordering::SeqCst);
                    return true;
                }
            }
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineRunState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineStatus {
    pub name: EngineName,
    pub state: EngineRunState,
    pub degraded: bool,
    pub effective_concurrency: usize,
}

/// A long-running automation engine: ticks every `config.tick_ms`, draining up to
/// `effective_concurrency` queued orders per tick, calling `dependency` for each behind
/// `breaker`, and isolating per-order panics with `tokio::spawn` (§5, §4.9).
/// One order in an engine's queue, carrying the pickup/order location dispatch needs to
/// score candidate drivers against (§4.5); other engines ignore `location`.
#[derive(Debug, Clone)]
pub struct QueuedOrder {
    pub id: String,
    pub location: Option<(f64, f64)>,
}

pub struct Engine {
    name: EngineName,
    config: EngineConfig,
    dependency: Arc<dyn ExternalDependency>,
    breaker: Arc<CircuitBreaker>,
    registry: Arc<JobRegistry>,
    hub: Arc<EventHub>,
    queue: Arc<Mutex<VecDeque<QueuedOrder>>>,
    degraded: Arc<DegradedTracker>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(
        name: EngineName,
        config: EngineConfig,
        dependency: Arc<dyn ExternalDependency>,
        breaker: Arc<CircuitBreaker>,
        registry: Arc<JobRegistry>,
        hub: Arc<EventHub>,
    ) -> Arc<Engine> {
        Arc::new(Engine {
            name,
            degraded: Arc::new(DegradedTracker::new(config.concurrency)),
            config,
            dependency,
            breaker,
            registry,
            hub,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        })
    }

    pub fn enqueue(&self, order_id: impl Into<String>) {
        self.queue.lock().unwrap().push_back(QueuedOrder { id: order_id.into(), location: None });
    }

    /// Like [`Engine::enqueue`] but attaches the order's pickup location, which the
    /// dispatch engine's dependency uses to score candidate drivers (§4.5).
    pub fn enqueue_at(&self, order_id: impl Into<String>, location: (f64, f64)) {
        self.queue.lock().unwrap().push_back(QueuedOrder { id: order_id.into(), location: Some(location) });
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn status(self: &Arc<Self>) -> EngineStatus {
        EngineStatus {
            name: self.name,
            state: if self.running.load(Ordering::SeqCst) { EngineRunState::Running } else { EngineRunState::Stopped },
            degraded: self.degraded.is_degraded(),
            effective_concurrency: self.degraded.concurrency(),
        }
    }

    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move { engine.run().await });
        *self.handle.lock().unwrap() = Some(handle);
        self.hub.publish(EventKind::EngineStarted { engine: self.name.as_str().to_string() });
        info!(engine = self.name.as_str(), "engine started");
    }

    pub async fn stop(self: &Arc<Self>) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_one();
        let handle = self.handle.lock().unwrap().take();
        if let Some(h) = handle {
            let _ = h.await;
        }
        self.hub.publish(EventKind::EngineStopped { engine: self.name.as_str().to_string() });
        info!(engine = self.name.as_str(), "engine stopped");
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.tick_ms.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = self.shutdown.notified() => {
                    break;
                }
            }
        }
    }

    async fn tick(self: &Arc<Self>) {
        if !self.breaker.is_healthy() {
            return;
        }

        let budget = self.degraded.concurrency();
        let mut batch = Vec::with_capacity(budget);
        {
            let mut queue = self.queue.lock().unwrap();
            for _ in 0..budget {
                match queue.pop_front() {
                    Some(id) => batch.push(id),
                    None => break,
                }
            }
        }
        if batch.is_empty() {
            return;
        }

        let job_id = format!("{}-{}", self.name.as_str(), self.registry.running_count(self.name.job_kind()));
        self.registry.start(Job {
            id: job_id.clone(),
            kind: self.name.job_kind(),
            params: serde_json::json!({ "order_count": batch.len() }),
            status: JobStatus::Running,
            started_at: std::time::Instant::now(),
            ended_at: None,
            result: None,
            error: None,
        });

        let mut handles = Vec::with_capacity(batch.len());
        for order in batch {
            let dependency = Arc::clone(&self.dependency);
            let payload = match order.location {
                Some((lat, lng)) => serde_json::json!({ "order_id": order.id, "location": [lat, lng] }),
                None => serde_json::json!({ "order_id": order.id }),
            };
            handles.push(tokio::spawn(async move { dependency.call(payload).await }));
        }

        let mut outcome = TickOutcome::default();
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => {
                    outcome.succeeded += 1;
                    self.breaker.record_success();
                }
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    self.breaker.record_failure();
                    warn!(engine = self.name.as_str(), error = %e, "order processing failed");
                }
                Err(join_err) => {
                    outcome.failed += 1;
                    self.breaker.record_failure();
                    warn!(engine = self.name.as_str(), error = %join_err, "order processing task panicked");
                }
            }
        }

        self.hub.publish(EventKind::EngineTick { engine: self.name.as_str().to_string(), succeeded: outcome.succeeded, failed: outcome.failed });

        let transitioned = self.degraded.record_tick(outcome);
        if transitioned {
            if self.degraded.is_degraded() {
                self.hub.publish(EventKind::EngineDegraded { engine: self.name.as_str().to_string() });
                warn!(engine = self.name.as_str(), "engine entering degraded mode, concurrency halved");
            } else {
                self.hub.publish(EventKind::EngineRecovered { engine: self.name.as_str().to_string() });
                info!(engine = self.name.as_str(), "engine recovered from degraded mode");
            }
        }

        let status = if outcome.failed == 0 { JobStatus::Completed } else { JobStatus::Failed };
        let error = if outcome.failed > 0 { Some(format!("{} of {} orders failed", outcome.failed, outcome.succeeded + outcome.failed)) } else { None };
        self.registry.finish(&job_id, status, Some(serde_json::json!({"succeeded": outcome.succeeded, "failed": outcome.failed})), error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_tracker_halves_after_two_bad_ticks() {
        let tracker = DegradedTracker::new(8);
        assert!(!tracker.record_tick(TickOutcome { succeeded: 0, failed: 10 }));
        assert!(tracker.record_tick(TickOutcome { succeeded: 0, failed: 10 }));
        assert!(tracker.is_degraded());
        assert_eq!(tracker.concurrency(), 4);
    }

    #[test]
    fn degraded_tracker_recovers_after_ten_good_ticks() {
        let tracker = DegradedTracker::new(8);
        tracker.record_tick(TickOutcome { succeeded: 0, failed: 10 });
        tracker.record_tick(TickOutcome { succeeded: 0, failed: 10 });
        assert!(tracker.is_degraded());

        for _ in 0..9 {
            assert!(!tracker.record_tick(TickOutcome { succeeded: 10, failed: 0 }));
        }
        assert!(tracker.record_tick(TickOutcome { succeeded: 10, failed: 0 }));
        assert!(!tracker.is_degraded());
        assert_eq!(tracker.concurrency(), 8);
    }

    #[tokio::test]
    async fn engine_processes_queued_orders_and_marks_job_complete() {
        use crate::config::EngineConfig;
        use crate::deps::MockDependency;

        let engine = Engine::new(
            EngineName::Dispatch,
            EngineConfig { tick_ms: 10_000, concurrency: 4, enabled: true },
            Arc::new(MockDependency { name: "advisor".to_string(), succeed: true }),
            Arc::new(CircuitBreaker::new("advisor", crate::config::BreakerConfig::default())),
            Arc::new(JobRegistry::new()),
            Arc::new(EventHub::new()),
        );

        engine.enqueue("order-1");
        engine.enqueue("order-2");
        engine.tick().await;

        let history = engine.registry.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, JobStatus::Completed);
        assert_eq!(engine.queue_len(), 0);
    }
}
