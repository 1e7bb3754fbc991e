//! Engine supervisor (C11, spec §4.10): owns the four automation engines, starts and
//! stops them individually or in bulk, and reports per-engine status.

use std::sync::Arc;

use crate::breaker::CircuitBreaker;
use crate::config::Config;
use crate::deps::ExternalDependency;
use crate::dispatch_assignment::DispatchDependency;
use crate::domain::driver::DriverRegistry;
use crate::events::EventHub;
use crate::registry::JobRegistry;

use super::{batching, dispatch, route_reopt, sla, Engine, EngineName, EngineStatus};

/// Assignment-scoring `maxDist` normaliser (§4.5) — not pinned by the spec, chosen to
/// match the ~40 km bounding boxes the testable-properties scenarios use.
const MAX_DISPATCH_DIST_KM: f64 = 50.0;

pub struct Supervisor {
    dispatch: Arc<Engine>,
    batching: Arc<Engine>,
    route_reopt: Arc<Engine>,
    sla: Arc<Engine>,
}

impl Supervisor {
    /// `advisor` and `store` are the two shared external dependencies the batching,
    /// route-reopt, and SLA engines' per-order calls go through (§6); the dispatch
    /// engine instead resolves assignments locally against `drivers` (§4.5). Each
    /// engine gets its own breaker instance so one engine's failures don't trip another's.
    pub fn new(
        config: &Config,
        advisor: Arc<dyn ExternalDependency>,
        store: Arc<dyn ExternalDependency>,
        drivers: DriverRegistry,
        hub: Arc<EventHub>,
    ) -> Supervisor {
        let registry = Arc::new(JobRegistry::new());

        let dispatch_dependency: Arc<dyn ExternalDependency> = Arc::new(DispatchDependency {
            name: "dispatch".to_string(),
            drivers,
            config: config.driver.clone(),
            max_dist_km: MAX_DISPATCH_DIST_KM,
        });

        Supervisor {
            dispatch: dispatch::build(
                config.dispatch.clone(),
                dispatch_dependency,
                Arc::new(CircuitBreaker::new("dispatch", config.breaker("dispatch"))),
                Arc::clone(&registry),
                Arc::clone(&hub),
            ),
            batching: batching::build(
                config.batching.clone(),
                Arc::clone(&store),
                Arc::new(CircuitBreaker::new("batching", config.breaker("batching"))),
                Arc::clone(&registry),
                Arc::clone(&hub),
            ),
            route_reopt: route_reopt::build(
                config.route_reopt.clone(),
                Arc::clone(&advisor),
                Arc::new(CircuitBreaker::new("route_reopt", config.breaker("route_reopt"))),
                Arc::clone(&registry),
                Arc::clone(&hub),
            ),
            sla: sla::build(
                config.sla.clone(),
                Arc::clone(&store),
                Arc::new(CircuitBreaker::new("sla", config.breaker("sla"))),
                Arc::clone(&registry),
                Arc::clone(&hub),
            ),
        }
    }

    fn engine(&self, name: EngineName) -> &Arc<Engine> {
        match name {
            EngineName::Dispatch => &self.dispatch,
            EngineName::Batching => &self.batching,
            EngineName::RouteReopt => &self.route_reopt,
            EngineName::Sla => &self.sla,
        }
    }

    pub fn start(&self, name: EngineName) {
        self.engine(name).start();
    }

    pub async fn stop(&self, name: EngineName) {
        self.engine(name).stop().await;
    }

    pub fn start_all(&self) {
        for name in [EngineName::Dispatch, EngineName::Batching, EngineName::RouteReopt, EngineName::Sla] {
            self.engine(name).start();
        }
    }

    /// Stops every engine, collecting the name of any engine whose shutdown join
    /// failed rather than aborting the rest — a partial failure here shouldn't strand
    /// the remaining engines running (§4.10).
    pub async fn stop_all(&self) -> Vec<EngineName> {
        let mut failures = Vec::new();
        for name in [EngineName::Dispatch, EngineName::Batching, EngineName::RouteReopt, EngineName::Sla] {
            let engine = Arc::clone(self.engine(name));
            let before = engine.status().state;
            engine.stop().await;
            if before == super::EngineRunState::Running && engine.status().state == super::EngineRunState::Running {
                failures.push(name);
            }
        }
        failures
    }

    pub fn status_all(&self) -> Vec<EngineStatus> {
        [EngineName::Dispatch, EngineName::Batching, EngineName::RouteReopt, EngineName::Sla]
            .into_iter()
            .map(|name| self.engine(name).status())
            .collect()
    }

    pub fn enqueue(&self, name: EngineName, order_id: impl Into<String>) {
        self.engine(name).enqueue(order_id);
    }

    pub fn enqueue_at(&self, name: EngineName, order_id: impl Into<String>, location: (f64, f64)) {
        self.engine(name).enqueue_at(order_id, location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::MockDependency;

    #[tokio::test]
    async fn start_all_then_stop_all_reports_no_failures() {
        let config = Config::default();
        let hub = Arc::new(EventHub::new());
        let advisor: Arc<dyn ExternalDependency> = Arc::new(MockDependency { name: "advisor".to_string(), succeed: true });
        let store: Arc<dyn ExternalDependency> = Arc::new(MockDependency { name: "store".to_string(), succeed: true });
        let supervisor = Supervisor::new(&config, advisor, store, DriverRegistry::new(), hub);

        supervisor.start_all();
        for status in supervisor.status_all() {
            assert_eq!(status.state, super::super::EngineRunState::Running);
        }

        let failures = supervisor.stop_all().await;
        assert!(failures.is_empty());
    }
}
