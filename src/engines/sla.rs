//! SLA escalation engine: flags deliveries approaching their service-level deadline on
//! a fast tick, tracked under [`crate::domain::job::JobKind::Sla`] (§4.9).

use std::sync::Arc;

use super::{Engine, EngineName};
use crate::breaker::CircuitBreaker;
use crate::config::EngineConfig;
use crate::deps::ExternalDependency;
use crate::events::EventHub;
use crate::registry::JobRegistry;

pub fn build(
    config: EngineConfig,
    dependency: Arc<dyn ExternalDependency>,
    breaker: Arc<CircuitBreaker>,
    registry: Arc<JobRegistry>,
    hub: Arc<EventHub>,
) -> Arc<Engine> {
    Engine::new(EngineName::Sla, config, dependency, breaker, registry, hub)
}
