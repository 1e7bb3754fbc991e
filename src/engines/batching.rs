//! Batching engine: groups compatible pending orders onto shared routes on a medium
//! tick, tracked under [`crate::domain::job::JobKind::Demand`] (§4.9).

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
    Engine::new(EngineName::Batching, config, dependency, breaker, registry, hub)
}
