//! Closed tagged error kinds surfaced by the core (spec §7).
//!
//! Per-delivery failure reasons (`no_feasible_vehicle`, `capacity_exceeded`, ...) are not
//! modelled here — they are data attached to [`crate::domain::route::UnserviceableDelivery`],
//! not `Result` errors, since the coordinator recovers them locally and reports them in the
//! result envelope rather than failing the call.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("optimization failed in phase '{phase}': {message}")]
    OptimizationFailed { phase: String, message: String },

    #[error("deadline exceeded in phase '{phase}' after {elapsed_ms}ms")]
    Timeout { phase: String, elapsed_ms: u64 },

    #[error("circuit breaker '{name}' is open")]
    BreakerOpen { name: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
