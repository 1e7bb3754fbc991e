//! Driver state machine and the shared, arena-style driver registry (spec §3, §4.5, §5).
//!
//! Design note (spec §9): the source's driver↔assignment↔route back-references are
//! replaced here with a flat registry keyed by stable driver IDs; callers hold IDs and
//! look state up through [`DriverRegistry`] rather than holding direct references.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStateKind {
    Offline,
    Available,
    Busy,
    Returning,
    OnBreak,
}

#[derive(Debug, Clone)]
pub struct DriverState {
    pub driver_id: String,
    pub state: DriverStateKind,
    pub active: bool,
    pub active_delivery_id: Option<String>,
    pub consecutive_deliveries: u32,
    pub completed_today: u32,
    pub hours_worked_today: f64,
    pub last_location: (f64, f64),
    pub last_location_update: Instant,
    pub state_since: Instant,
    pub rating: f64,
}

impl DriverState {
    pub fn new(driver_id: impl Into<String>, location: (f64, f64), now: Instant) -> Self {
        DriverState {
            driver_id: driver_id.into(),
            state: DriverStateKind::Offline,
            active: true,
            active_delivery_id: None,
            consecutive_deliveries: 0,
            completed_today: 0,
            hours_worked_today: 0.0,
            last_location: location,
            last_location_update: now,
            state_since: now,
            rating: 5.0,
        }
    }

    /// `available ⟺ active ∧ state=available ∧ hours<max ∧ consecutive<breakThreshold ∧
    /// completed<target ∧ locationFresh` (§4.5 `canAccept`).
    pub fn can_accept(
        &self,
        now: Instant,
        max_working_hours: f64,
        break_threshold: u32,
        target_deliveries: u32,
        location_freshness: Duration,
    ) -> bool {
        self.active
            && self.state == DriverStateKind::Available
            && self.hours_worked_today < max_working_hours
            && self.consecutive_deliveries < break_threshold
            && self.completed_today < target_deliveries
            && now.saturating_duration_since(self.last_location_update) < location_freshness
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// The caller's expected previous state didn't match the registry's current state —
    /// another engine already raced this driver.
    StaleRead,
    /// The transition itself is not one of §4.5's listed edges.
    IllegalTransition,
    NotFound,
}

/// Process-long, shared registry of driver states. The only way to mutate an entry is
/// [`DriverRegistry::transition`], which takes a compare-and-swap on the previous state
/// so that two engines racing to assign the same driver cannot both succeed (§5).
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    inner: Arc<Mutex<HashMap<String, DriverState>>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        DriverRegistry {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn upsert(&self, state: DriverState) {
        self.inner.lock().unwrap().insert(state.driver_id.clone(), state);
    }

    pub fn get(&self, driver_id: &str) -> Option<DriverState> {
        self.inner.lock().unwrap().get(driver_id).cloned()
    }

    pub fn snapshot(&self) -> Vec<DriverState> {
        self.inner.lock().unwrap().values().cloned().collect()
    }

    /// Attempt `from -> to`. Fails with [`TransitionError::StaleRead`] if the driver's
    /// current state no longer matches `from`, and with
    /// [`TransitionError::IllegalTransition`] if `from -> to` is not one of §4.5's edges.
    pub fn transition(
        &self,
        driver_id: &str,
        from: DriverStateKind,
        to: DriverStateKind,
        now: Instant,
        mutate: impl FnOnce(&mut DriverState),
    ) -> Result<(), TransitionError> {
        if !is_legal_edge(from, to) {
            return Err(TransitionError::IllegalTransition);
        }

        let mut guard = self.inner.lock().unwrap();
        let entry = guard.get_mut(driver_id).ok_or(TransitionError::NotFound)?;
        if entry.state != from {
            return Err(TransitionError::StaleRead);
        }

        mutate(entry);
        entry.state = to;
        entry.state_since = now;
        Ok(())
    }
}

fn is_legal_edge(from: DriverStateKind, to: DriverStateKind) -> bool {
    use DriverStateKind::*;
    matches!(
        (from, to),
        (Offline, Available)
            | (Available, Busy)
            | (Busy, Available)
            | (Busy, Returning)
            | (Returning, Available)
            | (Available, OnBreak)
            | (Returning, OnBreak)
            | (OnBreak, Available)
            | (Offline, Offline)
            | (Available, Offline)
            | (Busy, Offline)
            | (Returning, Offline)
            | (OnBreak, Offline)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_rejects_stale_location() {
        let now = Instant::now();
        let mut d = DriverState::new("d1", (1.0, 1.0), now - Duration::from_secs(600));
        d.state = DriverStateKind::Available;
        d.last_location_update = now - Duration::from_secs(600);
        assert!(!d.can_accept(now, 10.0, 5, 20, Duration::from_secs(300)));
    }

    #[test]
    fn guard_accepts_fresh_available_driver() {
        let now = Instant::now();
        let mut d = DriverState::new("d1", (1.0, 1.0), now);
        d.state = DriverStateKind::Available;
        assert!(d.can_accept(now, 10.0, 5, 20, Duration::from_secs(300)));
    }

    #[test]
    fn transition_rejects_illegal_edge() {
        let reg = DriverRegistry::new();
        reg.upsert(DriverState::new("d1", (0.0, 0.0), Instant::now()));
        let err = reg
            .transition(
                "d1",
                DriverStateKind::OnBreak,
                DriverStateKind::Busy,
                Instant::now(),
                |_| {},
            )
            .unwrap_err();
        assert_eq!(err, TransitionError::IllegalTransition);
    }

    #[test]
    fn transition_rejects_stale_read() {
        let reg = DriverRegistry::new();
        let mut d = DriverState::new("d1", (0.0, 0.0), Instant::now());
        d.state = DriverStateKind::Available;
        reg.upsert(d);

        let err = reg
            .transition(
                "d1",
                DriverStateKind::Offline,
                DriverStateKind::Available,
                Instant::now(),
                |_| {},
            )
            .unwrap_err();
        assert_eq!(err, TransitionError::StaleRead);
    }

    #[test]
    fn legal_transition_succeeds_and_updates_state() {
        let reg = DriverRegistry::new();
        let mut d = DriverState::new("d1", (0.0, 0.0), Instant::now());
        d.state = DriverStateKind::Available;
        reg.upsert(d);

        reg.transition(
            "d1",
            DriverStateKind::Available,
            DriverStateKind::Busy,
            Instant::now(),
            |s| s.active_delivery_id = Some("order-1".into()),
        )
        .unwrap();

        let updated = reg.get("d1").unwrap();
        assert_eq!(updated.state, DriverStateKind::Busy);
        assert_eq!(updated.active_delivery_id.as_deref(), Some("order-1"));
    }
}
