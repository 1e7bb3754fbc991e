//! SLA band tracking for the SLA escalation engine (C10, spec §4.7): remembers the
//! last published band per order so each transition is published exactly once, the
//! same one-shot-per-transition shape as the breaker's `breaker_opened`/`breaker_recovered`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::sla::{evaluate, SlaBand};
use crate::events::{EventHub, EventKind};

pub struct SlaTracker {
    hub: Arc<EventHub>,
    imminent_band_min: f64,
    last_band: Mutex<HashMap<String, SlaBand>>,
}

impl SlaTracker {
    pub fn new(hub: Arc<EventHub>, imminent_band_min: f64) -> Self {
        SlaTracker { hub, imminent_band_min, last_band: Mutex::new(HashMap::new()) }
    }

    /// Evaluates the current band for `order_id` and publishes `SlaBreachImminent` or
    /// `SlaBreachConfirmed` only on the transition into that band, not on every tick.
    pub fn check(
        &self,
        order_id: &str,
        driver_id: Option<&str>,
        deadline_min: f64,
        now_min: f64,
        estimated_remaining_min: f64,
    ) -> SlaBand {
        let (band, time_remaining_min) = evaluate(deadline_min, now_min, estimated_remaining_min, self.imminent_band_min);

        let mut last = self.last_band.lock().unwrap();
        let previous = last.insert(order_id.to_string(), band);
        if previous != Some(band) {
            match band {
                SlaBand::Imminent => self.hub.publish(EventKind::SlaBreachImminent {
                    order_id: order_id.to_string(),
                    driver_id: driver_id.map(str::to_string),
                    time_remaining_min,
                }),
                SlaBand::Confirmed => self.hub.publish(EventKind::SlaBreachConfirmed {
                    order_id: order_id.to_string(),
                    driver_id: driver_id.map(str::to_string),
                    time_remaining_min,
                }),
                SlaBand::Ok => {}
            }
        }
        band
    }

    /// Drops tracking state for an order once it's delivered or cancelled.
    pub fn forget(&self, order_id: &str) {
        self.last_band.lock().unwrap().remove(order_id);
    }
}
