//! Assignment priority scoring used by the dispatch engine (spec §4.5), disjoint from
//! the clusterer's F1-F5 factors — this scores a driver against one open order, not a
//! vehicle against a pickup group.

use std::time::{Duration, Instant};

use tracing::info;

use crate::config::DriverConfig;
use crate::deps::ExternalDependency;
use crate::domain::driver::{DriverRegistry, DriverState, DriverStateKind};
use crate::error::CoreResult;
use crate::geo::haversine_km;

/// `stateFactor + distanceFactor + ratingFactor + targetGapFactor`, clamped into [0, 100].
fn score(driver: &DriverState, dist_km: f64, max_dist_km: f64, target_deliveries: u32) -> f64 {
    let state_factor = match driver.state {
        DriverStateKind::Available => 40.0,
        DriverStateKind::Returning => 20.0,
        _ => 0.0,
    };
    let distance_factor = 30.0 * (1.0 - dist_km / max_dist_km.max(1e-6)).max(0.0);
    let rating_factor = (driver.rating / 5.0) * 15.0;
    let gap = target_deliveries.saturating_sub(driver.completed_today) as f64;
    let target_gap_factor = (gap * 2.0).min(15.0);
    state_factor + distance_factor + rating_factor + target_gap_factor
}

/// Picks the best-scoring driver passing the §4.5 `canAccept` guard for an order at
/// `order_location`, or `None` if no candidate qualifies (the order stays `pending`).
/// Ties are broken by the lower `driver_id`, matching the clusterer's tie-break style.
pub fn select_driver(
    order_location: (f64, f64),
    candidates: &[DriverState],
    now: Instant,
    config: &DriverConfig,
    max_dist_km: f64,
) -> Option<String> {
    let location_freshness = Duration::from_secs(config.location_freshness_sec);

    let mut best: Option<(f64, &DriverState)> = None;
    for driver in candidates {
        if !driver.can_accept(now, config.max_working_hours, config.break_threshold, config.target_deliveries, location_freshness) {
            continue;
        }
        let dist_km = haversine_km(order_location.0, order_location.1, driver.last_location.0, driver.last_location.1);
        let candidate_score = score(driver, dist_km, max_dist_km, config.target_deliveries);

        best = match best {
            None => Some((candidate_score, driver)),
            Some((best_score, best_driver)) => {
                if candidate_score > best_score
                    || (candidate_score == best_score && driver.driver_id < best_driver.driver_id)
                {
                    Some((candidate_score, driver))
                } else {
                    Some((best_score, best_driver))
                }
            }
        };
    }

    best.map(|(_, driver)| driver.driver_id.clone())
}

/// The dispatch engine's per-order work item (§4.7): picks a driver passing the §4.5
/// guard and transitions it `available -> busy`. Implements [`ExternalDependency`] so
/// it plugs into the generic [`crate::engines::Engine`] tick loop like the HTTP-backed
/// dependencies do, even though this one never leaves the process.
pub struct DispatchDependency {
    pub name: String,
    pub drivers: DriverRegistry,
    pub config: DriverConfig,
    pub max_dist_km: f64,
}

#[async_trait::async_trait]
impl ExternalDependency for DispatchDependency {
    fn name(&self) -> &str {
        &self.name
    }

    /// Orders without a `location` (queued through [`crate::engines::Engine::enqueue`]
    /// rather than `enqueue_at`) are treated as already-handled — this dependency only
    /// makes assignment decisions for location-carrying orders.
    async fn call(&self, payload: serde_json::Value) -> CoreResult<serde_json::Value> {
        let order_id = payload["order_id"].as_str().unwrap_or_default().to_string();
        let Some(location) = payload["location"].as_array().filter(|a| a.len() == 2) else {
            return Ok(serde_json::json!({ "order_id": order_id, "assigned": false, "reason": "no_location" }));
        };
        let order_location = (location[0].as_f64().unwrap_or_default(), location[1].as_f64().unwrap_or_default());

        let candidates = self.drivers.snapshot();
        let now = Instant::now();
        match select_driver(order_location, &candidates, now, &self.config, self.max_dist_km) {
            Some(driver_id) => {
                let _ = self.drivers.transition(
                    &driver_id,
                    DriverStateKind::Available,
                    DriverStateKind::Busy,
                    now,
                    |state| state.active_delivery_id = Some(order_id.clone()),
                );
                info!(order_id, driver_id, "order assigned to driver");
                Ok(serde_json::json!({ "order_id": order_id, "assigned": true, "driver_id": driver_id }))
            }
            None => {
                info!(order_id, "no driver available, order stays pending");
                Ok(serde_json::json!({ "order_id": order_id, "assigned": false, "reason": "no_driver_available" }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available_driver(id: &str, location: (f64, f64), rating: f64, completed_today: u32) -> DriverState {
        let mut d = DriverState::new(id, location, Instant::now());
        d.state = DriverStateKind::Available;
        d.rating = rating;
        d.completed_today = completed_today;
        d
    }

    #[test]
    fn picks_closest_available_driver() {
        let config = DriverConfig::default();
        let near = available_driver("near", (1.0, 1.0), 5.0, 0);
        let far = available_driver("far", (2.0, 2.0), 5.0, 0);
        let picked = select_driver((1.0, 1.0), &[far, near], Instant::now(), &config, 200.0);
        assert_eq!(picked.as_deref(), Some("near"));
    }

    #[test]
    fn excludes_drivers_failing_can_accept() {
        let config = DriverConfig::default();
        let mut offline = available_driver("offline", (1.0, 1.0), 5.0, 0);
        offline.state = DriverStateKind::Offline;
        let picked = select_driver((1.0, 1.0), &[offline], Instant::now(), &config, 200.0);
        assert_eq!(picked, None);
    }

    #[test]
    fn ties_break_by_lower_driver_id() {
        let config = DriverConfig::default();
        let a = available_driver("b-driver", (1.0, 1.0), 5.0, 0);
        let b = available_driver("a-driver", (1.0, 1.0), 5.0, 0);
        let picked = select_driver((1.0, 1.0), &[a, b], Instant::now(), &config, 200.0);
        assert_eq!(picked.as_deref(), Some("a-driver"));
    }

    #[test]
    fn no_candidates_returns_none() {
        let config = DriverConfig::default();
        let picked = select_driver((1.0, 1.0), &[], Instant::now(), &config, 200.0);
        assert_eq!(picked, None);
    }

    #[tokio::test]
    async fn dependency_assigns_available_driver_and_transitions_busy() {
        let drivers = DriverRegistry::new();
        drivers.upsert(available_driver("d1", (1.0, 1.0), 5.0, 0));
        let dep = DispatchDependency { name: "dispatch".to_string(), drivers: drivers.clone(), config: DriverConfig::default(), max_dist_km: 200.0 };

        let result = dep.call(serde_json::json!({ "order_id": "order-1", "location": [1.0, 1.0] })).await.unwrap();
        assert_eq!(result["assigned"], true);
        assert_eq!(result["driver_id"], "d1");
        assert_eq!(drivers.get("d1").unwrap().state, DriverStateKind::Busy);
    }

    #[tokio::test]
    async fn dependency_reports_no_driver_available() {
        let drivers = DriverRegistry::new();
        let dep = DispatchDependency { name: "dispatch".to_string(), drivers, config: DriverConfig::default(), max_dist_km: 200.0 };

        let result = dep.call(serde_json::json!({ "order_id": "order-1", "location": [1.0, 1.0] })).await.unwrap();
        assert_eq!(result["assigned"], false);
        assert_eq!(result["reason"], "no_driver_available");
    }
}
