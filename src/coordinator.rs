//! Optimization coordinator (C7, spec §4.6): orchestrates validate -> matrix -> cluster
//! -> sequence -> distribute -> summarize, timing each phase and enforcing the overall
//! deadline.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::breaker::CircuitBreaker;
use crate::cluster::{self, ClusterState};
use crate::distribute::distribute_group;
use crate::domain::cluster::Cluster;
use crate::domain::point::{DeliveryPoint, PointKind};
use crate::domain::route::{
    ClusteringMetadata, OptimizationResult, Route, Summary, UnserviceableDelivery, UnserviceableReason, Waypoint,
};
use crate::error::{CoreError, CoreResult};
use crate::matrix::{default_speed_factors, duration_min, CostMatrix};
use crate::sequence;
use crate::validate::{self, OptimizationRequest, ValidatedRequest};

/// Runs one end-to-end optimization, enforcing `timeout` as a wall-clock deadline across
/// every phase (§4.6, §7 `Timeout`). `now_minute` is the minute-of-day used to evaluate
/// restricted-zone active windows.
pub fn optimize(
    request_id: &str,
    request: &OptimizationRequest,
    timeout: Duration,
    now_minute: u16,
) -> CoreResult<OptimizationResult> {
    let start = Instant::now();
    let mut timings = HashMap::new();

    let phase_start = Instant::now();
    let validated = validate::validate(request)?;
    timings.insert("validate".to_string(), phase_start.elapsed().as_millis() as u64);
    check_deadline(&start, timeout, "validate")?;

    let phase_start = Instant::now();
    let coords = cluster::point_coords(&validated.pickups, &validated.deliveries);
    let dm = CostMatrix::build(&coords);
    timings.insert("matrix".to_string(), phase_start.elapsed().as_millis() as u64);
    check_deadline(&start, timeout, "matrix")?;

    let (clusters, mut unserviceable, cluster_ms, distribute_ms) = cluster_and_distribute(&validated, &dm, &coords, now_minute);
    timings.insert("cluster".to_string(), cluster_ms);
    timings.insert("distribute".to_string(), distribute_ms);
    check_deadline(&start, timeout, "distribute")?;

    let phase_start = Instant::now();
    let speed_factors = default_speed_factors();
    let mut routes = Vec::with_capacity(clusters.len());
    for (route_index, cluster) in clusters.into_iter().enumerate() {
        let (route, reclassified) = sequence_cluster(route_index, cluster, &dm, &coords, &speed_factors, now_minute);
        unserviceable.extend(reclassified);
        routes.push(route);
    }
    timings.insert("sequence".to_string(), phase_start.elapsed().as_millis() as u64);
    check_deadline(&start, timeout, "sequence")?;

    let phase_start = Instant::now();
    let summary = summarize(&routes, &unserviceable);
    timings.insert("summarize".to_string(), phase_start.elapsed().as_millis() as u64);

    let result = OptimizationResult {
        request_id: request_id.to_string(),
        routes,
        summary,
        unserviceable,
        timings,
    };

    if result.delivery_count_covered() != validated.deliveries.len() {
        return Err(CoreError::OptimizationFailed {
            phase: "summarize".to_string(),
            message: "delivery coverage invariant violated".to_string(),
        });
    }

    info!(
        request_id,
        routes = result.routes.len(),
        unserviceable = result.unserviceable.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "optimize complete"
    );

    Ok(result)
}

/// Wraps [`optimize`] behind a circuit breaker, so repeated optimizer failures open the
/// breaker instead of every caller eating the same latency/error (§4.6, §4.7).
pub fn optimize_guarded(
    breaker: &CircuitBreaker,
    request_id: &str,
    request: &OptimizationRequest,
    timeout: Duration,
    now_minute: u16,
) -> CoreResult<OptimizationResult> {
    if !breaker.is_healthy() {
        return Err(CoreError::BreakerOpen { name: breaker.name().to_string() });
    }

    match optimize(request_id, request, timeout, now_minute) {
        Ok(result) => {
            breaker.record_success();
            Ok(result)
        }
        Err(e) => {
            breaker.record_failure();
            Err(e)
        }
    }
}

fn check_deadline(start: &Instant, timeout: Duration, phase: &str) -> CoreResult<()> {
    let elapsed = start.elapsed();
    if elapsed > timeout {
        return Err(CoreError::Timeout { phase: phase.to_string(), elapsed_ms: elapsed.as_millis() as u64 });
    }
    Ok(())
}

/// Ranks and distributes every pickup group, separately accounting the time spent
/// ranking (§4.3, the "cluster" phase) from the time spent committing deliveries to
/// vehicles (§4.5, the "distribute" phase) even though the two interleave per group —
/// `distribute_group`'s mutation of `state` is what the next group's ranking reads for
/// "existing route compatibility", so the phases can't run as two independent passes.
fn cluster_and_distribute(
    validated: &ValidatedRequest,
    dm: &CostMatrix,
    coords: &[(f64, f64)],
    now_minute: u16,
) -> (Vec<Cluster>, Vec<UnserviceableDelivery>, u64, u64) {
    let groups = cluster::assign::assign_pickups(&validated.pickups, &validated.deliveries, dm);
    let pickup_count = validated.pickups.len();
    let mut state = ClusterState::new();
    let mut clusters = Vec::new();
    let mut unserviceable = Vec::new();
    let mut cluster_elapsed = Duration::ZERO;
    let mut distribute_elapsed = Duration::ZERO;

    for group in groups {
        if group.delivery_indices.is_empty() {
            continue;
        }
        let pickup = &validated.pickups[group.pickup_index];

        let cluster_start = Instant::now();
        let group_load_kg: f64 =
            group.delivery_indices.iter().map(|&i| validated.deliveries[i - pickup_count].weight_kg).sum();
        let ranked = cluster::rank_for_group(
            group.pickup_index,
            &group.delivery_indices,
            coords,
            &validated.fleet,
            dm,
            &state,
            &validated.weights,
            group_load_kg,
        );
        cluster_elapsed += cluster_start.elapsed();

        let deliveries: Vec<(usize, DeliveryPoint)> = group
            .delivery_indices
            .iter()
            .map(|&i| (i, validated.deliveries[i - pickup_count].clone()))
            .collect();

        let distribute_start = Instant::now();
        let (group_clusters, group_unserviceable) = distribute_group(
            group.pickup_index,
            pickup,
            &deliveries,
            &ranked,
            &validated.fleet,
            validated.distribution,
            &validated.business_rules.restricted_zones,
            now_minute,
            &mut state,
        );
        distribute_elapsed += distribute_start.elapsed();

        clusters.extend(group_clusters);
        unserviceable.extend(group_unserviceable);
    }

    (clusters, unserviceable, cluster_elapsed.as_millis() as u64, distribute_elapsed.as_millis() as u64)
}

/// Sequences one committed cluster into a [`Route`], then reconciles each delivery's
/// computed ETA against its time window — only now knowable, since ETA depends on
/// sequencing order (§4.4, §4.6). Violations are pulled back out as unserviceable.
fn sequence_cluster(
    route_index: usize,
    cluster: Cluster,
    dm: &CostMatrix,
    coords: &[(f64, f64)],
    speed_factors: &HashMap<crate::domain::point::VehicleKind, f64>,
    now_minute: u16,
) -> (Route, Vec<UnserviceableDelivery>) {
    // Recover the pickup's global index by coordinate match (cheap at this scale; the
    // cluster carries the resolved Point but not its matrix index).
    let pickup_idx = coords
        .iter()
        .position(|&c| c == (cluster.pickup.lat, cluster.pickup.lng))
        .unwrap_or(0);

    let delivery_refs: Vec<(usize, &DeliveryPoint)> = cluster
        .deliveries
        .iter()
        .map(|d| {
            let idx = coords.iter().position(|&c| c == (d.point.lat, d.point.lng)).unwrap_or(0);
            (idx, d)
        })
        .collect();

    let order = sequence::sequence(pickup_idx, &delivery_refs, dm);

    let mut waypoints = vec![Waypoint {
        point_ref: cluster.pickup.id.clone(),
        kind: PointKind::Pickup,
        eta_min: Some(0.0),
        time_window: None,
    }];

    let mut reclassified = Vec::new();
    let mut total_distance_km = 0.0;
    let mut total_duration_min = 0.0;
    let mut prev = pickup_idx;
    let mut eta = 0.0f64;
    let mut kept_deliveries: Vec<DeliveryPoint> = Vec::new();

    for idx in order {
        let delivery = cluster
            .deliveries
            .iter()
            .find(|d| coords.iter().position(|&c| c == (d.point.lat, d.point.lng)) == Some(idx))
            .expect("sequenced index maps back to a cluster delivery")
            .clone();

        let leg_km = dm.get(prev, idx);
        let leg_min = duration_min(leg_km, cluster.vehicle.kind, speed_factors);
        eta += leg_min;

        if let Some(window) = delivery.time_window {
            let eta_minute = ((now_minute as f64 + eta) as u16) % (24 * 60);
            if !window.contains(eta_minute) {
                reclassified.push(UnserviceableDelivery { delivery: delivery.clone(), reason: UnserviceableReason::TimeWindowConflict });
                prev = idx;
                continue;
            }
        }

        total_distance_km += leg_km;
        total_duration_min += leg_min;
        waypoints.push(Waypoint {
            point_ref: delivery.point.id.clone(),
            kind: PointKind::Delivery,
            eta_min: Some(eta),
            time_window: delivery.time_window,
        });
        kept_deliveries.push(delivery);
        prev = idx;
    }

    let load_kg: f64 = kept_deliveries.iter().map(|d| d.weight_kg).sum();
    let delivery_coords: Vec<(f64, f64)> = kept_deliveries.iter().map(|d| (d.point.lat, d.point.lng)).collect();
    let cluster_density = crate::geo::avg_distance_from_centroid(&delivery_coords);

    let route = Route {
        id: format!("route-{route_index}"),
        vehicle: cluster.vehicle,
        waypoints,
        total_distance_km,
        total_duration_min,
        load_kg,
        clustering_metadata: ClusteringMetadata { avg_score: cluster.score, cluster_density },
    };

    if !reclassified.is_empty() {
        warn!(route_id = %route.id, reclassified = reclassified.len(), "deliveries pulled from route on ETA/window conflict");
    }

    (route, reclassified)
}

fn summarize(routes: &[Route], unserviceable: &[UnserviceableDelivery]) -> Summary {
    let route_count = routes.len();
    let delivery_count: usize = routes
        .iter()
        .flat_map(|r| r.waypoints.iter())
        .filter(|w| w.kind == PointKind::Delivery)
        .count()
        + unserviceable.len();
    let total_distance_km: f64 = routes.iter().map(|r| r.total_distance_km).sum();
    let total_duration_min: f64 = routes.iter().map(|r| r.total_duration_min).sum();
    let vehicles_used = routes.iter().filter(|r| !r.waypoints.iter().all(|w| w.kind == PointKind::Pickup)).count();

    let avg_deliveries_per_vehicle = if vehicles_used == 0 {
        0.0
    } else {
        (delivery_count - unserviceable.len()) as f64 / vehicles_used as f64
    };
    let avg_load_per_vehicle = if vehicles_used == 0 {
        0.0
    } else {
        routes.iter().map(|r| r.load_kg).sum::<f64>() / vehicles_used as f64
    };

    Summary {
        route_count,
        delivery_count,
        total_distance_km,
        total_duration_min,
        vehicles_used,
        avg_deliveries_per_vehicle,
        avg_load_per_vehicle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{OptimizationRequest, RawBusinessRules, RawContext, RawDeliveryPoint, RawPoint, RawPreferences, RawVehicle};

    fn sample_request() -> OptimizationRequest {
        OptimizationRequest {
            pickup_points: vec![RawPoint { id: "p0".into(), name: None, address: None, lat: 24.70, lng: 46.67 }],
            delivery_points: vec![
                RawDeliveryPoint {
                    id: "d0".into(), name: None, address: None, lat: 24.71, lng: 46.68,
                    weight_kg: 5.0, priority: serde_json::json!(9), time_window: None, pickup_hint: None,
                },
                RawDeliveryPoint {
                    id: "d1".into(), name: None, address: None, lat: 24.72, lng: 46.69,
                    weight_kg: 5.0, priority: serde_json::json!(5), time_window: None, pickup_hint: None,
                },
            ],
            fleet: vec![RawVehicle { id: "v0".into(), kind: "van".into(), capacity_kg: 50.0, start_lat: 24.70, start_lng: 46.67, status: "available".into() }],
            business_rules: RawBusinessRules::default(),
            preferences: RawPreferences::default(),
            context: RawContext::default(),
        }
    }

    #[test]
    fn optimize_covers_every_delivery() {
        let request = sample_request();
        let result = optimize("req-1", &request, Duration::from_secs(5), 9 * 60).expect("optimize should succeed");
        assert_eq!(result.delivery_count_covered(), 2);
        assert_eq!(result.routes.len(), 1);
        assert_eq!(result.routes[0].vehicle.id, "v0");
    }

    #[test]
    fn optimize_rejects_invalid_request() {
        let mut request = sample_request();
        request.fleet.clear();
        let err = optimize("req-2", &request, Duration::from_secs(5), 0).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn unreachable_deliveries_become_unserviceable_without_capacity() {
        let mut request = sample_request();
        request.fleet[0].capacity_kg = 1.0;
        let result = optimize("req-3", &request, Duration::from_secs(5), 0).expect("optimize should succeed");
        assert_eq!(result.delivery_count_covered(), 2);
        assert!(!result.unserviceable.is_empty());
    }
}
