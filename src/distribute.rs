//! Distributor (C6, spec §4.5): turns one pickup's ranked vehicle candidates into
//! committed (vehicle, deliveries) clusters, applying the `best_match`/`balanced`
//! strategy and flagging deliveries that cannot be served.

use std::collections::HashMap;

use crate::cluster::scoring::RankedVehicle;
use crate::cluster::ClusterState;
use crate::domain::cluster::Cluster;
use crate::domain::point::{DeliveryPoint, Point, RestrictedZone, TimeWindow, Vehicle};
use crate::domain::route::{UnserviceableDelivery, UnserviceableReason};
use crate::geo::point_in_polygon;
use crate::validate::DistributionStrategy;

/// Round-robin "balanced" strategy spreads a group across at most this many
/// top-ranked candidates (§4.5).
const BALANCED_FANOUT: usize = 3;

/// A delivery currently active inside any restricted zone is never assigned, regardless
/// of strategy (§4.5, §3 `RestrictedZone`).
fn zone_blocks(point: &Point, zones: &[RestrictedZone], now_minute: u16) -> bool {
    zones
        .iter()
        .filter(|z| z.active_window.contains(now_minute))
        .any(|z| point_in_polygon((point.lat, point.lng), &z.zone.vertices))
}

fn window_is_closed(window: Option<TimeWindow>) -> bool {
    matches!(window, Some(TimeWindow::Closed))
}

#[allow(clippy::too_many_arguments)]
pub fn distribute_group(
    pickup_index: usize,
    pickup: &Point,
    deliveries: &[(usize, DeliveryPoint)],
    ranked_vehicles: &[RankedVehicle],
    fleet: &[Vehicle],
    strategy: DistributionStrategy,
    restricted_zones: &[RestrictedZone],
    now_minute: u16,
    state: &mut ClusterState,
) -> (Vec<Cluster>, Vec<UnserviceableDelivery>) {
    let mut unserviceable = Vec::new();
    let mut remaining: Vec<&DeliveryPoint> = Vec::with_capacity(deliveries.len());

    for (_, d) in deliveries {
        if zone_blocks(&d.point, restricted_zones, now_minute) {
            unserviceable.push(UnserviceableDelivery { delivery: d.clone(), reason: UnserviceableReason::RestrictedZone });
        } else if window_is_closed(d.time_window) {
            unserviceable.push(UnserviceableDelivery { delivery: d.clone(), reason: UnserviceableReason::TimeWindowConflict });
        } else {
            remaining.push(d);
        }
    }

    if ranked_vehicles.is_empty() {
        unserviceable.extend(remaining.into_iter().map(|d| UnserviceableDelivery {
            delivery: d.clone(),
            reason: UnserviceableReason::NoFeasibleVehicle,
        }));
        return (Vec::new(), unserviceable);
    }

    let vehicle_by_index: HashMap<usize, &Vehicle> = fleet.iter().enumerate().collect();

    let assignment: Vec<(usize, Vec<&DeliveryPoint>)> = match strategy {
        DistributionStrategy::BestMatch => best_match(ranked_vehicles, &vehicle_by_index, remaining, state),
        DistributionStrategy::Balanced => balanced(ranked_vehicles, &vehicle_by_index, remaining, state),
    };

    let mut clusters = Vec::new();
    for (vehicle_index, group_deliveries) in assignment {
        if group_deliveries.is_empty() {
            continue;
        }
        let vehicle = vehicle_by_index[&vehicle_index];
        let ranked = ranked_vehicles.iter().find(|r| r.vehicle_index == vehicle_index).expect("ranked candidate exists");

        let weight: f64 = group_deliveries.iter().map(|d| d.weight_kg).sum();
        state.load_kg_by_vehicle.entry(vehicle.id.clone()).and_modify(|w| *w += weight).or_insert(weight);
        state.pickup_by_vehicle.insert(vehicle.id.clone(), pickup_index);

        let mut cluster = Cluster {
            pickup: pickup.clone(),
            vehicle: vehicle.clone(),
            deliveries: group_deliveries.into_iter().cloned().collect(),
            total_load_kg: 0.0,
            score: ranked.score,
            breakdown: ranked.breakdown.clone(),
        };
        cluster.recompute_load();
        clusters.push(cluster);
    }

    // Anything that still has no home (every candidate lacked capacity) is unserviceable.
    let assigned_ids: std::collections::HashSet<&str> =
        clusters.iter().flat_map(|c| c.deliveries.iter().map(|d| d.point.id.as_str())).collect();
    for (_, d) in deliveries {
        if !assigned_ids.contains(d.point.id.as_str())
            && !unserviceable.iter().any(|u| u.delivery.point.id == d.point.id)
        {
            unserviceable.push(UnserviceableDelivery { delivery: d.clone(), reason: UnserviceableReason::CapacityExceeded });
        }
    }

    (clusters, unserviceable)
}

fn headroom(vehicle: &Vehicle, vehicle_id_load: &HashMap<String, f64>) -> f64 {
    vehicle.capacity_kg - vehicle_id_load.get(&vehicle.id).copied().unwrap_or(0.0)
}

/// All of a group's deliveries go to the single best-ranked vehicle with capacity;
/// overflow spills to the next-ranked vehicle, and so on.
fn best_match<'a>(
    ranked_vehicles: &[RankedVehicle],
    vehicle_by_index: &HashMap<usize, &'a Vehicle>,
    mut remaining: Vec<&'a DeliveryPoint>,
    state: &ClusterState,
) -> Vec<(usize, Vec<&'a DeliveryPoint>)> {
    let mut result = Vec::new();
    let mut loads = state.load_kg_by_vehicle.clone();

    for ranked in ranked_vehicles {
        if remaining.is_empty() {
            break;
        }
        let vehicle = vehicle_by_index[&ranked.vehicle_index];
        let mut taken = Vec::new();
        let mut left = Vec::new();
        let mut free = headroom(vehicle, &loads);

        for d in remaining {
            if d.weight_kg <= free {
                free -= d.weight_kg;
                taken.push(d);
            } else {
                left.push(d);
            }
        }

        if !taken.is_empty() {
            let taken_weight: f64 = taken.iter().map(|d| d.weight_kg).sum();
            *loads.entry(vehicle.id.clone()).or_insert(0.0) += taken_weight;
            result.push((ranked.vehicle_index, taken));
        }
        remaining = left;
    }

    result
}

/// Round-robins the group across the top [`BALANCED_FANOUT`] ranked candidates, one
/// delivery at a time, skipping a candidate once it runs out of headroom.
fn balanced<'a>(
    ranked_vehicles: &[RankedVehicle],
    vehicle_by_index: &HashMap<usize, &'a Vehicle>,
    remaining: Vec<&'a DeliveryPoint>,
    state: &ClusterState,
) -> Vec<(usize, Vec<&'a DeliveryPoint>)> {
    let candidates: Vec<usize> = ranked_vehicles.iter().take(BALANCED_FANOUT).map(|r| r.vehicle_index).collect();
    let mut loads = state.load_kg_by_vehicle.clone();
    let mut buckets: HashMap<usize, Vec<&DeliveryPoint>> = HashMap::new();

    let mut cursor = 0usize;
    'deliveries: for d in remaining {
        for _ in 0..candidates.len() {
            let vehicle_index = candidates[cursor % candidates.len()];
            cursor += 1;
            let vehicle = vehicle_by_index[&vehicle_index];
            if d.weight_kg <= headroom(vehicle, &loads) {
                *loads.entry(vehicle.id.clone()).or_insert(0.0) += d.weight_kg;
                buckets.entry(vehicle_index).or_default().push(d);
                continue 'deliveries;
            }
        }
        // none of the candidates had room; dropped here, picked up as CapacityExceeded
        // by the caller's reconciliation pass.
    }

    candidates.into_iter().map(|v| (v, buckets.remove(&v).unwrap_or_default())).collect()
}

/// Checks the §4.5 load-balance invariant across the final per-vehicle delivery
/// counts: `max - min <= 1 + ceil(0.3 * mean)`.
pub fn load_balance_holds(delivery_counts: &[usize]) -> bool {
    if delivery_counts.len() < 2 {
        return true;
    }
    let max = *delivery_counts.iter().max().unwrap();
    let min = *delivery_counts.iter().min().unwrap();
    let mean = delivery_counts.iter().sum::<usize>() as f64 / delivery_counts.len() as f64;
    let tolerance = 1 + (0.3 * mean).ceil() as usize;
    max - min <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cluster::Factor;
    use crate::domain::point::{PointKind, VehicleKind, VehicleStatus};

    fn vehicle(id: &str, capacity_kg: f64) -> Vehicle {
        Vehicle { id: id.to_string(), kind: VehicleKind::Van, capacity_kg, start_lat: 0.0, start_lng: 0.0, status: VehicleStatus::Available }
    }

    fn delivery(id: &str, weight_kg: f64) -> DeliveryPoint {
        DeliveryPoint {
            point: Point { id: id.to_string(), kind: PointKind::Delivery, lat: 0.0, lng: 0.0, name: id.to_string(), address: None },
            weight_kg,
            priority: 5,
            time_window: None,
            pickup_hint: None,
        }
    }

    fn ranked(vehicle_index: usize, score: f64) -> RankedVehicle {
        RankedVehicle { vehicle_index, score, breakdown: HashMap::from([(Factor::VehicleToPickupDistance, crate::domain::cluster::FactorBreakdown { value: 0.0, score: 0.0, weight: 0.0 })]) }
    }

    #[test]
    fn best_match_spills_overflow_to_next_vehicle() {
        let pickup = Point { id: "p0".into(), kind: PointKind::Pickup, lat: 0.0, lng: 0.0, name: "p0".into(), address: None };
        let fleet = vec![vehicle("v0", 5.0), vehicle("v1", 5.0)];
        let deliveries = vec![(1usize, delivery("d0", 4.0)), (2usize, delivery("d1", 4.0))];
        let ranked_vehicles = vec![ranked(0, 10.0), ranked(1, 20.0)];
        let mut state = ClusterState::new();

        let (clusters, unserviceable) = distribute_group(
            0,
            &pickup,
            &deliveries,
            &ranked_vehicles,
            &fleet,
            DistributionStrategy::BestMatch,
            &[],
            0,
            &mut state,
        );

        assert!(unserviceable.is_empty());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].vehicle.id, "v0");
        assert_eq!(clusters[1].vehicle.id, "v1");
    }

    #[test]
    fn closed_window_is_unserviceable() {
        let pickup = Point { id: "p0".into(), kind: PointKind::Pickup, lat: 0.0, lng: 0.0, name: "p0".into(), address: None };
        let fleet = vec![vehicle("v0", 50.0)];
        let mut d = delivery("d0", 1.0);
        d.time_window = Some(TimeWindow::Closed);
        let deliveries = vec![(1usize, d)];
        let ranked_vehicles = vec![ranked(0, 1.0)];
        let mut state = ClusterState::new();

        let (clusters, unserviceable) = distribute_group(
            0,
            &pickup,
            &deliveries,
            &ranked_vehicles,
            &fleet,
            DistributionStrategy::BestMatch,
            &[],
            0,
            &mut state,
        );

        assert!(clusters.is_empty());
        assert_eq!(unserviceable.len(), 1);
        assert_eq!(unserviceable[0].reason, UnserviceableReason::TimeWindowConflict);
    }

    #[test]
    fn load_balance_invariant_accepts_even_split() {
        assert!(load_balance_holds(&[3, 3, 4]));
        assert!(!load_balance_holds(&[1, 10]));
    }
}
