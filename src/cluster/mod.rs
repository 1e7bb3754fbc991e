//! Clusterer (C4, spec §4.3): groups deliveries by pickup, then ranks every available
//! vehicle against each group with the five weighted factors.

pub mod assign;
pub mod scoring;

use std::collections::HashMap;

use crate::domain::cluster::FactorWeights;
use crate::domain::point::{DeliveryPoint, Point, Vehicle, VehicleStatus};
use crate::matrix::CostMatrix;
use scoring::{score_candidate, RankedVehicle, RouteCompatibility};

#[derive(Debug, Clone)]
pub struct ClusterCandidate {
    pub pickup_index: usize,
    pub delivery_indices: Vec<usize>,
    pub ranked_vehicles: Vec<RankedVehicle>,
}

/// Mutable state the clusterer reads as it walks pickups in input order, so that later
/// pickups see the vehicle commitments made by earlier ones within the same `optimize()`
/// call (the "existing route compatibility" factor, §4.3).
#[derive(Debug, Clone, Default)]
pub struct ClusterState {
    pub load_kg_by_vehicle: HashMap<String, f64>,
    pub pickup_by_vehicle: HashMap<String, usize>,
}

impl ClusterState {
    pub fn new() -> Self {
        ClusterState::default()
    }

    fn compatibility(&self, vehicle_id: &str, pickup_index: usize) -> RouteCompatibility {
        match self.pickup_by_vehicle.get(vehicle_id) {
            Some(&p) if p == pickup_index => RouteCompatibility::SamePickup,
            Some(_) => RouteCompatibility::OtherPickup,
            None => RouteCompatibility::NoRoute,
        }
    }

    fn load_kg(&self, vehicle_id: &str) -> f64 {
        *self.load_kg_by_vehicle.get(vehicle_id).unwrap_or(&0.0)
    }
}

/// Ranks every `Available` vehicle for one pickup's delivery group, against the shared
/// `state` reflecting any commitments the distributor already made for earlier pickups.
/// Returns candidates sorted ascending by score (lower wins), tied by `(vehicle.id,
/// input index)`.
#[allow(clippy::too_many_arguments)]
pub fn rank_for_group(
    pickup_index: usize,
    delivery_indices: &[usize],
    point_coords: &[(f64, f64)],
    fleet: &[Vehicle],
    dm: &CostMatrix,
    state: &ClusterState,
    weights: &FactorWeights,
    group_load_kg: f64,
) -> Vec<RankedVehicle> {
    let mut scored: Vec<(RankedVehicle, &str)> = fleet
        .iter()
        .enumerate()
        .filter(|(_, v)| v.status == VehicleStatus::Available)
        .map(|(vi, v)| {
            let compat = state.compatibility(&v.id, pickup_index);
            let current_load = state.load_kg(&v.id);
            let ranked = score_candidate(
                pickup_index,
                v,
                vi,
                delivery_indices,
                point_coords,
                dm,
                current_load,
                group_load_kg,
                compat,
                weights,
            );
            (ranked, v.id.as_str())
        })
        .collect();

    scored.sort_by(|(a, a_id), (b, b_id)| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| a_id.cmp(b_id))
            .then_with(|| a.vehicle_index.cmp(&b.vehicle_index))
    });
    scored.into_iter().map(|(r, _)| r).collect()
}

/// Builds the coordinate array the matrix and scorer share: pickups first, then
/// deliveries, in input order (§4.2).
pub fn point_coords(pickups: &[Point], deliveries: &[DeliveryPoint]) -> Vec<(f64, f64)> {
    pickups
        .iter()
        .map(|p| (p.lat, p.lng))
        .chain(deliveries.iter().map(|d| (d.point.lat, d.point.lng)))
        .collect()
}

/// Groups deliveries by pickup (via `pickupHint` or nearest-pickup fallback) and ranks
/// candidate vehicles for every group, processing pickups in input order so later groups
/// see earlier ones' vehicle commitments reflected in `state`.
pub fn cluster(
    pickups: &[Point],
    deliveries: &[DeliveryPoint],
    fleet: &[Vehicle],
    dm: &CostMatrix,
    coords: &[(f64, f64)],
    weights: &FactorWeights,
) -> Vec<ClusterCandidate> {
    let groups = assign::assign_pickups(pickups, deliveries, dm);
    let state = ClusterState::new();
    let pickup_count = pickups.len();

    groups
        .into_iter()
        .filter(|g| !g.delivery_indices.is_empty())
        .map(|g| {
            let group_load_kg: f64 =
                g.delivery_indices.iter().map(|&d| deliveries[d - pickup_count].weight_kg).sum();
            let ranked =
                rank_for_group(g.pickup_index, &g.delivery_indices, coords, fleet, dm, &state, weights, group_load_kg);
            ClusterCandidate {
                pickup_index: g.pickup_index,
                delivery_indices: g.delivery_indices,
                ranked_vehicles: ranked,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::point::{PointKind, VehicleKind};

    fn pickup(id: &str, lat: f64, lng: f64) -> Point {
        Point { id: id.to_string(), kind: PointKind::Pickup, lat, lng, name: id.to_string(), address: None }
    }

    fn vehicle(id: &str, lat: f64, lng: f64, status: VehicleStatus) -> Vehicle {
        Vehicle { id: id.to_string(), kind: VehicleKind::Van, capacity_kg: 500.0, start_lat: lat, start_lng: lng, status }
    }

    #[test]
    fn unavailable_vehicles_are_excluded_from_ranking() {
        let _pickup0 = pickup("p0", 0.0, 0.0);
        let fleet = vec![
            vehicle("v0", 0.01, 0.01, VehicleStatus::Available),
            vehicle("v1", 0.0, 0.0, VehicleStatus::Unavailable),
        ];
        let coords = vec![(0.0, 0.0), (0.0, 0.0)];
        let dm = CostMatrix::build(&coords);
        let state = ClusterState::new();
        let weights = FactorWeights::default();

        let ranked = rank_for_group(0, &[1], &coords, &fleet, &dm, &state, &weights, 0.0);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].vehicle_index, 0);
    }
}
