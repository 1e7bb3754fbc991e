//! Five-factor vehicle scoring for a (pickup, delivery-group) candidate (spec §4.3).

use std::collections::HashMap;

use crate::domain::cluster::{Factor, FactorBreakdown, FactorWeights};
use crate::domain::point::Vehicle;
use crate::geo::{avg_distance_from_centroid, haversine_km};
use crate::matrix::CostMatrix;

#[derive(Debug, Clone)]
pub struct RankedVehicle {
    pub vehicle_index: usize,
    pub score: f64,
    pub breakdown: HashMap<Factor, FactorBreakdown>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCompatibility {
    SamePickup,
    NoRoute,
    OtherPickup,
}

fn f1_vehicle_to_pickup(vehicle_to_pickup_km: f64) -> f64 {
    (vehicle_to_pickup_km * 2.0).min(100.0)
}

fn f2_pickup_to_delivery_avg(avg_dist_km: f64) -> f64 {
    (avg_dist_km * 2.0).min(100.0)
}

fn f3_cluster_density(avg_dist_from_centroid_km: f64) -> f64 {
    (100.0 - avg_dist_from_centroid_km * 5.0).max(0.0)
}

fn f4_load_balance(current_load_kg: f64, group_load_kg: f64, capacity_kg: f64) -> f64 {
    if capacity_kg <= 0.0 {
        return 100.0;
    }
    let utilization_pct = (current_load_kg + group_load_kg) / capacity_kg * 100.0;
    if utilization_pct > 100.0 {
        100.0
    } else if utilization_pct > 90.0 {
        10.0
    } else if utilization_pct > 70.0 {
        30.0
    } else {
        70.0 - utilization_pct
    }
}

fn f5_route_compatibility(compat: RouteCompatibility) -> f64 {
    match compat {
        RouteCompatibility::SamePickup => 0.0,
        RouteCompatibility::NoRoute => 50.0,
        RouteCompatibility::OtherPickup => 100.0,
    }
}

/// Scores one (pickup, vehicle) candidate against a group of deliveries already
/// assigned to that pickup. `current_load_kg` and `compat` reflect the vehicle's
/// committed state as of this point in the (deterministic, pickup-by-pickup) clustering
/// pass — see `cluster::assign` for how that state evolves across pickups.
#[allow(clippy::too_many_arguments)]
pub fn score_candidate(
    pickup_index: usize,
    vehicle: &Vehicle,
    vehicle_index: usize,
    delivery_indices: &[usize],
    point_coords: &[(f64, f64)],
    dm: &CostMatrix,
    current_load_kg: f64,
    group_load_kg: f64,
    compat: RouteCompatibility,
    weights: &FactorWeights,
) -> RankedVehicle {
    let vehicle_to_pickup_km = haversine_km(
        vehicle.start_lat,
        vehicle.start_lng,
        point_coords[pickup_index].0,
        point_coords[pickup_index].1,
    );

    let avg_pickup_to_delivery_km = if delivery_indices.is_empty() {
        0.0
    } else {
        delivery_indices
            .iter()
            .map(|&d| dm.get(pickup_index, d))
            .sum::<f64>()
            / delivery_indices.len() as f64
    };

    let delivery_coords: Vec<(f64, f64)> = delivery_indices.iter().map(|&d| point_coords[d]).collect();
    let avg_dist_from_centroid = avg_distance_from_centroid(&delivery_coords);

    let v1 = f1_vehicle_to_pickup(vehicle_to_pickup_km);
    let v2 = f2_pickup_to_delivery_avg(avg_pickup_to_delivery_km);
    let v3 = f3_cluster_density(avg_dist_from_centroid);
    let v4 = f4_load_balance(current_load_kg, group_load_kg, vehicle.capacity_kg);
    let v5 = f5_route_compatibility(compat);

    let score = weights.vehicle_to_pickup_distance * v1
        + weights.pickup_to_delivery_distance * v2
        + weights.delivery_cluster_density * v3
        + weights.vehicle_load_balance * v4
        + weights.existing_route_compatibility * v5;

    let mut breakdown = HashMap::new();
    breakdown.insert(
        Factor::VehicleToPickupDistance,
        FactorBreakdown { value: vehicle_to_pickup_km, score: v1, weight: weights.vehicle_to_pickup_distance },
    );
    breakdown.insert(
        Factor::PickupToDeliveryDistance,
        FactorBreakdown { value: avg_pickup_to_delivery_km, score: v2, weight: weights.pickup_to_delivery_distance },
    );
    breakdown.insert(
        Factor::DeliveryClusterDensity,
        FactorBreakdown { value: avg_dist_from_centroid, score: v3, weight: weights.delivery_cluster_density },
    );
    breakdown.insert(
        Factor::VehicleLoadBalance,
        FactorBreakdown { value: current_load_kg, score: v4, weight: weights.vehicle_load_balance },
    );
    breakdown.insert(
        Factor::ExistingRouteCompatibility,
        FactorBreakdown { value: 0.0, score: v5, weight: weights.existing_route_compatibility },
    );

    RankedVehicle { vehicle_index, score, breakdown }
}

/// Ranks candidates ascending by score (lower wins), tie-broken by (lower vehicleId,
/// earlier input index) per §4.3.
pub fn rank(mut candidates: Vec<(RankedVehicle, &str)>) -> Vec<RankedVehicle> {
    candidates.sort_by(|(a, a_id), (b, b_id)| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| a_id.cmp(b_id))
            .then_with(|| a.vehicle_index.cmp(&b.vehicle_index))
    });
    candidates.into_iter().map(|(r, _)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_balance_bands() {
        assert_eq!(f4_load_balance(0.0, 0.0, 100.0), 70.0);
        assert!(f4_load_balance(95.0, 0.0, 100.0) - 10.0 < 1e-9);
        assert_eq!(f4_load_balance(101.0, 0.0, 100.0), 100.0);
    }

    #[test]
    fn compatibility_scores() {
        assert_eq!(f5_route_compatibility(RouteCompatibility::SamePickup), 0.0);
        assert_eq!(f5_route_compatibility(RouteCompatibility::NoRoute), 50.0);
        assert_eq!(f5_route_compatibility(RouteCompatibility::OtherPickup), 100.0);
    }
}
