//! Ephemeral clustering artefacts produced by C4 and consumed by C5/C6 (spec §3, §4.3).

use std::collections::HashMap;

use crate::domain::point::{DeliveryPoint, Point, Vehicle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Factor {
    VehicleToPickupDistance,
    PickupToDeliveryDistance,
    DeliveryClusterDensity,
    VehicleLoadBalance,
    ExistingRouteCompatibility,
}

#[derive(Debug, Clone, Copy)]
pub struct FactorBreakdown {
    pub value: f64,
    pub score: f64,
    pub weight: f64,
}

/// A (pickup, vehicle, delivery list) triple emitted by the clusterer.
/// Invariant: `total_load_kg <= vehicle.capacity_kg`.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub pickup: Point,
    pub vehicle: Vehicle,
    pub deliveries: Vec<DeliveryPoint>,
    pub total_load_kg: f64,
    pub score: f64,
    pub breakdown: HashMap<Factor, FactorBreakdown>,
}

impl Cluster {
    pub fn recompute_load(&mut self) {
        self.total_load_kg = self.deliveries.iter().map(|d| d.weight_kg).sum();
    }
}

/// A named weight vector for the clusterer's five factors (§4.3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorWeights {
    pub vehicle_to_pickup_distance: f64,
    pub pickup_to_delivery_distance: f64,
    pub delivery_cluster_density: f64,
    pub vehicle_load_balance: f64,
    pub existing_route_compatibility: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        FactorWeights {
            vehicle_to_pickup_distance: 0.25,
            pickup_to_delivery_distance: 0.30,
            delivery_cluster_density: 0.20,
            vehicle_load_balance: 0.15,
            existing_route_compatibility: 0.10,
        }
    }
}

impl FactorWeights {
    pub fn preset(name: &str) -> FactorWeights {
        match name {
            "proximity_focused" => FactorWeights {
                vehicle_to_pickup_distance: 0.45,
                pickup_to_delivery_distance: 0.35,
                delivery_cluster_density: 0.10,
                vehicle_load_balance: 0.05,
                existing_route_compatibility: 0.05,
            },
            "load_balanced" => FactorWeights {
                vehicle_to_pickup_distance: 0.15,
                pickup_to_delivery_distance: 0.20,
                delivery_cluster_density: 0.10,
                vehicle_load_balance: 0.45,
                existing_route_compatibility: 0.10,
            },
            "cluster_optimized" => FactorWeights {
                vehicle_to_pickup_distance: 0.15,
                pickup_to_delivery_distance: 0.25,
                delivery_cluster_density: 0.45,
                vehicle_load_balance: 0.10,
                existing_route_compatibility: 0.05,
            },
            "route_continuation" => FactorWeights {
                vehicle_to_pickup_distance: 0.15,
                pickup_to_delivery_distance: 0.20,
                delivery_cluster_density: 0.10,
                vehicle_load_balance: 0.10,
                existing_route_compatibility: 0.45,
            },
            _ => FactorWeights::default(),
        }
    }

    /// Sum of all five weights.
    pub fn sum(&self) -> f64 {
        self.vehicle_to_pickup_distance
            + self.pickup_to_delivery_distance
            + self.delivery_cluster_density
            + self.vehicle_load_balance
            + self.existing_route_compatibility
    }

    /// Normalises a non-sum-1 weight vector, as §4.3 requires ("a non-sum-1 weight
    /// vector is normalised with a warning"). Returns `self` unchanged if the sum is
    /// already ~1 or is zero (degenerate input — caller logs and falls back to default).
    pub fn normalized(&self) -> FactorWeights {
        let s = self.sum();
        if s <= 0.0 || (s - 1.0).abs() < 1e-12 {
            return *self;
        }
        FactorWeights {
            vehicle_to_pickup_distance: self.vehicle_to_pickup_distance / s,
            pickup_to_delivery_distance: self.pickup_to_delivery_distance / s,
            delivery_cluster_density: self.delivery_cluster_density / s,
            vehicle_load_balance: self.vehicle_load_balance / s,
            existing_route_compatibility: self.existing_route_compatibility / s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!((FactorWeights::default().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalization_matches_prescaled_weights() {
        let raw = FactorWeights {
            vehicle_to_pickup_distance: 0.5,
            pickup_to_delivery_distance: 0.6,
            delivery_cluster_density: 0.4,
            vehicle_load_balance: 0.3,
            existing_route_compatibility: 0.2,
        };
        let s = raw.sum();
        let normalized = raw.normalized();

        let prescaled = FactorWeights {
            vehicle_to_pickup_distance: raw.vehicle_to_pickup_distance / s,
            pickup_to_delivery_distance: raw.pickup_to_delivery_distance / s,
            delivery_cluster_density: raw.delivery_cluster_density / s,
            vehicle_load_balance: raw.vehicle_load_balance / s,
            existing_route_compatibility: raw.existing_route_compatibility / s,
        };

        assert!((normalized.sum() - 1.0).abs() < 1e-9);
        assert!((normalized.vehicle_to_pickup_distance - prescaled.vehicle_to_pickup_distance).abs() < 1e-12);
    }
}
