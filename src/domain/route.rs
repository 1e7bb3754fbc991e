//! Route and result envelope types (spec §3, §4.6).

use std::collections::HashMap;

use crate::domain::point::{DeliveryPoint, PointKind, TimeWindow, Vehicle};

#[derive(Debug, Clone)]
pub struct Waypoint {
    pub point_ref: String,
    pub kind: PointKind,
    pub eta_min: Option<f64>,
    pub time_window: Option<TimeWindow>,
}

#[derive(Debug, Clone)]
pub struct ClusteringMetadata {
    pub avg_score: f64,
    pub cluster_density: f64,
}

/// Invariant: first waypoint is a pickup; `sum(leg_distances) == total_distance_km`
/// to within 1e-6.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: String,
    pub vehicle: Vehicle,
    pub waypoints: Vec<Waypoint>,
    pub total_distance_km: f64,
    pub total_duration_min: f64,
    pub load_kg: f64,
    pub clustering_metadata: ClusteringMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnserviceableReason {
    NoFeasibleVehicle,
    CapacityExceeded,
    TimeWindowConflict,
    RestrictedZone,
}

#[derive(Debug, Clone)]
pub struct UnserviceableDelivery {
    pub delivery: DeliveryPoint,
    pub reason: UnserviceableReason,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub route_count: usize,
    pub delivery_count: usize,
    pub total_distance_km: f64,
    pub total_duration_min: f64,
    pub vehicles_used: usize,
    pub avg_deliveries_per_vehicle: f64,
    pub avg_load_per_vehicle: f64,
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub request_id: String,
    pub routes: Vec<Route>,
    pub summary: Summary,
    pub unserviceable: Vec<UnserviceableDelivery>,
    pub timings: HashMap<String, u64>,
}

impl OptimizationResult {
    /// Coverage invariant (spec §3, §8): every delivery appears exactly once in
    /// `routes` ∪ `unserviceable`.
    pub fn delivery_count_covered(&self) -> usize {
        let routed: usize = self
            .routes
            .iter()
            .flat_map(|r| r.waypoints.iter())
            .filter(|w| w.kind == PointKind::Delivery)
            .count();
        routed + self.unserviceable.len()
    }
}
