//! Cost matrix (C3, spec §4.2).
//!
//! Symmetric Haversine distance table, O(N^2) in time and space, plus an optional
//! parallel duration table `T[i][j] = D[i][j] * speedFactor(kind)`. Construction is
//! pure local computation — points already carry WGS84 coordinates, so (unlike the
//! teacher's OSRM/Google round trip) no network call is on this path.

use std::collections::HashMap;

use crate::domain::point::VehicleKind;
use crate::geo::haversine_km;

#[derive(Debug, Clone)]
pub struct CostMatrix {
    pub distance_km: Vec<Vec<f64>>,
}

impl CostMatrix {
    /// `points` is pickups-first-then-deliveries, in input order, per §4.2.
    pub fn build(points: &[(f64, f64)]) -> CostMatrix {
        let n = points.len();
        let mut distance_km = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let d = haversine_km(points[i].0, points[i].1, points[j].0, points[j].1);
                distance_km[i][j] = d;
                distance_km[j][i] = d;
            }
        }

        CostMatrix { distance_km }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.distance_km[i][j]
    }

    pub fn len(&self) -> usize {
        self.distance_km.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance_km.is_empty()
    }
}

/// Default km -> minutes factors by vehicle kind (spec §9 Open Question 1 — left
/// configurable; these are the crate's documented defaults).
pub fn default_speed_factors() -> HashMap<VehicleKind, f64> {
    let mut m = HashMap::new();
    m.insert(VehicleKind::Car, 2.0);
    m.insert(VehicleKind::Van, 1.8);
    m.insert(VehicleKind::Truck, 1.4);
    m.insert(VehicleKind::Motorcycle, 2.6);
    m.insert(VehicleKind::Mixed, 1.8);
    m
}

pub fn speed_factor(kind: VehicleKind, table: &HashMap<VehicleKind, f64>) -> f64 {
    *table.get(&kind).unwrap_or(&1.8)
}

/// Duration in minutes for a leg of `distance_km`, given a vehicle kind.
pub fn duration_min(distance_km: f64, kind: VehicleKind, table: &HashMap<VehicleKind, f64>) -> f64 {
    distance_km * speed_factor(kind, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let points = vec![(24.7136, 46.6753), (24.8, 46.8), (24.6, 46.5)];
        let dm = CostMatrix::build(&points);
        for i in 0..points.len() {
            assert_eq!(dm.get(i, i), 0.0);
            for j in 0..points.len() {
                assert!((dm.get(i, j) - dm.get(j, i)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn single_point_matrix() {
        let dm = CostMatrix::build(&[(1.0, 1.0)]);
        assert_eq!(dm.len(), 1);
        assert_eq!(dm.get(0, 0), 0.0);
    }
}
