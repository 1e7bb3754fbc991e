//! Pickup assignment: each delivery is assigned to the pickup named by its
//! `pickupHint`, or otherwise to its nearest pickup by matrix distance (spec §4.3).

use std::collections::HashMap;

use crate::domain::point::{DeliveryPoint, Point};
use crate::matrix::CostMatrix;

#[derive(Debug, Clone)]
pub struct PickupGroup {
    pub pickup_index: usize,
    pub delivery_indices: Vec<usize>,
}

/// `pickups.len()` is the offset at which delivery indices begin in the shared
/// cost matrix / point-coordinate arrays (pickups-first layout, per §4.2).
pub fn assign_pickups(
    pickups: &[Point],
    deliveries: &[DeliveryPoint],
    dm: &CostMatrix,
) -> Vec<PickupGroup> {
    let pickup_index_by_id: HashMap<&str, usize> =
        pickups.iter().enumerate().map(|(i, p)| (p.id.as_str(), i)).collect();

    let mut groups: Vec<PickupGroup> = pickups
        .iter()
        .enumerate()
        .map(|(i, _)| PickupGroup { pickup_index: i, delivery_indices: Vec::new() })
        .collect();

    for (d_offset, delivery) in deliveries.iter().enumerate() {
        let delivery_index = pickups.len() + d_offset;

        let pickup_index = delivery
            .pickup_hint
            .as_deref()
            .and_then(|hint| pickup_index_by_id.get(hint).copied())
            .unwrap_or_else(|| nearest_pickup(delivery_index, pickups.len(), dm));

        groups[pickup_index].delivery_indices.push(delivery_index);
    }

    groups
}

/// Nearest pickup by matrix distance, ties broken by lower pickup index (input order).
fn nearest_pickup(delivery_index: usize, pickup_count: usize, dm: &CostMatrix) -> usize {
    (0..pickup_count)
        .map(|p| (p, dm.get(delivery_index, p)))
        .min_by(|(a_idx, a_dist), (b_idx, b_dist)| {
            a_dist.total_cmp(b_dist).then_with(|| a_idx.cmp(b_idx))
        })
        .map(|(p, _)| p)
        .expect("validator guarantees at least one pickup")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::point::{PointKind, Priority, TimeWindow};

    fn point(id: &str, lat: f64, lng: f64) -> Point {
        Point { id: id.to_string(), kind: PointKind::Pickup, lat, lng, name: id.to_string(), address: None }
    }

    fn delivery(id: &str, lat: f64, lng: f64, hint: Option<&str>) -> DeliveryPoint {
        let _ = Priority::Medium;
        let _ = TimeWindow::Closed;
        DeliveryPoint {
            point: Point { id: id.to_string(), kind: PointKind::Delivery, lat, lng, name: id.to_string(), address: None },
            weight_kg: 1.0,
            priority: 5,
            time_window: None,
            pickup_hint: hint.map(str::to_string),
        }
    }

    #[test]
    fn honours_pickup_hint_over_nearest() {
        let pickups = vec![point("p0", 0.0, 0.0), point("p1", 10.0, 10.0)];
        let deliveries = vec![delivery("d0", 0.1, 0.1, Some("p1"))];
        let coords: Vec<(f64, f64)> = pickups
            .iter()
            .map(|p| (p.lat, p.lng))
            .chain(deliveries.iter().map(|d| (d.point.lat, d.point.lng)))
            .collect();
        let dm = CostMatrix::build(&coords);

        let groups = assign_pickups(&pickups, &deliveries, &dm);
        assert_eq!(groups[1].delivery_indices, vec![2]);
        assert!(groups[0].delivery_indices.is_empty());
    }

    #[test]
    fn falls_back_to_nearest_pickup() {
        let pickups = vec![point("p0", 0.0, 0.0), point("p1", 10.0, 10.0)];
        let deliveries = vec![delivery("d0", 9.9, 9.9, None)];
        let coords: Vec<(f64, f64)> = pickups
            .iter()
            .map(|p| (p.lat, p.lng))
            .chain(deliveries.iter().map(|d| (d.point.lat, d.point.lng)))
            .collect();
        let dm = CostMatrix::build(&coords);

        let groups = assign_pickups(&pickups, &deliveries, &dm);
        assert_eq!(groups[1].delivery_indices, vec![2]);
    }
}
