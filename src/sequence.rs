//! Sequencer (C5, spec §4.4): builds a delivery order for one pickup-vehicle cluster
//! with a priority-tilted nearest-neighbour construction, then improves it with a
//! capped 2-opt local search. The pickup stays fixed as the first waypoint.

use crate::domain::point::DeliveryPoint;
use crate::matrix::CostMatrix;

const MAX_TWO_OPT_ITERATIONS: usize = 100;

/// `deliveries` pairs each delivery's global matrix index (pickups-first layout, §4.2)
/// with its domain record, in input order. Returns the ordered list of delivery
/// indices.
pub fn sequence(pickup_index: usize, deliveries: &[(usize, &DeliveryPoint)], dm: &CostMatrix) -> Vec<usize> {
    let order = nearest_neighbor(pickup_index, deliveries, dm);
    two_opt(pickup_index, order, dm)
}

/// Greedy nearest-neighbour construction. At each step the next stop is chosen by
/// `distance * priorityFactor(delivery)` — high priority (0.7x) looks closer than it
/// is, low priority (1.3x) looks farther, per §4.4. Ties broken by lower input index.
fn nearest_neighbor(pickup_index: usize, deliveries: &[(usize, &DeliveryPoint)], dm: &CostMatrix) -> Vec<usize> {
    let mut remaining: Vec<(usize, &DeliveryPoint)> = deliveries.to_vec();
    let mut order = Vec::with_capacity(remaining.len());
    let mut current = pickup_index;

    while !remaining.is_empty() {
        let (pos, _) = remaining
            .iter()
            .enumerate()
            .map(|(pos, (idx, d))| (pos, dm.get(current, *idx) * d.priority_band().factor(), *idx))
            .min_by(|(_, score_a, idx_a), (_, score_b, idx_b)| {
                score_a.total_cmp(score_b).then_with(|| idx_a.cmp(idx_b))
            })
            .map(|(pos, score, idx)| (pos, (score, idx)))
            .unwrap();

        let (idx, _) = remaining.remove(pos);
        order.push(idx);
        current = idx;
    }

    order
}

/// Caps total candidate-edge evaluations (not passes) at [`MAX_TWO_OPT_ITERATIONS`],
/// per §4.4's bounded-runtime requirement.
fn two_opt(pickup_index: usize, mut order: Vec<usize>, dm: &CostMatrix) -> Vec<usize> {
    let n = order.len();
    if n < 3 {
        return order;
    }

    let mut iterations = 0;
    let mut improved = true;

    while improved && iterations < MAX_TWO_OPT_ITERATIONS {
        improved = false;

        'search: for i in 0..n - 1 {
            for j in (i + 1)..n {
                iterations += 1;
                if iterations >= MAX_TWO_OPT_ITERATIONS {
                    break 'search;
                }

                let a = if i == 0 { pickup_index } else { order[i - 1] };
                let b = order[i];
                let c = order[j];

                let before = dm.get(a, b) + if j + 1 < n { dm.get(order[j], order[j + 1]) } else { 0.0 };
                let after = dm.get(a, c) + if j + 1 < n { dm.get(b, order[j + 1]) } else { 0.0 };

                if after + 1e-9 < before {
                    order[i..=j].reverse();
                    improved = true;
                }
            }
        }
    }

    order
}

/// Total distance of the pickup-then-ordered-deliveries path.
pub fn path_distance_km(pickup_index: usize, order: &[usize], dm: &CostMatrix) -> f64 {
    let mut total = 0.0;
    let mut prev = pickup_index;
    for &idx in order {
        total += dm.get(prev, idx);
        prev = idx;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::point::{Point, PointKind};

    fn delivery(id: &str, lat: f64, lng: f64, priority: u8) -> DeliveryPoint {
        DeliveryPoint {
            point: Point { id: id.to_string(), kind: PointKind::Delivery, lat, lng, name: id.to_string(), address: None },
            weight_kg: 1.0,
            priority,
            time_window: None,
            pickup_hint: None,
        }
    }

    #[test]
    fn two_opt_untangles_a_crossed_path() {
        // pickup at origin, four points forming a square where naive ordering crosses.
        let coords = vec![(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0), (0.0, 2.0)];
        let dm = CostMatrix::build(&coords);
        // A deliberately crossed order: 1,3,2,4 relative to indices 1..4.
        let crossed = vec![1usize, 3, 2, 4];
        let before = path_distance_km(0, &crossed, &dm);
        let improved = two_opt(0, crossed, &dm);
        let after = path_distance_km(0, &improved, &dm);
        assert!(after <= before + 1e-9);
    }

    #[test]
    fn high_priority_deliveries_are_visited_first_when_equidistant() {
        let coords = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 0.0)];
        let dm = CostMatrix::build(&coords);
        let low = delivery("low", 1.0, 0.0, 2);
        let high = delivery("high", 1.0, 0.0, 9);
        let deliveries = vec![(1usize, &low), (2usize, &high)];
        let order = nearest_neighbor(0, &deliveries, &dm);
        assert_eq!(order[0], 2, "equidistant high-priority stop should be visited first");
    }

    #[test]
    fn single_delivery_sequence_is_trivial() {
        let coords = vec![(0.0, 0.0), (1.0, 1.0)];
        let dm = CostMatrix::build(&coords);
        let d = delivery("d0", 1.0, 1.0, 5);
        let order = sequence(0, &[(1, &d)], &dm);
        assert_eq!(order, vec![1]);
    }
}
