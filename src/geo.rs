//! Geo primitives (C1): great-circle distance, centroid, polygon containment.
//!
//! Grounded on the teacher's `api/osrm_api.rs` coordinate handling (lat/lng pairs, km
//! units) generalised to a pure local computation — this crate's points already carry
//! WGS84 coordinates directly, so no geocoding round-trip is needed for the core.

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two WGS84 points, in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Centroid (arithmetic mean) of a set of WGS84 points.
pub fn centroid(points: &[(f64, f64)]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let (sum_lat, sum_lng) = points
        .iter()
        .fold((0.0, 0.0), |(sl, sg), (lat, lng)| (sl + lat, sg + lng));
    let n = points.len() as f64;
    (sum_lat / n, sum_lng / n)
}

/// Average distance of each point from the centroid, in kilometres.
pub fn avg_distance_from_centroid(points: &[(f64, f64)]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let (clat, clng) = centroid(points);
    let total: f64 = points
        .iter()
        .map(|(lat, lng)| haversine_km(*lat, *lng, clat, clng))
        .sum();
    total / points.len() as f64
}

/// Even-odd (ray-casting) point-in-polygon test, any consistent winding.
/// Spec §9 Open Question 4 deliberately leaves the algorithm unspecified; this crate
/// picks ray-casting.
pub fn point_in_polygon(point: (f64, f64), vertices: &[(f64, f64)]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let (px, py) = point;
    let mut inside = false;
    let n = vertices.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];

        let intersects = ((yi > py) != (yj > py))
            && (px < (xj - xi) * (py - yi) / (yj - yi) + xi);
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_identity_and_symmetry() {
        let a = (24.7136, 46.6753);
        let b = (24.8, 46.8);
        assert_eq!(haversine_km(a.0, a.1, a.0, a.1), 0.0);
        let ab = haversine_km(a.0, a.1, b.0, b.1);
        let ba = haversine_km(b.0, b.1, a.0, a.1);
        assert!((ab - ba).abs() < 1e-9);
        assert!(ab > 0.0);
    }

    #[test]
    fn centroid_of_square_is_center() {
        let pts = [(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)];
        let (lat, lng) = centroid(&pts);
        assert!((lat - 1.0).abs() < 1e-9);
        assert!((lng - 1.0).abs() < 1e-9);
    }

    #[test]
    fn point_in_square_polygon() {
        let square = vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)];
        assert!(point_in_polygon((5.0, 5.0), &square));
        assert!(!point_in_polygon((20.0, 20.0), &square));
    }

    #[test]
    fn too_few_vertices_never_contains() {
        assert!(!point_in_polygon((0.0, 0.0), &[(0.0, 0.0), (1.0, 1.0)]));
    }
}
