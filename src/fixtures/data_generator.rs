//! Synthetic demand generator used by the CLI demo and local load-testing (§9 ambient
//! tooling). Mirrors the teacher's CSV-with-random-fallback shape, but generates
//! coordinates directly rather than geocoding postal codes, since [`crate::domain::point`]
//! carries `(lat, lng)` on every point rather than a postal-code join key.

use std::collections::HashSet;

use csv::ReaderBuilder;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::validate::{OptimizationRequest, RawDeliveryPoint, RawPoint, RawVehicle};

const SEED: u64 = 42;

const VEHICLE_KINDS: [&str; 4] = ["VAN", "TRUCK", "CAR", "MOTORCYCLE"];
const PRIORITIES: [u8; 3] = [2, 5, 9];

/// One row of a customer coordinates CSV: `id,lat,lng`.
struct CsvCoord {
    id: String,
    lat: f64,
    lng: f64,
}

/// Reads `id,lat,lng` rows from a CSV file, tolerating a non-numeric header row, and
/// capping at `max_count` rows — same shape as the teacher's postal-code reader.
fn read_coords_from_csv(csv_path: &str, max_count: usize) -> Result<Vec<CsvCoord>, Box<dyn std::error::Error>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(csv_path)?;

    let mut coords = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let record = row?;
        let (Some(id), Some(lat_raw), Some(lng_raw)) = (record.get(0), record.get(1), record.get(2)) else {
            continue;
        };
        if idx == 0 && lat_raw.trim().parse::<f64>().is_err() {
            continue;
        }
        let (Ok(lat), Ok(lng)) = (lat_raw.trim().parse::<f64>(), lng_raw.trim().parse::<f64>()) else {
            continue;
        };
        coords.push(CsvCoord { id: id.trim().to_string(), lat, lng });
        if coords.len() >= max_count {
            break;
        }
    }
    Ok(coords)
}

/// Scatters `count` points within `radius_km` of `center`, deterministically, using the
/// same seed every call so repeated generator runs are reproducible for a given input size.
fn random_points_near(center: (f64, f64), radius_km: f64, count: usize) -> Vec<(f64, f64)> {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut points = Vec::with_capacity(count);
    let mut seen: HashSet<(i64, i64)> = HashSet::new();

    while points.len() < count {
        let bearing = rng.gen_range(0.0..std::f64::consts::TAU);
        let distance = rng.gen_range(0.0..radius_km);
        // Equirectangular offset — good enough for synthetic scatter, not navigation.
        let dlat = (distance / 111.0) * bearing.cos();
        let dlng = (distance / (111.0 * center.0.to_radians().cos().max(0.01))) * bearing.sin();
        let lat = center.0 + dlat;
        let lng = center.1 + dlng;

        let key = ((lat * 1e6) as i64, (lng * 1e6) as i64);
        if seen.insert(key) {
            points.push((lat, lng));
        }
    }
    points
}

/// Loads delivery coordinates from a CSV, falling back to a deterministic random scatter
/// when the file is missing or short — same fallback policy as the teacher's locations
/// loader, reported through `tracing` instead of silently swallowed.
fn load_delivery_coords(csv_path: &str, count: usize, depot: (f64, f64)) -> Vec<(String, f64, f64)> {
    let csv_rows = match read_coords_from_csv(csv_path, count) {
        Ok(rows) => {
            info!(count = rows.len(), path = csv_path, "loaded delivery coordinates from csv");
            rows
        }
        Err(err) => {
            warn!(path = csv_path, %err, "failed to read delivery csv, falling back to random generation");
            Vec::new()
        }
    };

    let mut coords: Vec<(String, f64, f64)> =
        csv_rows.into_iter().map(|c| (c.id, c.lat, c.lng)).collect();

    if coords.len() < count {
        let missing = count - coords.len();
        warn!(have = coords.len(), want = count, "csv had fewer rows than requested, generating the remainder");
        let generated = random_points_near(depot, 15.0, missing);
        for (i, (lat, lng)) in generated.into_iter().enumerate() {
            coords.push((format!("gen-delivery-{i}"), lat, lng));
        }
    }

    coords.truncate(count);
    coords
}

/// Generates a full [`OptimizationRequest`] with `pickup_count` pickups, `delivery_count`
/// deliveries, and `vehicle_count` vehicles scattered around `depot`, optionally seeded
/// from a `id,lat,lng` CSV of delivery coordinates.
pub fn generate_request(
    pickup_count: usize,
    delivery_count: usize,
    vehicle_count: usize,
    depot: (f64, f64),
    csv_path: Option<&str>,
) -> OptimizationRequest {
    let pickup_coords = random_points_near(depot, 3.0, pickup_count.max(1));
    let pickup_points: Vec<RawPoint> = pickup_coords
        .into_iter()
        .enumerate()
        .map(|(i, (lat, lng))| RawPoint {
            id: format!("pickup-{i}"),
            name: Some(format!("Pickup {i}")),
            address: None,
            lat,
            lng,
        })
        .collect();

    let delivery_coords = match csv_path {
        Some(path) => load_delivery_coords(path, delivery_count, depot),
        None => random_points_near(depot, 15.0, delivery_count)
            .into_iter()
            .enumerate()
            .map(|(i, (lat, lng))| (format!("delivery-{i}"), lat, lng))
            .collect(),
    };

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let delivery_points: Vec<RawDeliveryPoint> = delivery_coords
        .into_iter()
        .enumerate()
        .map(|(i, (id, lat, lng))| RawDeliveryPoint {
            id,
            name: Some(format!("Delivery {i}")),
            address: None,
            lat,
            lng,
            weight_kg: rng.gen_range(5.0..120.0),
            priority: serde_json::Value::from(PRIORITIES[i % PRIORITIES.len()]),
            time_window: None,
            pickup_hint: None,
        })
        .collect();

    let vehicle_coords = random_points_near(depot, 1.0, vehicle_count.max(1));
    let fleet: Vec<RawVehicle> = vehicle_coords
        .into_iter()
        .enumerate()
        .map(|(i, (lat, lng))| RawVehicle {
            id: format!("vehicle-{i}"),
            kind: VEHICLE_KINDS[i % VEHICLE_KINDS.len()].to_string(),
            capacity_kg: 800.0,
            start_lat: lat,
            start_lng: lng,
            status: "AVAILABLE".to_string(),
        })
        .collect();

    info!(
        pickups = pickup_points.len(),
        deliveries = delivery_points.len(),
        vehicles = fleet.len(),
        "generated synthetic optimization request"
    );

    OptimizationRequest {
        pickup_points,
        delivery_points,
        fleet,
        business_rules: Default::default(),
        preferences: Default::default(),
        context: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_counts() {
        let request = generate_request(1, 12, 3, (1.3521, 103.8198), None);
        assert_eq!(request.pickup_points.len(), 1);
        assert_eq!(request.delivery_points.len(), 12);
        assert_eq!(request.fleet.len(), 3);
    }

    #[test]
    fn is_deterministic_across_calls() {
        let a = generate_request(2, 20, 4, (1.3521, 103.8198), None);
        let b = generate_request(2, 20, 4, (1.3521, 103.8198), None);
        let coords_a: Vec<(f64, f64)> = a.delivery_points.iter().map(|d| (d.lat, d.lng)).collect();
        let coords_b: Vec<(f64, f64)> = b.delivery_points.iter().map(|d| (d.lat, d.lng)).collect();
        assert_eq!(coords_a, coords_b);
    }

    #[test]
    fn falls_back_to_random_when_csv_missing() {
        let request = generate_request(1, 5, 2, (1.3521, 103.8198), Some("/nonexistent/path.csv"));
        assert_eq!(request.delivery_points.len(), 5);
    }
}
