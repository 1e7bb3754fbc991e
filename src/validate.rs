//! Request validator (C2, spec §4.1).
//!
//! Raw wire-shape DTOs (serde `Deserialize`, loose string enums) are validated and
//! normalised into the strict domain types of [`crate::domain`]. Unknown enumeration
//! values are silently replaced by the documented defaults (`delivery`, `outlet`,
//! `TRUCK`, `AVAILABLE`, `MEDIUM`, `normal`) rather than rejected; only shape/range
//! violations produce a [`CoreError::Validation`]. This component is not a security
//! boundary (spec §4.1) — its purpose is to guarantee the invariants of §3.

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::point::{
    BusinessRules, DeliveryPoint, Point, PointKind, RestrictedZone, TimeWindow, Vehicle,
    VehicleKind, VehicleStatus, Zone,
};
use crate::error::CoreError;

const MAX_POINTS: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct RawPoint {
    pub id: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDeliveryPoint {
    pub id: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub weight_kg: f64,
    pub priority: serde_json::Value,
    pub time_window: Option<String>,
    pub pickup_hint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawVehicle {
    pub id: String,
    pub kind: String,
    pub capacity_kg: f64,
    pub start_lat: f64,
    pub start_lng: f64,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawZone {
    pub vertices: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRestrictedZone {
    pub zone: RawZone,
    pub active_window: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawBusinessRules {
    pub max_driver_hours: Option<u8>,
    pub rest_period_min: Option<u16>,
    pub max_consecutive_drive_hours: Option<u8>,
    #[serde(default)]
    pub allowed_zones: Vec<RawZone>,
    #[serde(default)]
    pub restricted_zones: Vec<RawRestrictedZone>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawWeights {
    pub vehicle_to_pickup_distance: Option<f64>,
    pub pickup_to_delivery_distance: Option<f64>,
    pub delivery_cluster_density: Option<f64>,
    pub vehicle_load_balance: Option<f64>,
    pub existing_route_compatibility: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPreferences {
    pub weights: Option<RawWeights>,
    pub preset: Option<String>,
    pub distribution: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawContext {
    pub weather: Option<String>,
    pub traffic: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizationRequest {
    pub pickup_points: Vec<RawPoint>,
    pub delivery_points: Vec<RawDeliveryPoint>,
    pub fleet: Vec<RawVehicle>,
    #[serde(default)]
    pub business_rules: RawBusinessRules,
    #[serde(default)]
    pub preferences: RawPreferences,
    #[serde(default)]
    pub context: RawContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionStrategy {
    BestMatch,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weather {
    Sunny,
    Rainy,
    Cloudy,
    Snowy,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traffic {
    Light,
    Medium,
    Heavy,
    Normal,
}

#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub pickups: Vec<Point>,
    pub deliveries: Vec<DeliveryPoint>,
    pub fleet: Vec<Vehicle>,
    pub business_rules: BusinessRules,
    pub weights: crate::domain::cluster::FactorWeights,
    pub distribution: DistributionStrategy,
    pub weather: Weather,
    pub traffic: Traffic,
}

fn err(field: &str, message: impl Into<String>) -> CoreError {
    CoreError::Validation {
        field: field.to_string(),
        message: message.into(),
    }
}

fn validate_coord(field: &str, lat: f64, lng: f64) -> Result<(), CoreError> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(err(field, "coordinate must be finite"));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(err(field, "lat out of range [-90, 90]"));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(err(field, "lng out of range [-180, 180]"));
    }
    Ok(())
}

/// Parses a raw priority value (numeric 1..10, or a HIGH/MEDIUM/LOW string) into the
/// numeric band, defaulting unrecognised values to MEDIUM (5) per §4.1.
fn normalize_priority(raw: &serde_json::Value) -> u8 {
    if let Some(n) = raw.as_u64() {
        return n.clamp(1, 10) as u8;
    }
    if let Some(s) = raw.as_str() {
        return match s.trim().to_uppercase().as_str() {
            "HIGH" => 9,
            "LOW" => 2,
            "MEDIUM" => 5,
            _ => 5,
        };
    }
    5
}

fn normalize_vehicle_kind(raw: &str) -> VehicleKind {
    match raw.trim().to_uppercase().as_str() {
        "CAR" => VehicleKind::Car,
        "VAN" => VehicleKind::Van,
        "TRUCK" => VehicleKind::Truck,
        "MOTORCYCLE" => VehicleKind::Motorcycle,
        "MIXED" => VehicleKind::Mixed,
        _ => VehicleKind::Truck,
    }
}

fn normalize_vehicle_status(raw: &str) -> VehicleStatus {
    match raw.trim().to_uppercase().as_str() {
        "AVAILABLE" => VehicleStatus::Available,
        "UNAVAILABLE" => VehicleStatus::Unavailable,
        "DELIVERING" => VehicleStatus::Delivering,
        "RETURNING" => VehicleStatus::Returning,
        _ => VehicleStatus::Available,
    }
}

fn normalize_weather(raw: Option<&str>) -> Weather {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("sunny") => Weather::Sunny,
        Some("rainy") => Weather::Rainy,
        Some("cloudy") => Weather::Cloudy,
        Some("snowy") => Weather::Snowy,
        _ => Weather::Normal,
    }
}

fn normalize_traffic(raw: Option<&str>) -> Traffic {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("light") => Traffic::Light,
        Some("medium") => Traffic::Medium,
        Some("heavy") => Traffic::Heavy,
        _ => Traffic::Normal,
    }
}

fn normalize_distribution(raw: Option<&str>) -> DistributionStrategy {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("balanced") => DistributionStrategy::Balanced,
        _ => DistributionStrategy::BestMatch,
    }
}

fn parse_time_window(field: &str, raw: &str) -> Result<TimeWindow, CoreError> {
    TimeWindow::parse(raw).ok_or_else(|| err(field, format!("malformed time window '{raw}'")))
}

pub fn validate(request: &OptimizationRequest) -> Result<ValidatedRequest, CoreError> {
    let total_points = request.pickup_points.len() + request.delivery_points.len();
    if request.pickup_points.is_empty() || request.delivery_points.is_empty() {
        return Err(err("pickupPoints/deliveryPoints", "must not be empty"));
    }
    if total_points > MAX_POINTS {
        return Err(err(
            "pickupPoints/deliveryPoints",
            format!("exceeds {MAX_POINTS} points"),
        ));
    }
    if request.fleet.is_empty() {
        return Err(err("fleet", "must not be empty"));
    }

    let mut seen_ids: HashMap<&str, ()> = HashMap::new();

    let mut pickups = Vec::with_capacity(request.pickup_points.len());
    for raw in &request.pickup_points {
        let id = raw.id.trim();
        if id.is_empty() {
            return Err(err("pickupPoints[].id", "must not be empty"));
        }
        if seen_ids.insert(id, ()).is_some() {
            return Err(err("pickupPoints[].id", format!("duplicate id '{id}'")));
        }
        validate_coord("pickupPoints[].lat/lng", raw.lat, raw.lng)?;

        pickups.push(Point {
            id: id.to_string(),
            kind: PointKind::Pickup,
            lat: raw.lat,
            lng: raw.lng,
            name: raw.name.clone().unwrap_or_else(|| "outlet".to_string()).trim().to_string(),
            address: raw.address.clone().map(|a| a.trim().to_string()),
        });
    }

    let pickup_ids: HashMap<String, ()> = pickups.iter().map(|p| (p.id.clone(), ())).collect();

    let mut deliveries = Vec::with_capacity(request.delivery_points.len());
    for raw in &request.delivery_points {
        let id = raw.id.trim();
        if id.is_empty() {
            return Err(err("deliveryPoints[].id", "must not be empty"));
        }
        if seen_ids.insert(id, ()).is_some() {
            return Err(err("deliveryPoints[].id", format!("duplicate id '{id}'")));
        }
        validate_coord("deliveryPoints[].lat/lng", raw.lat, raw.lng)?;
        if raw.weight_kg < 0.0 || !raw.weight_kg.is_finite() {
            return Err(err("deliveryPoints[].weightKg", "must be >= 0"));
        }

        let pickup_hint = raw.pickup_hint.as_deref().map(str::trim).filter(|h| !h.is_empty());
        if let Some(hint) = pickup_hint {
            if !pickup_ids.contains_key(hint) {
                return Err(err(
                    "deliveryPoints[].pickupHint",
                    format!("references unknown pickup '{hint}'"),
                ));
            }
        }

        let time_window = match raw.time_window.as_deref() {
            Some(raw_tw) => Some(parse_time_window("deliveryPoints[].timeWindow", raw_tw)?),
            None => None,
        };

        deliveries.push(DeliveryPoint {
            point: Point {
                id: id.to_string(),
                kind: PointKind::Delivery,
                lat: raw.lat,
                lng: raw.lng,
                name: raw.name.clone().unwrap_or_else(|| "delivery".to_string()).trim().to_string(),
                address: raw.address.clone().map(|a| a.trim().to_string()),
            },
            weight_kg: raw.weight_kg,
            priority: normalize_priority(&raw.priority),
            time_window,
            pickup_hint: pickup_hint.map(str::to_string),
        });
    }

    let mut fleet = Vec::with_capacity(request.fleet.len());
    let mut seen_vehicle_ids: HashMap<&str, ()> = HashMap::new();
    for raw in &request.fleet {
        let id = raw.id.trim();
        if id.is_empty() {
            return Err(err("fleet[].id", "must not be empty"));
        }
        if seen_vehicle_ids.insert(id, ()).is_some() {
            return Err(err("fleet[].id", format!("duplicate vehicle id '{id}'")));
        }
        if raw.capacity_kg <= 0.0 || !raw.capacity_kg.is_finite() {
            return Err(err("fleet[].capacityKg", "must be > 0"));
        }
        validate_coord("fleet[].startLat/startLng", raw.start_lat, raw.start_lng)?;

        fleet.push(Vehicle {
            id: id.to_string(),
            kind: normalize_vehicle_kind(&raw.kind),
            capacity_kg: raw.capacity_kg,
            start_lat: raw.start_lat,
            start_lng: raw.start_lng,
            status: normalize_vehicle_status(&raw.status),
        });
    }

    let business_rules = validate_business_rules(&request.business_rules)?;

    let raw_weights = request.preferences.weights.clone().unwrap_or_default();
    let mut weights = request
        .preferences
        .preset
        .as_deref()
        .map(crate::domain::cluster::FactorWeights::preset)
        .unwrap_or_default();
    if raw_weights.vehicle_to_pickup_distance.is_some() {
        weights = crate::domain::cluster::FactorWeights {
            vehicle_to_pickup_distance: raw_weights.vehicle_to_pickup_distance.unwrap_or(weights.vehicle_to_pickup_distance),
            pickup_to_delivery_distance: raw_weights.pickup_to_delivery_distance.unwrap_or(weights.pickup_to_delivery_distance),
            delivery_cluster_density: raw_weights.delivery_cluster_density.unwrap_or(weights.delivery_cluster_density),
            vehicle_load_balance: raw_weights.vehicle_load_balance.unwrap_or(weights.vehicle_load_balance),
            existing_route_compatibility: raw_weights.existing_route_compatibility.unwrap_or(weights.existing_route_compatibility),
        };
    }
    let weights = weights.normalized();

    Ok(ValidatedRequest {
        pickups,
        deliveries,
        fleet,
        business_rules,
        weights,
        distribution: normalize_distribution(request.preferences.distribution.as_deref()),
        weather: normalize_weather(request.context.weather.as_deref()),
        traffic: normalize_traffic(request.context.traffic.as_deref()),
    })
}

fn validate_business_rules(raw: &RawBusinessRules) -> Result<BusinessRules, CoreError> {
    let defaults = BusinessRules::default();

    let max_driver_hours = raw.max_driver_hours.unwrap_or(defaults.max_driver_hours);
    if !(1..=24).contains(&max_driver_hours) {
        return Err(err("businessRules.maxDriverHours", "must be in [1, 24]"));
    }

    let rest_period_min = raw.rest_period_min.unwrap_or(defaults.rest_period_min);
    if rest_period_min > 120 {
        return Err(err("businessRules.restPeriodMin", "must be in [0, 120]"));
    }

    let max_consecutive_drive_hours = raw
        .max_consecutive_drive_hours
        .unwrap_or(defaults.max_consecutive_drive_hours);
    if !(1..=12).contains(&max_consecutive_drive_hours) {
        return Err(err(
            "businessRules.maxConsecutiveDriveHours",
            "must be in [1, 12]",
        ));
    }

    let mut allowed_zones = Vec::with_capacity(raw.allowed_zones.len());
    for zone in &raw.allowed_zones {
        if zone.vertices.len() < 3 {
            return Err(err("businessRules.allowedZones[]", "polygon needs >= 3 vertices"));
        }
        allowed_zones.push(Zone { vertices: zone.vertices.clone() });
    }

    let mut restricted_zones = Vec::with_capacity(raw.restricted_zones.len());
    for rz in &raw.restricted_zones {
        if rz.zone.vertices.len() < 3 {
            return Err(err(
                "businessRules.restrictedZones[].zone",
                "polygon needs >= 3 vertices",
            ));
        }
        let window = match rz.active_window.as_deref() {
            Some(raw_tw) => parse_time_window("businessRules.restrictedZones[].activeWindow", raw_tw)?,
            None => TimeWindow::Closed,
        };
        restricted_zones.push(RestrictedZone {
            zone: Zone { vertices: rz.zone.vertices.clone() },
            active_window: window,
        });
    }

    Ok(BusinessRules {
        max_driver_hours,
        rest_period_min,
        max_consecutive_drive_hours,
        allowed_zones,
        restricted_zones,
    })
}
