//! Geo points, vehicles and business rules (spec §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    Pickup,
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// §4.4 — higher priority shortens perceived nearest-neighbour distance.
    pub fn factor(self) -> f64 {
        match self {
            Priority::High => 0.7,
            Priority::Medium => 1.0,
            Priority::Low => 1.3,
        }
    }

    /// Maps the numeric `priority ∈ [1..10]` field of a [`DeliveryPoint`] onto the
    /// three-way HIGH/MEDIUM/LOW band used by the sequencer's priority tilt (§4.4).
    /// 8..10 -> High, 4..7 -> Medium, 1..3 -> Low.
    pub fn from_numeric(priority: u8) -> Priority {
        match priority {
            8..=10 => Priority::High,
            4..=7 => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleKind {
    Car,
    Van,
    Truck,
    Motorcycle,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Available,
    Unavailable,
    Delivering,
    Returning,
}

/// `{start, end}` wall times on a service day, or the special `closed` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Open { start_min: u16, end_min: u16 },
    Closed,
}

impl TimeWindow {
    /// Parses the `HH:MM-HH:MM` shape required by §4.1, or the literal `closed`.
    /// Returns `None` on any shape violation — the caller turns that into a validation error.
    pub fn parse(raw: &str) -> Option<TimeWindow> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("closed") {
            return Some(TimeWindow::Closed);
        }

        let (start, end) = raw.split_once('-')?;
        let start_min = parse_hhmm(start)?;
        let end_min = parse_hhmm(end)?;
        if start_min > end_min {
            return None;
        }
        Some(TimeWindow::Open { start_min, end_min })
    }

    pub fn contains(&self, minute_of_day: u16) -> bool {
        match self {
            TimeWindow::Closed => false,
            TimeWindow::Open { start_min, end_min } => {
                minute_of_day >= *start_min && minute_of_day <= *end_min
            }
        }
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        match (self, other) {
            (TimeWindow::Closed, _) | (_, TimeWindow::Closed) => false,
            (
                TimeWindow::Open { start_min: s1, end_min: e1 },
                TimeWindow::Open { start_min: s2, end_min: e2 },
            ) => s1 <= e2 && s2 <= e1,
        }
    }
}

fn parse_hhmm(raw: &str) -> Option<u16> {
    let (h, m) = raw.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let h: u16 = h.parse().ok()?;
    let m: u16 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: String,
    pub kind: PointKind,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPoint {
    pub point: Point,
    pub weight_kg: f64,
    pub priority: u8,
    pub time_window: Option<TimeWindow>,
    pub pickup_hint: Option<String>,
}

impl DeliveryPoint {
    pub fn priority_band(&self) -> Priority {
        Priority::from_numeric(self.priority)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: String,
    pub kind: VehicleKind,
    pub capacity_kg: f64,
    pub start_lat: f64,
    pub start_lng: f64,
    pub status: VehicleStatus,
}

/// A closed polygon of >= 3 coordinates (lat, lng pairs).
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub vertices: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestrictedZone {
    pub zone: Zone,
    pub active_window: TimeWindow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRules {
    pub max_driver_hours: u8,
    pub rest_period_min: u16,
    pub max_consecutive_drive_hours: u8,
    pub allowed_zones: Vec<Zone>,
    pub restricted_zones: Vec<RestrictedZone>,
}

impl Default for BusinessRules {
    fn default() -> Self {
        BusinessRules {
            max_driver_hours: 10,
            rest_period_min: 30,
            max_consecutive_drive_hours: 4,
            allowed_zones: Vec::new(),
            restricted_zones: Vec::new(),
        }
    }
}
