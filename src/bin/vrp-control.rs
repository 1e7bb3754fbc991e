//! Demo CLI for the logistics control plane (§9 ambient tooling).
//!
//! `vrp-control optimize [n_deliveries]` runs one synthetic request through the
//! optimization engine and prints a colored summary, mirroring the teacher's
//! `print_solution`. `vrp-control serve [seconds]` boots the automation-engine
//! supervisor, enqueues a handful of orders, and prints periodic status snapshots.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use colored::*;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use logistics_control_plane::config::Config;
use logistics_control_plane::coordinator;
use logistics_control_plane::deps::{ExternalDependency, MockDependency};
use logistics_control_plane::domain::driver::{DriverRegistry, DriverState, DriverStateKind};
use logistics_control_plane::engines::supervisor::Supervisor;
use logistics_control_plane::engines::EngineName;
use logistics_control_plane::events::EventHub;
use logistics_control_plane::fixtures::data_generator;

const DEPOT: (f64, f64) = (1.3521, 103.8198);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().compact())
        .init();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("serve") => {
            let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(20);
            run_serve(seconds).await;
        }
        _ => {
            let delivery_count: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(30);
            run_optimize(delivery_count)?;
        }
    }

    Ok(())
}

fn run_optimize(delivery_count: usize) -> Result<(), Box<dyn Error>> {
    let config = Config::load(None);
    let request = data_generator::generate_request(2, delivery_count, 5, DEPOT, None);

    let result = coordinator::optimize("demo-request", &request, config.optimizer_timeout(), 9 * 60)?;

    println!(
        "{}",
        format!(
            "routes={} deliveries={} unserviceable={}",
            result.summary.route_count, result.summary.delivery_count, result.unserviceable.len()
        )
        .green()
    );
    println!(
        "total_distance_km={:.2} total_duration_min={:.1} avg_load_per_vehicle={:.1}",
        result.summary.total_distance_km, result.summary.total_duration_min, result.summary.avg_load_per_vehicle
    );

    for route in &result.routes {
        println!(
            "{} vehicle={} stops={} load={:.1}/{:.1}kg distance={:.2}km",
            route.id.cyan(),
            route.vehicle.id,
            route.waypoints.len(),
            route.load_kg,
            route.vehicle.capacity_kg,
            route.total_distance_km
        );
    }

    if !result.unserviceable.is_empty() {
        for entry in &result.unserviceable {
            println!(
                "{}",
                format!("unserviceable delivery={} reason={:?}", entry.delivery.point.id, entry.reason).red()
            );
        }
    }

    Ok(())
}

async fn run_serve(seconds: u64) {
    let config = Config::default();
    let hub = Arc::new(EventHub::new());
    let advisor: Arc<dyn ExternalDependency> = Arc::new(MockDependency { name: "advisor".to_string(), succeed: true });
    let store: Arc<dyn ExternalDependency> = Arc::new(MockDependency { name: "store".to_string(), succeed: true });

    let drivers = DriverRegistry::new();
    for i in 0..5 {
        let mut driver = DriverState::new(format!("driver-{i}"), DEPOT, std::time::Instant::now());
        driver.state = DriverStateKind::Available;
        drivers.upsert(driver);
    }

    let supervisor = Supervisor::new(&config, advisor, store, drivers, hub);

    supervisor.start_all();
    for i in 0..20 {
        supervisor.enqueue_at(EngineName::Dispatch, format!("order-{i}"), DEPOT);
        supervisor.enqueue(EngineName::Batching, format!("order-{i}"));
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(seconds);
    let mut tick = tokio::time::interval(Duration::from_secs(2));
    while tokio::time::Instant::now() < deadline {
        tick.tick().await;
        for status in supervisor.status_all() {
            println!(
                "{:<12} state={:?} degraded={} concurrency={}",
                status.name.as_str(),
                status.state,
                status.degraded,
                status.effective_concurrency
            );
        }
    }

    let failures = supervisor.stop_all().await;
    if failures.is_empty() {
        println!("{}", "all engines stopped cleanly".green());
    } else {
        println!("{}", format!("engines still running: {failures:?}").red());
    }
}
