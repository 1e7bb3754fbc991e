//! Enumerated configuration surface (spec §6), loaded from an optional TOML file with
//! environment-variable overrides — the same dotenv-then-env layering the teacher uses
//! in `database/sqlx.rs`/`distance/providers/osrm.rs`, generalised from a single
//! `DATABASE_URL` to the full key table below.
//!
//! Unrecognised TOML keys are silently ignored (serde drops fields the struct doesn't
//! declare) rather than rejected — spec §9 asks implementations to pick one behaviour
//! for "dynamic option bags" and document it; see DESIGN.md.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub timeout_ms: u64,
    pub weights_preset: String,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            timeout_ms: 30_000,
            weights_preset: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_ms: u64,
    pub concurrency: usize,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_ms: u64,
    pub reset_timeout_ms: u64,
    pub monitoring_window_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 60_000,
            reset_timeout_ms: 30_000,
            monitoring_window_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    pub sweep_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_ms: 5 * 60 * 1000,
            sweep_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub location_freshness_sec: u64,
    pub break_threshold: u32,
    pub target_deliveries: u32,
    pub max_working_hours: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            location_freshness_sec: 300,
            break_threshold: 6,
            target_deliveries: 20,
            max_working_hours: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub optimizer: OptimizerConfig,
    pub dispatch: EngineConfig,
    pub batching: EngineConfig,
    pub route_reopt: EngineConfig,
    pub sla: EngineConfig,
    pub breakers: HashMap<String, BreakerConfig>,
    pub cache_metrics: CacheConfig,
    pub sla_imminent_band_min: f64,
    pub driver: DriverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tick_ms: 5_000,
            concurrency: 8,
            enabled: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            optimizer: OptimizerConfig::default(),
            dispatch: EngineConfig { tick_ms: 5_000, ..EngineConfig::default() },
            batching: EngineConfig { tick_ms: 30_000, ..EngineConfig::default() },
            route_reopt: EngineConfig { tick_ms: 60_000, ..EngineConfig::default() },
            sla: EngineConfig { tick_ms: 15_000, ..EngineConfig::default() },
            breakers: HashMap::new(),
            cache_metrics: CacheConfig::default(),
            sla_imminent_band_min: 10.0,
            driver: DriverConfig::default(),
        }
    }
}

impl Config {
    /// Loads a TOML file if present, then applies a small set of environment overrides
    /// (`LOGISTICS_OPTIMIZER_TIMEOUT_MS`, `LOGISTICS_WEIGHTS_PRESET`), mirroring the
    /// teacher's dotenv-then-`env::var` layering.
    pub fn load(path: Option<&str>) -> Config {
        dotenv::dotenv().ok();

        let mut config = path
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|raw| toml::from_str::<Config>(&raw).ok())
            .unwrap_or_default();

        if let Ok(v) = std::env::var("LOGISTICS_OPTIMIZER_TIMEOUT_MS") {
            if let Ok(parsed) = v.parse() {
                config.optimizer.timeout_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("LOGISTICS_WEIGHTS_PRESET") {
            config.optimizer.weights_preset = v;
        }

        config
    }

    pub fn breaker(&self, dependency: &str) -> BreakerConfig {
        self.breakers.get(dependency).cloned().unwrap_or_default()
    }

    pub fn optimizer_timeout(&self) -> Duration {
        Duration::from_millis(self.optimizer.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = Config::default();
        assert_eq!(config.optimizer.timeout_ms, 30_000);
        assert_eq!(config.dispatch.tick_ms, 5_000);
        assert_eq!(config.batching.tick_ms, 30_000);
        assert_eq!(config.route_reopt.tick_ms, 60_000);
        assert_eq!(config.sla.tick_ms, 15_000);
        assert_eq!(config.cache_metrics.ttl_ms, 300_000);
        assert_eq!(config.sla_imminent_band_min, 10.0);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let raw = r#"
            [optimizer]
            timeout_ms = 1234
            weights_preset = "load_balanced"
            unknown_field = "ignored"

            [totally_unknown_section]
            foo = 1
        "#;
        let config: Config = toml::from_str(raw).expect("unknown keys must not fail parsing");
        assert_eq!(config.optimizer.timeout_ms, 1234);
    }
}
