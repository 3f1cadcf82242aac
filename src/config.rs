use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use tracing::warn;

use crate::clock::Zone;
use crate::gate::{ClosedHoursConfig, ClosedHoursGate, ClosedWindow};
use crate::policy::GatingPolicy;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    // Closed window; None disables the gate (never closed)
    pub closed_hours: Option<ClosedHoursConfig>,

    // When false, the configured zone is ignored and local time is used
    pub zone_aware: bool,

    // Routing
    pub open_route: String,
    pub closed_route: String,
    /// Tracked routes. None means every route except the closed one.
    pub gated_routes: Option<Vec<String>>,

    // Polling period for re-evaluating the gate
    pub tick_interval_ms: u64,

    // Status HTTP server port (optional, disabled if not set)
    // When set, exposes /health, /ready, /status, /gate and /metrics
    pub status_port: Option<u16>,

    // Values that were malformed and replaced by their defaults
    pub problems: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    ///
    /// Malformed values never stop startup: each one falls back to its
    /// default, is logged, and is kept in `problems` for `validate()`.
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let mut problems: Vec<String> = Vec::new();

        let closed_hours = match (non_empty("CLOSED_START_HOUR"), non_empty("CLOSED_END_HOUR")) {
            (Some(start), Some(end)) => match parse_closed_hours(&start, &end) {
                Ok(window) => Some(ClosedHoursConfig {
                    start_hour: window.start_hour(),
                    end_hour: window.end_hour(),
                    time_zone: non_empty("CLOSED_TIME_ZONE").map(|z| z.trim().to_string()),
                }),
                Err(e) => {
                    problems.push(format!("{:#}; the gate is disabled (never closed).", e));
                    None
                }
            },
            // Either hour missing: the gate degrades to always open
            _ => None,
        };

        let zone_aware = match non_empty("ZONE_AWARE_GATE").map(|v| parse_bool(&v)) {
            None => true,
            Some(Ok(flag)) => flag,
            Some(Err(e)) => {
                problems.push(format!("ZONE_AWARE_GATE {}; using true.", e));
                true
            }
        };

        let tick_interval_ms = match non_empty("TICK_INTERVAL_MS").map(|s| s.trim().parse::<u64>()) {
            None => DEFAULT_TICK_INTERVAL_MS,
            Some(Ok(ms)) if ms > 0 => ms,
            Some(_) => {
                problems.push(format!(
                    "TICK_INTERVAL_MS must be a positive number of milliseconds; using {}.",
                    DEFAULT_TICK_INTERVAL_MS
                ));
                DEFAULT_TICK_INTERVAL_MS
            }
        };

        let status_port = match non_empty("STATUS_PORT") {
            None => None,
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => {
                    problems.push(format!(
                        "STATUS_PORT '{}' is not a valid port; the status server is disabled.",
                        raw.trim()
                    ));
                    None
                }
            },
        };

        for problem in &problems {
            warn!("{}", problem);
        }

        Ok(Config {
            closed_hours,
            zone_aware,

            open_route: non_empty("OPEN_ROUTE").unwrap_or_else(|| "/".to_string()),
            closed_route: non_empty("CLOSED_ROUTE").unwrap_or_else(|| "/closed".to_string()),
            gated_routes: non_empty("GATED_ROUTES").map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            }),

            tick_interval_ms,
            status_port,
            problems,
        })
    }

    /// Create config from a HashMap (convenience for testing)
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn build_gate(&self) -> Result<ClosedHoursGate> {
        ClosedHoursGate::new(self.closed_hours.as_ref(), self.zone_aware)
            .context("Invalid closed hours")
    }

    pub fn build_policy(&self) -> GatingPolicy {
        GatingPolicy::new(&self.open_route, &self.closed_route, self.gated_routes.clone())
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = self.problems.clone();

        if let Some(hours) = &self.closed_hours {
            if let Some(zone) = &hours.time_zone {
                if Zone::lookup(zone).is_none() {
                    errors.push(format!(
                        "CLOSED_TIME_ZONE '{}' is not a known IANA zone; local time would be used.",
                        zone
                    ));
                }
            }
        }

        for (name, route) in [("OPEN_ROUTE", &self.open_route), ("CLOSED_ROUTE", &self.closed_route)] {
            if !route.starts_with('/') {
                errors.push(format!("{} '{}' must start with '/'.", name, route));
            }
        }

        if let Some(routes) = &self.gated_routes {
            for route in routes.iter().filter(|r| !r.starts_with('/')) {
                errors.push(format!("GATED_ROUTES entry '{}' must start with '/'.", route));
            }
        }

        let policy = self.build_policy();
        if policy.open_route() == policy.closed_route() {
            errors.push("OPEN_ROUTE and CLOSED_ROUTE must differ.".to_string());
        }

        if self.tick_interval_ms > 60_000 {
            errors.push(format!(
                "TICK_INTERVAL_MS={} is too long (max: 60000); state changes would lag.",
                self.tick_interval_ms
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }
}

fn parse_closed_hours(start: &str, end: &str) -> Result<ClosedWindow> {
    let start_hour: u32 = start
        .trim()
        .parse()
        .with_context(|| format!("CLOSED_START_HOUR '{}' is not an hour between 0 and 23", start.trim()))?;
    let end_hour: u32 = end
        .trim()
        .parse()
        .with_context(|| format!("CLOSED_END_HOUR '{}' is not an hour between 0 and 23", end.trim()))?;
    ClosedWindow::new(start_hour, end_hour).context("Invalid closed hours")
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a boolean: '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gated_env() -> HashMap<&'static str, &'static str> {
        let mut m = HashMap::new();
        m.insert("CLOSED_START_HOUR", "21");
        m.insert("CLOSED_END_HOUR", "9");
        m.insert("CLOSED_TIME_ZONE", "America/Denver");
        m
    }

    #[test]
    fn test_empty_env_disables_gate() {
        let config = Config::from_map(&HashMap::new()).expect("empty env should parse");

        assert!(config.closed_hours.is_none());
        assert!(config.zone_aware);
        assert_eq!(config.open_route, "/");
        assert_eq!(config.closed_route, "/closed");
        assert_eq!(config.gated_routes, None);
        assert_eq!(config.tick_interval_ms, 1000); // default
        assert_eq!(config.status_port, None);
        assert!(!config.build_gate().unwrap().is_enabled());
    }

    #[test]
    fn test_closed_hours_parsed() {
        let config = Config::from_map(&gated_env()).expect("should parse");
        assert_eq!(
            config.closed_hours,
            Some(ClosedHoursConfig::new(21, 9, Some("America/Denver")))
        );
        assert!(config.build_gate().unwrap().is_enabled());
    }

    #[test]
    fn test_one_hour_missing_disables_gate() {
        for field in ["CLOSED_START_HOUR", "CLOSED_END_HOUR"] {
            let mut env = gated_env();
            env.remove(field);
            let config = Config::from_map(&env).expect("should parse");
            assert!(config.closed_hours.is_none(), "missing {} should disable gate", field);
        }
    }

    #[test]
    fn test_blank_hour_disables_gate() {
        let mut env = gated_env();
        env.insert("CLOSED_START_HOUR", "  ");
        let config = Config::from_map(&env).expect("should parse");
        assert!(config.closed_hours.is_none());
    }

    #[test]
    fn test_invalid_hour_not_numeric_disables_gate() {
        let mut env = gated_env();
        env.insert("CLOSED_START_HOUR", "nine");
        let config = Config::from_map(&env).expect("malformed hour must not stop startup");
        assert!(config.closed_hours.is_none());
        assert!(!config.build_gate().unwrap().is_enabled());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("CLOSED_START_HOUR"), "error should mention CLOSED_START_HOUR: {}", err);
    }

    #[test]
    fn test_invalid_hour_out_of_range_disables_gate() {
        for (field, value) in [("CLOSED_START_HOUR", "24"), ("CLOSED_END_HOUR", "99")] {
            let mut env = gated_env();
            env.insert(field, value);
            let config = Config::from_map(&env).expect("out-of-range hour must not stop startup");
            assert!(config.closed_hours.is_none(), "{}={} should disable gate", field, value);

            let err = config.validate().unwrap_err().to_string();
            assert!(err.contains("between 0 and 23"), "error should explain the range: {}", err);
            assert!(err.contains("disabled"), "error should say the gate is off: {}", err);
        }
    }

    #[test]
    fn test_zone_aware_flag() {
        let mut env = gated_env();
        env.insert("ZONE_AWARE_GATE", "false");
        let config = Config::from_map(&env).expect("should parse");
        assert!(!config.zone_aware);
        assert_eq!(config.build_gate().unwrap().zone(), Zone::Local);

        env.insert("ZONE_AWARE_GATE", "maybe");
        let config = Config::from_map(&env).expect("malformed flag falls back");
        assert!(config.zone_aware);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("ZONE_AWARE_GATE"), "{}", err);
    }

    #[test]
    fn test_gated_routes_list() {
        let mut env = gated_env();
        env.insert("GATED_ROUTES", "/, /lab ,,/archive");
        let config = Config::from_map(&env).expect("should parse");
        assert_eq!(
            config.gated_routes,
            Some(vec!["/".to_string(), "/lab".to_string(), "/archive".to_string()])
        );
    }

    #[test]
    fn test_tick_interval_invalid_uses_default() {
        let mut env = gated_env();
        env.insert("TICK_INTERVAL_MS", "fast");
        let config = Config::from_map(&env).expect("should parse with default");
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_tick_interval_uses_default() {
        let mut env = gated_env();
        env.insert("TICK_INTERVAL_MS", "0");
        let config = Config::from_map(&env).expect("should parse with default");
        assert_eq!(config.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        assert!(!config.tick_interval().is_zero());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("TICK_INTERVAL_MS"), "{}", err);
    }

    #[test]
    fn test_status_port() {
        let mut env = gated_env();
        env.insert("STATUS_PORT", "8080");
        assert_eq!(Config::from_map(&env).unwrap().status_port, Some(8080));

        env.insert("STATUS_PORT", "99999");
        let config = Config::from_map(&env).unwrap();
        assert_eq!(config.status_port, None);
        assert_eq!(config.problems.len(), 1);
        assert!(config.problems[0].contains("STATUS_PORT '99999'"), "{:?}", config.problems);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::from_map(&gated_env()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_unknown_zone() {
        let mut env = gated_env();
        env.insert("CLOSED_TIME_ZONE", "Atlantis/Capital");
        let config = Config::from_map(&env).expect("unknown zone still parses");
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("CLOSED_TIME_ZONE"), "{}", err);
        // The gate itself still builds and falls back to local time
        assert_eq!(config.build_gate().unwrap().zone(), Zone::Local);
    }

    #[test]
    fn test_validation_routes() {
        let mut env = gated_env();
        env.insert("OPEN_ROUTE", "home");
        env.insert("GATED_ROUTES", "/lab,archive");
        let config = Config::from_map(&env).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("OPEN_ROUTE"), "{}", err);
        assert!(err.contains("archive"), "{}", err);
    }

    #[test]
    fn test_validation_same_routes() {
        let mut env = gated_env();
        env.insert("OPEN_ROUTE", "/closed/");
        let config = Config::from_map(&env).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("must differ"), "{}", err);
    }

    #[test]
    fn test_validation_tick_interval_bounds() {
        let mut env = gated_env();
        env.insert("TICK_INTERVAL_MS", "120000");
        let err = Config::from_map(&env).unwrap().validate().unwrap_err().to_string();
        assert!(err.contains("too long"), "{}", err);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool(" on ").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("2").is_err());
    }
}
