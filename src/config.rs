//! Service configuration, read once from `GLAMTIPS_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::notify::SalonProfile;
use crate::slots::{SlotGrid, SlotTime};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}: cannot parse {value:?}")]
    Parse { name: &'static str, value: String },
    #[error("slot grid {opening}..{closing} every {step} min is empty")]
    EmptyGrid {
        opening: SlotTime,
        closing: SlotTime,
        step: u16,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Prometheus exporter port; disabled when unset.
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub grid: SlotGrid,
    pub email_relay_url: Option<String>,
    pub calendar_relay_url: Option<String>,
    pub notify_timeout: Duration,
    pub notify_queue: usize,
    pub time_zone: String,
    pub salon: SalonProfile,
    /// Allowed CORS origins; any origin when empty.
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let opening: SlotTime = parse_or(&var, "GLAMTIPS_OPENING", SlotTime::from_hm(9, 0))?;
        let closing: SlotTime = parse_or(&var, "GLAMTIPS_CLOSING", SlotTime::from_hm(18, 0))?;
        let step: u16 = parse_or(&var, "GLAMTIPS_SLOT_MINUTES", Some(30))?;
        let grid = SlotGrid::stepped(opening, closing, step).ok_or(ConfigError::EmptyGrid {
            opening,
            closing,
            step,
        })?;

        Ok(Self {
            bind: var("GLAMTIPS_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "GLAMTIPS_PORT", Some(5000))?,
            data_dir: var("GLAMTIPS_DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            metrics_port: parse_opt(&var, "GLAMTIPS_METRICS_PORT")?,
            compact_threshold: parse_or(&var, "GLAMTIPS_COMPACT_THRESHOLD", Some(1000))?,
            grid,
            email_relay_url: var("GLAMTIPS_EMAIL_RELAY_URL"),
            calendar_relay_url: var("GLAMTIPS_CALENDAR_RELAY_URL"),
            notify_timeout: Duration::from_secs(parse_or(&var, "GLAMTIPS_NOTIFY_TIMEOUT_SECS", Some(10))?),
            notify_queue: parse_or(&var, "GLAMTIPS_NOTIFY_QUEUE", Some(1024))?,
            time_zone: var("GLAMTIPS_TIMEZONE").unwrap_or_else(|| "America/New_York".into()),
            salon: SalonProfile {
                name: var("GLAMTIPS_SALON_NAME").unwrap_or_else(|| "Glam Tips Nail Salon".into()),
                location: var("GLAMTIPS_SALON_LOCATION")
                    .unwrap_or_else(|| "123 Beauty Street, Glamour City".into()),
            },
            cors_origins: var("GLAMTIPS_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("glamtips.wal")
    }
}

fn parse_opt<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match var(name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Parse { name, value }),
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match parse_opt(var, name)?.or(default) {
        Some(v) => Ok(v),
        None => Err(ConfigError::Parse {
            name,
            value: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 5000);
        assert_eq!(c.bind, "0.0.0.0");
        assert_eq!(c.grid, SlotGrid::default());
        assert_eq!(c.metrics_port, None);
        assert_eq!(c.compact_threshold, 1000);
        assert_eq!(c.notify_timeout, Duration::from_secs(10));
        assert_eq!(c.time_zone, "America/New_York");
        assert_eq!(c.salon.name, "Glam Tips Nail Salon");
        assert!(c.email_relay_url.is_none());
        assert!(c.cors_origins.is_empty());
        assert_eq!(c.wal_path(), PathBuf::from("./data/glamtips.wal"));
    }

    #[test]
    fn overrides() {
        let c = config(&[
            ("GLAMTIPS_PORT", "8080"),
            ("GLAMTIPS_METRICS_PORT", "9100"),
            ("GLAMTIPS_OPENING", "10:00"),
            ("GLAMTIPS_CLOSING", "7:00 PM"),
            ("GLAMTIPS_SLOT_MINUTES", "60"),
            ("GLAMTIPS_EMAIL_RELAY_URL", "http://relay.local/email"),
            ("GLAMTIPS_CORS_ORIGINS", "http://localhost:5173, https://glamtips.example ,"),
            ("GLAMTIPS_SALON_LOCATION", "  "),
        ])
        .unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.metrics_port, Some(9100));
        assert_eq!(c.grid.len(), 9);
        assert_eq!(c.grid.slots()[0].to_string(), "10:00");
        assert_eq!(c.email_relay_url.as_deref(), Some("http://relay.local/email"));
        assert_eq!(c.cors_origins, vec!["http://localhost:5173", "https://glamtips.example"]);
        assert_eq!(c.salon.location, "123 Beauty Street, Glamour City");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            config(&[("GLAMTIPS_PORT", "http")]),
            Err(ConfigError::Parse { name: "GLAMTIPS_PORT", .. })
        ));
        assert!(matches!(
            config(&[("GLAMTIPS_OPENING", "18:00"), ("GLAMTIPS_CLOSING", "09:00")]),
            Err(ConfigError::EmptyGrid { .. })
        ));
        assert!(matches!(
            config(&[("GLAMTIPS_SLOT_MINUTES", "0")]),
            Err(ConfigError::EmptyGrid { .. })
        ));
    }
}
