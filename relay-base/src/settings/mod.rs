//! Settings for the relay engine.
//!
//! Settings are read, in order of increasing precedence, from:
//!
//! 1. every file listed (comma separated) in the `CONFIG_FILES` environment
//!    variable; the format is picked from the file extension,
//! 2. environment variables prefixed with `RELAY_`, where `__` separates
//!    nested keys. `RELAY_SCANNER__BLOCK_INTERVAL=6s` sets
//!    `scanner.block_interval`.

use std::num::NonZeroUsize;
use std::time::Duration;

use eyre::{ensure, Context, Result};
use serde::Deserialize;

pub use trace::*;

mod loader;
/// Tracing subscriber management
pub mod trace;

/// Prefix of the environment variables read by `RelaySettings::load`.
pub const ENV_PREFIX: &str = "RELAY";

/// Top-level settings of a relay process.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    /// Scanning pipeline settings
    pub scanner: ScannerSettings,
    /// Logging settings
    #[serde(default)]
    pub tracing: TracingConfig,
}

impl RelaySettings {
    /// Load settings from the files in `CONFIG_FILES` and the process
    /// environment.
    pub fn load() -> Result<Self> {
        let config_files: Vec<String> = std::env::var("CONFIG_FILES")
            .map(|s| s.split(',').map(|s| s.trim().to_owned()).collect())
            .unwrap_or_default();
        Self::load_from(&config_files, std::env::vars())
    }

    /// Load settings from explicit config files and environment variables.
    pub fn load_from(
        config_files: &[String],
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let settings: Self = loader::load_settings_object(ENV_PREFIX, config_files, env)?;
        settings.scanner.validate()?;
        Ok(settings)
    }
}

/// Settings for scanning one chain.
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerSettings {
    /// Name of the scanned chain, used in logs and metric labels
    pub chain: String,
    /// Time between two scan ticks, e.g. `"6s"`
    pub block_interval: String,
    /// Size of the scan worker pool. Defaults to the number of logical CPUs.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Scan from this height instead of the one after the saved checkpoint
    #[serde(default)]
    pub start_height: Option<u64>,
    /// Upper bound on the number of heights scanned in one tick. This also
    /// bounds how many blocks wait behind a failing height.
    #[serde(default = "default_max_heights_per_tick")]
    pub max_heights_per_tick: u64,
    /// Extra passes over failed heights within one tick
    #[serde(default = "default_max_height_retries")]
    pub max_height_retries: u32,
    /// Deadline of every call made to the chain, e.g. `"30s"`
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
    /// Forward blocks in ascending height order
    #[serde(default = "default_ordered_delivery")]
    pub ordered_delivery: bool,
    /// How often the congestion monitor is polled, e.g. `"5s"`
    #[serde(default = "default_congestion_poll_interval")]
    pub congestion_poll_interval: String,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            chain: String::new(),
            block_interval: "6s".to_owned(),
            workers: None,
            start_height: None,
            max_heights_per_tick: default_max_heights_per_tick(),
            max_height_retries: default_max_height_retries(),
            request_timeout: default_request_timeout(),
            ordered_delivery: default_ordered_delivery(),
            congestion_poll_interval: default_congestion_poll_interval(),
        }
    }
}

impl ScannerSettings {
    /// The parsed tick interval
    pub fn block_interval(&self) -> Result<Duration> {
        parse_duration("block_interval", &self.block_interval)
    }

    /// The parsed per-request deadline
    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration("request_timeout", &self.request_timeout)
    }

    /// The parsed congestion poll interval
    pub fn congestion_poll_interval(&self) -> Result<Duration> {
        parse_duration("congestion_poll_interval", &self.congestion_poll_interval)
    }

    /// Size of the scan worker pool
    pub fn workers(&self) -> usize {
        self.workers
            .filter(|workers| *workers > 0)
            .unwrap_or_else(default_workers)
    }

    /// Check that every duration parses and the tick window is not empty.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_heights_per_tick > 0,
            "`max_heights_per_tick` must be greater than zero"
        );
        self.block_interval()?;
        self.request_timeout()?;
        self.congestion_poll_interval()?;
        Ok(())
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    let duration = humantime::parse_duration(value)
        .with_context(|| format!("Invalid duration {value:?} for `{field}`"))?;
    ensure!(!duration.is_zero(), "`{field}` must be greater than zero");
    Ok(duration)
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn default_max_heights_per_tick() -> u64 {
    1_000
}

fn default_max_height_retries() -> u32 {
    3
}

fn default_request_timeout() -> String {
    "30s".to_owned()
}

fn default_ordered_delivery() -> bool {
    true
}

fn default_congestion_poll_interval() -> String {
    "5s".to_owned()
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_humantime_durations() {
        let settings = ScannerSettings {
            block_interval: "6s".to_owned(),
            request_timeout: "1m 30s".to_owned(),
            ..Default::default()
        };
        assert_eq!(settings.block_interval().unwrap(), Duration::from_secs(6));
        assert_eq!(settings.request_timeout().unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn rejects_bad_and_zero_durations() {
        let garbage = ScannerSettings {
            block_interval: "soon".to_owned(),
            ..Default::default()
        };
        assert!(garbage.block_interval().is_err());
        assert!(garbage.validate().is_err());

        let zero = ScannerSettings {
            block_interval: "0s".to_owned(),
            ..Default::default()
        };
        assert!(zero.block_interval().is_err());
    }

    #[test]
    fn zero_workers_falls_back_to_cpu_count() {
        let settings = ScannerSettings {
            workers: Some(0),
            ..Default::default()
        };
        assert!(settings.workers() >= 1);
        assert_eq!(
            ScannerSettings {
                workers: Some(5),
                ..Default::default()
            }
            .workers(),
            5
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let settings: ScannerSettings =
            serde_json::from_str(r#"{"chain": "icon", "block_interval": "2s"}"#).unwrap();
        assert_eq!(settings.chain, "icon");
        assert_eq!(settings.max_height_retries, 3);
        assert!(settings.ordered_delivery);
        assert_eq!(settings.request_timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(settings.start_height, None);
        assert_eq!(settings.max_heights_per_tick, 1_000);
    }

    #[test]
    fn rejects_empty_tick_window() {
        let settings = ScannerSettings {
            chain: "icon".to_owned(),
            max_heights_per_tick: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn env_overrides_config_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "scanner": {{ "chain": "icon", "block_interval": "6s", "workers": 2 }},
                "tracing": {{ "fmt": "json", "level": "debug" }}
            }}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_owned();

        let env = vec![
            ("RELAY_SCANNER__BLOCK_INTERVAL".to_owned(), "3s".to_owned()),
            ("RELAY_SCANNER__START_HEIGHT".to_owned(), "1200".to_owned()),
            ("UNRELATED".to_owned(), "ignored".to_owned()),
        ];
        let settings = RelaySettings::load_from(&[path], env).unwrap();

        assert_eq!(settings.scanner.chain, "icon");
        assert_eq!(settings.scanner.workers(), 2);
        assert_eq!(
            settings.scanner.block_interval().unwrap(),
            Duration::from_secs(3)
        );
        assert_eq!(settings.scanner.start_height, Some(1200));
        assert_eq!(settings.tracing.level, Level::Debug);
    }

    #[test]
    fn load_fails_on_invalid_interval() {
        let env = vec![
            ("RELAY_SCANNER__CHAIN".to_owned(), "icon".to_owned()),
            ("RELAY_SCANNER__BLOCK_INTERVAL".to_owned(), "whenever".to_owned()),
        ];
        assert!(RelaySettings::load_from(&[], env).is_err());
    }
}
