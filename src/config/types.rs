use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default batch cutoff. Keeps request bodies well under the receiver's
/// practical request size limit.
pub const DEFAULT_BATCH_SIZE: usize = 900 * 1024;

pub const DEFAULT_PROVISION_API_URL: &str = "https://api.de.sumologic.com/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Holds the cursor file and pending batch files
    pub work_dir: PathBuf,
    pub source: SourceConfig,
    pub harvest: HarvestConfig,
    pub delivery: DeliveryConfig,
    pub provision: ProvisionConfig,
    pub shutdown: ShutdownConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            source: SourceConfig::default(),
            harvest: HarvestConfig::default(),
            delivery: DeliveryConfig::default(),
            provision: ProvisionConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".local/jforward"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/jforward"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// journalctl binary
    pub program: String,
    /// Only forward records matching this pattern (journalctl --grep)
    pub grep: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            program: "journalctl".to_string(),
            grep: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    #[serde(with = "duration_format")]
    pub interval: Duration,
    /// Uncompressed bytes per batch before a new one is started
    pub batch_size: usize,
    pub compression_level: i32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            batch_size: DEFAULT_BATCH_SIZE,
            compression_level: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Receiver URL. Resolved through the management API when empty.
    pub url: Option<String>,
    /// Source category override sent with every batch
    pub category: Option<String>,
    #[serde(with = "duration_format")]
    pub interval: Duration,
    #[serde(with = "duration_format")]
    pub timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            url: None,
            category: None,
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    pub api_url: String,
    #[serde(with = "duration_format")]
    pub timeout: Duration,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PROVISION_API_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShutdownConfig {
    /// Upper bound on waiting for running cycles after an interrupt
    #[serde(with = "duration_format")]
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Command line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub category: Option<String>,
    pub grep: Option<String>,
    pub read_interval: Option<Duration>,
    pub upload_interval: Option<Duration>,
    pub work_dir: Option<PathBuf>,
}

impl Config {
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.url {
            self.delivery.url = Some(url);
        }
        if let Some(category) = overrides.category {
            self.delivery.category = Some(category);
        }
        if let Some(grep) = overrides.grep {
            self.source.grep = Some(grep);
        }
        if let Some(interval) = overrides.read_interval {
            self.harvest.interval = interval;
        }
        if let Some(interval) = overrides.upload_interval {
            self.delivery.interval = interval;
        }
        if let Some(work_dir) = overrides.work_dir {
            self.work_dir = work_dir;
        }
    }
}

// Custom serde module for duration parsing
pub mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Parses `500ms`, `5s`, `2m` or `1h`
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
            (v, "ms")
        } else if let Some(v) = s.strip_suffix('s') {
            (v, "s")
        } else if let Some(v) = s.strip_suffix('m') {
            (v, "m")
        } else if let Some(v) = s.strip_suffix('h') {
            (v, "h")
        } else {
            return Err(format!("invalid duration format: {}", s));
        };

        let value: u64 = value_str
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        let duration = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            _ => return Err(format!("unknown unit: {}", unit)),
        };

        Ok(duration)
    }

    pub fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_nanos() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }

}
