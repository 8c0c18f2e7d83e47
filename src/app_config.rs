use config::{Config, ConfigError, Environment, File, Map, Source, Value, ValueKind};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    host: String,
    uid: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    request_timeout: Duration,
    #[serde(default = "default_log_level", deserialize_with = "deserialize_level_filter")]
    log_level: LevelFilter,
    #[serde(default)]
    shim: Shim,
    #[serde(rename = "dumbSwitches", default)]
    dumb_switches: BTreeMap<String, DumbSwitch>,
}

const ENV_PREFIX: &str = "SHIMS_";
const MAX_TOGGLE_ATTEMPTS: usize = 100;

/// Spellings of the `dumbSwitches` key. Environment keys arrive lower-cased, so they are merged last and win.
const DUMB_SWITCHES_KEYS: [&str; 3] = ["dumbSwitches", "dumb_switches", "dumbswitches"];
const LIGHT_ID_LIST_KEYS: [&str; 2] = ["trigger_light_ids", "target_light_ids"];

impl AppConfig {
    /// Loads the configuration from `path` (with or without extension), overridden by `SHIMS_*` environment variables.
    pub fn load(path: &str) -> Result<Self, AppConfigError> {
        Self::load_from(File::with_name(path).required(true), env::vars().collect())
    }

    fn load_from<T>(source: T, mut vars: Map<String, String>) -> Result<Self, AppConfigError>
    where
        T: Source + Send + Sync + 'static,
    {
        let mut builder = Config::builder().add_source(source);

        // Light id lists are comma separated and always applied as lists, even with a single id
        let list_vars = vars
            .keys()
            .filter_map(|var| light_id_list_key(var).map(|key| (var.clone(), key)))
            .collect::<Vec<_>>();
        for (var, key) in list_vars {
            if let Some(value) = vars.remove(&var) {
                builder = builder.set_override(key, split_light_ids(&value))?;
            }
        }

        let mut root = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX.trim_end_matches('_'))
                    .prefix_separator("_")
                    .separator("__")
                    .source(Some(vars)),
            )
            .build()?
            .try_deserialize::<Map<String, Value>>()?;

        let dumb_switches = DUMB_SWITCHES_KEYS
            .iter()
            .filter_map(|key| root.remove(*key))
            .reduce(merge);
        if let Some(dumb_switches) = dumb_switches {
            root.insert(DUMB_SWITCHES_KEYS[0].to_string(), dumb_switches);
        }

        let config: AppConfig = Value::new(None, ValueKind::Table(root)).try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppConfigError> {
        if !(1..=MAX_TOGGLE_ATTEMPTS).contains(&self.shim.toggle_attempts) {
            return Err(AppConfigError::ToggleAttemptsOutOfRange {
                attempts: self.shim.toggle_attempts,
                max: MAX_TOGGLE_ATTEMPTS,
            });
        }

        match self.dumb_switches.iter().find(|(_, switch)| switch.trigger_light_ids.is_empty()) {
            Some((name, _)) => Err(AppConfigError::NoTriggerLights { switch: name.clone() }),
            None => Ok(()),
        }
    }

    /// The Hue API v1 base url, `http://{host}/api/{uid}`. A host that already carries a scheme is kept as is.
    pub fn api_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.contains("://") {
            format!("{}/api/{}", host, self.uid)
        } else {
            format!("http://{}/api/{}", host, self.uid)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn shim(&self) -> &Shim {
        &self.shim
    }

    pub fn dumb_switches(&self) -> &BTreeMap<String, DumbSwitch> {
        &self.dumb_switches
    }
}

fn split_light_ids(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Maps `SHIMS_DUMBSWITCHES__HALLWAY__TRIGGER_LIGHT_IDS` to `dumbswitches.hallway.trigger_light_ids`.
fn light_id_list_key(var: &str) -> Option<String> {
    let key = var.strip_prefix(ENV_PREFIX)?.to_lowercase().replace("__", ".");
    LIGHT_ID_LIST_KEYS
        .iter()
        .any(|list_key| key.ends_with(&format!(".{}", list_key)))
        .then_some(key)
}

/// Deep merges two configuration values, `overlay` winning over `base`.
fn merge(base: Value, overlay: Value) -> Value {
    match (base.clone().into_table(), overlay.clone().into_table()) {
        (Ok(mut table), Ok(overlay_table)) => {
            for (key, value) in overlay_table {
                let merged = match table.remove(&key) {
                    Some(existing) => merge(existing, value),
                    None => value,
                };
                table.insert(key, merged);
            }
            Value::new(None, ValueKind::Table(table))
        }
        _ => overlay,
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_log_level() -> LevelFilter {
    LevelFilter::INFO
}

fn deserialize_level_filter<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    let level = String::deserialize(deserializer)?;
    level.parse::<LevelFilter>().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Shim {
    #[serde(with = "humantime_serde")]
    on_poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    off_poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    verify_delay: Duration,
    toggle_attempts: usize,
    #[serde(with = "humantime_serde")]
    backoff_unit: Duration,
}

impl Default for Shim {
    fn default() -> Self {
        Shim {
            // Lights take a while to drop off the Zigbee mesh, but come back quickly
            on_poll_interval: Duration::from_secs(30),
            off_poll_interval: Duration::from_secs(5),
            verify_delay: Duration::from_secs(30),
            toggle_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl Shim {
    pub fn on_poll_interval(&self) -> Duration {
        self.on_poll_interval
    }

    pub fn off_poll_interval(&self) -> Duration {
        self.off_poll_interval
    }

    pub fn verify_delay(&self) -> Duration {
        self.verify_delay
    }

    pub fn toggle_attempts(&self) -> usize {
        self.toggle_attempts
    }

    pub fn backoff_unit(&self) -> Duration {
        self.backoff_unit
    }
}

#[cfg(test)]
impl Shim {
    /// Timings that keep tests fast.
    pub fn immediate() -> Self {
        let millisecond = Duration::from_millis(1);
        Shim {
            on_poll_interval: millisecond,
            off_poll_interval: millisecond,
            verify_delay: millisecond,
            toggle_attempts: 3,
            backoff_unit: millisecond,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DumbSwitch {
    trigger_light_ids: Vec<u32>,
    #[serde(default)]
    target_light_ids: Vec<u32>,
}

impl DumbSwitch {
    #[cfg(test)]
    pub fn new(trigger_light_ids: Vec<u32>, target_light_ids: Vec<u32>) -> Self {
        DumbSwitch {
            trigger_light_ids,
            target_light_ids,
        }
    }

    pub fn trigger_light_ids(&self) -> &[u32] {
        &self.trigger_light_ids
    }

    pub fn target_light_ids(&self) -> &[u32] {
        &self.target_light_ids
    }
}

#[derive(Error, Debug)]
pub enum AppConfigError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("dumb switch '{switch}' has no trigger lights")]
    NoTriggerLights { switch: String },
    #[error("shim.toggle_attempts is {attempts}, expected 1 to {max}")]
    ToggleAttemptsOutOfRange { attempts: usize, max: usize },
}

#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn new() -> Self {
        AppConfigBuilder {
            config: AppConfig {
                host: "hue.local".to_string(),
                uid: "uid".to_string(),
                request_timeout: Duration::from_secs(1),
                log_level: LevelFilter::INFO,
                shim: Shim::immediate(),
                dumb_switches: BTreeMap::new(),
            },
        }
    }

    pub fn host(mut self, host: String) -> Self {
        self.config.host = host;
        self
    }

    pub fn dumb_switch(mut self, name: &str, trigger_light_ids: Vec<u32>, target_light_ids: Vec<u32>) -> Self {
        self.config
            .dumb_switches
            .insert(name.to_string(), DumbSwitch::new(trigger_light_ids, target_light_ids));
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
