use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use shared::StatusFilter;
use thiserror::Error;
use tracing::warn;

pub const SETTINGS_FILE: &str = "coordination.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub change_channel_capacity: usize,
    pub action_channel_capacity: usize,
    /// `0` disables the per-handler timeout on `send`.
    pub send_handler_timeout_ms: u64,
    pub default_status_filter: StatusFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            change_channel_capacity: 256,
            action_channel_capacity: 1024,
            send_handler_timeout_ms: 30_000,
            default_status_filter: StatusFilter::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSettings {
    change_channel_capacity: Option<usize>,
    action_channel_capacity: Option<usize>,
    send_handler_timeout_ms: Option<u64>,
    default_status_filter: Option<StatusFilter>,
}

impl Settings {
    pub fn send_handler_timeout(&self) -> Option<Duration> {
        (self.send_handler_timeout_ms > 0).then(|| Duration::from_millis(self.send_handler_timeout_ms))
    }

    pub fn merge_toml(&mut self, raw: &str) -> Result<(), SettingsError> {
        let file_cfg: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file_cfg.change_channel_capacity {
            self.change_channel_capacity = v;
        }
        if let Some(v) = file_cfg.action_channel_capacity {
            self.action_channel_capacity = v;
        }
        if let Some(v) = file_cfg.send_handler_timeout_ms {
            self.send_handler_timeout_ms = v;
        }
        if let Some(v) = file_cfg.default_status_filter {
            self.default_status_filter = v;
        }
        self.clamp_capacities();
        Ok(())
    }

    /// Applies `APP__*` overrides. Values that fail to parse are reported and
    /// leave the current setting in place.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();

        if let Some(v) = lookup("APP__CHANGE_CHANNEL_CAPACITY") {
            match v.parse() {
                Ok(parsed) => self.change_channel_capacity = parsed,
                Err(_) => errors.push(SettingsError::InvalidValue {
                    key: "APP__CHANGE_CHANNEL_CAPACITY",
                    value: v,
                }),
            }
        }
        if let Some(v) = lookup("APP__ACTION_CHANNEL_CAPACITY") {
            match v.parse() {
                Ok(parsed) => self.action_channel_capacity = parsed,
                Err(_) => errors.push(SettingsError::InvalidValue {
                    key: "APP__ACTION_CHANNEL_CAPACITY",
                    value: v,
                }),
            }
        }
        if let Some(v) = lookup("APP__SEND_HANDLER_TIMEOUT_MS") {
            match v.parse() {
                Ok(parsed) => self.send_handler_timeout_ms = parsed,
                Err(_) => errors.push(SettingsError::InvalidValue {
                    key: "APP__SEND_HANDLER_TIMEOUT_MS",
                    value: v,
                }),
            }
        }
        if let Some(v) = lookup("APP__DEFAULT_STATUS_FILTER") {
            match StatusFilter::parse(v.split(',').filter(|item| !item.trim().is_empty())) {
                Ok(parsed) => self.default_status_filter = parsed,
                Err(_) => errors.push(SettingsError::InvalidValue {
                    key: "APP__DEFAULT_STATUS_FILTER",
                    value: v,
                }),
            }
        }

        self.clamp_capacities();
        errors
    }

    // tokio broadcast channels panic on zero capacity.
    fn clamp_capacities(&mut self) {
        self.change_channel_capacity = self.change_channel_capacity.max(1);
        self.action_channel_capacity = self.action_channel_capacity.max(1);
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Err(error) = settings.merge_toml(&raw) {
            warn!(path = %path.display(), %error, "ignoring settings file");
        }
    }

    for error in settings.apply_env(|key| std::env::var(key).ok()) {
        warn!(%error, "ignoring environment override");
    }

    settings
}
