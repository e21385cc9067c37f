//! Environment driven configuration
use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub outgoing_folder: PathBuf,
    pub incoming_ack_folder: PathBuf,
    pub incoming_error_folder: PathBuf,
    pub archive_path: PathBuf,
    pub debounce_secs: f64,
    pub monitoring_enabled: bool,
    pub poll_interval_ms: u64,
    pub log_level: String,
    pub log_json: bool,
    pub max_file_size_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            outgoing_folder: "outgoing/".into(),
            incoming_ack_folder: "incoming/out/".into(),
            incoming_error_folder: "incoming/error/".into(),
            archive_path: "archive/reports.db".into(),
            debounce_secs: 2.0,
            monitoring_enabled: true,
            poll_interval_ms: 2000,
            log_level: "info".into(),
            log_json: false,
            max_file_size_mb: 100,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            name: name.into(),
            value,
        })
}

fn parse_bool(name: &str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.into(),
            value,
        }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(v) = lookup("OUTGOING_FOLDER") {
            config.outgoing_folder = v.into();
        }
        if let Some(v) = lookup("INCOMING_ACK_FOLDER") {
            config.incoming_ack_folder = v.into();
        }
        if let Some(v) = lookup("INCOMING_ERROR_FOLDER") {
            config.incoming_error_folder = v.into();
        }
        if let Some(v) = lookup("ARCHIVE_PATH") {
            config.archive_path = v.into();
        }
        if let Some(v) = lookup("DEBOUNCE_TIME") {
            config.debounce_secs = parse_var("DEBOUNCE_TIME", v)?;
        }
        if let Some(v) = lookup("MONITORING_ENABLED") {
            config.monitoring_enabled = parse_bool("MONITORING_ENABLED", v)?;
        }
        if let Some(v) = lookup("POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_var("POLL_INTERVAL_MS", v)?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("LOG_JSON") {
            config.log_json = parse_bool("LOG_JSON", v)?;
        }
        if let Some(v) = lookup("MAX_FILE_SIZE_MB") {
            config.max_file_size_mb = parse_var("MAX_FILE_SIZE_MB", v)?;
        }

        Ok(config)
    }

    pub fn monitored_folders(&self) -> Vec<PathBuf> {
        vec![
            self.outgoing_folder.clone(),
            self.incoming_ack_folder.clone(),
            self.incoming_error_folder.clone(),
        ]
    }

    /// Zero when `debounce_secs` is not a representable duration.
    pub fn debounce(&self) -> Duration {
        Duration::try_from_secs_f64(self.debounce_secs).unwrap_or_default()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Every problem found, empty when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = vec![];

        // rejects negative, NaN, infinite and overflowing values alike
        if Duration::try_from_secs_f64(self.debounce_secs).is_err() {
            errors.push(format!(
                "DEBOUNCE_TIME must be a non-negative number of seconds, got {}",
                self.debounce_secs
            ));
        }
        if self.poll_interval_ms == 0 {
            errors.push("POLL_INTERVAL_MS must be at least 1".to_string());
        }
        if self.max_file_size_mb < 1 {
            errors.push("MAX_FILE_SIZE_MB must be at least 1".to_string());
        }

        errors
    }

    pub fn ensure_folders(&self) -> Result<(), ConfigError> {
        for folder in self.monitored_folders() {
            std::fs::create_dir_all(&folder).map_err(|e| ConfigError::Folder(folder.clone(), e))?;
        }
        if let Some(parent) = self.archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Folder(parent.to_path_buf(), e))?;
        }
        Ok(())
    }
}
