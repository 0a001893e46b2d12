//! User settings, read from `settings.json5` in the config directory.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use livefs::{IoResultExt, WatchTiming};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub const SETTINGS_FILE_NAME: &str = "settings.json5";

/// Overrides the config directory, mostly for tests and portable installs.
pub const CONFIG_DIR_ENV: &str = "MDVIEW_CONFIG_DIR";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON5: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Level for the log file: `none`/`off` disables it. Defaults to trace.
    pub file_log_level: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub debounce_ms: Option<u64>,
}

impl Settings {
    /// Loads settings from `dir`. A missing file yields defaults.
    pub fn load(dir: &Path) -> Result<Self, SettingsError> {
        let path = dir.join(SETTINGS_FILE_NAME);

        let contents = fs_err::read_to_string(&path)
            .with_not_found()
            .map_err(|source| SettingsError::Io {
                path: path.clone(),
                source,
            })?;

        match contents {
            Some(contents) => {
                json5::from_str(&contents).map_err(|err| SettingsError::Parse {
                    path,
                    message: err.to_string(),
                })
            }
            None => Ok(Self::default()),
        }
    }

    pub fn watch_timing(&self) -> WatchTiming {
        let defaults = WatchTiming::default();

        WatchTiming {
            poll_interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            debounce_delay: self
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce_delay),
        }
    }

    /// `None` when file logging is turned off.
    pub fn file_log_level(&self) -> Option<LevelFilter> {
        let Some(level) = &self.file_log_level else {
            return Some(LevelFilter::TRACE);
        };

        match level.to_lowercase().as_str() {
            "none" | "off" => None,
            "error" => Some(LevelFilter::ERROR),
            "warn" => Some(LevelFilter::WARN),
            "info" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            _ => Some(LevelFilter::TRACE),
        }
    }
}

/// Where settings, history, and logs live.
pub fn config_dir() -> Option<PathBuf> {
    match env::var_os(CONFIG_DIR_ENV) {
        Some(dir) => Some(PathBuf::from(dir)),
        None => dirs::config_dir().map(|dir| dir.join("mdview")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn load(contents: &str) -> Settings {
        let dir = tempdir().unwrap();
        fs_err::write(dir.path().join(SETTINGS_FILE_NAME), contents).unwrap();
        Settings::load(dir.path()).unwrap()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(dir.path()).unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.watch_timing(), WatchTiming::default());
        assert_eq!(settings.file_log_level(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn timing_overrides_are_applied() {
        let settings = load("{ pollIntervalMs: 1000, debounceMs: 50 }");
        let timing = settings.watch_timing();

        assert_eq!(timing.poll_interval, Duration::from_millis(1000));
        assert_eq!(timing.debounce_delay, Duration::from_millis(50));
    }

    #[test]
    fn partial_settings_keep_other_defaults() {
        let settings = load("{ debounceMs: 100, }");
        let timing = settings.watch_timing();

        assert_eq!(timing.poll_interval, livefs::DEFAULT_POLL_INTERVAL);
        assert_eq!(timing.debounce_delay, Duration::from_millis(100));
    }

    #[test]
    fn file_log_level_parsing() {
        assert_eq!(load(r#"{ fileLogLevel: "none" }"#).file_log_level(), None);
        assert_eq!(load(r#"{ fileLogLevel: "OFF" }"#).file_log_level(), None);
        assert_eq!(
            load(r#"{ fileLogLevel: "Warn" }"#).file_log_level(),
            Some(LevelFilter::WARN)
        );
        assert_eq!(
            load(r#"{ fileLogLevel: "banana" }"#).file_log_level(),
            Some(LevelFilter::TRACE)
        );
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        fs_err::write(dir.path().join(SETTINGS_FILE_NAME), "{ nope").unwrap();

        let err = Settings::load(dir.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains(SETTINGS_FILE_NAME));
    }
}
