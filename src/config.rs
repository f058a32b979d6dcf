use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};
use crate::grid::{LabelFormat, WeekStart};
use crate::render::{DEFAULT_SELECTED_SYMBOL, DEFAULT_TODAY_SYMBOL};

const CONFIG_PATH_ENV_VAR: &str = "MONTHWIDGET_CONFIG_FILE";
const APP_DIR: &str = "monthwidget";

pub(crate) fn find_configfile_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if let Ok(path) = env::var(CONFIG_PATH_ENV_VAR) {
        locations.push(PathBuf::from(path));
    }

    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join(APP_DIR).join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".monthwidget.toml"));
    }

    locations
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub week_start: WeekStart,
    pub label_format: LabelFormat,
    pub today_symbol: Option<char>,
    pub selected_symbol: Option<char>,
    pub color: bool,
    pub state_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            week_start: WeekStart::default(),
            label_format: LabelFormat::default(),
            today_symbol: Some(DEFAULT_TODAY_SYMBOL),
            selected_symbol: Some(DEFAULT_SELECTED_SYMBOL),
            color: false,
            state_file: None,
        }
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::new(ErrorKind::Config, &e.to_string()))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::new(
                ErrorKind::Config,
                &format!("Could not read '{}': {}", path.display(), e),
            )
        })?;

        content.parse::<Config>().map_err(|e| {
            let msg = format!(
                "{} (in '{}')",
                e.message.as_deref().unwrap_or_default(),
                path.display()
            );
            e.with_msg(&msg)
        })
    }

    /// Where instance state is kept: the configured file, or the platform
    /// data directory.
    pub fn state_file(&self) -> PathBuf {
        if let Some(path) = &self.state_file {
            return path.clone();
        }

        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join("state.toml"))
            .unwrap_or_else(|| PathBuf::from("monthwidget-state.toml"))
    }
}

/// Loads `path` if given, else the first existing default location, else
/// the built-in defaults.
pub fn load_suitable_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::load(path);
    }

    match find_configfile_locations().into_iter().find(|p| p.is_file()) {
        Some(path) => {
            log::info!("Using configuration '{}'", path.display());
            Config::load(&path)
        }
        None => {
            log::debug!("No configuration file found, using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.week_start, WeekStart::Sunday);
        assert_eq!(config.label_format.as_str(), LabelFormat::DEFAULT);
        assert_eq!(config.today_symbol, Some('*'));
        assert_eq!(config.selected_symbol, Some('>'));
    }

    #[test]
    fn full_file() {
        let config: Config = r##"
            week_start = "monday"
            label_format = "%Y年%-m月"
            today_symbol = "#"
            selected_symbol = "@"
            color = true
            state_file = "/tmp/mw-state.toml"
        "##
        .parse()
        .unwrap();

        assert_eq!(config.week_start, WeekStart::Monday);
        assert_eq!(config.label_format.as_str(), "%Y年%-m月");
        assert_eq!(config.today_symbol, Some('#'));
        assert_eq!(config.selected_symbol, Some('@'));
        assert!(config.color);
        assert_eq!(config.state_file(), PathBuf::from("/tmp/mw-state.toml"));
    }

    #[test]
    fn rejects_unknown_week_start() {
        let err = "week_start = \"friday\"".parse::<Config>().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Config));
    }

    #[test]
    fn rejects_bad_label_format() {
        assert!("label_format = \"%Q\"".parse::<Config>().is_err());
    }

    #[test]
    fn explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "week_start = \"monday\"\n").unwrap();

        let config = load_suitable_config(Some(&path)).unwrap();
        assert_eq!(config.week_start, WeekStart::Monday);

        let missing = dir.path().join("missing.toml");
        assert!(load_suitable_config(Some(&missing)).is_err());
    }

    #[test]
    fn default_state_file_is_named() {
        let config = Config::default();
        assert!(config.state_file().ends_with("state.toml")
            || config.state_file().ends_with("monthwidget-state.toml"));
    }
}
