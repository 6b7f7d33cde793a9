//! Configuration loading and parsing

use anyhow::{Context, Result};
use instance_history::{ReplayConfig, Timestamp};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// JSON files containing arrays of lifecycle events
    #[serde(default)]
    pub events: Vec<PathBuf>,
    /// JSON file containing an array of live instance snapshots
    pub snapshot: Option<PathBuf>,
}

/// Reporting window; unset bounds are derived from the input
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WindowConfig {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Report destination (default: stdout)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if let (Some(start), Some(end)) = (config.window.start, config.window.end) {
        anyhow::ensure!(
            start <= end,
            "Invalid window in {:?}: start {} is after end {}",
            path,
            start,
            end
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance_history::OutOfOrderPolicy;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            events = ["events.json", "older-events.json"]
            snapshot = "instances.json"

            [window]
            start = "2019-12-01T00:00:00Z"
            end = "2019-12-31T00:00:00Z"

            [replay]
            out_of_order = "skip"

            [output]
            format = "json"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.events.len(), 2);
        assert!(config.input.snapshot.is_some());
        assert!(config.window.start.is_some());
        assert_eq!(config.replay.out_of_order, OutOfOrderPolicy::Skip);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.path.is_none());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.input.events.is_empty());
        assert_eq!(config.replay, ReplayConfig::default());
        assert_eq!(config.output.format, OutputFormat::Txt);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[input]\nevents = [\"events.json\"]").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.input.events, vec![PathBuf::from("events.json")]);
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[window]\nstart = \"2019-12-31T00:00:00Z\"\nend = \"2019-12-01T00:00:00Z\""
        )
        .unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        assert!(load_config(Path::new("/nonexistent/config.toml")).is_err());
    }
}
