use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::sink::{CreateDisposition, WriteDisposition};

pub const DEFAULT_OUTPUT: &str = "planning.yoy";
pub const DEFAULT_INPUT_FILE: &str = "planning.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    /// Source location; defaults to `planning.csv` inside the data dir.
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default = "default_output")]
    pub output: String,
    /// Service-account key handed to the driver. Carried, never exported.
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub dead_letter: Option<String>,
    #[serde(default)]
    pub create_disposition: CreateDisposition,
    #[serde(default)]
    pub write_disposition: WriteDisposition,
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            input: None,
            output: default_output(),
            credentials: None,
            workers: None,
            strict: false,
            dead_letter: None,
            create_disposition: CreateDisposition::default(),
            write_disposition: WriteDisposition::default(),
        }
    }
}

impl Settings {
    pub fn input_or_default(&self) -> String {
        match &self.input {
            Some(input) => input.clone(),
            None => PathBuf::from(&self.data_dir)
                .join(DEFAULT_INPUT_FILE)
                .to_string_lossy()
                .to_string(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("planload")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("planload")
}

/// Missing file means defaults; a file that exists must parse.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| PipelineError::Settings(format!("{}: {e}", path.display())))
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| PipelineError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            input: Some("/tmp/in.csv".to_string()),
            output: "mktg.plan".to_string(),
            credentials: Some("/tmp/key.json".to_string()),
            workers: Some(4),
            strict: true,
            dead_letter: Some("/tmp/rejects.csv".to_string()),
            create_disposition: CreateDisposition::Never,
            write_disposition: WriteDisposition::Append,
        };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings(&dir.path().join("absent.json")).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.output, "planning.yoy");
        assert!(!s.strict);
        assert_eq!(s.write_disposition, WriteDisposition::Truncate);
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "write_disposition": "append"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.output, "planning.yoy");
        assert_eq!(s.write_disposition, WriteDisposition::Append);
        assert_eq!(s.create_disposition, CreateDisposition::IfNeeded);
        assert_eq!(s.input_or_default(), "/tmp/test/planning.csv");
    }

    #[test]
    fn test_invalid_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_settings(&path), Err(PipelineError::Settings(_))));
    }

    #[test]
    fn test_save_creates_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("settings.json");
        save_settings(&path, &Settings::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_shellexpand_leaves_plain_paths() {
        assert_eq!(shellexpand_path("/abs/path"), "/abs/path");
        assert_eq!(shellexpand_path("rel/path"), "rel/path");
    }
}
