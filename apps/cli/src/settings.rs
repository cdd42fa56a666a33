//! CLI settings: optional YAML file, then environment, then flags.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Environment variable overriding `database_url`.
pub const DATABASE_URL_ENV: &str = "PLAN_DATABASE_URL";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => bail!("unknown report format: {other}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub log_filter: String,
    pub report_format: ReportFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: persistence::default_sqlite_url().to_string(),
            log_filter: "info".to_string(),
            report_format: ReportFormat::Table,
        }
    }
}

impl Settings {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("invalid settings file")
    }

    /// Read the settings file if given, then apply the environment override.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("reading settings {}", p.display()))?;
                Self::from_yaml(&text)?
            }
            None => Self::default(),
        };
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.trim().is_empty() {
                settings.database_url = url;
            }
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let s = Settings::from_yaml("report_format: json\n").unwrap();
        assert_eq!(s.report_format, ReportFormat::Json);
        assert_eq!(s.log_filter, "info");
        assert_eq!(s.database_url, persistence::default_sqlite_url());
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(Settings::from_yaml("report_format: csv\n").is_err());
        assert!("csv".parse::<ReportFormat>().is_err());
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = std::env::temp_dir().join(format!("plan-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.yaml");
        std::fs::write(&path, "database_url: sqlite://file.db\nlog_filter: debug\n").unwrap();

        std::env::set_var(DATABASE_URL_ENV, "sqlite://env.db");
        let from_env = Settings::load(Some(&path)).unwrap();
        std::env::set_var(DATABASE_URL_ENV, "  ");
        let blank_env = Settings::load(Some(&path)).unwrap();
        std::env::remove_var(DATABASE_URL_ENV);
        let from_file = Settings::load(Some(&path)).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(from_env.database_url, "sqlite://env.db");
        assert_eq!(from_env.log_filter, "debug");
        assert_eq!(blank_env.database_url, "sqlite://file.db");
        assert_eq!(from_file.database_url, "sqlite://file.db");
        assert!(Settings::load(Some(&dir.join("missing.yaml"))).is_err());
    }
}
