//! Harvester configuration, read from a TOML file.
//!
//! ```toml
//! last_runs_path = "/var/lib/hep-harvester/last_runs"
//! output = "records.jsonl"
//!
//! [[oaipmh]]
//! name = "hindawi"
//! url = "https://www.hindawi.com/oai-pmh/oai.aspx"
//! metadata_prefix = "marc21"
//! set = "HINDAWI.AHEP"
//! from_date = "2015-01-01"
//!
//! [[feeds]]
//! name = "hindawi"
//! path = "dumps/hindawi.xml"
//! ```

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::harvest::state::{HarvestWindow, DEFAULT_METADATA_PREFIX, DEFAULT_SOURCE_NAME};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Root directory of the persisted last-run files
    pub last_runs_path: PathBuf,
    /// JSON-lines output file; standard output when absent
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub oaipmh: Vec<OaiPmhSourceConfig>,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OaiPmhSourceConfig {
    #[serde(default = "default_source_name")]
    pub name: String,
    pub url: String,
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    #[serde(default)]
    pub until_date: Option<NaiveDate>,
}

impl OaiPmhSourceConfig {
    pub fn window(&self) -> HarvestWindow {
        HarvestWindow {
            url: self.url.clone(),
            metadata_prefix: self.metadata_prefix.clone(),
            set: self.set.clone(),
            from_date: self.from_date,
            until_date: self.until_date,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_name")]
    pub name: String,
    pub path: PathBuf,
}

fn default_source_name() -> String {
    DEFAULT_SOURCE_NAME.to_string()
}

fn default_metadata_prefix() -> String {
    DEFAULT_METADATA_PREFIX.to_string()
}

fn default_feed_name() -> String {
    "hindawi".to_string()
}

impl HarvesterConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = HarvesterConfig::from_toml_str(
            r#"
            last_runs_path = "/var/lib/last_runs"
            output = "out.jsonl"

            [[oaipmh]]
            name = "hindawi"
            url = "https://www.hindawi.com/oai-pmh/oai.aspx"
            metadata_prefix = "marc21"
            set = "HINDAWI.AHEP"
            from_date = "2015-01-01"

            [[feeds]]
            path = "dumps/hindawi.xml"
            "#,
        )
        .unwrap();

        assert_eq!(config.last_runs_path, PathBuf::from("/var/lib/last_runs"));
        assert_eq!(config.output, Some(PathBuf::from("out.jsonl")));

        let window = config.oaipmh[0].window();
        assert_eq!(window.alias(), "metadataPrefix=marc21&set=HINDAWI.AHEP");
        assert_eq!(window.from_date, NaiveDate::from_ymd_opt(2015, 1, 1));
        assert_eq!(window.until_date, None);

        assert_eq!(config.feeds[0].name, "hindawi");
    }

    #[test]
    fn test_defaults() {
        let config = HarvesterConfig::from_toml_str(
            r#"
            last_runs_path = "runs"
            [[oaipmh]]
            url = "http://repo.example.org/oai"
            "#,
        )
        .unwrap();

        let source = &config.oaipmh[0];
        assert_eq!(source.name, "OAI-PMH");
        assert_eq!(source.metadata_prefix, "oai_dc");
        assert!(config.output.is_none());
        assert!(config.feeds.is_empty());
    }

    #[test]
    fn test_missing_state_root_is_rejected() {
        let result = HarvesterConfig::from_toml_str("[[oaipmh]]\nurl = \"http://x\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = HarvesterConfig::load(Path::new("/nonexistent/harvester.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
