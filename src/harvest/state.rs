//! Incremental harvest bookkeeping.
//!
//! Each (source, alias) pair owns one JSON file under the last-runs root:
//! `<root>/<source name>/<sha1 hex of alias>.json`. The file is read before a
//! harvest to find where to resume, and rewritten once the harvest succeeds.

use chrono::{NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

/// Source name used when none is configured.
pub const DEFAULT_SOURCE_NAME: &str = "OAI-PMH";

/// Metadata format requested when none is configured.
pub const DEFAULT_METADATA_PREFIX: &str = "oai_dc";

// ============================================================================
// Harvest window
// ============================================================================

/// Parameters of one OAI-PMH harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestWindow {
    pub url: String,
    pub metadata_prefix: String,
    pub set: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub until_date: Option<NaiveDate>,
}

impl HarvestWindow {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
            set: None,
            from_date: None,
            until_date: None,
        }
    }

    pub fn with_metadata_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metadata_prefix = prefix.into();
        self
    }

    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    pub fn with_from_date(mut self, date: NaiveDate) -> Self {
        self.from_date = Some(date);
        self
    }

    pub fn with_until_date(mut self, date: NaiveDate) -> Self {
        self.until_date = Some(date);
        self
    }

    /// Key identifying this harvest configuration.
    ///
    /// An absent set renders as `None`, which is what existing state files
    /// were named after.
    pub fn alias(&self) -> String {
        format!(
            "metadataPrefix={}&set={}",
            self.metadata_prefix,
            self.set.as_deref().unwrap_or("None")
        )
    }
}

// ============================================================================
// Persisted record
// ============================================================================

/// Contents of a last-run file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRunRecord {
    #[serde(rename = "spider")]
    pub source_name: String,
    pub url: String,
    pub metadata_prefix: String,
    pub set: Option<String>,
    #[serde(default, with = "iso::date")]
    pub from_date: Option<NaiveDate>,
    #[serde(default, with = "iso::date")]
    pub until_date: Option<NaiveDate>,
    #[serde(rename = "last_run_started_at", with = "iso::timestamp")]
    pub started_at: NaiveDateTime,
    #[serde(rename = "last_run_finished_at", with = "iso::timestamp")]
    pub finished_at: NaiveDateTime,
}

impl LastRunRecord {
    /// Date the next harvest starts from: the end of the window when one was
    /// requested, otherwise the day the run finished.
    pub fn resume_date(&self) -> NaiveDate {
        self.until_date.unwrap_or_else(|| self.finished_at.date())
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum StateError {
    /// No harvest was recorded yet for this source and alias
    #[error("No last run to load at {}", .0.display())]
    NoPriorRun(PathBuf),

    /// Reading or writing the state file failed
    #[error("Last run storage failed at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The state file exists but cannot be understood
    #[error("Corrupted last run file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    fn storage(path: &Path, source: io::Error) -> Self {
        StateError::Storage {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Loads and saves last-run files for one source.
#[derive(Debug, Clone)]
pub struct LastRunStore {
    root: PathBuf,
    source_name: String,
}

impl LastRunStore {
    /// `root` is the directory holding the state of every source.
    pub fn new(root: impl Into<PathBuf>, source_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            source_name: source_name.into(),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Path of the last-run file for `window`.
    pub fn file_path(&self, window: &HarvestWindow) -> PathBuf {
        let file_name = format!("{}.json", hex::encode(Sha1::digest(window.alias().as_bytes())));
        self.root.join(&self.source_name).join(file_name)
    }

    /// Read the last run for `window`.
    ///
    /// # Errors
    ///
    /// [`StateError::NoPriorRun`] when the file does not exist; any other
    /// failure is [`StateError::Storage`] or [`StateError::Corrupt`].
    pub fn load(&self, window: &HarvestWindow) -> Result<LastRunRecord, StateError> {
        let path = self.file_path(window);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StateError::NoPriorRun(path))
            }
            Err(e) => return Err(StateError::storage(&path, e)),
        };
        let last_run: LastRunRecord = serde_json::from_str(&raw)
            .map_err(|source| StateError::Corrupt {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), ?last_run, "Last run file loaded");
        Ok(last_run)
    }

    /// Date the harvest of `window` starts from.
    ///
    /// An explicit `from_date` always wins. Otherwise the previous run decides
    /// (see [`LastRunRecord::resume_date`]); without one, `None` asks for a
    /// full harvest.
    pub fn resolve_start_date(&self, window: &HarvestWindow) -> Result<Option<NaiveDate>, StateError> {
        if window.from_date.is_some() {
            return Ok(window.from_date);
        }
        match self.load(window) {
            Ok(last_run) => Ok(Some(last_run.resume_date())),
            Err(StateError::NoPriorRun(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Record a completed harvest of `window`, replacing any previous run.
    ///
    /// The finish time is taken now and never precedes `started_at`. Both
    /// timestamps are kept at the microsecond precision of the file, so the
    /// returned record equals what a later [`load`](Self::load) reads back.
    pub fn persist_run(
        &self,
        started_at: NaiveDateTime,
        window: &HarvestWindow,
    ) -> Result<LastRunRecord, StateError> {
        let started_at = started_at.trunc_subsecs(6);
        let last_run = LastRunRecord {
            source_name: self.source_name.clone(),
            url: window.url.clone(),
            metadata_prefix: window.metadata_prefix.clone(),
            set: window.set.clone(),
            from_date: window.from_date,
            until_date: window.until_date,
            started_at,
            finished_at: Utc::now().naive_utc().trunc_subsecs(6).max(started_at),
        };

        let path = self.file_path(window);
        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir).map_err(|e| StateError::storage(dir, e))?;

        // Write beside the target and rename over it so readers never see a
        // partial file.
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StateError::storage(dir, e))?;
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(tmp.as_file_mut(), formatter);
        last_run
            .serialize(&mut ser)
            .map_err(|e| StateError::storage(&path, io::Error::from(e)))?;
        tmp.as_file_mut()
            .flush()
            .map_err(|e| StateError::storage(&path, e))?;
        tmp.persist(&path)
            .map_err(|e| StateError::storage(&path, e.error))?;

        info!(path = %path.display(), "Last run file saved");
        Ok(last_run)
    }
}

/// Date and timestamp encodings of last-run files.
///
/// Timestamps are written as naive UTC ISO-8601 with microseconds. Reading is
/// lenient: plain dates, naive datetimes with or without fraction, and RFC 3339.
mod iso {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    pub const DATE_FORMAT: &str = "%Y-%m-%d";
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok())
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.naive_utc()))
            .or_else(|| {
                NaiveDate::parse_from_str(raw, DATE_FORMAT)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }

    pub mod date {
        use chrono::NaiveDate;
        use serde::de::Error;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => s.serialize_some(&d.format(super::DATE_FORMAT).to_string()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
            let raw: Option<String> = Option::deserialize(d)?;
            raw.filter(|r| !r.is_empty())
                .map(|r| {
                    super::parse_timestamp(&r)
                        .map(|t| t.date())
                        .ok_or_else(|| D::Error::custom(format!("invalid date `{r}`")))
                })
                .transpose()
        }
    }

    pub mod timestamp {
        use chrono::NaiveDateTime;
        use serde::de::Error;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&t.format(super::TIMESTAMP_FORMAT).to_string())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
            let raw = String::deserialize(d)?;
            super::parse_timestamp(&raw)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`")))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
