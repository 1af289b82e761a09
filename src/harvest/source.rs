//! Where raw records come from.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::harvest::state::HarvestWindow;

#[derive(Error, Debug)]
pub enum FetchError {
    /// The repository has nothing in the requested window
    #[error("No records match the request: {0}")]
    NoRecordsMatch(String),

    /// Any other OAI-PMH error reported by the repository
    #[error("OAI-PMH error {code}: {message}")]
    Protocol { code: String, message: String },

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid repository URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Malformed feed: {0}")]
    MalformedFeed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for FetchError {
    fn from(err: quick_xml::Error) -> Self {
        FetchError::MalformedFeed(err.to_string())
    }
}

/// Fetches the raw XML records of a harvest window.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Returns every record of `window` as a standalone XML fragment.
    ///
    /// # Errors
    ///
    /// [`FetchError::NoRecordsMatch`] when the window is empty upstream.
    async fn fetch(&self, window: &HarvestWindow) -> Result<Vec<String>, FetchError>;
}

/// A local XML document holding any number of records, as dumped from the
/// vendor's OAI interface.
#[derive(Debug, Clone)]
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file and split it into record fragments.
    pub async fn read(&self) -> Result<Vec<String>, FetchError> {
        let xml = tokio::fs::read_to_string(&self.path).await?;
        let records = split_records(&xml)?;
        info!(path = %self.path.display(), records = records.len(), "Feed file read");
        Ok(records)
    }
}

/// Split a document into its top-most `record` elements, whatever their
/// namespace prefix. Nested records stay inside their parent fragment.
pub fn split_records(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();

    loop {
        let start = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"record" => {
                reader.read_to_end(e.name())?;
                if let Some(fragment) = xml.get(start..reader.buffer_position()) {
                    records.push(fragment.to_string());
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"record" => {
                if let Some(fragment) = xml.get(start..reader.buffer_position()) {
                    records.push(fragment.to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}
