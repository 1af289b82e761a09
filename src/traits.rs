use crate::marc::MarcRecord;
use crate::model::NormalizedRecord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to parse record: {0}")]
    InvalidContent(String),
}

impl From<quick_xml::Error> for ParseError {
    fn from(err: quick_xml::Error) -> Self {
        ParseError::InvalidContent(err.to_string())
    }
}

/// Capability every harvester provides: turn one raw record into a
/// [`NormalizedRecord`].
pub trait RecordParser: Send + Sync {
    /// Returns the source name this parser handles (e.g., "hindawi").
    fn source_name(&self) -> &str;

    /// Normalizes an already parsed MARC record node.
    fn parse_record(&self, record: &MarcRecord) -> NormalizedRecord;

    /// Parses a raw XML record fragment and normalizes it.
    fn parse_raw(&self, raw: &str) -> Result<NormalizedRecord, ParseError> {
        let record = MarcRecord::from_xml(raw)?;
        Ok(self.parse_record(&record))
    }
}
