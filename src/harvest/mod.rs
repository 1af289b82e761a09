//! Harvest module - incremental OAI-PMH harvesting.
//!
//! - **State**: last-run bookkeeping via [`LastRunStore`]
//! - **Sources**: the [`RecordSource`] fetch abstraction and local [`FileFeed`]s
//! - **OAI-PMH**: the HTTP `ListRecords` client [`OaiPmhClient`]

pub mod oaipmh;
pub mod source;
pub mod state;

// Re-export commonly used types
pub use oaipmh::{parse_list_records, ListRecordsPage, OaiPmhClient};
pub use source::{split_records, FetchError, FileFeed, RecordSource};
pub use state::{HarvestWindow, LastRunRecord, LastRunStore, StateError};
