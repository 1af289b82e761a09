//! MARC21-XML record nodes.
//!
//! Harvested records arrive as XML fragments (either an OAI-PMH `<record>`
//! wrapping a `marc:record`, or a bare `marc:record`). This module parses a
//! fragment into tagged data fields so the normalizer can address values by
//! tag and subfield code.

pub mod record;

pub use record::{DataField, MarcRecord, Subfield};
