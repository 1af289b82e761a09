//! Harvest driver.
//!
//! Runs one harvest end to end: resolve the start date, fetch, normalize
//! every record, then record the completed window so the next run resumes
//! from it.

use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::harvest::source::{FetchError, FileFeed, RecordSource};
use crate::harvest::state::{HarvestWindow, LastRunStore, StateError};
use crate::model::NormalizedRecord;
use crate::traits::{ParseError, RecordParser};

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Harvest state error: {0}")]
    State(#[from] StateError),
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Record parsing failed: {0}")]
    Parse(#[from] ParseError),
}

/// Records and statistics of a completed harvest.
#[derive(Debug)]
pub struct HarvestResult {
    pub records: Vec<NormalizedRecord>,
    /// The window actually harvested, with its resolved start date
    pub window: HarvestWindow,
    pub stats: HarvestStats,
}

#[derive(Debug, Default, Clone)]
pub struct HarvestStats {
    pub records_parsed: usize,
    /// The repository answered `noRecordsMatch`
    pub no_matching_records: bool,
    pub duration_ms: u64,
}

/// Drives incremental harvests of one source.
///
/// The parser and the record source are held as trait objects, so any
/// harvester plugs in by implementing [`RecordParser`].
pub struct HarvestExecutor {
    store: LastRunStore,
    source: Arc<dyn RecordSource>,
    parser: Arc<dyn RecordParser>,
}

impl HarvestExecutor {
    pub fn new(
        store: LastRunStore,
        source: Arc<dyn RecordSource>,
        parser: Arc<dyn RecordParser>,
    ) -> Self {
        Self {
            store,
            source,
            parser,
        }
    }

    /// Harvest `window` and persist it as the last run.
    ///
    /// An upstream `noRecordsMatch` is an empty, successful harvest. Any other
    /// failure leaves the last run untouched so the next run retries the
    /// same window.
    #[instrument(skip(self, window), fields(source = %self.store.source_name(), url = %window.url))]
    pub async fn harvest(&self, mut window: HarvestWindow) -> Result<HarvestResult, HarvestError> {
        let start = Instant::now();
        let mut stats = HarvestStats::default();

        window.from_date = self.store.resolve_start_date(&window)?;
        // Last-run files keep microseconds
        let started_at = Utc::now().naive_utc().trunc_subsecs(6);

        info!(
            set = ?window.set,
            metadata_prefix = %window.metadata_prefix,
            from = ?window.from_date,
            until = ?window.until_date,
            "Starting harvesting"
        );

        let raw_records = match self.source.fetch(&window).await {
            Ok(records) => records,
            Err(FetchError::NoRecordsMatch(message)) => {
                warn!(%message, "No records match the harvest window");
                stats.no_matching_records = true;
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let records = raw_records
            .iter()
            .map(|raw| self.parser.parse_raw(raw))
            .collect::<Result<Vec<_>, _>>()?;
        stats.records_parsed = records.len();

        let last_run = self.store.persist_run(started_at, &window)?;
        stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            records = stats.records_parsed,
            duration_ms = stats.duration_ms,
            "Harvesting completed. Next harvesting will resume from {}",
            last_run.resume_date().format("%Y-%m-%d")
        );

        Ok(HarvestResult {
            records,
            window,
            stats,
        })
    }
}

/// Normalize every record of a local feed file. Feeds carry no harvest state.
#[instrument(skip(parser), fields(source = %parser.source_name(), path = %feed.path().display()))]
pub async fn parse_feed(
    feed: &FileFeed,
    parser: &dyn RecordParser,
) -> Result<Vec<NormalizedRecord>, HarvestError> {
    let records = feed
        .read()
        .await?
        .iter()
        .map(|raw| parser.parse_raw(raw))
        .collect::<Result<Vec<_>, _>>()?;
    info!(records = records.len(), "Feed parsed");
    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================
