pub mod columns;
pub mod container;
pub mod guess;

use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use self::columns::ColumnStrategy;
use self::container::ContainerExtractor;

/// Where a resolved date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// A device property column, by index
    DeviceColumn(usize),
    /// Metadata embedded in the local copy
    Container,
    /// Camera-style filename
    Filename,
    /// `YYYYMM` device folder name
    FolderName,
}

/// Capture date used for placement, plus the full timestamp when one was known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub timestamp: Option<NaiveDateTime>,
    pub source: DateSource,
}

impl ResolvedDate {
    pub fn from_date(date: NaiveDate, source: DateSource) -> Self {
        Self {
            date,
            timestamp: None,
            source,
        }
    }

    pub fn from_timestamp(timestamp: NaiveDateTime, source: DateSource) -> Self {
        Self {
            date: timestamp.date(),
            timestamp: Some(timestamp),
            source,
        }
    }

    /// The full timestamp, or noon on the capture date when no time is known.
    pub fn timestamp_or_noon(&self) -> NaiveDateTime {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default();
        self.timestamp.unwrap_or_else(|| self.date.and_time(noon))
    }
}

/// Everything known about one item when its date is resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evidence<'a> {
    /// Device property columns, indexed by column number; empty when unset
    pub columns: &'a [String],
    pub filename: &'a str,
    pub parent_folder: Option<&'a str>,
    /// Local copy of the file, once it exists
    pub local_file: Option<&'a Path>,
}

/// One evidence source of the cascade.
#[derive(Clone, Copy)]
pub enum CascadeStep {
    DeviceColumns(&'static [ColumnStrategy]),
    ContainerMetadata,
    Filename,
    FolderName,
}

/// Ordered list of evidence sources; the first one that yields a date wins.
#[derive(Clone)]
pub struct DateResolver {
    steps: Vec<CascadeStep>,
    extractor: Arc<dyn ContainerExtractor>,
}

impl std::fmt::Debug for DateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateResolver")
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}

impl DateResolver {
    /// The full cascade used to place items: columns, container, filename, folder.
    pub fn new(extractor: Arc<dyn ContainerExtractor>) -> Self {
        Self::with_steps(
            extractor,
            vec![
                CascadeStep::DeviceColumns(columns::SCAN_COLUMNS),
                CascadeStep::ContainerMetadata,
                CascadeStep::Filename,
                CascadeStep::FolderName,
            ],
        )
    }

    pub fn with_steps(extractor: Arc<dyn ContainerExtractor>, steps: Vec<CascadeStep>) -> Self {
        Self { steps, extractor }
    }

    /// Resolve a capture date. `None` means Unknown.
    pub fn resolve(&self, evidence: &Evidence) -> Option<ResolvedDate> {
        let resolved = self.steps.iter().find_map(|step| self.try_step(*step, evidence));
        match &resolved {
            Some(r) => debug!(
                filename = evidence.filename,
                date = %r.date,
                source = ?r.source,
                "date resolved"
            ),
            None => debug!(filename = evidence.filename, "no date evidence"),
        }
        resolved
    }

    fn try_step(&self, step: CascadeStep, evidence: &Evidence) -> Option<ResolvedDate> {
        match step {
            CascadeStep::DeviceColumns(strategies) => scan_columns(strategies, evidence.columns),
            CascadeStep::ContainerMetadata => {
                let path = evidence.local_file?;
                let ts = self.extractor.extract(path)?.best()?;
                let ts = columns::normalize_datetime(ts)?;
                Some(ResolvedDate::from_timestamp(ts, DateSource::Container))
            }
            CascadeStep::Filename => guess::date_from_filename(evidence.filename)
                .map(|d| ResolvedDate::from_date(d, DateSource::Filename)),
            CascadeStep::FolderName => guess::date_from_folder_name(evidence.parent_folder?)
                .map(|d| ResolvedDate::from_date(d, DateSource::FolderName)),
        }
    }
}

/// Earliest column that parses wins; low indices are more often "date taken".
fn scan_columns(strategies: &[ColumnStrategy], values: &[String]) -> Option<ResolvedDate> {
    for strategy in strategies {
        for col in strategy.columns.clone() {
            let Some(value) = values.get(col) else { break };
            if let Some(parsed) = (strategy.parse)(value) {
                return Some(ResolvedDate {
                    date: parsed.date,
                    timestamp: parsed.timestamp,
                    source: DateSource::DeviceColumn(col),
                });
            }
        }
    }
    None
}
