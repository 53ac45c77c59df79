use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info};

use crate::date::columns::BACKWRITE_COLUMNS;
use crate::date::container::ContainerExtractor;
use crate::date::{CascadeStep, DateResolver, DateSource, Evidence, ResolvedDate};
use crate::device::Filesystem;
use crate::error::{MoverError, MoverResult};

/// What the back-writer knows about the item besides the copied file itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackWriteHints<'a> {
    /// Property columns of the original device item
    pub columns: &'a [String],
    /// Date the item was placed under
    pub placement: Option<ResolvedDate>,
}

/// Result of stamping a copied file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackWrite {
    Applied {
        timestamp: NaiveDateTime,
        source: DateSource,
    },
    /// No date found; the file keeps the time the copy gave it.
    NotApplied,
}

/// Writes the capture timestamp onto a file that has landed at its destination.
#[derive(Debug, Clone)]
pub struct MetadataBackWriter {
    resolver: DateResolver,
}

impl MetadataBackWriter {
    pub fn new(extractor: Arc<dyn ContainerExtractor>) -> Self {
        Self {
            resolver: DateResolver::with_steps(
                extractor,
                vec![
                    CascadeStep::DeviceColumns(BACKWRITE_COLUMNS),
                    CascadeStep::ContainerMetadata,
                ],
            ),
        }
    }

    /// Pick the authoritative timestamp for `path` and write it as both the
    /// creation and modification time.
    pub fn apply(
        &self,
        path: &Path,
        hints: &BackWriteHints,
        fs: &dyn Filesystem,
    ) -> MoverResult<BackWrite> {
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let evidence = Evidence {
            columns: hints.columns,
            filename,
            parent_folder: None,
            local_file: Some(path),
        };

        let Some(resolved) = self.resolver.resolve(&evidence).or(hints.placement) else {
            debug!(path = %path.display(), "no timestamp evidence");
            return Ok(BackWrite::NotApplied);
        };
        let timestamp = resolved.timestamp_or_noon();

        let Some(local) = timestamp.and_local_timezone(Local).earliest() else {
            debug!(path = %path.display(), %timestamp, "timestamp does not exist in local time");
            return Ok(BackWrite::NotApplied);
        };
        let when = SystemTime::from(local);
        fs.set_timestamps(path, when, when)
            .map_err(|e| MoverError::unwritable("set timestamps on", path, e))?;

        info!(
            path = %path.display(),
            %timestamp,
            source = ?resolved.source,
            "capture date applied"
        );
        Ok(BackWrite::Applied {
            timestamp,
            source: resolved.source,
        })
    }
}
