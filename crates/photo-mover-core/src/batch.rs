use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::backwrite::{BackWrite, BackWriteHints, MetadataBackWriter};
use crate::cancel::CancellationToken;
use crate::config::SortConfiguration;
use crate::date::columns::BACKWRITE_COLUMNS;
use crate::date::container::ContainerExtractor;
use crate::date::{DateResolver, Evidence, ResolvedDate};
use crate::destination::resolve_destination;
use crate::device::{DeviceAdapter, Filesystem};
use crate::duplicate::{self, DuplicateAction};
use crate::error::{MoverError, MoverResult};
use crate::media::{format_size, MediaItem};
use crate::monitor::{Completion, MonitorSettings, TransferMonitor};
use crate::scan::read_columns;

/// Hidden folder a renamed copy lands in before it gets its final name.
pub const STAGING_DIR: &str = ".photo-mover-incoming";

/// Terminal result for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Moved { path: PathBuf, bytes: u64 },
    Skipped { reason: String },
    Failed { detail: String },
}

/// Counts and itemized failures of one batch run, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    /// `"<filename>: <detail>"` per failed item
    pub failures: Vec<String>,
    pub outcomes: Vec<(String, TransferOutcome)>,
    /// The batch stopped early; items after the last outcome were not touched
    pub cancelled: bool,
}

impl BatchSummary {
    fn record(&mut self, filename: &str, outcome: TransferOutcome) {
        match &outcome {
            TransferOutcome::Moved { .. } => self.moved += 1,
            TransferOutcome::Skipped { .. } => self.skipped += 1,
            TransferOutcome::Failed { detail } => {
                self.failed += 1;
                self.failures.push(format!("{}: {}", filename, detail));
            }
        }
        self.outcomes.push((filename.to_string(), outcome));
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SUMMARY:")?;
        writeln!(f, "  Moved: {}", self.moved)?;
        writeln!(f, "  Skipped: {}", self.skipped)?;
        write!(f, "  Errors: {}", self.failed)?;
        if self.cancelled {
            write!(f, "\n  (cancelled before all items were processed)")?;
        }
        if !self.failures.is_empty() {
            write!(f, "\nERROR DETAILS:")?;
            for failure in &self.failures {
                write!(f, "\n  - {}", failure)?;
            }
        }
        Ok(())
    }
}

/// Progress events emitted while a batch runs.
#[derive(Debug)]
pub enum BatchEvent<'a> {
    Started {
        total: usize,
    },
    ItemStarted {
        index: usize,
        total: usize,
        filename: &'a str,
        destination: &'a Path,
    },
    DuplicateResolved {
        filename: &'a str,
        action: &'a DuplicateAction,
    },
    StillCopying {
        filename: &'a str,
        waited: Duration,
    },
    DateApplied {
        filename: &'a str,
        timestamp: NaiveDateTime,
    },
    DateNotApplied {
        filename: &'a str,
    },
    ItemFinished {
        index: usize,
        total: usize,
        filename: &'a str,
        outcome: &'a TransferOutcome,
    },
    Finished {
        summary: &'a BatchSummary,
    },
}

/// Receives batch progress. Injected by whoever drives the batch.
pub trait ReportSink {
    fn report(&self, event: &BatchEvent<'_>);
}

impl<F> ReportSink for F
where
    F: Fn(&BatchEvent<'_>),
{
    fn report(&self, event: &BatchEvent<'_>) {
        self(event)
    }
}

/// Moves selected items off a device one at a time.
pub struct BatchOrchestrator<'a, D: DeviceAdapter> {
    device: &'a D,
    fs: &'a dyn Filesystem,
    sink: &'a dyn ReportSink,
    resolver: DateResolver,
    back_writer: MetadataBackWriter,
    monitor: TransferMonitor,
    cancel_token: Option<CancellationToken>,
}

impl<'a, D: DeviceAdapter> BatchOrchestrator<'a, D> {
    pub fn new(
        device: &'a D,
        fs: &'a dyn Filesystem,
        extractor: Arc<dyn ContainerExtractor>,
        sink: &'a dyn ReportSink,
    ) -> Self {
        Self {
            device,
            fs,
            sink,
            resolver: DateResolver::new(Arc::clone(&extractor)),
            back_writer: MetadataBackWriter::new(extractor),
            monitor: TransferMonitor::default(),
            cancel_token: None,
        }
    }

    pub fn with_monitor(mut self, settings: MonitorSettings) -> Self {
        self.monitor = TransferMonitor::new(settings);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Process every selected item in order. Never fails as a whole: each item
    /// ends up moved, skipped or failed, and the summary says which.
    ///
    /// `config` is owned for the duration of the run, so edits made elsewhere
    /// after the batch starts do not reach it.
    pub fn run(&self, items: Vec<MediaItem<D::Handle>>, config: SortConfiguration) -> BatchSummary {
        let selected: Vec<_> = items.into_iter().filter(|item| item.selected).collect();
        let total = selected.len();
        let mut summary = BatchSummary::default();
        self.sink.report(&BatchEvent::Started { total });
        info!(total, "batch started");

        for (i, item) in selected.into_iter().enumerate() {
            let index = i + 1;
            if let Some(token) = &self.cancel_token {
                if token.check().is_err() {
                    warn!(processed = i, total, "batch cancelled");
                    summary.cancelled = true;
                    break;
                }
            }

            let attempt = catch_unwind(AssertUnwindSafe(|| {
                self.process_item(index, total, &item, &config)
            }));
            let outcome = match attempt {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => TransferOutcome::Failed { detail: e.to_string() },
                Err(panic) => TransferOutcome::Failed {
                    detail: panic_message(panic.as_ref()),
                },
            };

            match &outcome {
                TransferOutcome::Moved { path, bytes } => info!(
                    path = %path.display(),
                    size = %format_size(*bytes),
                    "moved {}",
                    item.filename
                ),
                TransferOutcome::Skipped { reason } => {
                    info!(reason = %reason, "skipped {}", item.filename)
                }
                TransferOutcome::Failed { detail } => {
                    warn!(detail = %detail, "error moving {}", item.filename)
                }
            }
            self.sink.report(&BatchEvent::ItemFinished {
                index,
                total,
                filename: &item.filename,
                outcome: &outcome,
            });
            summary.record(&item.filename, outcome);
        }

        info!(
            moved = summary.moved,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch finished"
        );
        for failure in &summary.failures {
            warn!("{}", failure);
        }
        self.sink.report(&BatchEvent::Finished { summary: &summary });
        summary
    }

    fn resolve_date(
        &self,
        item: &MediaItem<D::Handle>,
        columns: &[String],
    ) -> Option<ResolvedDate> {
        item.inferred_date.or_else(|| {
            self.resolver.resolve(&Evidence {
                columns,
                filename: &item.filename,
                parent_folder: item.parent_folder.as_deref(),
                local_file: None,
            })
        })
    }

    fn process_item(
        &self,
        index: usize,
        total: usize,
        item: &MediaItem<D::Handle>,
        config: &SortConfiguration,
    ) -> MoverResult<TransferOutcome> {
        let width = BACKWRITE_COLUMNS.iter().map(|s| s.columns.end).max().unwrap_or(0);
        let columns = read_columns(self.device, &item.handle, width);
        let date = self.resolve_date(item, &columns);

        let dest_folder = resolve_destination(date.map(|d| d.date), config, self.fs)?;
        info!(
            "[{}/{}] Moving {} to {} ({} remaining)",
            index,
            total,
            item.filename,
            dest_folder.display(),
            total - index + 1
        );
        self.sink.report(&BatchEvent::ItemStarted {
            index,
            total,
            filename: &item.filename,
            destination: &dest_folder,
        });

        let target = dest_folder.join(&item.filename);
        let action = duplicate::decide(&target, config.duplicate_mode, self.fs);
        if !matches!(action, DuplicateAction::Proceed { delete_existing: false, .. }) {
            self.sink.report(&BatchEvent::DuplicateResolved {
                filename: &item.filename,
                action: &action,
            });
        }

        let (copy_folder, final_path) = match action {
            DuplicateAction::Skip => {
                return Ok(TransferOutcome::Skipped {
                    reason: "already exists".to_string(),
                })
            }
            DuplicateAction::Proceed { path, delete_existing } => {
                if delete_existing {
                    info!(path = %path.display(), "file exists, overwriting");
                    self.fs
                        .delete(&path)
                        .map_err(|e| MoverError::unwritable("delete", &path, e))?;
                }
                (dest_folder.clone(), path)
            }
            DuplicateAction::Rename { path } => {
                info!(path = %path.display(), "file exists, keeping both");
                let staging = dest_folder.join(STAGING_DIR);
                self.fs
                    .create_dir_all(&staging)
                    .map_err(|e| MoverError::unwritable("create directory", &staging, e))?;
                let stale = staging.join(&item.filename);
                if self.fs.exists(&stale) {
                    self.fs
                        .delete(&stale)
                        .map_err(|e| MoverError::unwritable("delete", &stale, e))?;
                }
                (staging, path)
            }
        };

        let copied = self.copy_and_settle(item, &copy_folder, &final_path);
        if copy_folder != dest_folder {
            self.discard_staging(&copy_folder, &item.filename);
        }
        let size = copied?;

        self.write_back(item, &final_path, &columns, date);

        Ok(TransferOutcome::Moved {
            path: final_path,
            bytes: size,
        })
    }

    /// Trigger the device copy into `copy_folder`, wait for it to settle and
    /// move it to `final_path`. Returns the settled size.
    fn copy_and_settle(
        &self,
        item: &MediaItem<D::Handle>,
        copy_folder: &Path,
        final_path: &Path,
    ) -> MoverResult<u64> {
        self.device.trigger_copy(&item.handle, copy_folder)?;

        let landed = copy_folder.join(&item.filename);
        let mut on_progress = |waited: Duration| {
            info!(waited = waited.as_secs(), "still copying {}", item.filename);
            self.sink.report(&BatchEvent::StillCopying {
                filename: &item.filename,
                waited,
            });
        };
        let cancel = self.cancel_token.as_ref();
        let size = match self.monitor.wait(&landed, self.fs, cancel, &mut on_progress) {
            Completion::Completed { size } => size,
            Completion::TimedOut { waited } => {
                return Err(MoverError::CompletionTimeout {
                    path: landed,
                    waited,
                })
            }
            Completion::Cancelled => return Err(MoverError::Cancelled),
        };

        if landed != final_path {
            self.fs
                .rename(&landed, final_path)
                .map_err(|e| MoverError::unwritable("rename", &landed, e))?;
        }
        Ok(size)
    }

    /// Drop whatever is left of a staged copy, then the staging folder if empty.
    fn discard_staging(&self, staging: &Path, filename: &str) {
        let leftover = staging.join(filename);
        if self.fs.exists(&leftover) {
            if let Err(e) = self.fs.delete(&leftover) {
                warn!(path = %leftover.display(), error = %e, "could not remove staged copy");
            }
        }
        // Fails while other items still have files staged there
        let _ = self.fs.remove_dir(staging);
    }

    /// Stamp the capture time on the landed file. Failures here never fail the item.
    fn write_back(
        &self,
        item: &MediaItem<D::Handle>,
        path: &Path,
        columns: &[String],
        placement: Option<ResolvedDate>,
    ) {
        let hints = BackWriteHints { columns, placement };
        match self.back_writer.apply(path, &hints, self.fs) {
            Ok(BackWrite::Applied { timestamp, .. }) => self.sink.report(&BatchEvent::DateApplied {
                filename: &item.filename,
                timestamp,
            }),
            Ok(BackWrite::NotApplied) => {
                let unavailable = MoverError::MetadataUnavailable {
                    path: path.to_path_buf(),
                };
                warn!("{}, file keeps its copy date", unavailable);
                self.sink.report(&BatchEvent::DateNotApplied {
                    filename: &item.filename,
                });
            }
            Err(e) => {
                warn!(error = %e, "could not preserve metadata for {}", item.filename);
                self.sink.report(&BatchEvent::DateNotApplied {
                    filename: &item.filename,
                });
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("internal error: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("internal error: {}", s)
    } else {
        "internal error".to_string()
    }
}
