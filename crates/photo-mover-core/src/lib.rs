pub mod backwrite;
pub mod batch;
pub mod cancel;
pub mod config;
pub mod date;
pub mod destination;
pub mod device;
pub mod duplicate;
pub mod error;
pub mod media;
pub mod monitor;
pub mod scan;

pub use batch::{BatchEvent, BatchOrchestrator, BatchSummary, ReportSink, TransferOutcome};
pub use cancel::CancellationToken;
pub use config::{DuplicateMode, SortConfiguration, SortMode, CONFIG_FILENAME};
pub use date::container::{ContainerExtractor, MediaMetadataExtractor};
pub use date::{DateResolver, DateSource, ResolvedDate};
pub use device::{DeviceAdapter, DeviceEntry, Filesystem, LocalFilesystem, MountedDevice};
pub use error::{MoverError, MoverResult};
pub use media::MediaItem;
pub use monitor::{MonitorSettings, TransferMonitor};
pub use scan::{scan_device, ScanResult, DEFAULT_MAX_DEPTH};
