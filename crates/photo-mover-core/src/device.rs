use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use filetime::FileTime;
use tracing::{debug, error, warn};

use crate::error::{MoverError, MoverResult};

/// One entry of a device folder listing.
#[derive(Debug, Clone)]
pub struct DeviceEntry<H> {
    pub handle: H,
    pub name: String,
    pub is_container: bool,
}

/// Session with a removable device.
///
/// The copy trigger is fire-and-forget: it returns once the transfer has been
/// requested, and the file shows up at the destination at some later time.
pub trait DeviceAdapter {
    /// Opaque reference to an item on the device.
    type Handle: Clone + std::fmt::Debug;

    /// Top-level storage folder of the device.
    fn root(&self) -> MoverResult<Self::Handle>;

    /// Direct children of a device folder.
    fn list_children(&self, folder: &Self::Handle) -> MoverResult<Vec<DeviceEntry<Self::Handle>>>;

    /// Shell-style property column of an item; `None` when empty or unavailable.
    fn property(&self, item: &Self::Handle, column: usize) -> Option<String>;

    /// Ask the device to copy `item` into `dest_folder` under its own name.
    fn trigger_copy(&self, item: &Self::Handle, dest_folder: &Path) -> MoverResult<()>;
}

/// Local filesystem operations the engine performs on the destination side.
pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;
    fn size(&self, path: &Path) -> io::Result<u64>;
    fn delete(&self, path: &Path) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Remove a directory if it is empty.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
    fn set_timestamps(
        &self,
        path: &Path,
        created: SystemTime,
        modified: SystemTime,
    ) -> io::Result<()>;
}

/// `std::fs` backed [`Filesystem`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn set_timestamps(
        &self,
        path: &Path,
        created: SystemTime,
        modified: SystemTime,
    ) -> io::Result<()> {
        let ft = FileTime::from_system_time(modified);
        filetime::set_file_times(path, ft, ft)?;

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileTimesExt;
            let file = fs::OpenOptions::new().write(true).open(path)?;
            file.set_times(fs::FileTimes::new().set_created(created))?;
        }
        #[cfg(not(windows))]
        let _ = created;

        Ok(())
    }
}

/// A device whose storage is mounted into the local filesystem (MTP/AFC mounts,
/// card readers). Handles are absolute paths below the mount point.
#[derive(Debug, Clone)]
pub struct MountedDevice {
    mount_point: PathBuf,
}

/// Column layout mirrors the Windows shell detail view.
pub mod column {
    pub const NAME: usize = 0;
    pub const SIZE: usize = 1;
    pub const ITEM_TYPE: usize = 2;
    pub const DATE_MODIFIED: usize = 3;
    pub const DATE_CREATED: usize = 4;
}

const SHELL_DATE_FORMAT: &str = "%m/%d/%Y %I:%M %p";

impl MountedDevice {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}

fn shell_date(time: io::Result<SystemTime>) -> Option<String> {
    let local: DateTime<Local> = time.ok()?.into();
    Some(local.format(SHELL_DATE_FORMAT).to_string())
}

impl DeviceAdapter for MountedDevice {
    type Handle = PathBuf;

    fn root(&self) -> MoverResult<PathBuf> {
        if self.mount_point.is_dir() {
            Ok(self.mount_point.clone())
        } else {
            Err(MoverError::DeviceUnavailable {
                reason: format!("{} is not a mounted folder", self.mount_point.display()),
            })
        }
    }

    fn list_children(&self, folder: &PathBuf) -> MoverResult<Vec<DeviceEntry<PathBuf>>> {
        let listing = fs::read_dir(folder).map_err(|source| MoverError::EnumerationFailure {
            folder: folder.display().to_string(),
            source,
        })?;

        let mut entries = Vec::new();
        for entry in listing {
            // Symlinks are followed; a dangling one is skipped like any unreadable entry
            let read = entry.and_then(|e| Ok((e.path(), fs::metadata(e.path())?, e.file_name())));
            let (path, meta, name) = match read {
                Ok(read) => read,
                Err(e) => {
                    warn!(folder = %folder.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            entries.push(DeviceEntry {
                handle: path,
                name: name.to_string_lossy().into_owned(),
                is_container: meta.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn property(&self, item: &PathBuf, col: usize) -> Option<String> {
        let meta = fs::metadata(item).ok()?;
        match col {
            column::NAME => item.file_name().map(|n| n.to_string_lossy().into_owned()),
            column::SIZE if meta.is_file() => Some(format!("{} KB", meta.len().div_ceil(1024))),
            column::ITEM_TYPE => Some(match item.extension().and_then(|e| e.to_str()) {
                Some(ext) => format!("{} File", ext.to_uppercase()),
                None if meta.is_dir() => "File folder".to_string(),
                None => "File".to_string(),
            }),
            column::DATE_MODIFIED => shell_date(meta.modified()),
            column::DATE_CREATED => shell_date(meta.created()),
            _ => None,
        }
    }

    fn trigger_copy(&self, item: &PathBuf, dest_folder: &Path) -> MoverResult<()> {
        if !item.is_file() {
            return Err(MoverError::CopyTriggerFailure {
                reason: format!("{} is no longer on the device", item.display()),
            });
        }
        let Some(name) = item.file_name() else {
            return Err(MoverError::CopyTriggerFailure {
                reason: format!("{} has no file name", item.display()),
            });
        };
        if !dest_folder.is_dir() {
            return Err(MoverError::CopyTriggerFailure {
                reason: format!("cannot access destination: {}", dest_folder.display()),
            });
        }

        let source = item.clone();
        let target = dest_folder.join(name);
        debug!(source = %source.display(), target = %target.display(), "copy requested");
        // Detached on purpose: completion is observed by polling the target
        std::thread::spawn(move || {
            if let Err(e) = fs::copy(&source, &target) {
                error!(source = %source.display(), error = %e, "device copy failed");
            }
        });
        Ok(())
    }
}
