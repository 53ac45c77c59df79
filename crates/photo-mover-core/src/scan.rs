use tracing::{debug, info, warn};

use crate::date::columns::SCAN_COLUMNS;
use crate::date::{DateResolver, Evidence};
use crate::device::{DeviceAdapter, DeviceEntry};
use crate::error::MoverResult;
use crate::media::{is_media_file, parse_size_hint, MediaItem, SIZE_COLUMNS};

/// Folder levels below the device root that are still listed.
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Media found on a device, plus the subtrees that could not be listed.
#[derive(Debug)]
pub struct ScanResult<H> {
    pub items: Vec<MediaItem<H>>,
    pub failures: Vec<String>,
}

/// Read the first `count` property columns of a device item, empty when unset.
pub fn read_columns<D: DeviceAdapter>(device: &D, handle: &D::Handle, count: usize) -> Vec<String> {
    (0..count)
        .map(|col| device.property(handle, col).unwrap_or_default())
        .collect()
}

/// Walk the device from its root, collecting media items with an inferred date.
///
/// A folder that cannot be listed is logged and skipped; only an unreachable
/// device fails the whole scan.
pub fn scan_device<D: DeviceAdapter>(
    device: &D,
    resolver: &DateResolver,
    max_depth: usize,
) -> MoverResult<ScanResult<D::Handle>> {
    let root = device.root()?;
    let mut result = ScanResult {
        items: Vec::new(),
        failures: Vec::new(),
    };
    scan_folder_recursive(device, resolver, &root, None, 0, max_depth, &mut result);
    info!(
        items = result.items.len(),
        failed_folders = result.failures.len(),
        "device scan finished"
    );
    Ok(result)
}

fn scan_folder_recursive<D: DeviceAdapter>(
    device: &D,
    resolver: &DateResolver,
    folder: &D::Handle,
    folder_name: Option<&str>,
    depth: usize,
    max_depth: usize,
    result: &mut ScanResult<D::Handle>,
) {
    let entries = match device.list_children(folder) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(folder = ?folder, error = %e, "skipping folder");
            result.failures.push(e.to_string());
            return;
        }
    };

    for DeviceEntry {
        handle,
        name,
        is_container,
    } in entries
    {
        if is_container {
            if depth < max_depth {
                let sub = Some(name.as_str());
                scan_folder_recursive(device, resolver, &handle, sub, depth + 1, max_depth, result);
            } else {
                debug!(folder = %name, "max depth reached");
            }
        } else if is_media_file(&name) {
            result.items.push(build_item(device, resolver, handle, name, folder_name));
        }
    }
}

fn build_item<D: DeviceAdapter>(
    device: &D,
    resolver: &DateResolver,
    handle: D::Handle,
    filename: String,
    folder_name: Option<&str>,
) -> MediaItem<D::Handle> {
    let scan_width = SCAN_COLUMNS.iter().map(|s| s.columns.end).max().unwrap_or(0);
    let columns = read_columns(device, &handle, scan_width);
    let size_hint = SIZE_COLUMNS
        .iter()
        .find_map(|&col| columns.get(col).and_then(|v| parse_size_hint(v)));
    let inferred_date = resolver.resolve(&Evidence {
        columns: &columns,
        filename: &filename,
        parent_folder: folder_name,
        local_file: None,
    });

    debug!(filename = %filename, date = ?inferred_date.map(|d| d.date), "found media");
    let mut item = MediaItem::new(handle, filename, folder_name.map(str::to_string));
    item.size_hint = size_hint;
    item.inferred_date = inferred_date;
    item
}
