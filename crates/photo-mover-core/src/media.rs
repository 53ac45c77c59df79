use std::path::Path;

use crate::date::ResolvedDate;

/// Extensions the device scan picks up regardless of what `mime_guess` says.
const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "mov", "mp4"];

/// Columns that may hold a human-readable size ("1.4 MB").
pub const SIZE_COLUMNS: &[usize] = &[1, 2];

/// One media file discovered on the device.
#[derive(Debug, Clone)]
pub struct MediaItem<H> {
    /// Device handle, only ever passed back to the adapter that produced it
    pub handle: H,
    pub filename: String,
    /// Upper-cased extension, "Unknown" when the name has none
    pub extension: String,
    /// Best-effort size parsed from the device's size column
    pub size_hint: Option<u64>,
    /// Name of the device-side folder holding the item (often date-encoded)
    pub parent_folder: Option<String>,
    /// Capture date inferred at scan time
    pub inferred_date: Option<ResolvedDate>,
    /// Set by the interactive layer; the batch only processes selected items
    pub selected: bool,
}

impl<H> MediaItem<H> {
    pub fn new(handle: H, filename: impl Into<String>, parent_folder: Option<String>) -> Self {
        let filename = filename.into();
        let extension = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_uppercase())
            .unwrap_or_else(|| "Unknown".to_string());
        Self {
            handle,
            filename,
            extension,
            size_hint: None,
            parent_folder,
            inferred_date: None,
            selected: true,
        }
    }
}

/// Whether a device file should be offered for import.
pub fn is_media_file(filename: &str) -> bool {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if let Some(ext) = &ext {
        if MEDIA_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
    }
    mime_guess::from_path(filename).first().map_or(false, |mime| {
        mime.type_() == mime_guess::mime::IMAGE || mime.type_() == mime_guess::mime::VIDEO
    })
}

/// Parse a shell-style size string ("2.5 MB", "1,024 KB", "512 bytes").
pub fn parse_size_hint(detail: &str) -> Option<u64> {
    let detail = detail.trim();
    let units: [(&str, f64); 4] = [
        ("GB", 1024.0 * 1024.0 * 1024.0),
        ("MB", 1024.0 * 1024.0),
        ("KB", 1024.0),
        ("byte", 1.0),
    ];
    for (unit, factor) in units {
        let Some(pos) = detail.find(unit) else { continue };
        let number: String = detail[..pos].chars().filter(|c| *c != ',').collect();
        let value: f64 = number.trim().parse().ok()?;
        let bytes = (value * factor) as u64;
        return (bytes > 0).then_some(bytes);
    }
    None
}

/// Human-readable size for log lines.
pub fn format_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}
