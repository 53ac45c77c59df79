use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};

/// Dates a media container carries about itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerDates {
    /// Capture / creation time
    pub creation: Option<NaiveDateTime>,
    /// Any other recorded time (last modification, digitization)
    pub other: Option<NaiveDateTime>,
}

impl ContainerDates {
    pub fn best(&self) -> Option<NaiveDateTime> {
        self.creation.or(self.other)
    }
}

/// Reads embedded dates out of a local media file. Best-effort: any parse
/// problem is reported as `None`.
pub trait ContainerExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Option<ContainerDates>;
}

/// EXIF for still images, `moov/mvhd` for QuickTime and MP4 video.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaMetadataExtractor;

const QUICKTIME_EXTENSIONS: &[&str] = &["mov", "mp4", "m4v", "3gp"];

impl ContainerExtractor for MediaMetadataExtractor {
    fn extract(&self, path: &Path) -> Option<ContainerDates> {
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| QUICKTIME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));

        if is_video {
            extract_quicktime_dates(path).or_else(|| extract_exif_dates(path))
        } else {
            extract_exif_dates(path).or_else(|| extract_quicktime_dates(path))
        }
    }
}

/// Extract dates from EXIF data.
/// EXIF datetimes have no timezone info - they are local time as-is.
pub fn extract_exif_dates(path: &Path) -> Option<ContainerDates> {
    let mut reader = BufReader::new(File::open(path).ok()?);
    let exif = Reader::new().read_from_container(&mut reader).ok()?;

    let read_tag = |tag: Tag| -> Option<NaiveDateTime> {
        let field = exif.get_field(tag, In::PRIMARY)?;
        // Raw ASCII avoids the quoting display_value() adds
        let raw = match &field.value {
            Value::Ascii(vec) if !vec.is_empty() => String::from_utf8(vec[0].clone()).ok(),
            _ => None,
        }
        .unwrap_or_else(|| field.display_value().to_string());
        parse_exif_datetime(&raw)
    };

    let dates = ContainerDates {
        creation: read_tag(Tag::DateTimeOriginal).or_else(|| read_tag(Tag::DateTimeDigitized)),
        other: read_tag(Tag::DateTime),
    };
    dates.best().map(|_| dates)
}

fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s
        .trim()
        .replace('-', ":")
        .replace('/', ":")
        .replace('\\', ":")
        .replace('.', ":");

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some(dt);
    }

    if let Ok(d) = chrono::NaiveDate::parse_from_str(cleaned.split(' ').next()?, "%Y:%m:%d") {
        return d.and_hms_opt(0, 0, 0);
    }

    None
}

#[derive(Debug, Clone, Copy)]
struct AtomRange {
    data_start: u64,
    data_end: u64,
}

/// Seconds between the QuickTime epoch (1904-01-01) and the Unix epoch.
const QT_TO_UNIX_OFFSET: i64 = 2_082_844_800;

/// Creation and modification time from the movie header of an ISO-BMFF file.
pub fn extract_quicktime_dates(path: &Path) -> Option<ContainerDates> {
    let mut file = File::open(path).ok()?;
    let file_len = file.metadata().ok()?.len();
    read_mvhd_dates(&mut file, file_len)
}

fn read_mvhd_dates<R: Read + Seek>(reader: &mut R, len: u64) -> Option<ContainerDates> {
    let moov = find_atom(reader, 0, len, *b"moov")?;
    let mvhd = find_atom(reader, moov.data_start, moov.data_end, *b"mvhd")?;

    reader.seek(SeekFrom::Start(mvhd.data_start)).ok()?;
    let mut ver_flags = [0u8; 4];
    reader.read_exact(&mut ver_flags).ok()?;
    let (created, modified) = if ver_flags[0] == 1 {
        (read_u64_be(reader)?, read_u64_be(reader)?)
    } else {
        (read_u32_be(reader)? as u64, read_u32_be(reader)? as u64)
    };

    let dates = ContainerDates {
        creation: qt_seconds_to_local(created),
        other: qt_seconds_to_local(modified),
    };
    dates.best().map(|_| dates)
}

fn find_atom<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    atom_type: [u8; 4],
) -> Option<AtomRange> {
    let mut offset = start;
    while offset + 8 <= end {
        reader.seek(SeekFrom::Start(offset)).ok()?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header).ok()?;
        let mut atom_size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let atom_kind = [header[4], header[5], header[6], header[7]];
        let mut header_size = 8u64;

        if atom_size == 1 {
            atom_size = read_u64_be(reader)?;
            header_size = 16;
        } else if atom_size == 0 {
            // Extends to the end of the enclosing range
            atom_size = end.saturating_sub(offset);
        }
        if atom_size < header_size {
            return None;
        }
        let atom_end = offset.saturating_add(atom_size).min(end);

        if atom_kind == atom_type {
            return Some(AtomRange {
                data_start: offset + header_size,
                data_end: atom_end,
            });
        }
        offset = atom_end;
    }
    None
}

fn read_u32_be<R: Read>(reader: &mut R) -> Option<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).ok()?;
    Some(u32::from_be_bytes(buf))
}

fn read_u64_be<R: Read>(reader: &mut R) -> Option<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).ok()?;
    Some(u64::from_be_bytes(buf))
}

/// Zero means "not set" in the movie header.
fn qt_seconds_to_local(qt_seconds: u64) -> Option<NaiveDateTime> {
    if qt_seconds == 0 {
        return None;
    }
    let unix = i64::try_from(qt_seconds).ok()?.checked_sub(QT_TO_UNIX_OFFSET)?;
    let utc = chrono::DateTime::from_timestamp(unix, 0)?;
    Some(utc.with_timezone(&chrono::Local).naive_local())
}
