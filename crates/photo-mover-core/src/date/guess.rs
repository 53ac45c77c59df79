use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// Camera-roll names: `IMG_20240115_...`, `VID_E20240115...`, `PXL_20240115_...`.
/// One stray non-digit right after the underscore (burst/edit marker) is allowed.
static CAPTURE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:IMG|VID|PXL)_[^0-9_]?(?P<y>(?:19|20)\d{2})(?P<m>\d{2})(?P<d>\d{2})").unwrap()
});

/// Device folders such as `202410__` or `202410_a`.
static MONTH_FOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<y>\d{4})(?P<m>\d{2})").unwrap());

/// Capture date encoded in a camera filename. Date only, no time of day.
pub fn date_from_filename(filename: &str) -> Option<NaiveDate> {
    let caps = CAPTURE_NAME_RE.captures(filename)?;
    NaiveDate::from_ymd_opt(
        caps["y"].parse().ok()?,
        caps["m"].parse().ok()?,
        caps["d"].parse().ok()?,
    )
}

/// `YYYYMM` prefix of a device folder name, pinned to the first of the month.
pub fn date_from_folder_name(folder: &str) -> Option<NaiveDate> {
    let caps = MONTH_FOLDER_RE.captures(folder)?;
    NaiveDate::from_ymd_opt(caps["y"].parse().ok()?, caps["m"].parse().ok()?, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_filename_patterns() {
        assert_eq!(date_from_filename("IMG_20240115_101500.jpg"), ymd(2024, 1, 15));
        assert_eq!(date_from_filename("IMG_E20240115_101500.HEIC"), ymd(2024, 1, 15));
        assert_eq!(date_from_filename("VID_20231231.mov"), ymd(2023, 12, 31));
        assert_eq!(date_from_filename("PXL_20220601_081122333.jpg"), ymd(2022, 6, 1));
        assert_eq!(date_from_filename("IMG_1234.JPG"), None);
        assert_eq!(date_from_filename("IMG_20241340.jpg"), None);
        assert_eq!(date_from_filename("photo_20240115.jpg"), None);
        assert_eq!(date_from_filename("IMG_EE20240115.jpg"), None);
    }

    #[test]
    fn test_folder_patterns() {
        assert_eq!(date_from_folder_name("202410_something"), ymd(2024, 10, 1));
        assert_eq!(date_from_folder_name("202512__"), ymd(2025, 12, 1));
        assert_eq!(date_from_folder_name("2024_10"), None);
        assert_eq!(date_from_folder_name("202413__"), None);
        assert_eq!(date_from_folder_name("DCIM"), None);
    }
}
