use std::path::PathBuf;

use chrono::NaiveDate;

use crate::config::{SortConfiguration, SortMode};
use crate::device::Filesystem;
use crate::error::{MoverError, MoverResult};

/// Folder name for a capture date under the given sort mode.
pub fn folder_name(date: NaiveDate, mode: SortMode) -> String {
    match mode {
        SortMode::MonthYear => date.format("%Y-%m").to_string(),
        SortMode::DateMonthYear => date.format("%Y-%m-%d").to_string(),
    }
}

/// Destination directory for a capture date, created if absent.
///
/// Unknown dates go to the configured unknown folder. Safe to call repeatedly.
pub fn resolve_destination(
    date: Option<NaiveDate>,
    config: &SortConfiguration,
    fs: &dyn Filesystem,
) -> MoverResult<PathBuf> {
    let dir = match date {
        Some(date) => config.output_base_path.join(folder_name(date, config.sort_mode)),
        None => config.unknown_folder_path.clone(),
    };
    fs.create_dir_all(&dir)
        .map_err(|e| MoverError::unwritable("create directory", &dir, e))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LocalFilesystem;
    use tempfile::tempdir;

    fn config(root: &std::path::Path, mode: SortMode) -> SortConfiguration {
        SortConfiguration {
            sort_mode: mode,
            output_base_path: root.join("sorted"),
            unknown_folder_path: root.join("unknown"),
            ..Default::default()
        }
    }

    #[test]
    fn test_sort_modes() {
        let dir = tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2023, 7, 9);

        let cfg = config(dir.path(), SortMode::MonthYear);
        let month = resolve_destination(date, &cfg, &LocalFilesystem).unwrap();
        assert_eq!(month, dir.path().join("sorted").join("2023-07"));
        assert!(month.is_dir());

        let cfg = config(dir.path(), SortMode::DateMonthYear);
        let day = resolve_destination(date, &cfg, &LocalFilesystem).unwrap();
        assert_eq!(day, dir.path().join("sorted").join("2023-07-09"));
        assert!(day.is_dir());
    }

    #[test]
    fn test_unknown_date() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), SortMode::MonthYear);
        let dest = resolve_destination(None, &cfg, &LocalFilesystem).unwrap();
        assert_eq!(dest, cfg.unknown_folder_path);
        assert!(dest.is_dir());
    }

    #[test]
    fn test_idempotent() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), SortMode::DateMonthYear);
        let date = NaiveDate::from_ymd_opt(2024, 1, 15);
        let first = resolve_destination(date, &cfg, &LocalFilesystem).unwrap();
        let second = resolve_destination(date, &cfg, &LocalFilesystem).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("sorted");
        std::fs::write(&blocker, b"a file, not a folder").unwrap();
        let cfg = config(dir.path(), SortMode::MonthYear);
        let date = NaiveDate::from_ymd_opt(2024, 1, 15);
        let result = resolve_destination(date, &cfg, &LocalFilesystem);
        assert!(matches!(result, Err(MoverError::DestinationUnwritable { .. })));
    }
}
