use std::path::{Path, PathBuf};

use crate::config::DuplicateMode;
use crate::device::Filesystem;

/// What to do with an item whose target name may already be taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateAction {
    /// Copy under the original name, deleting the existing file first if asked.
    Proceed { path: PathBuf, delete_existing: bool },
    /// Copy, then give the file this free name.
    Rename { path: PathBuf },
    /// Leave the existing file alone.
    Skip,
}

/// Decide how to handle `target` under `mode`, looking at the destination as it is now.
pub fn decide(target: &Path, mode: DuplicateMode, fs: &dyn Filesystem) -> DuplicateAction {
    if !fs.exists(target) {
        return DuplicateAction::Proceed {
            path: target.to_path_buf(),
            delete_existing: false,
        };
    }

    match mode {
        DuplicateMode::Overwrite => DuplicateAction::Proceed {
            path: target.to_path_buf(),
            delete_existing: true,
        },
        DuplicateMode::KeepBoth => DuplicateAction::Rename {
            path: next_free_name(target, fs),
        },
        DuplicateMode::Skip => DuplicateAction::Skip,
    }
}

/// First of `stem_1.ext`, `stem_2.ext`, ... that does not exist.
fn next_free_name(target: &Path, fs: &dyn Filesystem) -> PathBuf {
    let dir = target.parent().unwrap_or_else(|| Path::new(""));
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let ext = target.extension().map(|s| s.to_string_lossy().into_owned());

    let mut counter = 1u64;
    loop {
        let name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = dir.join(name);
        if !fs.exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LocalFilesystem;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_free_target_always_proceeds() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("photo.jpg");
        for mode in [DuplicateMode::Overwrite, DuplicateMode::KeepBoth, DuplicateMode::Skip] {
            assert_eq!(
                decide(&target, mode, &LocalFilesystem),
                DuplicateAction::Proceed {
                    path: target.clone(),
                    delete_existing: false
                }
            );
        }
    }

    #[test]
    fn test_keep_both_probes_counter() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("photo.jpg"), b"a").unwrap();
        fs::write(dir.path().join("photo_1.jpg"), b"b").unwrap();

        let target = dir.path().join("photo.jpg");
        let action = decide(&target, DuplicateMode::KeepBoth, &LocalFilesystem);
        assert_eq!(
            action,
            DuplicateAction::Rename {
                path: dir.path().join("photo_2.jpg")
            }
        );
    }

    #[test]
    fn test_keep_both_without_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("clip"), b"a").unwrap();
        let action = decide(&dir.path().join("clip"), DuplicateMode::KeepBoth, &LocalFilesystem);
        assert_eq!(
            action,
            DuplicateAction::Rename {
                path: dir.path().join("clip_1")
            }
        );
    }

    #[test]
    fn test_overwrite_and_skip() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("photo.jpg");
        fs::write(&target, b"a").unwrap();

        assert_eq!(
            decide(&target, DuplicateMode::Overwrite, &LocalFilesystem),
            DuplicateAction::Proceed {
                path: target.clone(),
                delete_existing: true
            }
        );
        assert_eq!(decide(&target, DuplicateMode::Skip, &LocalFilesystem), DuplicateAction::Skip);
    }
}
