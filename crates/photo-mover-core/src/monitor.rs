use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::cancel::CancellationToken;
use crate::device::Filesystem;

/// Timing of the completion poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Pause between polls while the file is missing or still growing
    pub poll_interval: Duration,
    /// Pause between the two size samples
    pub settle_delay: Duration,
    /// Give up after this long
    pub timeout: Duration,
    /// How often a "still copying" notification is emitted
    pub progress_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Completed { size: u64 },
    TimedOut { waited: Duration },
    Cancelled,
}

/// Turns a fire-and-forget copy into a bounded wait.
///
/// The destination file appears before its bytes are flushed, so a transfer is
/// only considered finished once two size samples a settle delay apart agree
/// and are non-zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferMonitor {
    settings: MonitorSettings,
}

impl TransferMonitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self { settings }
    }

    /// Whether `path` currently holds a file that has stopped growing.
    /// Returns its size when it has. Blocks for one settle delay.
    fn stable_size(&self, path: &Path, fs: &dyn Filesystem) -> Option<u64> {
        if !fs.exists(path) {
            return None;
        }
        let first = fs.size(path).ok()?;
        std::thread::sleep(self.settings.settle_delay);
        let second = fs.size(path).ok()?;
        trace!(path = %path.display(), first, second, "size samples");
        (first == second && second > 0).then_some(second)
    }

    /// Poll `expected` until the copy settles, the timeout passes, or the batch
    /// is cancelled. `on_progress` receives the elapsed wait every progress interval.
    pub fn wait(
        &self,
        expected: &Path,
        fs: &dyn Filesystem,
        cancel: Option<&CancellationToken>,
        on_progress: &mut dyn FnMut(Duration),
    ) -> Completion {
        let start = Instant::now();
        let mut last_progress = Duration::ZERO;

        loop {
            if cancel.map_or(false, |token| token.check().is_err()) {
                debug!(path = %expected.display(), "wait cancelled");
                return Completion::Cancelled;
            }

            if let Some(size) = self.stable_size(expected, fs) {
                debug!(
                    path = %expected.display(),
                    size,
                    elapsed = ?start.elapsed(),
                    "transfer settled"
                );
                return Completion::Completed { size };
            }

            let waited = start.elapsed();
            if waited >= self.settings.timeout {
                return Completion::TimedOut { waited };
            }

            std::thread::sleep(self.settings.poll_interval);

            let waited = start.elapsed();
            if waited.saturating_sub(last_progress) >= self.settings.progress_interval {
                on_progress(waited);
                last_progress = waited;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::path::PathBuf;
    use std::time::SystemTime;

    pub(crate) fn fast_settings() -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_millis(5),
            settle_delay: Duration::from_millis(5),
            timeout: Duration::from_millis(80),
            progress_interval: Duration::from_millis(20),
        }
    }

    /// Filesystem whose single file reports a scripted sequence of sizes.
    struct ScriptedFs {
        path: PathBuf,
        present: bool,
        sizes: RefCell<VecDeque<u64>>,
        samples: RefCell<Vec<u64>>,
        sampled_at: RefCell<Vec<Instant>>,
    }

    impl ScriptedFs {
        fn new(present: bool, sizes: &[u64]) -> Self {
            Self {
                path: PathBuf::from("/dest/IMG_0001.JPG"),
                present,
                sizes: RefCell::new(sizes.iter().copied().collect()),
                samples: RefCell::new(Vec::new()),
                sampled_at: RefCell::new(Vec::new()),
            }
        }
    }

    impl Filesystem for ScriptedFs {
        fn exists(&self, path: &Path) -> bool {
            self.present && path == self.path
        }
        fn size(&self, _path: &Path) -> io::Result<u64> {
            let mut sizes = self.sizes.borrow_mut();
            let size = if sizes.len() > 1 {
                sizes.pop_front().unwrap_or(0)
            } else {
                sizes.front().copied().unwrap_or(0)
            };
            self.samples.borrow_mut().push(size);
            self.sampled_at.borrow_mut().push(Instant::now());
            Ok(size)
        }
        fn delete(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }
        fn rename(&self, _from: &Path, _to: &Path) -> io::Result<()> {
            Ok(())
        }
        fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }
        fn remove_dir(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }
        fn set_timestamps(&self, _path: &Path, _c: SystemTime, _m: SystemTime) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_growing_file_waits_for_stable_pair() {
        let fs = ScriptedFs::new(true, &[10, 20, 20, 30, 30]);
        let monitor = TransferMonitor::new(fast_settings());
        let result = monitor.wait(&fs.path, &fs, None, &mut |_| {});
        assert_eq!(result, Completion::Completed { size: 30 });
        assert_eq!(*fs.samples.borrow(), vec![10, 20, 20, 30, 30, 30]);
    }

    #[test]
    fn test_sample_pairs_are_a_settle_delay_apart() {
        let settings = MonitorSettings {
            settle_delay: Duration::from_millis(30),
            ..fast_settings()
        };
        let fs = ScriptedFs::new(true, &[10, 20, 20, 20]);
        let result = TransferMonitor::new(settings).wait(&fs.path, &fs, None, &mut |_| {});
        assert_eq!(result, Completion::Completed { size: 20 });

        let times = fs.sampled_at.borrow();
        assert_eq!(times.len(), 4);
        for pair in times.chunks(2) {
            assert!(pair[1] - pair[0] >= settings.settle_delay, "{:?}", pair[1] - pair[0]);
        }
    }

    #[test]
    fn test_missing_file_times_out() {
        let fs = ScriptedFs::new(false, &[]);
        let monitor = TransferMonitor::new(fast_settings());
        let start = Instant::now();
        match monitor.wait(&fs.path, &fs, None, &mut |_| {}) {
            Completion::TimedOut { waited } => assert!(waited >= fast_settings().timeout),
            other => panic!("unexpected {other:?}"),
        }
        assert!(start.elapsed() >= fast_settings().timeout);
        assert!(fs.samples.borrow().is_empty());
    }

    #[test]
    fn test_empty_file_never_completes() {
        let fs = ScriptedFs::new(true, &[0]);
        let monitor = TransferMonitor::new(fast_settings());
        let result = monitor.wait(&fs.path, &fs, None, &mut |_| {});
        assert!(matches!(result, Completion::TimedOut { .. }));
    }

    #[test]
    fn test_progress_notifications() {
        let fs = ScriptedFs::new(false, &[]);
        let monitor = TransferMonitor::new(fast_settings());
        let mut ticks = Vec::new();
        monitor.wait(&fs.path, &fs, None, &mut |waited| ticks.push(waited));
        assert!(ticks.len() >= 2, "got {ticks:?}");
        assert!(ticks.windows(2).all(|w| w[1] - w[0] >= fast_settings().progress_interval));
    }

    #[test]
    fn test_cancelled_wait() {
        let fs = ScriptedFs::new(false, &[]);
        let token = CancellationToken::new();
        token.cancel();
        let monitor = TransferMonitor::new(fast_settings());
        assert_eq!(monitor.wait(&fs.path, &fs, Some(&token), &mut |_| {}), Completion::Cancelled);
    }

    #[test]
    fn test_real_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mov");
        std::fs::write(&path, vec![7u8; 4096]).unwrap();
        let monitor = TransferMonitor::new(fast_settings());
        let result = monitor.wait(&path, &crate::device::LocalFilesystem, None, &mut |_| {});
        assert_eq!(result, Completion::Completed { size: 4096 });
    }
}
