//! Rotating file writer with automatic log rotation
//!
//! Records are written on a worker thread. The file is rotated by size,
//! by age or by whichever comes first; rotated files are numbered
//! `<name>.1` (newest) to `<name>.<max_backups>` and optionally gzipped.

use super::base::{FeedbackSlot, Lifecycle};
use super::file::open_append;
use crate::core::{
    FeedbackSender, LogRecord, LoggerError, Result, TextLayout, Worker, Writer,
    DEFAULT_CLOSE_TIMEOUT, DEFAULT_WORKER_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// When to rotate the log file
///
/// # Examples
///
/// ```
/// use rust_logging_core::writers::RotationStrategy;
/// use std::time::Duration;
///
/// // Rotate when the file exceeds 100 MB
/// let size_strategy = RotationStrategy::Size { max_bytes: 100 * 1024 * 1024 };
///
/// // Rotate every hour
/// let time_strategy = RotationStrategy::Time { interval: Duration::from_secs(3600) };
///
/// // Rotate on size OR time, whichever comes first
/// let hybrid_strategy = RotationStrategy::Hybrid {
///     max_bytes: 50 * 1024 * 1024,
///     interval: Duration::from_secs(24 * 3600),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationStrategy {
    /// Rotate when the file exceeds size in bytes
    Size { max_bytes: u64 },

    /// Rotate when the file is older than the interval
    Time { interval: Duration },

    /// Rotate on size OR time, whichever comes first
    Hybrid { max_bytes: u64, interval: Duration },

    /// No rotation (external rotation or tests)
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::Size {
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Rotation configuration
///
/// # Examples
///
/// ```
/// use rust_logging_core::writers::{RotationPolicy, RotationStrategy};
/// use std::time::Duration;
///
/// // Daily rotation, compressed, only keeping days with warnings or worse
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::Time { interval: Duration::from_secs(24 * 3600) })
///     .with_max_backups(30)
///     .with_compression(true)
///     .keep_only_critical(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    pub strategy: RotationStrategy,
    /// Number of rotated files to keep
    pub max_backups: usize,
    /// Gzip rotated files
    pub compress: bool,
    /// Discard rotated files without a Fatal, Error or Warning record
    pub keep_only_critical: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            max_backups: 5,
            compress: false,
            keep_only_critical: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for a size strategy
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, size: u64) -> Self {
        self.strategy = RotationStrategy::Size { max_bytes: size };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn keep_only_critical(mut self, enabled: bool) -> Self {
        self.keep_only_critical = enabled;
        self
    }
}

/// Open log file and rotation bookkeeping, owned by the worker thread.
struct RotatingFile {
    base_path: PathBuf,
    policy: RotationPolicy,
    layout: TextLayout,
    file: Option<BufWriter<File>>,
    current_size: u64,
    last_rotation: SystemTime,
    critical: bool,
}

impl RotatingFile {
    fn open(base_path: PathBuf, policy: RotationPolicy, layout: TextLayout) -> Result<Self> {
        if let Some(parent) = base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let file = open_append(&base_path)?;
        let metadata = file.metadata().map_err(|e| {
            LoggerError::file_writer(
                base_path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?;

        Ok(Self {
            base_path,
            policy,
            layout,
            current_size: metadata.len(),
            last_rotation: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
            file: Some(BufWriter::new(file)),
            critical: false,
        })
    }

    fn should_rotate(&self) -> bool {
        if self.current_size == 0 {
            return false;
        }

        let age = || {
            SystemTime::now()
                .duration_since(self.last_rotation)
                .unwrap_or(Duration::ZERO)
        };

        match &self.policy.strategy {
            RotationStrategy::Never => false,
            RotationStrategy::Size { max_bytes } => self.current_size >= *max_bytes,
            RotationStrategy::Time { interval } => age() >= *interval,
            RotationStrategy::Hybrid { max_bytes, interval } => {
                self.current_size >= *max_bytes || age() >= *interval
            }
        }
    }

    /// Write one record, rotating first when due. A failed rotation is
    /// returned after the record has been written to the current file.
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        let mut rotation = Ok(());
        if self.should_rotate() {
            rotation = self.rotate();
            if rotation.is_err() {
                self.recover_after_failed_rotation();
            }
        }

        self.write_line(record)?;
        rotation
    }

    fn write_line(&mut self, record: &LogRecord) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            LoggerError::file_writer(self.base_path.display().to_string(), "file not open")
        })?;

        let mut line = record.to_text(&self.layout);
        line.push('\n');
        file.write_all(line.as_bytes()).map_err(|e| {
            LoggerError::file_writer(
                self.base_path.display().to_string(),
                format!("Failed to write record: {}", e),
            )
        })?;
        file.flush()?;

        self.current_size += line.len() as u64;
        if record.level().is_critical() {
            self.critical = true;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        let keep = self.policy.max_backups > 0 && (!self.policy.keep_only_critical || self.critical);
        if keep {
            self.shift_backups()?;
            let first = self.backup_path(1, false);
            self.rename(&self.base_path, &first)?;
            if self.policy.compress {
                compress_file(&first, &self.backup_path(1, true))?;
            }
        } else {
            fs::remove_file(&self.base_path).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to discard rotated file: {}", e),
                )
            })?;
        }

        let file = open_append(&self.base_path)?;
        self.file = Some(BufWriter::new(file));
        self.current_size = 0;
        self.last_rotation = SystemTime::now();
        self.critical = false;
        Ok(())
    }

    /// Drop the oldest backup and move `<name>.i` to `<name>.i+1`.
    fn shift_backups(&self) -> Result<()> {
        let max = self.policy.max_backups;
        for compressed in [false, true] {
            let oldest = self.backup_path(max, compressed);
            if oldest.exists() {
                fs::remove_file(&oldest).map_err(|e| {
                    LoggerError::file_rotation(
                        oldest.display().to_string(),
                        format!("Failed to remove oldest backup: {}", e),
                    )
                })?;
            }
        }

        for index in (1..max).rev() {
            for compressed in [false, true] {
                let from = self.backup_path(index, compressed);
                if from.exists() {
                    self.rename(&from, &self.backup_path(index + 1, compressed))?;
                }
            }
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|e| {
            LoggerError::file_rotation(
                from.display().to_string(),
                format!("Failed to rename to '{}': {}", to.display(), e),
            )
        })
    }

    fn recover_after_failed_rotation(&mut self) {
        if self.file.is_none() {
            match open_append(&self.base_path) {
                Ok(file) => self.file = Some(BufWriter::new(file)),
                Err(e) => {
                    eprintln!(
                        "[LOGGER ERROR] Failed to reopen '{}' after rotation failure: {}",
                        self.base_path.display(),
                        e
                    );
                    return;
                }
            }
        }
        // Keep writing into the current file instead of retrying on every record
        self.current_size = 0;
        self.last_rotation = SystemTime::now();
    }

    fn backup_path(&self, index: usize, compressed: bool) -> PathBuf {
        let name = self
            .base_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app.log");
        let suffix = if compressed { ".gz" } else { "" };
        self.base_path
            .with_file_name(format!("{}.{}{}", name, index, suffix))
    }
}

impl Drop for RotatingFile {
    fn drop(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                eprintln!(
                    "[LOGGER ERROR] Failed to flush '{}': {}",
                    self.base_path.display(),
                    e
                );
            }
        }
    }
}

/// Gzip `path` into `gz_path`, removing `path` only once compression succeeded.
fn compress_file(path: &Path, gz_path: &Path) -> Result<()> {
    let temp_path = gz_path.with_extension("gz.tmp");

    let compress = || -> io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let output = BufWriter::with_capacity(64 * 1024, File::create(&temp_path)?);
        let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;
        fs::rename(&temp_path, gz_path)
    };

    if let Err(e) = compress() {
        let _ = fs::remove_file(&temp_path);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress '{}'", path.display()),
            e,
        ));
    }

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compressed '{}' but failed to remove it: {}",
            path.display(),
            e
        );
    }
    Ok(())
}

/// Asynchronous file writer with rotation
///
/// # Examples
///
/// ```no_run
/// use rust_logging_core::writers::{RotatingFileWriter, RotationPolicy, RotationStrategy};
/// use std::time::Duration;
///
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::Time { interval: Duration::from_secs(3600) })
///     .with_max_backups(24)
///     .with_compression(true);
/// let writer = RotatingFileWriter::with_policy("/var/log/app.log", policy).unwrap();
/// ```
pub struct RotatingFileWriter {
    path: PathBuf,
    worker: Worker<Arc<LogRecord>>,
    lifecycle: Lifecycle,
    feedback: Arc<FeedbackSlot>,
}

impl RotatingFileWriter {
    /// Size-based rotation with the default policy.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    pub fn with_policy(path: impl AsRef<Path>, policy: RotationPolicy) -> Result<Self> {
        Self::with_layout(path, policy, TextLayout::default())
    }

    pub fn with_layout(
        path: impl AsRef<Path>,
        policy: RotationPolicy,
        layout: TextLayout,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = RotatingFile::open(path.clone(), policy, layout)?;

        let feedback = Arc::new(FeedbackSlot::new());
        let worker_feedback = Arc::clone(&feedback);
        let worker = Worker::new(
            "logger-rotating-file",
            DEFAULT_WORKER_CAPACITY,
            move |record: Arc<LogRecord>| {
                if let Err(e) = file.append(&record) {
                    worker_feedback.report_failure(&record, e);
                }
            },
        )?;

        let lifecycle = Lifecycle::new();
        lifecycle.open();

        Ok(Self {
            path,
            worker,
            lifecycle,
            feedback,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Writer for RotatingFileWriter {
    fn write(&self, record: &Arc<LogRecord>) {
        if self.lifecycle.is_open() {
            self.worker.enqueue(Arc::clone(record));
        }
    }

    fn close(&self) {
        if self.lifecycle.close() {
            self.worker.close(DEFAULT_CLOSE_TIMEOUT);
        }
    }

    fn set_feedback(&self, feedback: FeedbackSender) {
        self.feedback.set(feedback);
    }

    fn name(&self) -> &str {
        "rotating-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use std::io::Read;
    use std::thread;
    use tempfile::tempdir;

    fn record(level: LogLevel, message: &str) -> LogRecord {
        LogRecord::new(level, message)
    }

    fn open(path: &Path, policy: RotationPolicy) -> RotatingFile {
        RotatingFile::open(path.to_path_buf(), policy, TextLayout::plain()).expect("open")
    }

    fn files_starting_with(dir: &Path, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_policy_builder() {
        let policy = RotationPolicy::new()
            .with_max_size(1024)
            .with_max_backups(3)
            .with_compression(true)
            .keep_only_critical(true);

        assert_eq!(policy.strategy, RotationStrategy::Size { max_bytes: 1024 });
        assert_eq!(policy.max_backups, 3);
        assert!(policy.compress);
        assert!(policy.keep_only_critical);
    }

    #[test]
    fn test_size_rotation_keeps_max_backups() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("multi.log");
        let mut file = open(&path, RotationPolicy::new().with_max_size(50).with_max_backups(2));

        for i in 0..100 {
            file.append(&record(LogLevel::Info, &format!("Entry {}", i)))
                .expect("append");
        }
        drop(file);

        assert_eq!(
            files_starting_with(dir.path(), "multi.log"),
            vec!["multi.log", "multi.log.1", "multi.log.2"]
        );
    }

    #[test]
    fn test_newest_backup_is_first() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("order.log");
        let mut file = open(&path, RotationPolicy::new().with_max_size(1).with_max_backups(3));

        for message in ["a", "b", "c"] {
            file.append(&record(LogLevel::Info, message)).expect("append");
        }
        drop(file);

        assert_eq!(fs::read_to_string(&path).expect("read"), "INFO: c\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("order.log.1")).expect("read"),
            "INFO: b\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("order.log.2")).expect("read"),
            "INFO: a\n"
        );
    }

    #[test]
    fn test_time_rotation() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("time.log");
        let policy = RotationPolicy::new().with_strategy(RotationStrategy::Time {
            interval: Duration::from_millis(50),
        });
        let mut file = open(&path, policy);

        file.append(&record(LogLevel::Info, "before")).expect("append");
        thread::sleep(Duration::from_millis(80));
        file.append(&record(LogLevel::Info, "after")).expect("append");
        drop(file);

        assert!(dir.path().join("time.log.1").exists());
        assert_eq!(fs::read_to_string(&path).expect("read"), "INFO: after\n");
    }

    #[test]
    fn test_never_rotates() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("never.log");
        let mut file = open(&path, RotationPolicy::new().with_strategy(RotationStrategy::Never));

        for i in 0..100 {
            file.append(&record(LogLevel::Info, &format!("Entry {}", i)))
                .expect("append");
        }
        drop(file);

        assert_eq!(files_starting_with(dir.path(), "never.log"), vec!["never.log"]);
    }

    #[test]
    fn test_compressed_backup() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("zip.log");
        let policy = RotationPolicy::new()
            .with_max_size(1)
            .with_max_backups(2)
            .with_compression(true);
        let mut file = open(&path, policy);

        file.append(&record(LogLevel::Warning, "first")).expect("append");
        file.append(&record(LogLevel::Info, "second")).expect("append");
        drop(file);

        let gz = File::open(dir.path().join("zip.log.1.gz")).expect("gz exists");
        let mut content = String::new();
        flate2::read::GzDecoder::new(gz)
            .read_to_string(&mut content)
            .expect("decompress");

        assert_eq!(content, "WARNING: first\n");
        assert!(!dir.path().join("zip.log.1").exists());
    }

    #[test]
    fn test_keep_only_critical_discards_quiet_rotations() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("critical.log");
        let policy = RotationPolicy::new()
            .with_max_size(1)
            .with_max_backups(5)
            .keep_only_critical(true);
        let mut file = open(&path, policy);

        file.append(&record(LogLevel::Info, "quiet")).expect("append");
        file.append(&record(LogLevel::Error, "loud")).expect("append");
        file.append(&record(LogLevel::Info, "tail")).expect("append");
        drop(file);

        assert_eq!(
            files_starting_with(dir.path(), "critical.log"),
            vec!["critical.log", "critical.log.1"]
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("critical.log.1")).expect("read"),
            "ERROR: loud\n"
        );
    }

    #[test]
    fn test_writer_delivers_through_worker() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("async.log");
        let writer = RotatingFileWriter::with_layout(
            &path,
            RotationPolicy::new().with_strategy(RotationStrategy::Never),
            TextLayout::plain(),
        )?;

        for i in 0..10 {
            writer.write(&Arc::new(record(LogLevel::Info, &format!("line {}", i))));
        }
        writer.close();
        writer.write(&Arc::new(record(LogLevel::Info, "ignored")));

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "INFO: line 0");
        assert_eq!(lines[9], "INFO: line 9");
        Ok(())
    }
}
