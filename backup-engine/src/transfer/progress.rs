//! Per-job progress accounting.
//!
//! Progress is an integer percentage of processed bytes over the job's total
//! and never moves backwards within one execution.

use std::time::{Duration, Instant};

/// Running totals of one job execution
#[derive(Debug, Clone)]
pub struct JobProgress {
    /// Number of files found under the source
    pub total_files: u64,

    /// Sum of their sizes
    pub total_bytes: u64,

    /// Files handled so far (copied or skipped as unchanged)
    pub files_processed: u64,

    /// Bytes handled so far
    pub bytes_processed: u64,

    percent: u8,
    start_time: Instant,
}

impl JobProgress {
    pub fn new(total_files: u64, total_bytes: u64) -> Self {
        Self {
            total_files,
            total_bytes,
            files_processed: 0,
            bytes_processed: 0,
            percent: 0,
            start_time: Instant::now(),
        }
    }

    /// Account one finished file of `bytes` and return the new percentage.
    pub fn advance(&mut self, bytes: u64) -> u8 {
        self.files_processed += 1;
        self.bytes_processed += bytes;
        self.percent = self.percent.max(percent_of(
            self.files_processed,
            self.total_files,
            self.bytes_processed,
            self.total_bytes,
        ));
        self.percent
    }

    /// Pin the percentage to 100 once every file is through.
    pub fn finish(&mut self) -> u8 {
        self.percent = 100;
        self.percent
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// `bytes*100/total_bytes`, falling back to the file ratio when the tree
/// holds only empty files. An empty tree counts as done.
fn percent_of(files: u64, total_files: u64, bytes: u64, total_bytes: u64) -> u8 {
    let ratio = if total_bytes > 0 {
        bytes.saturating_mul(100) / total_bytes
    } else if total_files > 0 {
        files.saturating_mul(100) / total_files
    } else {
        100
    };
    ratio.min(100) as u8
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds < 60 {
        format!("{}.{:01}s", seconds, duration.subsec_millis() / 100)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_follows_bytes() {
        let mut progress = JobProgress::new(2, 30);
        assert_eq!(progress.advance(10), 33);
        assert_eq!(progress.advance(20), 100);
        assert_eq!(progress.files_processed, 2);
        assert_eq!(progress.bytes_processed, 30);
    }

    #[test]
    fn test_percent_never_decreases() {
        // A file that shrank after the walk cannot pull the percentage back
        let mut progress = JobProgress::new(3, 100);
        assert_eq!(progress.advance(60), 60);
        progress.total_bytes = 1000;
        assert_eq!(progress.advance(0), 60);
    }

    #[test]
    fn test_empty_files_and_empty_tree() {
        let mut progress = JobProgress::new(4, 0);
        assert_eq!(progress.advance(0), 25);
        assert_eq!(progress.finish(), 100);

        let mut nothing = JobProgress::new(0, 0);
        assert_eq!(nothing.finish(), 100);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 1m");
    }
}
