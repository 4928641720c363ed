//! CSV audit log, one row per corrected cycle.
//!
//! ```text
//! timestamp,percentKept,errorPctDelta,bytesThisWindow,deltaBytes,avgRateMBPerSec
//! 2024-06-01T12:00:00.000Z,0.5000,0.2716,400000000,400000000,1.2716
//! ```
//!
//! `percentKept` is the fraction in effect while the window's growth was
//! observed, i.e. before this cycle's correction. The file is truncated
//! when opened.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use ratekeeper_control::AuditLog;
use ratekeeper_core::CycleReport;

pub const HEADER: &str =
    "timestamp,percentKept,errorPctDelta,bytesThisWindow,deltaBytes,avgRateMBPerSec";

pub struct CsvAuditLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl CsvAuditLog {
    /// Create (or truncate) the log file and write the header.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{HEADER}")?;
        writer.flush()?;
        debug!(?path, "audit log opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Render one audit row (without the trailing newline).
pub fn format_row(report: &CycleReport) -> String {
    let timestamp = DateTime::<Utc>::from_timestamp_millis(report.epoch_ms as i64)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default();
    format!(
        "{timestamp},{:.4},{:.4},{},{},{:.4}",
        report.previous_fraction,
        report.error,
        report.raw_delta_bytes,
        report.smoothed_delta_bytes,
        report.average_rate_mb_per_sec,
    )
}

impl AuditLog for CsvAuditLog {
    fn record(&self, report: &CycleReport) {
        let row = format_row(report);
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(writer, "{row}").and_then(|_| writer.flush()) {
            warn!(path = ?self.path, error = %e, "failed to write audit row");
        }
    }
}
