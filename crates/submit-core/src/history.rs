//! Submission history log.
//!
//! One tab-separated line per submission, appended without locking;
//! concurrent invocations may interleave lines.

use camino::Utf8Path;
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;

/// One line of the history log.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub job_id: String,
    pub user: String,
    pub script_name: String,
    pub working_dir: String,
    /// Backend invocation as it was run, shell quoted.
    pub command_line: String,
}

impl HistoryEntry {
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\n",
            self.timestamp.format("%Y-%m-%d\t%H:%M:%S%.6f"),
            self.job_id,
            self.user,
            self.script_name,
            self.working_dir,
            self.command_line
        )
    }
}

/// Append `entry` to the log at `path`, creating the file if needed.
///
/// The line is written with a single `write_all` on an append-mode handle.
pub fn append_entry(path: &Utf8Path, entry: &HistoryEntry) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(entry.to_line().as_bytes())
}
