//! Append-only CSV cycle log (§4.8).
//!
//! Write failures are logged as warnings and never propagate — a full disk
//! or an unwritable log directory must not stop the control loop.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{Local, TimeZone};
use tracing::warn;

use crate::cycle::CompletedCycle;

const HEADER: &str = "start_iso,end_iso,duration_s,mean_current_a,reason\n";

/// Append-only CSV writer. Writes the header once, when the file does not
/// yet exist.
pub struct CycleLog {
    path: PathBuf,
}

impl CycleLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure the log file (and its parent directory) exist, writing the
    /// header exactly once.
    pub fn ensure_initialized(&self) {
        if self.path.exists() {
            return;
        }
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("failed to create cycle log directory {}: {e}", parent.display());
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, HEADER) {
            warn!("failed to create cycle log {}: {e}", self.path.display());
        }
    }

    /// Append one completed cycle as a CSV row.
    pub fn append(&self, cycle: &CompletedCycle) {
        let start_iso = local_iso8601(cycle.start_wall_s);
        let end_iso = local_iso8601(cycle.end_wall_s);
        let duration_s = cycle.end_wall_s - cycle.start_wall_s;
        let line = format!(
            "{start_iso},{end_iso},{duration_s:.3},{mean:.3},{reason}\n",
            mean = cycle.mean_current_a,
            reason = cycle.reason.as_str(),
        );

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));

        if let Err(e) = result {
            warn!("failed to append cycle log row to {}: {e}", self.path.display());
        }
    }
}

/// Format a Unix timestamp (seconds) as a local-time, second-precision
/// ISO-8601 string (§4.8).
fn local_iso8601(wall_seconds: f64) -> String {
    let secs = wall_seconds.floor() as i64;
    let dt = Local
        .timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(|| Local.timestamp_opt(0, 0).single().unwrap());
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleEndReason;
    use tempfile::tempdir;

    #[test]
    fn header_written_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cycles.csv");
        let log = CycleLog::new(&path);
        log.ensure_initialized();
        log.ensure_initialized();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("start_iso").count(), 1);
    }

    #[test]
    fn append_produces_one_row_with_expected_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cycles.csv");
        let log = CycleLog::new(&path);
        log.ensure_initialized();
        log.append(&CompletedCycle {
            start_wall_s: 1_700_000_000.0,
            end_wall_s: 1_700_000_003.5,
            mean_current_a: 4.321,
            reason: CycleEndReason::Complete,
        });
        let text = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ends_with(",4.321,complete"));
        assert!(rows[0].contains("3.500"));
    }

    #[test]
    fn rows_append_in_start_time_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cycles.csv");
        let log = CycleLog::new(&path);
        log.ensure_initialized();
        for i in 0..3 {
            log.append(&CompletedCycle {
                start_wall_s: 1_700_000_000.0 + i as f64,
                end_wall_s: 1_700_000_001.0 + i as f64,
                mean_current_a: 0.0,
                reason: CycleEndReason::Complete,
            });
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let starts: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn local_iso8601_has_expected_shape() {
        let s = local_iso8601(1_700_000_000.0);
        assert_eq!(s.len(), 19);
        assert_eq!(s.as_bytes()[4], b'-');
        assert_eq!(s.as_bytes()[7], b'-');
        assert_eq!(s.as_bytes()[10], b'T');
        assert_eq!(s.as_bytes()[13], b':');
        assert_eq!(s.as_bytes()[16], b':');
    }

    #[test]
    fn local_iso8601_is_monotonic_with_wall_time() {
        let earlier = local_iso8601(1_700_000_000.0);
        let later = local_iso8601(1_700_000_060.0);
        assert!(later > earlier);
    }
}
