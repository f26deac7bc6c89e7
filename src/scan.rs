use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use walkdir::WalkDir;
use crate::{stamp, window};

/// Case-sensitive substrings that mark a candidate line.
pub const FAILURE_MARKERS: [&str; 2] = ["failure", "error"];

#[derive(Clone, Debug, Serialize)]
pub struct FailureHit {
    pub time: NaiveDateTime,
    pub path: String,
    pub line: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ScanSummary {
    pub files_scanned: usize,
    pub lines_matched: usize,
    pub hits: Vec<FailureHit>,
}

/// Scans every converted text file under `root` and appends marker lines
/// inside the incident window verbatim to the report. The report is created
/// fresh at the top of each invocation. A line whose timestamp does not parse
/// is logged and skipped, the same per-item leniency as every other parser
/// here.
pub fn scan_failures(root: &Path, incident: NaiveDateTime, report: &Path) -> Result<ScanSummary> {
    let mut out = File::create(report).with_context(|| format!("create report {}", report.display()))?;
    let mut summary = ScanSummary::default();
    for de in WalkDir::new(root).follow_links(false).into_iter().filter_map(Result::ok) {
        let p = de.path();
        if !p.is_file() { continue; }
        if p.extension().and_then(|e| e.to_str()) != Some("txt") { continue; }
        if p == report { continue; } // never scan the report being written
        summary.files_scanned += 1;
        let f = match File::open(p) { Ok(f) => f, Err(e) => { log::warn!("Failed to open {}: {}", p.display(), e); continue } };
        let mut br = BufReader::new(f);
        let mut line = String::new();
        loop {
            line.clear();
            let read = br.read_line(&mut line).unwrap_or(0);
            if read == 0 { break; }
            if !FAILURE_MARKERS.iter().any(|m| line.contains(m)) { continue; }
            let t = match stamp::line_stamp(&line) {
                Some(t) => t,
                None => { log::warn!("Unparseable line timestamp in {}: {}", p.display(), line.trim_end()); continue }
            };
            if !window::in_window(t, incident) { continue; }
            out.write_all(line.as_bytes()).with_context(|| format!("write report {}", report.display()))?;
            if !line.ends_with('\n') { out.write_all(b"\n").with_context(|| format!("write report {}", report.display()))?; }
            summary.lines_matched += 1;
            summary.hits.push(FailureHit { time: t, path: p.display().to_string(), line: line.trim_end().to_string() });
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn incident() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 15).unwrap().and_hms_opt(15, 31, 0).unwrap()
    }

    #[test]
    fn only_in_window_marker_lines_reach_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let log = "2024/04/15 15:25:00.000000 ECU1 PARK CTX1 log error error: X\n\
                   2024/04/15 15:29:00.000000 ECU1 PARK CTX1 log error error: Y\n\
                   2024/04/15 15:41:00.000000 ECU1 PARK CTX1 log error failure: Z\n\
                   2024/04/15 15:30:00.000000 ECU1 PARK CTX1 log info all healthy\n";
        std::fs::write(dir.path().join("HU_PARK_log.txt"), log).unwrap();
        let report = dir.path().join("failure.txt");
        let summary = scan_failures(dir.path(), incident(), &report).unwrap();
        assert_eq!(summary.files_scanned, 1);
        assert_eq!(summary.lines_matched, 1);
        let body = std::fs::read_to_string(&report).unwrap();
        assert_eq!(body.lines().count(), 1);
        assert!(body.contains("error: Y"));
    }

    #[test]
    fn report_is_truncated_per_invocation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "2024/04/15 15:30:00.000000 x error: A\n").unwrap();
        let report = dir.path().join("report").join("failure.txt");
        std::fs::create_dir_all(report.parent().unwrap()).unwrap();
        scan_failures(dir.path(), incident(), &report).unwrap();
        let first = std::fs::read_to_string(&report).unwrap();
        scan_failures(dir.path(), incident(), &report).unwrap();
        let second = std::fs::read_to_string(&report).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.lines().count(), 1);
    }

    #[test]
    fn malformed_timestamp_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = "not a timestamp but an error anyway\n\
                   2024/04/15 15:30:00.000000 ECU1 PARK CTX1 log error error: kept\n";
        std::fs::write(dir.path().join("b.txt"), log).unwrap();
        let report = dir.path().join("out.log");
        let summary = scan_failures(dir.path(), incident(), &report).unwrap();
        assert_eq!(summary.lines_matched, 1);
        assert!(std::fs::read_to_string(&report).unwrap().contains("error: kept"));
    }

    #[test]
    fn non_txt_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.dlt"), "2024/04/15 15:30:00.000000 error: binary\n").unwrap();
        let report = dir.path().join("out.log");
        let summary = scan_failures(dir.path(), incident(), &report).unwrap();
        assert_eq!(summary.files_scanned, 0);
        assert_eq!(summary.lines_matched, 0);
        assert_eq!(std::fs::read_to_string(&report).unwrap(), "");
    }
}
