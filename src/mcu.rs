use std::io::Write;
use std::path::Path;
use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use walkdir::WalkDir;
use crate::window;

pub const MCU_LOG_SUBDIR: &str = "log/MCUlog/running";

const CAR_TIME_PATTERN: &str = r"g_nCarTime\s+=\s+(\d+)";
const ERROR_MANAGER_PATTERN: &str = r"ErrorManager\s+:\s+(.*)";

#[derive(Clone, Debug, Default)]
pub struct McuScan {
    pub files_scanned: usize,
    pub files_in_window: usize,
    pub entries: Vec<String>,
}

/// Collects ErrorManager entries from MCU running logs. Two explicit phases
/// per file: first the car-clock markers decide whether THAT file touches the
/// incident window, then entries are collected only from member files. The
/// car clock is epoch milliseconds, read as naive UTC.
pub fn collect_errors(root: &Path, incident: NaiveDateTime) -> McuScan {
    let car_time_re = Regex::new(CAR_TIME_PATTERN).unwrap();
    let error_re = Regex::new(ERROR_MANAGER_PATTERN).unwrap();
    let mut out = McuScan::default();
    for de in WalkDir::new(root).follow_links(false).into_iter().filter_map(Result::ok) {
        let p = de.path();
        if !p.is_file() { continue; }
        if p.extension().and_then(|e| e.to_str()) != Some("log") { continue; }
        out.files_scanned += 1;
        let data = match std::fs::read_to_string(p) {
            Ok(d) => d,
            Err(e) => { log::warn!("Failed to read {}: {}", p.display(), e); continue }
        };
        let member = data.lines().any(|l| {
            car_time_re
                .captures(l)
                .and_then(|c| c[1].parse::<i64>().ok())
                .and_then(car_clock_to_time)
                .map(|t| window::in_window(t, incident))
                .unwrap_or(false)
        });
        if !member { continue; }
        out.files_in_window += 1;
        for l in data.lines() {
            if let Some(c) = error_re.captures(l) {
                out.entries.push(c[1].trim_end().to_string());
            }
        }
    }
    out
}

fn car_clock_to_time(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

pub fn write_entries(entries: &[String], path: &Path) -> std::io::Result<()> {
    let mut f = std::fs::File::create(path)?;
    for e in entries {
        writeln!(f, "{}", e)?;
    }
    Ok(())
}
