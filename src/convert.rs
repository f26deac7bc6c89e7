use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use anyhow::{Context, Result};
use walkdir::WalkDir;
use crate::decoder::DltReader;

pub const TRACE_EXT: &str = ".dlt";
pub const TEXT_EXT: &str = "txt";

/// Converts every trace file under `root` whose name carries the subsystem
/// tag into a sibling text file. Returns whether at least one candidate was
/// found; this is a presence signal, a decode failure on one file is logged
/// and does not abort the batch.
pub fn convert_traces(root: &Path, tag: &str) -> bool {
    let mut found = false;
    for de in WalkDir::new(root).follow_links(false).into_iter().filter_map(Result::ok) {
        let p = de.path();
        if !p.is_file() { continue; }
        let name = match p.file_name().and_then(|n| n.to_str()) { Some(n) => n, None => continue };
        if !name.ends_with(TRACE_EXT) || !name.contains(tag) { continue; }
        found = true;
        let out = p.with_extension(TEXT_EXT);
        if out.exists() {
            log::debug!("Already converted, skipping: {}", p.display());
            continue;
        }
        match convert_one(p, &out) {
            Ok(n) => log::info!("Converted {} ({} records) -> {}", p.display(), n, out.display()),
            Err(e) => log::warn!("Conversion failed for {}: {:#}", p.display(), e),
        }
    }
    found
}

// Records stream to the output as they decode, so a malformed tail record
// leaves the valid prefix on disk.
fn convert_one(src: &Path, dst: &Path) -> Result<usize> {
    let reader = DltReader::open(src).with_context(|| format!("open trace {}", src.display()))?;
    let f = File::create(dst).with_context(|| format!("create {}", dst.display()))?;
    let mut w = BufWriter::new(f);
    let mut n = 0usize;
    for rec in reader {
        match rec {
            Ok(r) => {
                writeln!(w, "{}", r.to_line()).with_context(|| format!("write {}", dst.display()))?;
                n += 1;
            }
            Err(e) => {
                w.flush().ok();
                return Err(e).with_context(|| format!("decode {} (kept {} records)", src.display(), n));
            }
        }
    }
    w.flush().with_context(|| format!("flush {}", dst.display()))?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::encode_record;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 15).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn converts_tagged_traces_to_sibling_txt() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("deep");
        std::fs::create_dir_all(&sub).unwrap();
        let mut bytes = encode_record(at(15, 31, 0), "ECU1", "PARK", "CTX1", 4, "system nominal");
        bytes.extend(encode_record(at(15, 31, 1), "ECU1", "PARK", "CTX1", 2, "sensor error detected"));
        std::fs::write(sub.join("HU_PARK_log.dlt"), &bytes).unwrap();
        std::fs::write(sub.join("HU_OTHER_log.dlt"), &bytes).unwrap();

        assert!(convert_traces(dir.path(), "PARK"));
        let text = std::fs::read_to_string(sub.join("HU_PARK_log.txt")).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("system nominal"));
        assert!(text.contains("sensor error detected"));
        assert!(!sub.join("HU_OTHER_log.txt").exists());
    }

    #[test]
    fn reports_absence_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("HU_OTHER_log.dlt"), b"irrelevant").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"irrelevant").unwrap();
        assert!(!convert_traces(dir.path(), "PARK"));
    }

    #[test]
    fn skips_files_already_converted() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = encode_record(at(15, 31, 0), "ECU1", "PARK", "CTX1", 4, "fresh");
        std::fs::write(dir.path().join("HU_PARK_log.dlt"), &bytes).unwrap();
        std::fs::write(dir.path().join("HU_PARK_log.txt"), "stale contents\n").unwrap();
        assert!(convert_traces(dir.path(), "PARK"));
        let text = std::fs::read_to_string(dir.path().join("HU_PARK_log.txt")).unwrap();
        assert_eq!(text, "stale contents\n");
    }

    #[test]
    fn malformed_trace_keeps_valid_prefix_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut broken = encode_record(at(15, 31, 0), "ECU1", "PARK", "CTX1", 4, "kept line");
        broken.extend_from_slice(b"garbage instead of a record");
        std::fs::write(dir.path().join("A_PARK_bad.dlt"), &broken).unwrap();
        let good = encode_record(at(15, 31, 5), "ECU1", "PARK", "CTX1", 4, "good line");
        std::fs::write(dir.path().join("B_PARK_good.dlt"), &good).unwrap();

        assert!(convert_traces(dir.path(), "PARK"));
        let bad_text = std::fs::read_to_string(dir.path().join("A_PARK_bad.txt")).unwrap();
        assert!(bad_text.contains("kept line"));
        let good_text = std::fs::read_to_string(dir.path().join("B_PARK_good.txt")).unwrap();
        assert!(good_text.contains("good line"));
    }
}
