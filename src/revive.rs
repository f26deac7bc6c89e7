use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use walkdir::WalkDir;
use crate::{stamp, window};

/// Suffix appended when a trace is finalized and compressed during rotation.
pub const STALE_SUFFIX: &str = ".finish.gz";

/// Restores in-window trace files inside an extracted archive to decodable
/// form: gzip decompression plus stripping the rotation suffix. Files outside
/// the window are skipped before any decompression, which bounds the work to
/// the relevant slice of the archive. Returns whether any in-window candidate
/// was seen.
pub fn revive_stale(root: &Path, incident: NaiveDateTime, tag: &str) -> bool {
    let mut found = false;
    for de in WalkDir::new(root).follow_links(false).into_iter().filter_map(Result::ok) {
        let p = de.path();
        if !p.is_file() { continue; }
        let name = match p.file_name().and_then(|n| n.to_str()) { Some(n) => n, None => continue };
        if !name.contains(tag) || !name.contains(".dlt") || name.contains(".txt") { continue; }
        let t = match stamp::trace_stamp(name) {
            Some(t) => t,
            None => { log::warn!("Unrecognized trace stamp, skipping: {}", name); continue }
        };
        if !window::in_window(t, incident) { continue; }
        found = true;
        if !name.ends_with(STALE_SUFFIX) {
            log::debug!("Already decodable: {}", p.display());
            continue;
        }
        let dst = p.with_file_name(&name[..name.len() - STALE_SUFFIX.len()]);
        if dst.exists() {
            log::debug!("Already revived, skipping: {}", dst.display());
            continue;
        }
        match inflate(p, &dst) {
            Ok(bytes) => log::info!("Revived {} ({} bytes) -> {}", p.display(), bytes, dst.display()),
            Err(e) => {
                log::warn!("Revive failed for {}: {}", p.display(), e);
                let _ = std::fs::remove_file(&dst);
            }
        }
    }
    found
}

fn inflate(src: &Path, dst: &Path) -> std::io::Result<u64> {
    let f = File::open(src)?;
    let mut gz = GzDecoder::new(BufReader::new(f));
    let mut out = File::create(dst)?;
    std::io::copy(&mut gz, &mut out)
}
