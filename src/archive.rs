use std::fs::File;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use walkdir::WalkDir;
use crate::stamp;

pub const ARCHIVE_EXT: &str = ".tar";

#[derive(Clone, Debug)]
pub struct ArchiveCandidate {
    pub path: PathBuf,
    pub stamp: NaiveDateTime,
}

/// Picks the archive whose embedded stamp is closest to the incident without
/// preceding it. Error bundles are written after the triggering event, so a
/// pre-incident archive cannot contain it. Ties keep the first candidate in
/// traversal order, which is filesystem-dependent.
pub fn select_archive(history: &Path, incident: NaiveDateTime) -> Option<ArchiveCandidate> {
    let mut best: Option<(Duration, ArchiveCandidate)> = None;
    for de in WalkDir::new(history).follow_links(false).into_iter().filter_map(Result::ok) {
        let p = de.path();
        if !p.is_file() { continue; }
        let name = match p.file_name().and_then(|n| n.to_str()) { Some(n) => n, None => continue };
        if !name.ends_with(ARCHIVE_EXT) { continue; }
        let stem = &name[..name.len() - ARCHIVE_EXT.len()];
        let stamp = match stamp::archive_stamp(stem) {
            Some(t) => t,
            None => { log::warn!("Unrecognized archive name, skipping: {}", name); continue }
        };
        let diff = stamp - incident;
        if diff < Duration::zero() { continue; }
        if best.as_ref().map(|(d, _)| diff < *d).unwrap_or(true) {
            best = Some((diff, ArchiveCandidate { path: p.to_path_buf(), stamp }));
        }
    }
    best.map(|(_, c)| c)
}

/// Unpacks the archive into the sibling directory named by stripping the
/// `.tar` extension. Pre-existing extracted content is not cleared; entries
/// overwrite with the unpacker's semantics. A corrupt or unreadable archive
/// is fatal for the run.
pub fn extract_archive(path: &Path) -> Result<PathBuf> {
    let dest = extraction_root(path);
    std::fs::create_dir_all(&dest).with_context(|| format!("create extraction dir {}", dest.display()))?;
    let f = File::open(path).with_context(|| format!("open archive {}", path.display()))?;
    let mut ar = tar::Archive::new(f);
    ar.unpack(&dest).with_context(|| format!("unpack archive {}", path.display()))?;
    log::info!("Extracted {} -> {}", path.display(), dest.display());
    Ok(dest)
}

pub fn extraction_root(path: &Path) -> PathBuf {
    path.with_extension("")
}
