use std::path::PathBuf;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use crate::scan::ScanSummary;
use crate::{archive, convert, revive, scan};

pub const REDIRECTED_SUBDIR: &str = "log/redirected";
pub const HISTORY_SUBDIR: &str = "log/history";

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub root: PathBuf,
    pub report: PathBuf,
    pub tag: String,
    pub progress: bool,
}

impl RunConfig {
    pub fn redirected_dir(&self) -> PathBuf { self.root.join(REDIRECTED_SUBDIR) }
    pub fn history_dir(&self) -> PathBuf { self.root.join(HISTORY_SUBDIR) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Live traces covered the window; history was never touched.
    LiveMatch,
    /// Correlated from an extracted history archive.
    HistoryMatch { archive: PathBuf },
    /// No archive stamped at or after the incident.
    NoArchive,
    /// An archive was extracted but held no trace inside the window.
    NothingInWindow,
}

/// The fallback cascade as an explicit machine: prefer already-available live
/// data; only pay for extraction and decompression when live data is absent,
/// and only decompress the in-window slice of the chosen archive.
#[derive(Clone, Debug)]
pub enum Stage {
    CheckLive,
    ExtractHistory,
    Reviving { root: PathBuf, archive: PathBuf },
    ConvertExtracted { root: PathBuf, archive: PathBuf },
    ScanFailures { root: PathBuf, archive: Option<PathBuf> },
    Done(Outcome),
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub outcome: Outcome,
    pub scan: Option<ScanSummary>,
}

pub fn run(cfg: &RunConfig, incident: NaiveDateTime) -> Result<RunReport> {
    let mut scanned: Option<ScanSummary> = None;
    let mut stage = Stage::CheckLive;
    loop {
        match step(stage, cfg, incident, &mut scanned)? {
            Stage::Done(outcome) => return Ok(RunReport { outcome, scan: scanned }),
            next => stage = next,
        }
    }
}

fn step(stage: Stage, cfg: &RunConfig, incident: NaiveDateTime, scanned: &mut Option<ScanSummary>) -> Result<Stage> {
    Ok(match stage {
        Stage::CheckLive => {
            let live = cfg.redirected_dir();
            if convert::convert_traces(&live, &cfg.tag) {
                Stage::ScanFailures { root: live, archive: None }
            } else {
                log::info!("No live {} traces under {}", cfg.tag, live.display());
                Stage::ExtractHistory
            }
        }
        Stage::ExtractHistory => {
            let history = cfg.history_dir();
            let pb = if cfg.progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
            if let Some(ref pb) = pb { pb.set_message(format!("Selecting archive in {}", history.display())); }
            let chosen = archive::select_archive(&history, incident);
            let next = match chosen {
                None => {
                    log::info!("No history archive at or after the incident under {}", history.display());
                    Stage::Done(Outcome::NoArchive)
                }
                Some(cand) => {
                    if let Some(ref pb) = pb { pb.set_message(format!("Extracting {}", cand.path.display())); }
                    let root = archive::extract_archive(&cand.path)
                        .with_context(|| format!("history archive {}", cand.path.display()))?;
                    Stage::Reviving { root, archive: cand.path }
                }
            };
            if let Some(pb) = pb { pb.finish_and_clear(); }
            next
        }
        Stage::Reviving { root, archive } => {
            if revive::revive_stale(&root, incident, &cfg.tag) {
                Stage::ConvertExtracted { root, archive }
            } else {
                Stage::Done(Outcome::NothingInWindow)
            }
        }
        Stage::ConvertExtracted { root, archive } => {
            convert::convert_traces(&root, &cfg.tag);
            Stage::ScanFailures { root, archive: Some(archive) }
        }
        Stage::ScanFailures { root, archive } => {
            let summary = scan::scan_failures(&root, incident, &cfg.report)?;
            *scanned = Some(summary);
            Stage::Done(match archive {
                Some(a) => Outcome::HistoryMatch { archive: a },
                None => Outcome::LiveMatch,
            })
        }
        done @ Stage::Done(_) => done,
    })
}
