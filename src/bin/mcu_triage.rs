use std::path::{Path, PathBuf};
use clap::Parser;
use dlt_triage::{mcu, window};

#[derive(Parser, Debug)]
#[command(
    name = "mcu-triage",
    about = "MCU running-log error extractor",
    long_about = "Scans MCU running logs for files whose car clock touches the incident window and collects their ErrorManager entries into a flat output file.",
    after_long_help = "Examples:\n  mcu-triage '2024/04/15 - 15:31:03'\n  mcu-triage --root /data/bundle --output-file errors.log '2024/04/15 - 15:31:03'"
)]
struct Args {
    /// Incident timestamp, format 'YYYY/MM/DD - HH:MM:SS'
    #[arg(value_name = "INCIDENT_TIME")]
    incident: String,
    /// Bundle root holding log/MCUlog/running
    #[arg(long, default_value = ".")]
    root: String,
    #[arg(long, default_value = "error_messages.log")]
    output_file: String,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let incident = match window::parse_incident(&args.incident) {
        Some(t) => t,
        None => {
            eprintln!("Invalid incident time '{}'; expected 'YYYY/MM/DD - HH:MM:SS'", args.incident);
            std::process::exit(2);
        }
    };
    let root = PathBuf::from(&args.root).join(mcu::MCU_LOG_SUBDIR);
    let scan = mcu::collect_errors(&root, incident);
    if scan.entries.is_empty() {
        if !args.quiet {
            println!("No ErrorManager entries inside the incident window ({} files scanned).", scan.files_scanned);
        }
        return;
    }
    match mcu::write_entries(&scan.entries, Path::new(&args.output_file)) {
        Ok(()) => {
            if !args.quiet {
                println!("Error log written: {} ({} entries from {} in-window files)", args.output_file, scan.entries.len(), scan.files_in_window);
            }
        }
        Err(e) => {
            log::error!("Failed to write {}: {}", args.output_file, e);
            std::process::exit(1);
        }
    }
}
