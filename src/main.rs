use std::path::PathBuf;
use std::sync::OnceLock;
use anyhow::Result;
use clap::{ArgAction, ColorChoice, CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use comfy_table::{ContentArrangement, Table};
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};

use dlt_triage::pipeline::{self, Outcome, RunConfig, RunReport};
use dlt_triage::window;

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum OutputFmt { Text, Json }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Parser, Debug)]
#[command(
    name = "dlt-triage",
    about = "Vehicle log incident correlator",
    long_about = "Correlates an operator-supplied incident time against a vehicle log bundle: converts live DLT traces, falls back to the nearest post-incident history archive, revives the in-window slice, and collects failure lines into a report.",
    after_long_help = "Examples:\n  dlt-triage '2024/04/15 - 15:31:03'\n  dlt-triage --root /data/bundle --report failure.txt '2024/04/15 - 15:31:03'\n  dlt-triage --output json --csv-path hits.csv '2024/04/15 - 15:31:03'",
    color = ColorChoice::Auto
)]
struct Args {
    /// Incident timestamp, format 'YYYY/MM/DD - HH:MM:SS'
    #[arg(value_name = "INCIDENT_TIME")]
    incident: Option<String>,
    /// Bundle root holding log/redirected and log/history
    #[arg(long, default_value = ".")]
    root: String,
    #[arg(long, default_value = "failure.txt")]
    report: String,
    /// Subsystem tag trace files must carry
    #[arg(long, default_value = "PARK")]
    tag: String,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long)]
    config: Option<String>,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
}

#[derive(Deserialize)]
struct AppConfig {
    root: Option<String>,
    report: Option<String>,
    tag: Option<String>,
    output: Option<OutputFmt>,
    json_path: Option<String>,
    csv_path: Option<String>,
    progress: Option<bool>,
    force_color: Option<bool>,
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        clap_complete::generate(sh, &mut cmd, "dlt-triage", &mut std::io::stdout());
        return;
    }
    if let Some(p) = args.config.as_ref()
        && let Ok(s) = std::fs::read_to_string(p)
        && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    else {
        let def = "DltTriage.toml";
        if let Ok(s) = std::fs::read_to_string(def)
            && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    }
    {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if args.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if let Some(lvl) = args.log_level {
            let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
            builder.filter_level(f);
        } else if args.verbose > 0 {
            let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
            builder.filter_level(f);
        }
        builder.init();
    }
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);

    let incident_str = match args.incident.as_ref() {
        Some(s) => s.clone(),
        None => {
            eprintln!("Usage: dlt-triage '<YYYY/MM/DD - HH:MM:SS>'");
            eprintln!("Example: dlt-triage '2024/04/15 - 15:31:03'");
            std::process::exit(2);
        }
    };
    let incident = match window::parse_incident(&incident_str) {
        Some(t) => t,
        None => {
            eprintln!("Invalid incident time '{}'; expected 'YYYY/MM/DD - HH:MM:SS'", incident_str);
            std::process::exit(2);
        }
    };

    let cfg = RunConfig {
        root: PathBuf::from(&args.root),
        report: PathBuf::from(&args.report),
        tag: args.tag.clone(),
        progress: args.progress,
    };
    let report = match pipeline::run(&cfg, incident) {
        Ok(r) => r,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("{}", paint(&format!("Run failed: {:#}", e), "1;31"));
            std::process::exit(1);
        }
    };

    match args.output {
        OutputFmt::Text => { if !args.quiet { print_text(&report, &cfg); } }
        OutputFmt::Json => {
            if !args.quiet { println!("{}", serde_json::to_string_pretty(&report).unwrap()); }
        }
    }
    if let Some(p) = args.json_path.as_ref() {
        match std::fs::write(p, serde_json::to_vec_pretty(&report).unwrap()) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("JSON written: {}", p), "1;36")); } }
            Err(e) => log::error!("JSON write failed for {}: {}", p, e),
        }
    }
    if let Some(p) = args.csv_path.as_ref() {
        if let Err(e) = write_csv(p, &report) { log::error!("CSV write failed for {}: {}", p, e); } else if !args.quiet { println!("{}", paint(&format!("CSV written: {}", p), "1;36")); }
    }
}

fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.root == "." && let Some(v) = cfg.root { args.root = v; }
    if args.report == "failure.txt" && let Some(v) = cfg.report { args.report = v; }
    if args.tag == "PARK" && let Some(v) = cfg.tag { args.tag = v; }
    if let Some(v) = cfg.output { args.output = v; }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if args.csv_path.is_none() && let Some(v) = cfg.csv_path { args.csv_path = Some(v); }
    if let Some(v) = cfg.progress { args.progress = v; }
    if let Some(v) = cfg.force_color { args.force_color = v; }
}

fn print_text(rep: &RunReport, cfg: &RunConfig) {
    match &rep.outcome {
        Outcome::LiveMatch => println!("{}", paint("Live traces covered the incident window", "1;32")),
        Outcome::HistoryMatch { archive } => println!("{}", paint(&format!("Correlated from history archive {}", archive.display()), "1;32")),
        Outcome::NoArchive => println!("{}", paint("No history archive at or after the incident time", "1;33")),
        Outcome::NothingInWindow => println!("{}", paint("Archive extracted but nothing inside the incident window", "1;33")),
    }
    if let Some(scan) = rep.scan.as_ref() {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Text files scanned", "Failure lines in window", "Report"]);
        table.add_row(vec![scan.files_scanned.to_string(), scan.lines_matched.to_string(), cfg.report.display().to_string()]);
        println!("{table}");
        if scan.lines_matched == 0 { println!("No failure lines inside the incident window."); }
    }
}

fn write_csv(path: &str, rep: &RunReport) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["time", "file", "line"])?;
    if let Some(scan) = rep.scan.as_ref() {
        for h in &scan.hits {
            wtr.write_record([h.time.format("%Y/%m/%d %H:%M:%S%.6f").to_string(), h.path.clone(), h.line.clone()])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&true) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}
