//! CLI interface for muster.
//!
//! Every subcommand is non-interactive: arguments in, plain text out.
//! Diagnostics go to stderr through `tracing`; stdout carries results.
//!
//! Commands split into three groups:
//!
//! - `submit`, `ingest`, `process`, `discard`, `requeue`: the intake lifecycle.
//! - `status`, `show`, `observers`: inspection.
//! - `schedule`, `event`, `prefill`: event setup.

mod format;
mod schedule;

use std::fs;
use std::io::{self, Read};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::config::Config;
use crate::context::{EventContext, load_roster};
use crate::inbox;
use crate::intake::Intake;
use crate::model::{Alliance, Area, ReportKind, Station};
use crate::parse::{ParsedReport, parse};
use crate::sheet::JsonlSheet;
use crate::storage::Storage;

use format::{format_outcome, format_report, format_row};
use schedule::{ScheduleCommand, cmd_schedule};

/// Muster: scouting report intake.
#[derive(Debug, Parser)]
#[command(name = "muster", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Config file (defaults to `~/.muster/config.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: one match
  1. muster ingest ./uploads          → stores every report as pending
  2. muster process --all             → parses, reconciles, writes rows
  3. muster status --area failed      → see what needs attention
  4. muster requeue <name>            → retry once the missing data exists

Event setup:
  muster event switch 2025orore       → archives the old event's reports
  muster prefill 1 40                 → writes match numbers into the sheet
  muster schedule add avery --range 0,1,10";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store one report as pending. Use `-` to read it from stdin.
    Submit {
        /// Report file, or `-` for stdin.
        file: PathBuf,

        /// Store under this name instead of the file name.
        #[arg(long)]
        name: Option<String>,

        /// The report is a pit report.
        #[arg(long)]
        pit: bool,
    },

    /// Store every `.json` report under a directory as pending.
    ///
    /// Respects `.gitignore` and `.ignore` files; skips dotfiles.
    Ingest {
        /// Directory to walk.
        dir: PathBuf,

        /// Directory names to skip at any depth.
        #[arg(long)]
        skip: Vec<String>,

        /// The reports are pit reports.
        #[arg(long)]
        pit: bool,
    },

    /// Move pending reports to their final area.
    Process {
        /// Reports to process.
        names: Vec<String>,

        /// Process every pending report.
        #[arg(long, conflicts_with = "names")]
        all: bool,

        /// Worker threads for `--all`.
        #[arg(long, default_value_t = 4)]
        jobs: usize,

        /// Per-report deadline in milliseconds (defaults to `write-timeout-ms`).
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Drop a pending report without processing it.
    Discard { name: String },

    /// Return a failed report to pending.
    Requeue { name: String },

    /// List reports, optionally in one area.
    Status {
        #[arg(long, value_enum)]
        area: Option<AreaArg>,
    },

    /// Print a report's metadata and payload.
    Show { name: String },

    /// List observers with standing reports for one match station.
    Observers {
        match_number: NonZeroU32,
        #[arg(value_enum)]
        alliance: AllianceArg,
        /// Station 1-3.
        station: u8,
    },

    /// Manage observer schedules.
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },

    /// Show or change the active event.
    Event {
        #[command(subcommand)]
        command: EventCommand,
    },

    /// Write match numbers into the sheet for a range of matches.
    Prefill { first: u32, last: u32 },

    /// Print the sheet's current rows, one `<cell>  <values>` line each.
    Sheet {
        /// Show the pit tab instead of the match tab.
        #[arg(long)]
        pits: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum EventCommand {
    /// Print the active event and its roster size.
    Show,

    /// Archive reports from other events and make `key` active.
    Switch { key: String },
}

/// CLI-facing area, mapped to the domain `Area`.
#[derive(Debug, Clone, ValueEnum)]
pub enum AreaArg {
    Pending,
    Malformed,
    Finalized,
    Failed,
    Discarded,
    Archived,
    PitFinalized,
}

impl AreaArg {
    fn to_domain(&self) -> Area {
        match self {
            Self::Pending => Area::Pending,
            Self::Malformed => Area::Malformed,
            Self::Finalized => Area::Finalized,
            Self::Failed => Area::Failed,
            Self::Discarded => Area::Discarded,
            Self::Archived => Area::Archived,
            Self::PitFinalized => Area::PitFinalized,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum AllianceArg {
    Red,
    Blue,
}

/// Everything a command may need.
pub struct Env<'a> {
    pub config: Config,
    pub config_path: PathBuf,
    pub storage: &'a Storage,
    pub sheet: &'a JsonlSheet,
    pub intake: &'a Intake<'a>,
}

/// Run one command, returning an error message on failure.
pub fn run(command: Command, env: &Env<'_>) -> Result<(), String> {
    let ctx = EventContext::from_config(&env.config)
        .map_err(|e| format!("failed to load roster for {}: {e}", env.config.event_key))?;

    match command {
        Command::Submit { file, name, pit } => cmd_submit(env, &ctx, &file, name, kind_of(pit)),
        Command::Ingest { dir, skip, pit } => cmd_ingest(env, &dir, &skip, kind_of(pit)),
        Command::Process {
            names,
            all,
            jobs,
            timeout_ms,
        } => {
            let timeout = timeout_ms.map_or_else(
                || env.config.write_timeout(),
                std::time::Duration::from_millis,
            );
            cmd_process(env, &ctx, &names, all, jobs, timeout)
        }
        Command::Discard { name } => env
            .intake
            .discard(&name)
            .map_err(|e| format!("failed to discard {name}: {e}")),
        Command::Requeue { name } => env
            .intake
            .requeue(&name)
            .map_err(|e| format!("failed to requeue {name}: {e}")),
        Command::Status { area } => cmd_status(env, area.as_ref().map(AreaArg::to_domain)),
        Command::Show { name } => cmd_show(env, &name),
        Command::Observers {
            match_number,
            alliance,
            station,
        } => cmd_observers(env, &ctx, match_number, &alliance, station),
        Command::Schedule { command } => cmd_schedule(env.storage, command),
        Command::Event { command } => match command {
            EventCommand::Show => {
                println!("{} ({} teams)", ctx.event(), ctx.roster().len());
                Ok(())
            }
            EventCommand::Switch { key } => cmd_switch(env, &ctx, &key),
        },
        Command::Prefill { first, last } => {
            let deadline = Instant::now() + env.config.write_timeout();
            let rows = env
                .intake
                .prefill(&ctx, first, last, deadline)
                .map_err(|e| format!("failed to prefill: {e}"))?;
            eprintln!("Prefilled {rows} rows");
            Ok(())
        }
        Command::Sheet { pits } => {
            let targets = ctx.targets();
            cmd_sheet(env, if pits { &targets.pits } else { &targets.matches })
        }
    }
}

fn kind_of(pit: bool) -> ReportKind {
    if pit { ReportKind::Pit } else { ReportKind::Match }
}

fn cmd_submit(
    env: &Env<'_>,
    ctx: &EventContext,
    file: &Path,
    name: Option<String>,
    kind: ReportKind,
) -> Result<(), String> {
    let from_stdin = file.as_os_str() == "-";
    let bytes = if from_stdin {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        buf
    } else {
        fs::read(file).map_err(|e| format!("failed to read {}: {e}", file.display()))?
    };

    let name = match name {
        Some(n) => n,
        None if from_stdin => submission_name(&bytes, kind, ctx.event()),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| format!("{} has no file name", file.display()))?,
    };

    let report = env
        .storage
        .submit(&name, kind, &bytes)
        .map_err(|e| format!("failed to submit {name}: {e}"))?;
    println!("{}", report.name);
    Ok(())
}

/// Name a stdin submission `<event>_<match>_<station>_<id>.json`, the
/// convention uploads from scouting clients follow.
fn submission_name(bytes: &[u8], kind: ReportKind, event: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    let id = &id[..12];
    let prefix = match parse("stdin", bytes, kind) {
        Ok(ParsedReport::Match(report)) => report.subject(event).map(|s| s.grouping_key()),
        Ok(ParsedReport::Pit(pit)) => Some(pit.subject().grouping_key()),
        Err(_) => None,
    };
    match prefix {
        Some(prefix) => format!("{prefix}_{id}.json"),
        None => format!("unnamed_{id}.json"),
    }
}

fn cmd_ingest(env: &Env<'_>, dir: &Path, skip: &[String], kind: ReportKind) -> Result<(), String> {
    if !dir.is_dir() {
        return Err(format!("{} is not a directory", dir.display()));
    }
    let summary = inbox::ingest(env.storage, dir, skip, kind);

    for report in &summary.stored {
        println!("{}", report.name);
    }
    for (path, reason) in &summary.rejected {
        eprintln!("Skipped {}: {reason}", path.display());
    }
    eprintln!(
        "Stored {} report(s), skipped {}",
        summary.stored.len(),
        summary.rejected.len()
    );
    Ok(())
}

fn cmd_process(
    env: &Env<'_>,
    ctx: &EventContext,
    names: &[String],
    all: bool,
    jobs: usize,
    timeout: std::time::Duration,
) -> Result<(), String> {
    let results = if all {
        env.intake
            .process_pending(ctx, timeout, jobs)
            .map_err(|e| format!("failed to list pending reports: {e}"))?
    } else {
        if names.is_empty() {
            return Err("specify report names or --all".to_string());
        }
        names
            .iter()
            .map(|name| {
                let deadline = Instant::now() + timeout;
                (name.clone(), env.intake.process(name, ctx, deadline))
            })
            .collect()
    };

    let mut errors = 0;
    for (name, result) in &results {
        match result {
            Ok(outcome) => println!("{name}  {}", format_outcome(outcome)),
            Err(e) => {
                errors += 1;
                eprintln!("{name}: {e}");
            }
        }
    }

    if errors > 0 {
        return Err(format!("{errors} of {} report(s) left pending", results.len()));
    }
    Ok(())
}

fn cmd_status(env: &Env<'_>, area: Option<Area>) -> Result<(), String> {
    let reports = env
        .storage
        .list(area)
        .map_err(|e| format!("failed to list reports: {e}"))?;

    if reports.is_empty() {
        println!("No reports");
        return Ok(());
    }
    for report in &reports {
        println!("{}", format_report(report));
    }
    Ok(())
}

fn cmd_show(env: &Env<'_>, name: &str) -> Result<(), String> {
    let report = env
        .storage
        .get(name)
        .map_err(|e| format!("failed to load {name}: {e}"))?;
    let payload = env
        .storage
        .read_payload(name)
        .map_err(|e| format!("failed to read payload of {name}: {e}"))?;

    let meta = serde_json::to_string_pretty(&report)
        .map_err(|e| format!("failed to serialize {name}: {e}"))?;
    println!("{meta}");
    println!("{}", String::from_utf8_lossy(&payload));
    Ok(())
}

fn cmd_observers(
    env: &Env<'_>,
    ctx: &EventContext,
    match_number: NonZeroU32,
    alliance: &AllianceArg,
    station: u8,
) -> Result<(), String> {
    let alliance = match alliance {
        AllianceArg::Red => Alliance::Red,
        AllianceArg::Blue => Alliance::Blue,
    };
    let station =
        Station::new(alliance, station).ok_or_else(|| format!("station {station} is not 1-3"))?;

    let observers = env
        .intake
        .observers(ctx, match_number, station)
        .map_err(|e| format!("failed to look up observers: {e}"))?;
    println!("{}", observers.join(", "));
    Ok(())
}

fn cmd_sheet(env: &Env<'_>, target: &str) -> Result<(), String> {
    let rows = env
        .sheet
        .snapshot(target)
        .map_err(|e| format!("failed to read {target}: {e}"))?;
    for ((column, row), cells) in &rows {
        println!("{}", format_row(target, *column, *row, cells));
    }
    Ok(())
}

fn cmd_switch(env: &Env<'_>, ctx: &EventContext, key: &str) -> Result<(), String> {
    let key = key.trim();
    if key.is_empty() {
        return Err("event key is empty".to_string());
    }

    let roster = load_roster(env.storage.root(), key)
        .map_err(|e| format!("failed to load roster for {key}: {e}"))?;
    let (next, archived) = env
        .intake
        .switch_event(ctx, key, roster)
        .map_err(|e| format!("failed to archive reports: {e}"))?;

    let mut config = env.config.clone();
    config.event_key = next.event().to_string();
    config
        .save(&env.config_path)
        .map_err(|e| format!("archived {} report(s) but {e}", archived.len()))?;

    eprintln!(
        "Active event is now {} ({} teams); archived {} report(s)",
        next.event(),
        next.roster().len(),
        archived.len()
    );
    Ok(())
}
