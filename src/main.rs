mod app;
mod clock;
mod config;
mod schedule;
mod sync;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;

use crate::app::{TickDriver, build_snapshot};
use crate::clock::CorrectedClock;
use crate::config::AppSettings;
use crate::schedule::model::load_or_default;
use crate::schedule::resolver::ScheduleResolver;
use crate::sync::TimeSynchronizer;

#[derive(Parser, Debug)]
#[command(
    name = "classbell",
    version,
    about = "Class schedule countdown clock with drift-corrected time"
)]
struct Cli {
    #[arg(long, default_value = "schedule.json")]
    schedule: PathBuf,

    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    #[arg(long)]
    once: bool,

    #[arg(long)]
    json: bool,

    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.tick_ms == 0 {
        bail!("--tick-ms must be greater than zero");
    }

    let settings = AppSettings::load(&cli.settings);
    let timezone = settings.resolve_timezone();
    let mode = settings.display_mode();

    let schedule = load_or_default(&cli.schedule);
    let resolver = Arc::new(RwLock::new(ScheduleResolver::new(schedule)));
    let clock = CorrectedClock::new();

    let mut synchronizer = TimeSynchronizer::new(clock.clone());
    if settings.sync_world_time {
        synchronizer.trigger();
    }

    let emit_json = cli.json;
    let print_snapshot = move |snapshot: &app::StatusSnapshot| {
        if emit_json {
            match serde_json::to_string(snapshot) {
                Ok(text) => println!("{text}"),
                Err(err) => eprintln!("error: could not encode snapshot: {err}"),
            }
        } else {
            println!("{}", snapshot.status_line());
        }
    };

    if cli.once {
        let snapshot = {
            let guard = resolver
                .read()
                .map_err(|_| anyhow::anyhow!("schedule resolver lock poisoned"))?;
            build_snapshot(&guard, &clock.now_in(timezone), mode)
        };
        print_snapshot(&snapshot);
        return Ok(());
    }

    let (tick_tx, tick_rx) = mpsc::channel();
    let _driver = TickDriver::start(
        Arc::clone(&resolver),
        clock,
        timezone,
        mode,
        Duration::from_millis(cli.tick_ms),
        move |snapshot| {
            print_snapshot(&snapshot);
            let _ = tick_tx.send(());
        },
    );

    // Runs until the process is terminated; the channel only closes if the
    // tick thread dies. Edits to the schedule file are picked up between
    // ticks, off the tick thread, so the read path stays free of disk I/O.
    let mut last_modified = schedule_modified_time(&cli.schedule);
    loop {
        tick_rx
            .recv()
            .context("tick driver stopped unexpectedly")?;

        let modified = schedule_modified_time(&cli.schedule);
        if modified != last_modified {
            last_modified = modified;
            let segments = load_or_default(&cli.schedule);
            if let Ok(mut guard) = resolver.write() {
                guard.reload(segments);
                info!("schedule reloaded from {}", cli.schedule.display());
            }
        }
    }
}

fn schedule_modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
