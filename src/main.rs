//! Main application entry point.
//!
//! Parses arguments, prepares the configuration directory, and runs a
//! [`SunCycle`] on a file-backed host until SIGINT or SIGTERM. SIGHUP restarts
//! the cycle from scratch, re-reading the configuration.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM},
    iterator::Signals,
};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use suncycle::args::{CliAction, ParsedArgs};
use suncycle::config::builder::create_default_config;
use suncycle::constants::{CONFIG_DOCUMENT, PREFERENCES_DOCUMENT};
use suncycle::host::event_loop::LoopMessage;
use suncycle::host::file::{FileHost, default_config_dir};
use suncycle::logger::Log;
use suncycle::{
    ActiveCycle, SunCycle, log_block_start, log_debug, log_end, log_error_exit, log_indented,
    log_pipe, log_version,
};

fn main() -> Result<()> {
    match ParsedArgs::from_env().action {
        CliAction::ShowVersion => {
            log_version!();
            log_end!();
            Ok(())
        }
        CliAction::ShowHelp => {
            suncycle::args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            suncycle::args::display_help();
            std::process::exit(1);
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
            preferences,
            interval_secs,
        } => {
            if let Err(e) = run(debug_enabled, config_dir, preferences, interval_secs) {
                log_error_exit!("suncycle failed");
                eprintln!("{e:?}");
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn run(
    debug_enabled: bool,
    config_dir: Option<String>,
    preferences: Option<String>,
    interval_secs: Option<u64>,
) -> Result<()> {
    log_version!();
    Log::set_timestamps(true);
    if debug_enabled {
        log_pipe!();
        log_debug!("Debug mode enabled - showing period checks and file events");
    }

    let config_dir = match config_dir {
        Some(dir) => PathBuf::from(dir),
        None => default_config_dir()?,
    };
    ensure_config(&config_dir)?;

    let preferences = preferences
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir.join(format!("{PREFERENCES_DOCUMENT}.json")));
    ensure_preferences(&preferences)?;

    let host = Rc::new(
        FileHost::new(&config_dir)
            .with_document(PREFERENCES_DOCUMENT, &preferences)
            .with_debug(debug_enabled),
    );
    setup_signal_handler(host.sender())?;

    let new_cycle = || {
        let mut cycle = SunCycle::new(host.clone()).debug(debug_enabled);
        if let Some(secs) = interval_secs {
            cycle = cycle.with_interval(Duration::from_secs(secs));
        }
        cycle
    };

    let mut active = ActiveCycle::new();
    active.restart(new_cycle());

    host.run(|| {
        log_block_start!("Restarting");
        active.restart(new_cycle());
    });

    active.stop();
    log_block_start!("Shutting down");
    log_end!();
    Ok(())
}

fn ensure_config(config_dir: &Path) -> Result<()> {
    let toml = config_dir.join(format!("{CONFIG_DOCUMENT}.toml"));
    let json = config_dir.join(format!("{CONFIG_DOCUMENT}.json"));
    if toml.exists() || json.exists() {
        return Ok(());
    }

    create_default_config(&toml)?;
    log_block_start!("Created default configuration");
    log_indented!("{}", toml.display());
    Ok(())
}

fn ensure_preferences(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create preferences directory")?;
    }
    std::fs::write(path, "{}\n")
        .with_context(|| format!("Failed to create {}", path.display()))?;
    log_block_start!("Created empty preferences");
    log_indented!("{}", path.display());
    Ok(())
}

/// Forward SIGINT/SIGTERM as shutdown and SIGHUP as restart to the host loop.
fn setup_signal_handler(sender: Sender<LoopMessage>) -> Result<()> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGHUP]).context("Failed to register signal handlers")?;

    thread::spawn(move || {
        for signal in signals.forever() {
            let message = match signal {
                SIGHUP => LoopMessage::Restart,
                _ => LoopMessage::Shutdown,
            };
            let shutdown = message == LoopMessage::Shutdown;
            if sender.send(message).is_err() || shutdown {
                break;
            }
        }
    });

    Ok(())
}
