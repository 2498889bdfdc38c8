//! Command-line argument parsing and processing.
//!
//! This module handles parsing of command-line arguments and provides a clean
//! interface for the main application logic. It supports the standard help,
//! version, and debug flags plus the paths and interval of a standalone run.

use crate::constants::{MAXIMUM_CYCLE_INTERVAL_SECS, MINIMUM_CYCLE_INTERVAL_SECS};

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the cycle with these settings
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        preferences: Option<String>,
        interval_secs: Option<u64>,
    },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown or malformed arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name and is skipped. Version wins over
    /// help, and help wins over running.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut unknown_arg_found = false;
        let mut config_dir: Option<String> = None;
        let mut preferences: Option<String> = None;
        let mut interval_secs: Option<u64> = None;

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg_str = &args_vec[i];
            let value = args_vec
                .get(i + 1)
                .filter(|next| !next.starts_with('-'))
                .cloned();

            match arg_str.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => match value {
                    Some(dir) => {
                        config_dir = Some(dir);
                        i += 1;
                    }
                    None => {
                        log_warning!("Missing directory for --config. Usage: --config <directory>");
                        unknown_arg_found = true;
                    }
                },
                "--preferences" | "-p" => match value {
                    Some(file) => {
                        preferences = Some(file);
                        i += 1;
                    }
                    None => {
                        log_warning!("Missing file for --preferences. Usage: --preferences <file>");
                        unknown_arg_found = true;
                    }
                },
                "--interval" | "-i" => {
                    match value.as_deref().and_then(|v| v.parse::<u64>().ok()) {
                        Some(secs)
                            if (MINIMUM_CYCLE_INTERVAL_SECS..=MAXIMUM_CYCLE_INTERVAL_SECS)
                                .contains(&secs) =>
                        {
                            interval_secs = Some(secs);
                            i += 1;
                        }
                        _ => {
                            log_warning!(
                                "Interval must be {}-{} seconds. Usage: --interval <seconds>",
                                MINIMUM_CYCLE_INTERVAL_SECS,
                                MAXIMUM_CYCLE_INTERVAL_SECS
                            );
                            unknown_arg_found = true;
                            if value.is_some() {
                                i += 1;
                            }
                        }
                    }
                }
                _ => {
                    if arg_str.starts_with('-') {
                        log_warning!("Unknown option: {arg_str}");
                    } else {
                        log_warning!("Unexpected argument: {arg_str}");
                    }
                    unknown_arg_found = true;
                }
            }
            i += 1;
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else if display_help {
            CliAction::ShowHelp
        } else {
            CliAction::Run {
                debug_enabled,
                config_dir,
                preferences,
                interval_secs,
            }
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("suncycle [OPTIONS]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>         Use custom configuration directory");
    log_indented!("-p, --preferences <file>   Preferences file to switch (JSON or TOML)");
    log_indented!("-i, --interval <seconds>   Seconds between checks (default 18)");
    log_indented!("-d, --debug                Enable detailed debug output");
    log_indented!("-h, --help                 Print help information");
    log_indented!("-V, --version              Print version information");
    log_block_start!("Signals:");
    log_indented!("SIGHUP                     Restart the cycle");
    log_indented!("SIGINT, SIGTERM            Stop");
    log_end!();
}
