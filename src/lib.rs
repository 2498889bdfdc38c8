//! # suncycle
//!
//! Switches an editor's color scheme and theme between a day and a night
//! variant, following the local sun.
//!
//! ## Architecture
//!
//! - **Entry Point**: [`SunCycle`] builds a [`driver::CycleDriver`];
//!   [`ActiveCycle`] keeps at most one of them running per process
//! - **Driver**: `driver` ticks on host timers and writes the current
//!   period's settings into the host's preferences
//! - **Resolver**: `resolver` owns the configuration, location and timezone,
//!   each refreshed through a time-boxed `cache`
//! - **Configuration**: `config` reads and validates the `day`/`night`
//!   sections and the optional fixed location and times
//! - **Geographic**: `geo` computes sunrise/sunset and performs IP lookups
//! - **Host**: `host` abstracts the surrounding application; `host::file`
//!   implements it on plain files for the `suncycle` binary
//! - **Infrastructure**: logging, time sources, constants, argument parsing

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod cache;
pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod geo;
pub mod host;
pub mod period;
pub mod resolver;
pub mod time_source;

mod suncycle;

pub use error::SunCycleError;
pub use period::Period;
pub use suncycle::{ActiveCycle, SunCycle};
