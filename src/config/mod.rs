//! Configuration for suncycle with validation.
//!
//! The configuration is a key/value settings document provided by the host
//! (see [`crate::host`]). In the standalone host it is `suncycle.toml`:
//!
//! ```toml
//! #[Fixed location] (optional, both or neither)
//! latitude = 40.7128
//! longitude = -74.0060
//!
//! #[Fixed times] (optional, both or neither, HH:MM)
//! sunrise = "06:30"
//! sunset = "19:45"
//!
//! [day]
//! color_scheme = "Packages/Color Scheme - Default/Breakers.sublime-color-scheme"
//! theme = "Default.sublime-theme"
//!
//! [night]
//! color_scheme = "Packages/Color Scheme - Default/Mariana.sublime-color-scheme"
//! theme = "Default Dark.sublime-theme"
//! ```
//!
//! ## Validation and Error Handling
//!
//! - `day` and `night` sections are required; loading fails without them
//! - Latitude (-90° to +90°) and longitude (-180° to +180°) are range checked
//! - Fixed times must be `HH:MM` and sunrise must come before sunset
//! - A lone `latitude`/`longitude` or `sunrise`/`sunset` is ignored with a warning

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::constants::FIXED_TIME_FORMAT;
use crate::geo::Coordinates;
use crate::period::{DaylightWindow, PeriodMap};

pub use loading::load;
pub use validation::validate_config;

/// What to apply to the editor during one period.
///
/// Unset fields leave the editor's current value alone.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct PeriodConfig {
    pub color_scheme: Option<String>,
    pub theme: Option<String>,
}

impl PeriodConfig {
    pub fn is_empty(&self) -> bool {
        self.color_scheme.is_none() && self.theme.is_none()
    }
}

/// Configured wall-clock sunrise and sunset, independent of any date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTimes {
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

impl FixedTimes {
    pub fn parse(sunrise: &str, sunset: &str) -> Result<Self> {
        Ok(Self {
            sunrise: parse_clock_time(sunrise).context("Invalid sunrise time format")?,
            sunset: parse_clock_time(sunset).context("Invalid sunset time format")?,
        })
    }

    /// Place the clock times on `date` in `tz`.
    ///
    /// Times that fall into a DST gap resolve to the first valid instant after it.
    pub fn on(&self, date: NaiveDate, tz: Tz) -> Result<DaylightWindow> {
        Ok(DaylightWindow {
            sunrise: localize(date, self.sunrise, tz).context("Cannot place fixed sunrise")?,
            sunset: localize(date, self.sunset, tz).context("Cannot place fixed sunset")?,
        })
    }
}

fn localize(date: NaiveDate, time: NaiveTime, tz: Tz) -> Result<chrono::DateTime<Tz>> {
    use chrono::TimeZone;

    let naive = date.and_time(time);
    if let Some(instant) = tz.from_local_datetime(&naive).earliest() {
        return Ok(instant);
    }
    // Inside a spring-forward gap; gaps never exceed a couple of hours
    (1..=180)
        .map(|minutes| naive + chrono::Duration::minutes(minutes))
        .find_map(|shifted| tz.from_local_datetime(&shifted).earliest())
        .ok_or_else(|| anyhow::anyhow!("{naive} does not exist in {tz}"))
}

/// Parse a 24-hour `HH:MM` clock time.
pub fn parse_clock_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), FIXED_TIME_FORMAT)
        .with_context(|| format!("'{value}' is not a HH:MM time"))
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub periods: PeriodMap<PeriodConfig>,
    /// Location from the configuration; `None` means look it up by IP.
    pub coordinates: Option<Coordinates>,
    /// Literal sunrise/sunset; `None` means compute them from the location.
    pub fixed_times: Option<FixedTimes>,
}

impl Config {
    pub fn has_fixed_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");

        for (period, settings) in self.periods.iter() {
            let label = match period {
                crate::period::Period::Day => "Day",
                crate::period::Period::Night => "Night",
            };
            if settings.is_empty() {
                log_indented!("{}: (nothing to switch)", label);
                continue;
            }
            if let Some(ref theme) = settings.theme {
                log_indented!("{} theme: {}", label, theme);
            }
            if let Some(ref scheme) = settings.color_scheme {
                log_indented!("{} color scheme: {}", label, scheme);
            }
        }

        match self.coordinates {
            Some(coordinates) => {
                let lat_dir = if coordinates.latitude >= 0.0 { "N" } else { "S" };
                let lon_dir = if coordinates.longitude >= 0.0 { "E" } else { "W" };
                log_indented!(
                    "Location: {:.3}°{}, {:.3}°{}",
                    coordinates.latitude.abs(),
                    lat_dir,
                    coordinates.longitude.abs(),
                    lon_dir
                );
            }
            None => log_indented!("Location: from IP lookup"),
        }

        match self.fixed_times {
            Some(times) => log_indented!(
                "Fixed times: sunrise {} / sunset {}",
                times.sunrise.format(FIXED_TIME_FORMAT),
                times.sunset.format(FIXED_TIME_FORMAT)
            ),
            None => log_indented!("Times: computed from location"),
        }
    }
}
