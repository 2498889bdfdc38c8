//! Configuration validation functionality.
//!
//! Rejects configurations that cannot drive a day/night cycle: missing period
//! sections, coordinates off the globe, and fixed times that are not `HH:MM`.

use anyhow::Result;

use super::loading::RawConfig;
use super::parse_clock_time;
use crate::constants::*;
use crate::error::SunCycleError;
use crate::period::Period;

/// Comprehensive configuration validation.
pub fn validate_config(config: &RawConfig) -> Result<()> {
    if config.day.is_none() {
        return Err(SunCycleError::MissingPeriod(Period::Day).into());
    }
    if config.night.is_none() {
        return Err(SunCycleError::MissingPeriod(Period::Night).into());
    }

    if let Some(lat) = config.latitude
        && !(MINIMUM_LATITUDE..=MAXIMUM_LATITUDE).contains(&lat)
    {
        return Err(invalid(format!(
            "latitude must be between -90 and 90 degrees (got {lat})"
        )));
    }

    if let Some(lon) = config.longitude
        && !(MINIMUM_LONGITUDE..=MAXIMUM_LONGITUDE).contains(&lon)
    {
        return Err(invalid(format!(
            "longitude must be between -180 and 180 degrees (got {lon})"
        )));
    }

    let sunrise = match config.sunrise.as_deref() {
        Some(value) => Some(
            parse_clock_time(value)
                .map_err(|_| invalid(format!("sunrise '{value}' must use HH:MM (24-hour)")))?,
        ),
        None => None,
    };
    let sunset = match config.sunset.as_deref() {
        Some(value) => Some(
            parse_clock_time(value)
                .map_err(|_| invalid(format!("sunset '{value}' must use HH:MM (24-hour)")))?,
        ),
        None => None,
    };

    // Still usable: the inclusive comparison makes it night all day, or day for a single instant
    if let (Some(sunrise), Some(sunset)) = (sunrise, sunset)
        && sunrise >= sunset
    {
        log_pipe!();
        log_warning!(
            "Fixed sunrise ({}) is not earlier than sunset ({})",
            sunrise.format(FIXED_TIME_FORMAT),
            sunset.format(FIXED_TIME_FORMAT)
        );
        log_indented!("Day is only the span from sunrise to sunset, inclusive");
    }

    Ok(())
}

fn invalid(message: String) -> anyhow::Error {
    SunCycleError::InvalidConfig(message).into()
}
