//! Configuration loading from a host settings document.
//!
//! Reads the recognised keys out of the document, checks them with
//! [`validate_config`], and turns the result into a [`Config`].

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use super::{Config, FixedTimes, PeriodConfig, validate_config};
use crate::error::SunCycleError;
use crate::geo::Coordinates;
use crate::host::SettingsDocument;
use crate::period::{Period, PeriodMap};

const RECOGNISED_KEYS: [&str; 6] = ["day", "night", "latitude", "longitude", "sunrise", "sunset"];

/// Configuration exactly as found in the document, before validation.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RawConfig {
    pub day: Option<PeriodConfig>,
    pub night: Option<PeriodConfig>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
}

impl RawConfig {
    /// Collect the recognised keys from `document`.
    pub fn read(document: &dyn SettingsDocument) -> Result<Self> {
        let values: serde_json::Map<String, Value> = RECOGNISED_KEYS
            .iter()
            .filter_map(|key| document.get(key).map(|value| (key.to_string(), value)))
            .filter(|(_, value)| !value.is_null())
            .collect();

        serde_json::from_value(Value::Object(values))
            .map_err(|e| SunCycleError::InvalidConfig(e.to_string()).into())
    }
}

/// Load and validate the configuration held in `document`.
pub fn load(document: &dyn SettingsDocument) -> Result<Config> {
    let raw = RawConfig::read(document)?;
    validate_config(&raw)?;
    into_config(raw)
}

fn into_config(raw: RawConfig) -> Result<Config> {
    let (Some(day), Some(night)) = (raw.day, raw.night) else {
        // validate_config already rejected this
        return Err(SunCycleError::MissingPeriod(Period::Day).into());
    };

    let coordinates = match (raw.latitude, raw.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
        (None, None) => None,
        _ => {
            log_pipe!();
            log_warning!("Both latitude and longitude are needed for a fixed location");
            log_indented!("Falling back to IP-based location lookup");
            None
        }
    };

    let fixed_times = match (raw.sunrise.as_deref(), raw.sunset.as_deref()) {
        (Some(sunrise), Some(sunset)) => Some(FixedTimes::parse(sunrise, sunset)?),
        (None, None) => None,
        _ => {
            log_pipe!();
            log_warning!("Both sunrise and sunset are needed for fixed times");
            log_indented!("Falling back to computed sunrise and sunset");
            None
        }
    };

    Ok(Config {
        periods: PeriodMap::new(day, night),
        coordinates,
        fixed_times,
    })
}
