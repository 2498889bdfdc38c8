//! Application constants and default values for suncycle.
//!
//! This module contains the document names, timing defaults, validation limits
//! and fallback values used throughout the application.

use std::time::Duration;

use crate::geo::Coordinates;

// ═══ Host Documents ═══
// Names the engine passes to the host when loading or saving settings

pub const CONFIG_DOCUMENT: &str = "suncycle"; // day/night configuration
pub const PREFERENCES_DOCUMENT: &str = "Preferences"; // editor preferences that get switched
pub const SUBSCRIPTION_TOKEN: &str = "suncycle"; // change-subscription key on the config document

// Preference keys switched per period
pub const COLOR_SCHEME_KEY: &str = "color_scheme";
pub const THEME_KEY: &str = "theme";

// ═══ Operational Timing Constants ═══

pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(18); // 0.3 minutes between checks
pub const STARTUP_DELAY: Duration = Duration::from_millis(500); // lets host settings finish loading
pub const CACHE_LIFETIME_HOURS: i64 = 12; // shared by the IP and timezone caches
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10); // IP lookups block the loop
pub const WATCH_DEBOUNCE_MS: u64 = 500; // editors write files in multiple steps

// Interval limits for the host binary
pub const MINIMUM_CYCLE_INTERVAL_SECS: u64 = 1;
pub const MAXIMUM_CYCLE_INTERVAL_SECS: u64 = 3600;

// ═══ Geolocation ═══

pub const IP_LOOKUP_URL: &str = "http://ip-api.com/json";

// Used when the IP lookup cannot tell us where we are
pub const GREENWICH: Coordinates = Coordinates {
    latitude: 51.2838,
    longitude: 0.0,
};
pub const FALLBACK_TIMEZONE: &str = "UTC";

// ═══ Validation Limits ═══

pub const MINIMUM_LATITUDE: f64 = -90.0;
pub const MAXIMUM_LATITUDE: f64 = 90.0;
pub const MINIMUM_LONGITUDE: f64 = -180.0;
pub const MAXIMUM_LONGITUDE: f64 = 180.0;
pub const FIXED_TIME_FORMAT: &str = "%H:%M";
