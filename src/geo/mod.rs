//! Geographic location and sunrise/sunset calculations.
//!
//! ## Module Structure
//!
//! - [`ip`]: IP-based geolocation lookups and the fetch seam used to reach
//!   the lookup service
//!
//! The [`Sun`] calculator is bound to one set of [`Coordinates`] and answers
//! sunrise/sunset questions for whatever date the query instant falls on,
//! expressed in the query's timezone.

pub mod ip;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use std::fmt;
use sunrise::{SolarDay, SolarEvent};
use tzf_rs::DefaultFinder;

pub use ip::{Fetch, HttpFetcher, IpLocation, LookupOutcome};

use crate::constants::{MAXIMUM_LATITUDE, MAXIMUM_LONGITUDE, MINIMUM_LATITUDE, MINIMUM_LONGITUDE};
use crate::period::{Daylight, DaylightWindow};

// Sun's upper limb touching the horizon, refraction included
const HORIZON_ELEVATION: f64 = -0.833;

// A real crossing on the query date is never further than this from the query
const EVENT_SEARCH_HOURS: i64 = 36;

// Building the finder decompresses the bundled boundary data, so do it once
static TZ_FINDER: Lazy<DefaultFinder> = Lazy::new(DefaultFinder::new);

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (MINIMUM_LATITUDE..=MAXIMUM_LATITUDE).contains(&self.latitude)
            && (MINIMUM_LONGITUDE..=MAXIMUM_LONGITUDE).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.latitude, self.longitude)
    }
}

/// Sunrise/sunset calculator bound to a location.
#[derive(Debug, Clone, Copy)]
pub struct Sun {
    coordinates: Coordinates,
    solar: sunrise::Coordinates,
}

impl Sun {
    pub fn new(coordinates: Coordinates) -> Result<Self> {
        let solar = sunrise::Coordinates::new(coordinates.latitude, coordinates.longitude)
            .with_context(|| format!("Invalid coordinates {coordinates}"))?;
        Ok(Self { coordinates, solar })
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    /// Sunrise and sunset on the calendar date of `at`, in `at`'s timezone.
    ///
    /// When the sun never crosses the horizon that date, the result is
    /// [`Daylight::PolarDay`] or [`Daylight::PolarNight`] depending on
    /// whether it stands above the horizon at noon.
    pub fn daylight(&self, at: &DateTime<Tz>) -> Daylight {
        let day = SolarDay::new(self.solar, at.date_naive());
        let sunrise = day.event_time(SolarEvent::Sunrise).with_timezone(&at.timezone());
        let sunset = day.event_time(SolarEvent::Sunset).with_timezone(&at.timezone());

        // No crossing comes back as an instant far from the date, usually the epoch
        let near = |event: &DateTime<Tz>| (*event - *at).num_hours().abs() <= EVENT_SEARCH_HOURS;
        if near(&sunrise) && near(&sunset) && sunrise < sunset {
            return Daylight::Window(DaylightWindow { sunrise, sunset });
        }

        if self.noon_elevation(at.ordinal()) > HORIZON_ELEVATION {
            Daylight::PolarDay
        } else {
            Daylight::PolarNight
        }
    }

    /// Approximate solar elevation at local noon in degrees.
    fn noon_elevation(&self, day_of_year: u32) -> f64 {
        let angle = (360.0 / 365.0 * (f64::from(day_of_year) + 10.0)).to_radians();
        let declination = -23.44 * angle.cos();
        90.0 - (self.coordinates.latitude - declination).abs()
    }
}

/// IANA timezone name for a location, if it falls inside a known zone.
pub fn timezone_name_for(coordinates: Coordinates) -> Option<String> {
    let name = TZ_FINDER.get_tz_name(coordinates.longitude, coordinates.latitude);
    // Open ocean has no zone of its own
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
