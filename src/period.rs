//! Day/night period classification.
//!
//! A [`Period`] is always derived from "now" and a daylight window, never
//! stored. Per-period configuration lives in a [`PeriodMap`], which keeps the
//! day and night entries side by side and selects between them by value.

use chrono::DateTime;
use chrono_tz::Tz;
use std::fmt;

/// The current classification of the day.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum Period {
    Day,
    Night,
}

impl Period {
    /// Configuration key of the period's section.
    pub fn key(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Night => "night",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Sunrise and sunset instants bounding the day for one calendar date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaylightWindow {
    pub sunrise: DateTime<Tz>,
    pub sunset: DateTime<Tz>,
}

impl DaylightWindow {
    /// Day iff `sunrise <= now <= sunset`; both boundaries count as day.
    pub fn period_at(&self, now: &DateTime<Tz>) -> Period {
        if *now >= self.sunrise && *now <= self.sunset {
            Period::Day
        } else {
            Period::Night
        }
    }
}

/// How the sun behaves on one calendar date at one location.
///
/// Above the polar circles the sun can stay up or down for the whole date,
/// in which case there is no window to compare against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Daylight {
    Window(DaylightWindow),
    PolarDay,
    PolarNight,
}

impl Daylight {
    pub fn period_at(&self, now: &DateTime<Tz>) -> Period {
        match self {
            Daylight::Window(window) => window.period_at(now),
            Daylight::PolarDay => Period::Day,
            Daylight::PolarNight => Period::Night,
        }
    }
}

impl fmt::Display for Daylight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Daylight::Window(window) => {
                write!(f, "sunrise {}, sunset {}", window.sunrise, window.sunset)
            }
            Daylight::PolarDay => f.write_str("sun stays up all day"),
            Daylight::PolarNight => f.write_str("sun stays down all day"),
        }
    }
}

/// One value per period, selected by [`Period`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeriodMap<T> {
    pub day: T,
    pub night: T,
}

impl<T> PeriodMap<T> {
    pub fn new(day: T, night: T) -> Self {
        Self { day, night }
    }

    pub fn get(&self, period: Period) -> &T {
        match period {
            Period::Day => &self.day,
            Period::Night => &self.night,
        }
    }

    /// Iterate both entries, day first.
    pub fn iter(&self) -> impl Iterator<Item = (Period, &T)> {
        [(Period::Day, &self.day), (Period::Night, &self.night)].into_iter()
    }
}
