//! Settings and location resolver.
//!
//! The resolver owns everything the cycle driver needs to decide between day
//! and night: the loaded configuration, the current coordinates and the
//! sunrise/sunset calculator bound to them, and the timezone those instants are
//! compared in. Two independent [`TimeBoxedCache`]s keep it from repeating work:
//!
//! - the IP cache limits geolocation lookups to one per cache lifetime
//! - the timezone cache re-resolves only when the location inputs change or
//!   the lifetime runs out
//!
//! The resolver is shared through [`ResolverHandle`] and lives on the host
//! loop. It subscribes to changes of its configuration document and reloads
//! itself when the document changes, invoking the caller's change callback on
//! every reload after the first.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::cache::TimeBoxedCache;
use crate::config::{self, Config, PeriodConfig};
use crate::constants::{CONFIG_DOCUMENT, FALLBACK_TIMEZONE, GREENWICH, SUBSCRIPTION_TOKEN};
use crate::error::SunCycleError;
use crate::geo::ip::{self, Fetch, LookupOutcome};
use crate::geo::{self, Coordinates, Sun};
use crate::host::{Host, SettingsDocument};
use crate::period::{Daylight, DaylightWindow, Period};
use crate::time_source::TimeSource;

/// Inputs the timezone was last resolved from.
#[derive(Debug, Clone, PartialEq)]
pub struct TimezoneKey {
    pub fixed_coordinates: bool,
    pub coordinates: Option<Coordinates>,
    pub timezone_name: Option<String>,
}

/// Everything a resolver needs from its owner.
pub struct ResolverParams {
    pub host: Rc<dyn Host>,
    pub clock: Arc<dyn TimeSource>,
    pub fetcher: Rc<dyn Fetch>,
    pub lookup_url: String,
    /// Called after every successful reload except the first.
    pub on_change: Option<Rc<dyn Fn()>>,
}

/// Where the location in use came from after an IP lookup attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
enum LocationSource {
    Lookup,
    Greenwich,
    /// The lookup failed and the earlier location stays in use.
    Previous,
}

struct Resolver {
    clock: Arc<dyn TimeSource>,
    fetcher: Rc<dyn Fetch>,
    lookup_url: String,

    document: Option<Rc<dyn SettingsDocument>>,
    config: Option<Config>,
    loaded: bool,

    fixed_coordinates: bool,
    coordinates: Option<Coordinates>,
    sun: Option<Sun>,
    timezone: Option<Tz>,
    timezone_name: Option<String>,

    ip_cache: TimeBoxedCache<()>,
    tz_cache: TimeBoxedCache<TimezoneKey>,
}

impl Resolver {
    fn apply_config(&mut self, config: Config) {
        self.ip_cache.clear();
        self.tz_cache.clear();

        self.fixed_coordinates = config.has_fixed_coordinates();
        if let Some(coordinates) = config.coordinates {
            self.coordinates = Some(coordinates);
            // Rebuilt on the next resolve_sun
            self.sun = None;
            self.timezone_name = geo::timezone_name_for(coordinates);
            log_block_start!("Using location {} from settings", coordinates);
            match self.timezone_name {
                Some(ref name) => log_indented!("Timezone {} from coordinates", name),
                None => log_indented!("No timezone at these coordinates, using UTC"),
            }
        }

        self.config = Some(config);
    }

    fn resolve_sun(&mut self) -> Result<Sun> {
        if self.fixed_coordinates {
            if self.sun.is_none() {
                let coordinates = self.coordinates.ok_or(SunCycleError::NoCoordinates)?;
                self.sun = Some(Sun::new(coordinates)?);
            }
            return self.sun.ok_or_else(|| SunCycleError::NoCoordinates.into());
        }

        let now = self.clock.now();
        if self.ip_cache.is_stale(now, &()) {
            // Recorded before the lookup so a failing service is not hammered
            self.ip_cache.record(now, ());
            self.refresh_location_from_ip();
        }

        self.sun.ok_or_else(|| SunCycleError::NoCoordinates.into())
    }

    fn refresh_location_from_ip(&mut self) -> LocationSource {
        match ip::lookup(self.fetcher.as_ref(), &self.lookup_url) {
            LookupOutcome::Located(location) => match Sun::new(location.coordinates) {
                Ok(sun) => {
                    self.coordinates = Some(location.coordinates);
                    self.sun = Some(sun);
                    self.timezone_name = Some(location.timezone_name);
                    log_block_start!("Using location {} from IP lookup", location.coordinates);
                    LocationSource::Lookup
                }
                Err(e) => {
                    log_pipe!();
                    log_warning!("IP lookup returned an unusable location: {e:#}");
                    self.use_fallback_location()
                }
            },
            LookupOutcome::Malformed(reason) => {
                log_pipe!();
                log_warning!("IP lookup returned an unusable location: {}", reason);
                self.use_fallback_location()
            }
            LookupOutcome::Unreachable(e) => {
                log_pipe!();
                log_error!("{e:#}");
                log_indented!("Failed to get a result from {}", self.lookup_url);
                match self.coordinates.filter(|_| self.sun.is_some()) {
                    Some(previous) => {
                        log_indented!("Keeping previous location {}", previous);
                        LocationSource::Previous
                    }
                    None => self.use_fallback_location(),
                }
            }
        }
    }

    fn use_fallback_location(&mut self) -> LocationSource {
        self.coordinates = Some(GREENWICH);
        self.sun = Sun::new(GREENWICH).ok();
        self.timezone_name = Some(FALLBACK_TIMEZONE.to_string());
        log_block_start!("Using location {} from Greenwich", GREENWICH);
        LocationSource::Greenwich
    }

    fn resolve_timezone(&mut self) -> Tz {
        let now = self.clock.now();
        let key = TimezoneKey {
            fixed_coordinates: self.fixed_coordinates,
            coordinates: self.coordinates,
            timezone_name: self.timezone_name.clone(),
        };

        if let Some(timezone) = self.timezone
            && !self.tz_cache.is_stale(now, &key)
        {
            return timezone;
        }

        let timezone = match self.timezone_name.as_deref() {
            Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                log_pipe!();
                log_warning!("Unknown timezone '{}', using UTC", name);
                chrono_tz::UTC
            }),
            None => chrono_tz::UTC,
        };

        self.tz_cache.record(now, key);
        self.timezone = Some(timezone);
        log_decorated!("Using {}", now.with_timezone(&timezone).format("%Z"));
        timezone
    }

    fn fixed_times(&mut self) -> Result<Option<DaylightWindow>> {
        let Some(times) = self.config.as_ref().and_then(|config| config.fixed_times) else {
            return Ok(None);
        };
        let timezone = self.resolve_timezone();
        let today = self.clock.now().with_timezone(&timezone).date_naive();
        times.on(today, timezone).map(Some)
    }

    fn log_todays_times(&mut self, sun: Sun) -> Result<()> {
        let timezone = self.resolve_timezone();
        let now = self.clock.now().with_timezone(&timezone);
        match self.fixed_times()? {
            Some(window) => {
                log_decorated!("Fixed sunrise at {}", window.sunrise);
                log_decorated!("Fixed sunset at {}", window.sunset);
            }
            None => match sun.daylight(&now) {
                Daylight::Window(window) => {
                    log_decorated!("Sunrise at {}", window.sunrise);
                    log_decorated!("Sunset at {}", window.sunset);
                }
                polar => log_decorated!("No sunrise or sunset today, {}", polar),
            },
        }
        Ok(())
    }
}

struct Shared {
    state: RefCell<Resolver>,
    host: Rc<dyn Host>,
    on_change: Option<Rc<dyn Fn()>>,
}

/// Shared handle to a resolver living on the host loop.
#[derive(Clone)]
pub struct ResolverHandle {
    shared: Rc<Shared>,
}

impl ResolverHandle {
    /// Create an unloaded resolver. Call [`ResolverHandle::load`] before use.
    pub fn new(params: ResolverParams) -> Self {
        let state = Resolver {
            clock: params.clock,
            fetcher: params.fetcher,
            lookup_url: params.lookup_url,
            document: None,
            config: None,
            loaded: false,
            fixed_coordinates: false,
            coordinates: None,
            sun: None,
            timezone: None,
            timezone_name: None,
            ip_cache: TimeBoxedCache::with_default_lifetime(),
            tz_cache: TimeBoxedCache::with_default_lifetime(),
        };

        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(state),
                host: params.host,
                on_change: params.on_change,
            }),
        }
    }

    /// Read and validate the configuration, then resolve location and timezone.
    ///
    /// The change subscription is (re)registered before validation, so fixing
    /// a broken configuration file brings the resolver back without a restart.
    /// On failure the previous configuration and caches stay in place.
    pub fn load(&self) -> Result<()> {
        let document = self
            .shared
            .host
            .load_settings(CONFIG_DOCUMENT)
            .ok_or_else(|| SunCycleError::SettingsUnavailable(CONFIG_DOCUMENT.to_string()))?;

        document.clear_on_change(SUBSCRIPTION_TOKEN);
        let weak = Rc::downgrade(&self.shared);
        document.add_on_change(SUBSCRIPTION_TOKEN, Rc::new(move || reload(&weak)));

        let was_loaded = {
            let mut state = self.shared.state.borrow_mut();
            state.document = Some(Rc::clone(&document));

            let config = config::load(document.as_ref())?;
            config.log_config();
            state.apply_config(config);

            let sun = state.resolve_sun()?;
            state.resolve_timezone();
            state.log_todays_times(sun)?;

            std::mem::replace(&mut state.loaded, true)
        };

        if was_loaded && let Some(on_change) = self.shared.on_change.as_ref() {
            on_change();
        }
        Ok(())
    }

    /// Stop listening for configuration changes. Safe to call repeatedly.
    pub fn unload(&self) {
        let mut state = self.shared.state.borrow_mut();
        if let Some(document) = state.document.as_ref() {
            document.clear_on_change(SUBSCRIPTION_TOKEN);
        }
        state.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.shared.state.borrow().loaded
    }

    /// Whether a configuration has ever been loaded successfully.
    pub fn has_config(&self) -> bool {
        self.shared.state.borrow().config.is_some()
    }

    /// Sun calculator for the current location, refreshing it when due.
    pub fn resolve_sun(&self) -> Result<Sun> {
        self.shared.state.borrow_mut().resolve_sun()
    }

    pub fn resolve_timezone(&self) -> Tz {
        self.shared.state.borrow_mut().resolve_timezone()
    }

    /// Configured sunrise/sunset placed on today's date in the resolved timezone.
    pub fn fixed_times(&self) -> Result<Option<DaylightWindow>> {
        self.shared.state.borrow_mut().fixed_times()
    }

    pub fn period_config(&self, period: Period) -> Option<PeriodConfig> {
        let state = self.shared.state.borrow();
        state
            .config
            .as_ref()
            .map(|config| config.periods.get(period).clone())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.shared.state.borrow().clock.now()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.shared.state.borrow().coordinates
    }

    pub fn timezone_name(&self) -> Option<String> {
        self.shared.state.borrow().timezone_name.clone()
    }
}

fn reload(weak: &Weak<Shared>) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let handle = ResolverHandle { shared };
    if let Err(e) = handle.load().context("Reloading configuration failed") {
        log_pipe!();
        log_error!("{e:#}");
    }
}
