//! Periodic day/night driver.
//!
//! The driver owns a [`ResolverHandle`], decides which period the current
//! instant falls in, and writes that period's color scheme and theme into the
//! host's preferences document. It runs entirely on host timers: one start-up
//! timer, then one tick every cycle interval until [`CycleDriver::stop`].
//!
//! Tick errors are logged and never end the loop, so a transient failure (an
//! unreadable preferences file, say) heals on a later tick.

use anyhow::{Result, anyhow};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{COLOR_SCHEME_KEY, PREFERENCES_DOCUMENT, THEME_KEY};
use crate::error::SunCycleError;
use crate::geo::ip::Fetch;
use crate::host::Host;
use crate::period::{Daylight, Period};
use crate::resolver::{ResolverHandle, ResolverParams};
use crate::time_source::TimeSource;

/// Everything a driver needs, assembled by [`crate::SunCycle`].
pub struct DriverParams {
    pub host: Rc<dyn Host>,
    pub clock: Arc<dyn TimeSource>,
    pub fetcher: Rc<dyn Fetch>,
    pub lookup_url: String,
    pub interval: Duration,
    pub startup_delay: Duration,
    pub debug_enabled: bool,
}

struct Driver {
    params: DriverParams,
    halted: Cell<bool>,
    started: Cell<bool>,
    resolver: RefCell<Option<ResolverHandle>>,
    last_period: Cell<Option<Period>>,
}

/// Handle to a running (or stopped) day/night cycle.
#[derive(Clone)]
pub struct CycleDriver {
    inner: Rc<Driver>,
}

impl CycleDriver {
    pub fn new(params: DriverParams) -> Self {
        Self {
            inner: Rc::new(Driver {
                params,
                halted: Cell::new(false),
                started: Cell::new(false),
                resolver: RefCell::new(None),
                last_period: Cell::new(None),
            }),
        }
    }

    /// Schedule start-up after the start-up delay. Later calls do nothing.
    pub fn start(&self) {
        if self.inner.started.replace(true) {
            return;
        }
        let driver = self.clone();
        self.inner.params.host.set_timeout(
            self.inner.params.startup_delay,
            Box::new(move || driver.begin()),
        );
    }

    fn begin(&self) {
        if self.is_halted() {
            return;
        }

        let weak = Rc::downgrade(&self.inner);
        let on_change: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                CycleDriver { inner }.apply_logged("Applying changed settings failed");
            }
        });

        let params = &self.inner.params;
        let resolver = ResolverHandle::new(ResolverParams {
            host: Rc::clone(&params.host),
            clock: Arc::clone(&params.clock),
            fetcher: Rc::clone(&params.fetcher),
            lookup_url: params.lookup_url.clone(),
            on_change: Some(on_change),
        });
        *self.inner.resolver.borrow_mut() = Some(resolver.clone());

        if let Err(e) = resolver.load() {
            log_pipe!();
            log_error!("Configuration failed: {e:#}");
            log_indented!("Waiting for a valid configuration");
        }

        self.tick();
    }

    /// One cycle step: reschedule unless halted, then apply the current period.
    pub fn tick(&self) {
        if !self.is_halted() {
            let driver = self.clone();
            self.inner
                .params
                .host
                .set_timeout(self.inner.params.interval, Box::new(move || driver.tick()));
        }
        self.apply_logged("Cycle failed");
    }

    fn apply_logged(&self, context: &str) {
        if let Err(e) = self.apply_period() {
            log_pipe!();
            log_error!("{}: {e:#}", context);
        }
    }

    fn resolver(&self) -> Result<ResolverHandle> {
        self.inner
            .resolver
            .borrow()
            .clone()
            .ok_or_else(|| anyhow!("cycle has not started"))
    }

    /// Which period the current instant falls in.
    ///
    /// Fixed times from the configuration win over computed sunrise/sunset.
    /// Both boundaries count as day.
    pub fn determine_period(&self) -> Result<Period> {
        let resolver = self.resolver()?;
        let sun = resolver.resolve_sun()?;
        let timezone = resolver.resolve_timezone();
        let now = resolver.now().with_timezone(&timezone);

        let daylight = match resolver.fixed_times()? {
            Some(window) => Daylight::Window(window),
            None => sun.daylight(&now),
        };

        let period = daylight.period_at(&now);
        if self.inner.params.debug_enabled {
            log_pipe!();
            log_debug!("Period check");
            log_indented!("Now: {}", now);
            log_indented!("Sun: {}", daylight);
            log_indented!("Period: {}", period);
        }
        Ok(period)
    }

    /// Write the current period's settings into the preferences document.
    ///
    /// Only values that differ from what the document already holds are
    /// written, and the document is saved only when something changed.
    /// Returns whether anything was written.
    pub fn apply_period(&self) -> Result<bool> {
        let resolver = self.resolver()?;
        if !resolver.has_config() {
            return Ok(false);
        }

        let period = self.determine_period()?;
        let settings = resolver
            .period_config(period)
            .ok_or(SunCycleError::MissingPeriod(period))?;

        let params = &self.inner.params;
        let preferences = params.host.load_settings(PREFERENCES_DOCUMENT).ok_or_else(|| {
            SunCycleError::PreferencesUnavailable(PREFERENCES_DOCUMENT.to_string())
        })?;

        let updates = [
            (COLOR_SCHEME_KEY, "color scheme", settings.color_scheme.as_deref()),
            (THEME_KEY, "theme", settings.theme.as_deref()),
        ];

        let mut changed = false;
        for (key, label, wanted) in updates {
            let Some(wanted) = wanted.filter(|value| !value.is_empty()) else {
                continue;
            };
            let current = preferences.get(key);
            if current.as_ref().and_then(Value::as_str) == Some(wanted) {
                continue;
            }
            if !changed {
                log_block_start!("Switching to {} settings", period);
            }
            log_indented!("{}: {}", label, wanted);
            preferences.set(key, Value::String(wanted.to_string()));
            changed = true;
        }

        self.inner.last_period.set(Some(period));

        if changed {
            params.host.save_settings(PREFERENCES_DOCUMENT)?;
        }
        Ok(changed)
    }

    /// Halt future ticks and drop the configuration subscription.
    ///
    /// A tick that is already scheduled still runs once, but does not
    /// reschedule itself. Calling this more than once is harmless.
    pub fn stop(&self) {
        self.inner.halted.set(true);
        if let Some(resolver) = self.inner.resolver.borrow().as_ref() {
            resolver.unload();
        }
    }

    pub fn is_halted(&self) -> bool {
        self.inner.halted.get()
    }

    /// Period applied by the most recent successful tick.
    pub fn last_period(&self) -> Option<Period> {
        self.inner.last_period.get()
    }

    pub fn resolver_handle(&self) -> Option<ResolverHandle> {
        self.inner.resolver.borrow().clone()
    }
}

#[cfg(test)]
mod tests;
