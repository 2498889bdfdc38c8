//! Cycle assembly and lifecycle.
//!
//! [`SunCycle`] is a builder over the driver's dependencies. Defaults match a
//! normal run: the real clock, HTTP lookups against the public IP service, an
//! 18 second interval and a short start-up delay. Tests and the binary swap in
//! what they need:
//!
//! ```no_run
//! use std::rc::Rc;
//! use std::time::Duration;
//! use suncycle::host::file::FileHost;
//! use suncycle::{ActiveCycle, SunCycle};
//!
//! let host = Rc::new(FileHost::new("/home/me/.config/suncycle"));
//! let mut active = ActiveCycle::new();
//! active.restart(SunCycle::new(host.clone()).with_interval(Duration::from_secs(60)));
//! host.run(|| {});
//! active.stop();
//! ```
//!
//! [`ActiveCycle`] holds at most one running driver. Starting a new one always
//! stops the previous one first, so a reload never leaves two cycles writing to
//! the same preferences.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{DEFAULT_CYCLE_INTERVAL, IP_LOOKUP_URL, STARTUP_DELAY};
use crate::driver::{CycleDriver, DriverParams};
use crate::geo::ip::{Fetch, HttpFetcher};
use crate::host::Host;
use crate::time_source::{self, TimeSource};

/// Builder for a day/night cycle.
pub struct SunCycle {
    host: Rc<dyn Host>,
    clock: Arc<dyn TimeSource>,
    fetcher: Option<Rc<dyn Fetch>>,
    lookup_url: String,
    interval: Duration,
    startup_delay: Duration,
    debug_enabled: bool,
}

impl SunCycle {
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            host,
            clock: time_source::real(),
            fetcher: None,
            lookup_url: IP_LOOKUP_URL.to_string(),
            interval: DEFAULT_CYCLE_INTERVAL,
            startup_delay: STARTUP_DELAY,
            debug_enabled: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the HTTP client used for IP lookups
    pub fn with_fetcher(mut self, fetcher: Rc<dyn Fetch>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_lookup_url(mut self, url: impl Into<String>) -> Self {
        self.lookup_url = url.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn debug(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    /// Build the driver without starting it.
    pub fn build(self) -> CycleDriver {
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Rc::new(HttpFetcher::default()) as Rc<dyn Fetch>);

        CycleDriver::new(DriverParams {
            host: self.host,
            clock: self.clock,
            fetcher,
            lookup_url: self.lookup_url,
            interval: self.interval,
            startup_delay: self.startup_delay,
            debug_enabled: self.debug_enabled,
        })
    }

    /// Build the driver and schedule its start-up.
    pub fn start(self) -> CycleDriver {
        let driver = self.build();
        driver.start();
        driver
    }
}

/// The single running cycle of a process.
#[derive(Default)]
pub struct ActiveCycle {
    current: Option<CycleDriver>,
}

impl ActiveCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop whatever is running, then start `cycle`.
    pub fn restart(&mut self, cycle: SunCycle) -> &CycleDriver {
        self.stop();
        self.current.insert(cycle.start())
    }

    /// Stop the running cycle, if any. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(driver) = self.current.take() {
            driver.stop();
        }
    }

    pub fn current(&self) -> Option<&CycleDriver> {
        self.current.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CONFIG_DOCUMENT, PREFERENCES_DOCUMENT};
    use crate::host::memory::MemoryHost;
    use crate::time_source::ManualTimeSource;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn host() -> Rc<MemoryHost> {
        crate::logger::Log::set_enabled(false);
        let host = Rc::new(MemoryHost::new());
        host.insert_document(
            CONFIG_DOCUMENT,
            json!({
                "day": {"theme": "Light"},
                "night": {"theme": "Dark"},
                "latitude": 0.0,
                "longitude": 0.0,
                "sunrise": "06:00",
                "sunset": "18:00",
            }),
        );
        host.insert_document(PREFERENCES_DOCUMENT, json!({}));
        host
    }

    fn cycle(host: &Rc<MemoryHost>) -> SunCycle {
        let clock = Arc::new(ManualTimeSource::new(
            Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap(),
        ));
        SunCycle::new(Rc::clone(host) as Rc<dyn Host>)
            .with_clock(clock)
            .with_fetcher(Rc::new(|_: &str| -> anyhow::Result<Vec<u8>> {
                anyhow::bail!("no network in tests")
            }))
            .with_interval(Duration::from_secs(5))
            .with_startup_delay(Duration::ZERO)
    }

    #[test]
    fn test_build_does_not_schedule() {
        let host = host();
        let driver = cycle(&host).build();
        assert_eq!(host.pending_timers(), 0);
        assert!(!driver.is_halted());
    }

    #[test]
    fn test_restart_stops_previous_cycle() {
        let host = host();
        let mut active = ActiveCycle::new();

        let first = active.restart(cycle(&host)).clone();
        host.fire_next();
        assert!(!first.is_halted());

        active.restart(cycle(&host));
        assert!(first.is_halted());
        assert!(active.is_running());

        active.stop();
        active.stop();
        assert!(!active.is_running());

        // Drain: halted drivers stop rescheduling
        let mut fired = 0;
        while host.fire_next() {
            fired += 1;
            assert!(fired < 10, "timers kept rescheduling after stop");
        }
    }

    #[test]
    fn test_only_one_subscription_after_restart() {
        let host = host();
        let mut active = ActiveCycle::new();
        active.restart(cycle(&host));
        host.fire_next();
        active.restart(cycle(&host));
        host.fire_next();
        host.fire_next();

        let config = host.document(CONFIG_DOCUMENT).unwrap();
        assert_eq!(config.subscriber_count(), 1);
    }
}
