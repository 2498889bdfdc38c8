use super::*;
use crate::constants::test_constants::*;
use crate::constants::{CONFIG_DOCUMENT, IP_LOOKUP_URL};
use crate::error;
use crate::geo::ip::MockFetch;
use crate::host::SettingsDocument;
use crate::host::memory::{MemoryDocument, MemoryHost};
use crate::time_source::{ManualTimeSource, parse_datetime_in_tz};
use serde_json::json;

const BERLIN: chrono_tz::Tz = chrono_tz::Europe::Berlin;

fn berlin(local: &str) -> chrono::DateTime<chrono::Utc> {
    parse_datetime_in_tz(local, BERLIN).unwrap()
}

fn fixed_config() -> serde_json::Value {
    json!({
        "day": {"theme": TEST_DAY_THEME, "color_scheme": TEST_DAY_SCHEME},
        "night": {"theme": TEST_NIGHT_THEME, "color_scheme": TEST_NIGHT_SCHEME},
        "latitude": 52.52,
        "longitude": 13.405,
        "sunrise": TEST_SUNRISE,
        "sunset": TEST_SUNSET,
    })
}

struct Fixture {
    host: Rc<MemoryHost>,
    clock: Arc<ManualTimeSource>,
    config: Rc<MemoryDocument>,
    preferences: Rc<MemoryDocument>,
    driver: CycleDriver,
}

fn fixture(config: serde_json::Value, start: &str) -> Fixture {
    crate::logger::Log::set_enabled(false);
    let host = Rc::new(MemoryHost::new());
    let config = host.insert_document(CONFIG_DOCUMENT, config);
    let preferences = host.insert_document(PREFERENCES_DOCUMENT, json!({"font_size": 11}));
    let clock = Arc::new(ManualTimeSource::new(berlin(start)));

    let driver = CycleDriver::new(DriverParams {
        host: Rc::clone(&host) as Rc<dyn Host>,
        clock: Arc::clone(&clock) as Arc<dyn TimeSource>,
        // Fixed coordinates: any lookup would panic on the unexpected call
        fetcher: Rc::new(MockFetch::new()),
        lookup_url: IP_LOOKUP_URL.to_string(),
        interval: Duration::from_secs(18),
        startup_delay: Duration::from_millis(500),
        debug_enabled: false,
    });

    Fixture {
        host,
        clock,
        config,
        preferences,
        driver,
    }
}

fn theme(document: &MemoryDocument) -> Option<String> {
    document
        .get(THEME_KEY)
        .and_then(|value| value.as_str().map(str::to_string))
}

#[test]
fn test_start_waits_for_startup_delay() {
    let f = fixture(fixed_config(), "2025-06-01 10:00:00");
    f.driver.start();
    f.driver.start();

    assert_eq!(f.host.pending_timers(), 1);
    assert_eq!(f.preferences.write_count(), 0);

    assert!(f.host.fire_next());
    assert_eq!(f.host.elapsed(), Duration::from_millis(500));
    assert_eq!(theme(&f.preferences).as_deref(), Some(TEST_DAY_THEME));
    assert_eq!(
        f.preferences.get(COLOR_SCHEME_KEY),
        Some(json!(TEST_DAY_SCHEME))
    );
    assert_eq!(f.preferences.get("font_size"), Some(json!(11)));
    assert_eq!(f.host.save_count(PREFERENCES_DOCUMENT), 1);
    assert_eq!(f.driver.last_period(), Some(Period::Day));

    // Next tick is queued one interval later
    assert_eq!(f.host.pending_timers(), 1);
    assert!(f.host.fire_next());
    assert_eq!(f.host.elapsed(), Duration::from_millis(18_500));
}

#[test]
fn test_repeated_ticks_do_not_rewrite() {
    let f = fixture(fixed_config(), "2025-06-01 10:00:00");
    f.driver.start();
    f.host.fire_next();
    let writes = f.preferences.write_count();

    for _ in 0..5 {
        f.clock.advance(chrono::Duration::seconds(18));
        f.host.fire_next();
    }

    assert_eq!(f.preferences.write_count(), writes);
    assert_eq!(f.host.save_count(PREFERENCES_DOCUMENT), 1);
}

#[test]
fn test_sunset_boundary_belongs_to_day() {
    let f = fixture(fixed_config(), "2025-06-01 19:59:59");
    f.driver.start();
    f.host.fire_next();
    assert_eq!(f.driver.last_period(), Some(Period::Day));

    f.clock.set(berlin("2025-06-01 20:00:00"));
    assert!(!f.driver.apply_period().unwrap());
    assert_eq!(f.driver.determine_period().unwrap(), Period::Day);

    f.clock.set(berlin("2025-06-01 20:00:01"));
    assert!(f.driver.apply_period().unwrap());
    assert_eq!(theme(&f.preferences).as_deref(), Some(TEST_NIGHT_THEME));
    assert_eq!(
        f.preferences.get(COLOR_SCHEME_KEY),
        Some(json!(TEST_NIGHT_SCHEME))
    );
}

#[test]
fn test_sunrise_boundary_belongs_to_day() {
    let f = fixture(fixed_config(), "2025-06-02 05:59:59");
    f.driver.start();
    f.host.fire_next();
    assert_eq!(f.driver.last_period(), Some(Period::Night));

    f.clock.set(berlin("2025-06-02 06:00:00"));
    assert_eq!(f.driver.determine_period().unwrap(), Period::Day);
}

#[test]
fn test_partial_period_leaves_other_keys_alone() {
    let f = fixture(
        json!({
            "day": {"theme": TEST_DAY_THEME, "color_scheme": TEST_DAY_SCHEME},
            "night": {"theme": TEST_NIGHT_THEME},
            "latitude": 52.52,
            "longitude": 13.405,
            "sunrise": TEST_SUNRISE,
            "sunset": TEST_SUNSET,
        }),
        "2025-06-01 12:00:00",
    );
    f.driver.start();
    f.host.fire_next();

    f.clock.set(berlin("2025-06-01 22:00:00"));
    f.driver.apply_period().unwrap();

    assert_eq!(theme(&f.preferences).as_deref(), Some(TEST_NIGHT_THEME));
    assert_eq!(
        f.preferences.get(COLOR_SCHEME_KEY),
        Some(json!(TEST_DAY_SCHEME))
    );
}

#[test]
fn test_empty_values_are_skipped() {
    let mut config = fixed_config();
    config["day"] = json!({"theme": "", "color_scheme": TEST_DAY_SCHEME});
    let f = fixture(config, "2025-06-01 12:00:00");
    f.driver.start();
    f.host.fire_next();

    assert_eq!(theme(&f.preferences), None);
    assert_eq!(f.preferences.write_count(), 1);
}

#[test]
fn test_config_change_applies_immediately() {
    let f = fixture(fixed_config(), "2025-06-01 12:00:00");
    f.driver.start();
    f.host.fire_next();
    let pending = f.host.pending_timers();

    let mut changed = fixed_config();
    changed["day"]["theme"] = json!("Adaptive.sublime-theme");
    f.config.replace(changed);

    assert_eq!(
        theme(&f.preferences).as_deref(),
        Some("Adaptive.sublime-theme")
    );
    assert_eq!(f.host.pending_timers(), pending);
}

#[test]
fn test_stop_lets_pending_tick_finish_without_rescheduling() {
    let f = fixture(fixed_config(), "2025-06-01 12:00:00");
    f.driver.start();
    f.host.fire_next();
    assert_eq!(f.config.subscriber_count(), 1);

    f.driver.stop();
    f.driver.stop();
    assert!(f.driver.is_halted());
    assert_eq!(f.config.subscriber_count(), 0);

    f.clock.set(berlin("2025-06-01 23:00:00"));
    assert!(f.host.fire_next());
    assert_eq!(theme(&f.preferences).as_deref(), Some(TEST_NIGHT_THEME));
    assert_eq!(f.host.pending_timers(), 0);
    assert!(!f.host.fire_next());
}

#[test]
fn test_stop_before_startup_never_loads() {
    let f = fixture(fixed_config(), "2025-06-01 12:00:00");
    f.driver.start();
    f.driver.stop();

    assert!(f.host.fire_next());
    assert!(f.driver.resolver_handle().is_none());
    assert_eq!(f.preferences.write_count(), 0);
    assert_eq!(f.host.pending_timers(), 0);
}

#[test]
fn test_missing_preferences_keeps_cycling() {
    let f = fixture(fixed_config(), "2025-06-01 12:00:00");
    f.host.remove_document(PREFERENCES_DOCUMENT);
    f.driver.start();
    f.host.fire_next();

    let err = f.driver.apply_period().unwrap_err();
    assert!(matches!(
        error::kind(&err),
        Some(SunCycleError::PreferencesUnavailable(_))
    ));
    assert_eq!(f.host.pending_timers(), 1);
    assert!(f.host.fire_next());
    assert_eq!(f.host.pending_timers(), 1);
}

#[test]
fn test_recovers_once_broken_config_is_fixed() {
    let f = fixture(json!({"day": {"theme": TEST_DAY_THEME}}), "2025-06-01 12:00:00");
    f.driver.start();
    f.host.fire_next();

    assert_eq!(f.preferences.write_count(), 0);
    assert!(!f.driver.apply_period().unwrap());
    assert_eq!(f.host.pending_timers(), 1);

    f.config.replace(fixed_config());
    f.host.fire_next();
    assert_eq!(theme(&f.preferences).as_deref(), Some(TEST_DAY_THEME));
}

#[test]
fn test_computed_sun_times_without_fixed_times() {
    let f = fixture(
        json!({
            "day": {"theme": TEST_DAY_THEME},
            "night": {"theme": TEST_NIGHT_THEME},
            "latitude": 52.52,
            "longitude": 13.405,
        }),
        "2025-06-21 13:00:00",
    );
    f.driver.start();
    f.host.fire_next();
    assert_eq!(f.driver.determine_period().unwrap(), Period::Day);

    // Berlin midsummer sunset is around 21:30
    f.clock.set(berlin("2025-06-21 23:30:00"));
    assert_eq!(f.driver.determine_period().unwrap(), Period::Night);

    f.clock.set(berlin("2025-06-21 03:00:00"));
    assert_eq!(f.driver.determine_period().unwrap(), Period::Night);
}

#[test]
fn test_midnight_sun_keeps_day_settings() {
    // Tromsø shares Berlin's offset
    let f = fixture(
        json!({
            "day": {"theme": TEST_DAY_THEME},
            "night": {"theme": TEST_NIGHT_THEME},
            "latitude": 69.65,
            "longitude": 18.96,
        }),
        "2025-06-21 12:00:00",
    );
    f.driver.start();
    f.host.fire_next();
    assert_eq!(theme(&f.preferences).as_deref(), Some(TEST_DAY_THEME));

    for local in ["2025-06-21 00:30:00", "2025-06-21 23:30:00"] {
        f.clock.set(berlin(local));
        assert_eq!(f.driver.determine_period().unwrap(), Period::Day, "at {local}");
    }

    f.clock.set(berlin("2025-12-21 12:00:00"));
    assert_eq!(f.driver.determine_period().unwrap(), Period::Night);
}

#[test]
fn test_operations_before_start_fail() {
    let f = fixture(fixed_config(), "2025-06-01 12:00:00");
    assert!(f.driver.determine_period().is_err());
    assert!(f.driver.apply_period().is_err());
}
