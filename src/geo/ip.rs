//! IP-based geolocation.
//!
//! The lookup service answers with a JSON object carrying `lat`, `lon` and
//! `timezone` (an IANA zone name). Getting bytes off the network goes through
//! the [`Fetch`] trait so hosts and tests can substitute their own transport.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;

use super::Coordinates;
use crate::constants::HTTP_TIMEOUT;

/// Blocking byte fetch from a URL.
#[cfg_attr(test, mockall::automock)]
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

impl<F> Fetch for F
where
    F: Fn(&str) -> Result<Vec<u8>>,
{
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self(url)
    }
}

/// [`Fetch`] over plain HTTP(S) with a bounded timeout.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(HTTP_TIMEOUT))
            .build()
            .into();
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", concat!("suncycle/", env!("CARGO_PKG_VERSION")))
            .call()
            .with_context(|| format!("Request to {url} failed"))?;

        let mut bytes = Vec::new();
        response
            .into_body()
            .into_reader()
            .read_to_end(&mut bytes)
            .with_context(|| format!("Failed to read response from {url}"))?;
        Ok(bytes)
    }
}

/// A location reported by the lookup service.
#[derive(Debug, Clone, PartialEq)]
pub struct IpLocation {
    pub coordinates: Coordinates,
    pub timezone_name: String,
}

/// What a lookup produced.
#[derive(Debug)]
pub enum LookupOutcome {
    /// The service answered with everything we need.
    Located(IpLocation),
    /// The service answered, but not with a usable location.
    Malformed(String),
    /// Nothing usable came back: transport failure or a body that is not JSON.
    Unreachable(anyhow::Error),
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    lat: Option<f64>,
    lon: Option<f64>,
    timezone: Option<String>,
}

/// Query `url` and classify the response.
pub fn lookup(fetcher: &dyn Fetch, url: &str) -> LookupOutcome {
    let body = match fetcher.fetch(url) {
        Ok(body) => body,
        Err(e) => return LookupOutcome::Unreachable(e),
    };

    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return LookupOutcome::Unreachable(
                anyhow::Error::new(e).context("Response is not valid JSON"),
            );
        }
    };

    parse_location(value)
}

fn parse_location(value: serde_json::Value) -> LookupOutcome {
    if !value.is_object() {
        return LookupOutcome::Malformed(format!("expected a JSON object, got {value}"));
    }

    let response: LookupResponse = match serde_json::from_value(value) {
        Ok(response) => response,
        Err(e) => return LookupOutcome::Malformed(e.to_string()),
    };

    match response {
        LookupResponse {
            lat: Some(latitude),
            lon: Some(longitude),
            timezone: Some(timezone_name),
        } => {
            let coordinates = Coordinates::new(latitude, longitude);
            if !coordinates.is_valid() {
                return LookupOutcome::Malformed(format!("coordinates {coordinates} out of range"));
            }
            LookupOutcome::Located(IpLocation {
                coordinates,
                timezone_name,
            })
        }
        _ => LookupOutcome::Malformed("missing lat, lon or timezone".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn respond(body: &'static str) -> impl Fn(&str) -> Result<Vec<u8>> {
        move |_url: &str| Ok(body.as_bytes().to_vec())
    }

    #[test]
    fn test_lookup_located() {
        let fetcher = respond(
            r#"{"status":"success","lat":52.52,"lon":13.405,"timezone":"Europe/Berlin","query":"203.0.113.7"}"#,
        );
        match lookup(&fetcher, "http://example.test/json") {
            LookupOutcome::Located(location) => {
                assert_eq!(location.coordinates, Coordinates::new(52.52, 13.405));
                assert_eq!(location.timezone_name, "Europe/Berlin");
            }
            other => panic!("expected a location, got {other:?}"),
        }
    }

    #[test]
    fn test_lookup_missing_fields_is_malformed() {
        let fetcher = respond(r#"{"status":"fail","message":"reserved range"}"#);
        assert!(matches!(
            lookup(&fetcher, "http://example.test/json"),
            LookupOutcome::Malformed(_)
        ));

        let fetcher = respond(r#"{"lat":"north","lon":1.0,"timezone":"UTC"}"#);
        assert!(matches!(
            lookup(&fetcher, "http://example.test/json"),
            LookupOutcome::Malformed(_)
        ));

        let fetcher = respond("[1, 2, 3]");
        assert!(matches!(
            lookup(&fetcher, "http://example.test/json"),
            LookupOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_lookup_transport_failure_is_unreachable() {
        let mut fetcher = MockFetch::new();
        fetcher
            .expect_fetch()
            .withf(|url| url.contains("example.test"))
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        assert!(matches!(
            lookup(&fetcher, "http://example.test/json"),
            LookupOutcome::Unreachable(_)
        ));
    }

    #[test]
    fn test_lookup_non_json_body_is_unreachable() {
        let fetcher = respond("<html>captive portal</html>");
        assert!(matches!(
            lookup(&fetcher, "http://example.test/json"),
            LookupOutcome::Unreachable(_)
        ));
    }
}
