//! Error taxonomy shared by the resolver and the cycle driver.
//!
//! Functions return `anyhow::Result` and attach context as they go; callers
//! that need to tell failures apart downcast to [`SunCycleError`].

use thiserror::Error;

use crate::period::Period;

#[derive(Debug, Error)]
pub enum SunCycleError {
    /// A required period section is absent from the configuration.
    #[error("missing {0} setting")]
    MissingPeriod(Period),

    /// A configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No location could ever be established.
    #[error("no coordinates")]
    NoCoordinates,

    /// The host could not provide the configuration document.
    #[error("settings document '{0}' is not available")]
    SettingsUnavailable(String),

    /// The host preference store is not loaded.
    #[error("preferences '{0}' not loaded")]
    PreferencesUnavailable(String),
}

/// Returns the typed error at the root of an `anyhow` chain, if any.
pub fn kind(error: &anyhow::Error) -> Option<&SunCycleError> {
    error.chain().find_map(|cause| cause.downcast_ref::<SunCycleError>())
}
