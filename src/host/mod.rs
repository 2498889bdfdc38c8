//! Host integration traits.
//!
//! suncycle never talks to an editor directly. Everything it needs from the
//! surrounding application goes through [`Host`]: loading named settings
//! documents, saving them, and scheduling single-shot callbacks on the host's
//! own loop. All callbacks run on that loop, one at a time, so the engine keeps
//! its state in `Rc`/`RefCell` rather than behind locks.
//!
//! ## Implementations
//!
//! - [`file`]: settings documents on disk with a file watcher and a
//!   single-threaded timer loop, used by the `suncycle` binary
//! - [`sublime`]: reading and editing Sublime Text's commented settings files
//! - `memory`: in-process documents and a manually pumped timer queue for
//!   tests (behind the `testing-support` feature)

pub mod event_loop;
pub mod file;
pub mod sublime;
#[cfg(any(test, feature = "testing-support"))]
pub mod memory;

use anyhow::Result;
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;

/// A loaded key/value settings document.
///
/// Mutation goes through `&self`: documents are shared between the host and
/// the engine, and the host decides when changes reach storage
/// ([`Host::save_settings`]).
pub trait SettingsDocument {
    fn get(&self, key: &str) -> Option<Value>;

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn set(&self, key: &str, value: Value);

    /// Register `callback` to run whenever the document changes underneath us.
    /// Re-registering under the same token replaces the previous callback.
    fn add_on_change(&self, token: &str, callback: Rc<dyn Fn()>);

    /// Remove the callback registered under `token`, if any.
    fn clear_on_change(&self, token: &str);
}

/// The surrounding application.
pub trait Host {
    /// Load (or return the already loaded) document called `name`.
    /// `None` means the host has no such document available.
    fn load_settings(&self, name: &str) -> Option<Rc<dyn SettingsDocument>>;

    /// Persist the in-memory state of document `name`.
    fn save_settings(&self, name: &str) -> Result<()>;

    /// Run `callback` once on the host loop after `delay`.
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>);
}
