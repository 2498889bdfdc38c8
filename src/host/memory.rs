//! In-memory host for tests.
//!
//! Documents live in process memory and count their writes; timers queue up
//! until a test pumps them with [`MemoryHost::fire_next`]. Nothing runs on its
//! own, which keeps tick-by-tick assertions deterministic.

use anyhow::Result;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use super::{Host, SettingsDocument};

#[derive(Default)]
pub struct MemoryDocument {
    values: RefCell<Map<String, Value>>,
    callbacks: RefCell<Vec<(String, Rc<dyn Fn()>)>>,
    writes: Cell<usize>,
}

impl MemoryDocument {
    /// Build a document from a JSON object; anything else yields an empty one.
    pub fn new(values: Value) -> Self {
        let values = match values {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            values: RefCell::new(values),
            ..Self::default()
        }
    }

    /// Swap in new contents as if edited outside the engine, then notify.
    pub fn replace(&self, values: Value) {
        *self.values.borrow_mut() = match values {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let callbacks: Vec<Rc<dyn Fn()>> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Number of `set` calls made through the [`SettingsDocument`] interface.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.borrow().len()
    }
}

impl SettingsDocument for MemoryDocument {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.writes.set(self.writes.get() + 1);
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    fn add_on_change(&self, token: &str, callback: Rc<dyn Fn()>) {
        let mut callbacks = self.callbacks.borrow_mut();
        callbacks.retain(|(existing, _)| existing != token);
        callbacks.push((token.to_string(), callback));
    }

    fn clear_on_change(&self, token: &str) {
        self.callbacks
            .borrow_mut()
            .retain(|(existing, _)| existing != token);
    }
}

struct PendingTimer {
    due: Duration,
    seq: u64,
    callback: Box<dyn FnOnce()>,
}

/// Host whose documents and timers live entirely in memory.
#[derive(Default)]
pub struct MemoryHost {
    documents: RefCell<HashMap<String, Rc<MemoryDocument>>>,
    saves: RefCell<HashMap<String, usize>>,
    timers: RefCell<Vec<PendingTimer>>,
    elapsed: Cell<Duration>,
    next_seq: Cell<u64>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&self, name: &str, values: Value) -> Rc<MemoryDocument> {
        let document = Rc::new(MemoryDocument::new(values));
        self.documents
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&document));
        document
    }

    pub fn remove_document(&self, name: &str) {
        self.documents.borrow_mut().remove(name);
    }

    pub fn document(&self, name: &str) -> Option<Rc<MemoryDocument>> {
        self.documents.borrow().get(name).cloned()
    }

    pub fn save_count(&self, name: &str) -> usize {
        self.saves.borrow().get(name).copied().unwrap_or(0)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Host time that has passed according to fired timers.
    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    /// Run the earliest pending timer. Returns false when none is queued.
    pub fn fire_next(&self) -> bool {
        let timer = {
            let mut timers = self.timers.borrow_mut();
            let Some(index) = timers
                .iter()
                .enumerate()
                .min_by_key(|(_, timer)| (timer.due, timer.seq))
                .map(|(index, _)| index)
            else {
                return false;
            };
            timers.remove(index)
        };

        self.elapsed.set(timer.due);
        (timer.callback)();
        true
    }
}

impl Host for MemoryHost {
    fn load_settings(&self, name: &str) -> Option<Rc<dyn SettingsDocument>> {
        self.document(name)
            .map(|document| document as Rc<dyn SettingsDocument>)
    }

    fn save_settings(&self, name: &str) -> Result<()> {
        if !self.documents.borrow().contains_key(name) {
            anyhow::bail!("No settings document named '{name}'");
        }
        *self.saves.borrow_mut().entry(name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.timers.borrow_mut().push(PendingTimer {
            due: self.elapsed.get() + delay,
            seq,
            callback,
        });
    }
}
