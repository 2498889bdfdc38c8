//! File-backed host used by the `suncycle` binary.
//!
//! Each named settings document maps to a file in the configuration directory:
//! `<name>.toml` if present, otherwise `<name>.json`. Individual documents can
//! be pointed elsewhere with [`FileHost::with_document`], which is how the
//! editor's preferences file is wired in.
//!
//! `.sublime-settings` files are read in Sublime's own dialect, comments and
//! all, and saved by editing the changed values in place.
//!
//! Loaded documents are watched for changes. The watcher runs on notify's own
//! thread and only forwards paths to the [`EventLoop`]; reloading, comparing
//! and notifying subscribers all happen on the loop thread. Editors often write
//! a file in several steps, so a change is picked up once the file has been
//! quiet for the debounce period.

use anyhow::{Context, Result, anyhow, bail};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::time::Duration;

use super::event_loop::{EventLoop, LoopMessage};
use super::sublime;
use super::{Host, SettingsDocument};
use crate::constants::WATCH_DEBOUNCE_MS;

/// On-disk encoding of a settings document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Json,
    Sublime,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some("sublime-settings") => Ok(Self::Sublime),
            _ => bail!("Unsupported settings file type: {}", path.display()),
        }
    }

    fn parse(self, text: &str) -> Result<Map<String, Value>> {
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value = match self {
            Self::Toml => toml::from_str(text).context("Invalid TOML")?,
            Self::Json => serde_json::from_str(text).context("Invalid JSON")?,
            Self::Sublime => sublime::parse(text)?,
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => bail!("Settings must be a table of keys"),
        }
    }

    fn render(self, values: &Map<String, Value>) -> Result<String> {
        let mut text = match self {
            Self::Toml => toml::to_string(values).context("Cannot express settings as TOML")?,
            Self::Json | Self::Sublime => serde_json::to_string_pretty(values)?,
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }
}

/// A settings document backed by a file.
pub struct FileDocument {
    path: PathBuf,
    format: DocumentFormat,
    values: RefCell<Map<String, Value>>,
    // Last text read from or written to disk, and what it parsed to
    source: RefCell<String>,
    on_disk: RefCell<Map<String, Value>>,
    callbacks: RefCell<Vec<(String, Rc<dyn Fn()>)>>,
}

impl FileDocument {
    pub fn open(path: &Path) -> Result<Self> {
        let format = DocumentFormat::from_path(path)?;
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let (source, values) = read_document(&path, format)?;
        Ok(Self {
            path,
            format,
            values: RefCell::new(values.clone()),
            source: RefCell::new(source),
            on_disk: RefCell::new(values),
            callbacks: RefCell::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the in-memory values back to disk.
    pub fn save(&self) -> Result<()> {
        let values = self.values.borrow().clone();
        let patched = match self.format {
            DocumentFormat::Sublime => {
                sublime::patch(&self.source.borrow(), &self.on_disk.borrow(), &values)
            }
            DocumentFormat::Toml | DocumentFormat::Json => None,
        };
        let text = match patched {
            Some(text) => text,
            None => self.format.render(&values)?,
        };

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, &text)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        *self.source.borrow_mut() = text;
        *self.on_disk.borrow_mut() = values;
        Ok(())
    }

    /// Re-read the file. Returns whether the contents differ from memory.
    pub fn reload(&self) -> Result<bool> {
        let (source, values) = read_document(&self.path, self.format)?;
        *self.source.borrow_mut() = source;
        *self.on_disk.borrow_mut() = values.clone();
        if *self.values.borrow() == values {
            return Ok(false);
        }
        *self.values.borrow_mut() = values;
        Ok(true)
    }

    fn notify(&self) {
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

    fn is_at(&self, path: &Path) -> bool {
        path == self.path
            || (path.file_name() == self.path.file_name()
                && path.parent().and_then(|p| p.canonicalize().ok()).as_deref()
                    == self.path.parent())
    }
}

fn read_document(path: &Path, format: DocumentFormat) -> Result<(String, Map<String, Value>)> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let values = format
        .parse(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok((text, values))
}

impl SettingsDocument for FileDocument {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
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

/// Host whose documents are files and whose timers run on an [`EventLoop`].
pub struct FileHost {
    directory: PathBuf,
    overrides: HashMap<String, PathBuf>,
    documents: RefCell<HashMap<String, Rc<FileDocument>>>,
    event_loop: EventLoop,
    watcher: RefCell<Option<RecommendedWatcher>>,
    watched_dirs: RefCell<HashSet<PathBuf>>,
    pending_reloads: RefCell<HashSet<PathBuf>>,
    debounce: Duration,
    debug_enabled: bool,
}

impl FileHost {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            overrides: HashMap::new(),
            documents: RefCell::new(HashMap::new()),
            event_loop: EventLoop::new(),
            watcher: RefCell::new(None),
            watched_dirs: RefCell::new(HashSet::new()),
            pending_reloads: RefCell::new(HashSet::new()),
            debounce: Duration::from_millis(WATCH_DEBOUNCE_MS),
            debug_enabled: false,
        }
    }

    /// Serve document `name` from `path` instead of the configuration directory.
    pub fn with_document(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(name.to_string(), path.into());
        self
    }

    pub fn with_debug(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    /// Sender for threads that need to reach the loop (signal handling).
    pub fn sender(&self) -> Sender<LoopMessage> {
        self.event_loop.sender()
    }

    pub fn run_due_timers(&self) -> usize {
        self.event_loop.run_due_timers()
    }

    /// File that backs document `name`, if one exists.
    pub fn document_path(&self, name: &str) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(name) {
            return path.exists().then(|| path.clone());
        }
        ["toml", "json"]
            .iter()
            .map(|ext| self.directory.join(format!("{name}.{ext}")))
            .find(|path| path.exists())
    }

    /// Drive the loop until shutdown. `on_restart` runs for each restart request.
    pub fn run(self: &Rc<Self>, mut on_restart: impl FnMut()) {
        self.event_loop.run(|message| match message {
            LoopMessage::DocumentChanged(path) => {
                self.schedule_reload(path);
                ControlFlow::Continue(())
            }
            LoopMessage::Restart => {
                on_restart();
                ControlFlow::Continue(())
            }
            LoopMessage::Shutdown => ControlFlow::Break(()),
        });
    }

    fn schedule_reload(self: &Rc<Self>, path: PathBuf) {
        if !self.documents.borrow().values().any(|doc| doc.is_at(&path)) {
            return;
        }
        // Coalesce bursts: one reload per quiet period
        if !self.pending_reloads.borrow_mut().insert(path.clone()) {
            return;
        }
        let host = Rc::clone(self);
        self.event_loop.schedule(
            self.debounce,
            Box::new(move || {
                host.pending_reloads.borrow_mut().remove(&path);
                host.reload_path(&path);
            }),
        );
    }

    /// Re-read every document stored at `path` and notify subscribers of the
    /// ones whose contents changed.
    pub fn reload_path(&self, path: &Path) {
        let affected: Vec<Rc<FileDocument>> = self
            .documents
            .borrow()
            .values()
            .filter(|doc| doc.is_at(path))
            .cloned()
            .collect();

        for document in affected {
            match document.reload() {
                Ok(true) => {
                    if self.debug_enabled {
                        log_pipe!();
                        log_debug!("Settings file change detected");
                        log_indented!("{}", document.path().display());
                    }
                    document.notify();
                }
                Ok(false) => {}
                Err(e) => {
                    log_pipe!();
                    log_warning!("Keeping previous settings: {e:#}");
                }
            }
        }
    }

    fn watch(&self, path: &Path) -> Result<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        // Watching the directory catches editors that replace the file
        if !self.watched_dirs.borrow_mut().insert(parent.to_path_buf()) {
            return Ok(());
        }

        let mut watcher = self.watcher.borrow_mut();
        if watcher.is_none() {
            *watcher = Some(create_watcher(self.event_loop.sender())?);
        }
        if let Some(watcher) = watcher.as_mut() {
            watcher
                .watch(parent, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch directory: {}", parent.display()))?;
        }
        Ok(())
    }
}

/// `suncycle` directory under the user's configuration directory
/// (`$XDG_CONFIG_HOME` on Linux).
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("suncycle"))
        .context("Could not determine the configuration directory")
}

fn create_watcher(sender: Sender<LoopMessage>) -> Result<RecommendedWatcher> {
    RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            let Ok(event) = res else {
                return;
            };
            if matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                for path in event.paths {
                    let _ = sender.send(LoopMessage::DocumentChanged(path));
                }
            }
        },
        NotifyConfig::default(),
    )
    .context("Failed to create file watcher")
}

impl Host for FileHost {
    fn load_settings(&self, name: &str) -> Option<Rc<dyn SettingsDocument>> {
        if let Some(document) = self.documents.borrow().get(name) {
            return Some(Rc::clone(document) as Rc<dyn SettingsDocument>);
        }

        let path = self.document_path(name)?;
        let document = match FileDocument::open(&path) {
            Ok(document) => Rc::new(document),
            Err(e) => {
                log_pipe!();
                log_error!("{e:#}");
                return None;
            }
        };

        if let Err(e) = self.watch(document.path()) {
            log_pipe!();
            log_warning!("Changes to {} will not be picked up: {e:#}", name);
        }

        self.documents
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&document));
        Some(document as Rc<dyn SettingsDocument>)
    }

    fn save_settings(&self, name: &str) -> Result<()> {
        let document = self
            .documents
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("settings '{name}' are not loaded"))?;
        document.save()
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) {
        self.event_loop.schedule(delay, callback);
    }
}
