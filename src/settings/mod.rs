//! Namespaced key/value settings with change notification.
//!
//! - `widgets.rs` - declarative preference widgets bound to setting keys

mod widgets;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

pub use widgets::{apply_command, PreferenceWidget, WidgetKind, WIDGETS};

/// Settings section owned by the presence feature.
pub const SECTION: &str = "nowplaying-rpc";

/// Free-form text appended to the status line.
pub const EXTRA_TEXT: &str = "extra_text";

/// Use Discord's "Playing" vocabulary instead of "Listening".
pub const USE_PLAYING_STATUS: &str = "use_playing_status";

/// Defaults registered for [`SECTION`].
pub fn presence_defaults() -> Vec<(&'static str, Value)> {
  vec![
    (EXTRA_TEXT, Value::String(String::new())),
    (USE_PLAYING_STATUS, Value::Bool(false)),
  ]
}

#[derive(Error, Debug)]
pub enum SettingsError {
  #[error("Failed to read settings: {0}")]
  Io(#[from] std::io::Error),
  #[error("Invalid settings file: {0}")]
  Json(#[from] serde_json::Error),
  #[error("Unknown setting: {0}")]
  UnknownKey(String),
  #[error("Setting {0} is not a toggle")]
  NotAToggle(String),
  #[error("Invalid value for {key}: {value}")]
  InvalidValue { key: String, value: String },
}

/// Handle returned by [`ConfigStore::watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Called with `(section, key)` after a watched value changed.
pub type ChangeCallback = Rc<dyn Fn(&str, &str)>;

/// Read access to configuration plus change notification.
pub trait ConfigStore {
  /// Boolean value, `false` when unset or not a boolean.
  fn get_bool(&self, section: &str, key: &str) -> bool;

  /// String value, empty when unset.
  fn get_string(&self, section: &str, key: &str) -> String;

  fn watch(&self, section: &str, key: &str, callback: ChangeCallback) -> WatchId;

  fn unwatch(&self, id: WatchId);
}

type Sections = BTreeMap<String, BTreeMap<String, Value>>;

struct Watch {
  id: WatchId,
  section: String,
  key: String,
  callback: ChangeCallback,
}

/// JSON-file backed settings store.
///
/// Layout on disk is `{"section": {"key": value}}`. Defaults are kept apart
/// and never written out.
pub struct SettingsStore {
  path: Option<PathBuf>,
  values: RefCell<Sections>,
  defaults: RefCell<Sections>,
  watches: RefCell<Vec<Watch>>,
  next_watch: Cell<u64>,
}

impl SettingsStore {
  /// Store that lives only in memory.
  pub fn in_memory() -> Self {
    Self {
      path: None,
      values: RefCell::new(Sections::new()),
      defaults: RefCell::new(Sections::new()),
      watches: RefCell::new(Vec::new()),
      next_watch: Cell::new(0),
    }
  }

  /// Open the store at `path`. A missing file yields an empty store.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
    let path = path.into();
    let values = if path.exists() {
      let raw = std::fs::read_to_string(&path)?;
      if raw.trim().is_empty() {
        Sections::new()
      } else {
        serde_json::from_str(&raw)?
      }
    } else {
      log::info!("No settings file at {:?}, starting with defaults", path);
      Sections::new()
    };

    let mut store = Self::in_memory();
    store.path = Some(path);
    *store.values.get_mut() = values;
    Ok(store)
  }

  /// Default location under the user's config directory.
  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SECTION).join("settings.json"))
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  /// Register defaults for keys that have no stored value.
  pub fn set_defaults(&self, section: &str, defaults: &[(&str, Value)]) {
    let mut all = self.defaults.borrow_mut();
    let entry = all.entry(section.to_string()).or_default();
    for (key, value) in defaults {
      entry.insert((*key).to_string(), value.clone());
    }
  }

  fn lookup(&self, section: &str, key: &str) -> Option<Value> {
    let stored = self
      .values
      .borrow()
      .get(section)
      .and_then(|s| s.get(key))
      .cloned();
    stored.or_else(|| {
      self
        .defaults
        .borrow()
        .get(section)
        .and_then(|s| s.get(key))
        .cloned()
    })
  }

  pub fn set_bool(&self, section: &str, key: &str, value: bool) {
    self.set_value(section, key, Value::Bool(value));
  }

  pub fn set_string(&self, section: &str, key: &str, value: &str) {
    self.set_value(section, key, Value::String(value.to_string()));
  }

  fn set_value(&self, section: &str, key: &str, value: Value) {
    if self.lookup(section, key).as_ref() == Some(&value) {
      log::debug!("Setting {}.{} unchanged", section, key);
      return;
    }

    self
      .values
      .borrow_mut()
      .entry(section.to_string())
      .or_default()
      .insert(key.to_string(), value);
    log::info!("Setting {}.{} updated", section, key);

    if let Err(e) = self.save() {
      log::warn!("Failed to save settings: {}", e);
    }

    self.notify(section, key);
  }

  fn notify(&self, section: &str, key: &str) {
    let callbacks: Vec<ChangeCallback> = self
      .watches
      .borrow()
      .iter()
      .filter(|w| w.section == section && w.key == key)
      .map(|w| w.callback.clone())
      .collect();

    for callback in callbacks {
      callback(section, key);
    }
  }

  /// Write stored values to disk. No-op for in-memory stores.
  pub fn save(&self) -> Result<(), SettingsError> {
    let Some(path) = &self.path else {
      return Ok(());
    };

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&*self.values.borrow())?;
    std::fs::write(path, json)?;
    Ok(())
  }
}

impl ConfigStore for SettingsStore {
  fn get_bool(&self, section: &str, key: &str) -> bool {
    self
      .lookup(section, key)
      .and_then(|v| v.as_bool())
      .unwrap_or(false)
  }

  fn get_string(&self, section: &str, key: &str) -> String {
    match self.lookup(section, key) {
      Some(Value::String(s)) => s,
      Some(Value::Null) | None => String::new(),
      Some(other) => other.to_string(),
    }
  }

  fn watch(&self, section: &str, key: &str, callback: ChangeCallback) -> WatchId {
    let id = WatchId(self.next_watch.get());
    self.next_watch.set(id.0 + 1);
    self.watches.borrow_mut().push(Watch {
      id,
      section: section.to_string(),
      key: key.to_string(),
      callback,
    });
    id
  }

  fn unwatch(&self, id: WatchId) {
    self.watches.borrow_mut().retain(|w| w.id != id);
  }
}
