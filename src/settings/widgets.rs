//! Preference widgets and the player commands that drive them.
//!
//! The player's input bindings can change settings at runtime:
//!   script-message nowplaying-rpc-toggle use_playing_status
//!   script-message nowplaying-rpc-set extra_text brb

use super::{ConfigStore, SettingsError, SettingsStore, EXTRA_TEXT, SECTION, USE_PLAYING_STATUS};

const SET_COMMAND: &str = "nowplaying-rpc-set";
const TOGGLE_COMMAND: &str = "nowplaying-rpc-toggle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
  /// Boolean switch.
  Toggle,
  /// Free text entry.
  Entry,
}

/// A typed option bound to a settings key.
#[derive(Debug, Clone, Copy)]
pub struct PreferenceWidget {
  pub label: &'static str,
  pub key: &'static str,
  pub kind: WidgetKind,
}

pub const WIDGETS: &[PreferenceWidget] = &[
  PreferenceWidget {
    label: "Use \"Playing\" instead of \"Listening\"",
    key: USE_PLAYING_STATUS,
    kind: WidgetKind::Toggle,
  },
  PreferenceWidget {
    label: "Status text suffix",
    key: EXTRA_TEXT,
    kind: WidgetKind::Entry,
  },
];

fn find_widget(key: &str) -> Result<&'static PreferenceWidget, SettingsError> {
  WIDGETS
    .iter()
    .find(|w| w.key == key)
    .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, SettingsError> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "yes" | "true" | "on" | "1" => Ok(true),
    "no" | "false" | "off" | "0" => Ok(false),
    _ => Err(SettingsError::InvalidValue {
      key: key.to_string(),
      value: raw.to_string(),
    }),
  }
}

/// Apply a settings command sent by the player.
///
/// Returns `Ok(false)` when `args` is not a settings command.
pub fn apply_command(store: &SettingsStore, args: &[String]) -> Result<bool, SettingsError> {
  let Some((command, rest)) = args.split_first() else {
    return Ok(false);
  };

  match command.as_str() {
    SET_COMMAND => {
      let Some((key, value)) = rest.split_first() else {
        return Err(SettingsError::UnknownKey(String::new()));
      };
      let widget = find_widget(key)?;
      let value = value.join(" ");
      match widget.kind {
        WidgetKind::Toggle => store.set_bool(SECTION, widget.key, parse_bool(key, &value)?),
        WidgetKind::Entry => store.set_string(SECTION, widget.key, &value),
      }
      Ok(true)
    }
    TOGGLE_COMMAND => {
      let key = rest.first().map(String::as_str).unwrap_or_default();
      let widget = find_widget(key)?;
      if widget.kind != WidgetKind::Toggle {
        return Err(SettingsError::NotAToggle(key.to_string()));
      }
      let current = store.get_bool(SECTION, widget.key);
      store.set_bool(SECTION, widget.key, !current);
      Ok(true)
    }
    _ => Ok(false),
  }
}
