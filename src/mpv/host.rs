//! mpv as the presence host: property cache, event translation and the
//! `MetadataAccessor` view over it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use async_channel::Receiver;
use serde_json::Value;
use thiserror::Error;

use super::ipc::{IpcError, MpvIpc};
use super::protocol::{MpvCommand, MpvEvent, OBSERVED_PROPERTIES};
use crate::player::{LocalEventBus, MetadataAccessor, PlayerEvent, TrackTuple};

#[derive(Error, Debug)]
pub enum MpvError {
  #[error("IPC error: {0}")]
  Ipc(#[from] IpcError),
  #[error("mpv command failed: {0}")]
  CommandFailed(String),
}

/// What a call to [`MpvHost::pump`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
  /// A lifecycle event, already emitted on the host's bus.
  Player(PlayerEvent),
  /// `script-message` arguments addressed to clients.
  Message(Vec<String>),
}

/// Cached player state, updated from mpv events.
#[derive(Debug, Default)]
struct PlaybackState {
  loaded: bool,
  idle: bool,
  paused: bool,
  seeking: bool,
  time_pos: Option<f64>,
  duration: Option<f64>,
  /// Tags with lowercased keys.
  metadata: BTreeMap<String, String>,
  media_title: Option<String>,
  path: Option<String>,
}

fn parse_metadata(value: Option<&Value>) -> BTreeMap<String, String> {
  let Some(Value::Object(map)) = value else {
    return BTreeMap::new();
  };

  map
    .iter()
    .filter_map(|(key, value)| {
      let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => return None,
        other => other.to_string(),
      };
      Some((key.to_lowercase(), text))
    })
    .collect()
}

fn as_string(value: Option<&Value>) -> Option<String> {
  value.and_then(Value::as_str).map(str::to_string)
}

impl PlaybackState {
  /// Store a property value. Returns the player event the change implies.
  fn set_property(&mut self, name: &str, value: Option<&Value>) -> Option<PlayerEvent> {
    match name {
      "pause" => {
        let paused = value.and_then(Value::as_bool).unwrap_or(false);
        let changed = paused != self.paused;
        self.paused = paused;
        match (changed && self.loaded, paused) {
          (true, true) => Some(PlayerEvent::PlaybackPause),
          (true, false) => Some(PlayerEvent::PlaybackUnpause),
          _ => None,
        }
      }
      "time-pos" => {
        self.time_pos = value.and_then(Value::as_f64);
        None
      }
      "duration" => {
        self.duration = value.and_then(Value::as_f64);
        None
      }
      "metadata" => {
        let metadata = parse_metadata(value);
        let changed = metadata != self.metadata;
        self.metadata = metadata;
        (changed && self.loaded).then_some(PlayerEvent::TitleChange)
      }
      "media-title" => {
        let title = as_string(value);
        let changed = title != self.media_title;
        self.media_title = title;
        (changed && self.loaded).then_some(PlayerEvent::TitleChange)
      }
      "idle-active" => {
        let idle = value.and_then(Value::as_bool).unwrap_or(false);
        let entered = idle && !self.idle;
        self.idle = idle;
        if entered {
          self.loaded = false;
          Some(PlayerEvent::PlaylistEndReached)
        } else {
          None
        }
      }
      "path" => {
        self.path = as_string(value);
        None
      }
      _ => None,
    }
  }

  fn apply(&mut self, event: &MpvEvent) -> Option<HostEvent> {
    let player_event = match event.event.as_str() {
      "property-change" => {
        let name = event.name.as_deref()?;
        self.set_property(name, event.value())
      }
      "start-file" => {
        self.seeking = false;
        None
      }
      "file-loaded" => {
        self.loaded = true;
        self.idle = false;
        Some(PlayerEvent::PlaybackReady)
      }
      "end-file" => {
        self.loaded = false;
        self.seeking = false;
        match event.reason.as_deref() {
          Some("eof") => Some(PlayerEvent::PlaybackEnd),
          Some("redirect") => None,
          _ => Some(PlayerEvent::PlaybackStop),
        }
      }
      "seek" => {
        self.seeking = self.loaded;
        None
      }
      "playback-restart" => {
        let seeked = std::mem::take(&mut self.seeking);
        seeked.then_some(PlayerEvent::PlaybackSeek)
      }
      "client-message" => {
        return Some(HostEvent::Message(event.args.clone().unwrap_or_default()));
      }
      _ => None,
    };

    player_event.map(HostEvent::Player)
  }

  fn title(&self) -> String {
    ["title", "icy-title"]
      .iter()
      .find_map(|key| self.metadata.get(*key).filter(|t| !t.is_empty()).cloned())
      .or_else(|| self.media_title.clone())
      .unwrap_or_default()
  }

  fn track(&self) -> Option<TrackTuple> {
    if !self.loaded {
      return None;
    }

    Some(TrackTuple {
      title: self.title(),
      artist: self.metadata.get("artist").cloned(),
      album: self.metadata.get("album").cloned(),
      duration_ms: self.duration.map_or(-1, |d| (d * 1000.0).round() as i64),
    })
  }
}

/// A connected mpv instance acting as the player.
pub struct MpvHost {
  ipc: MpvIpc,
  events: Receiver<MpvEvent>,
  state: RefCell<PlaybackState>,
  bus: Rc<LocalEventBus>,
}

impl MpvHost {
  /// Connect to mpv's IPC server at `path` and start observing it.
  pub async fn connect(path: &str, retry_count: u32) -> Result<Self, MpvError> {
    let ipc = MpvIpc::connect(path, retry_count).await?;
    log::info!("Connected to mpv at {}", path);
    Self::attach(ipc).await
  }

  pub(crate) async fn attach(ipc: MpvIpc) -> Result<Self, MpvError> {
    let host = Self {
      events: ipc.events(),
      ipc,
      state: RefCell::new(PlaybackState::default()),
      bus: Rc::new(LocalEventBus::new()),
    };
    host.observe().await?;
    host.sync().await;
    Ok(host)
  }

  async fn observe(&self) -> Result<(), MpvError> {
    for (id, name) in OBSERVED_PROPERTIES {
      let response = self.ipc.send_command(MpvCommand::observe_property(id, name)).await?;
      if !response.is_success() {
        return Err(MpvError::CommandFailed(format!("observe {}: {}", name, response.error)));
      }
    }
    Ok(())
  }

  /// Read the current values so a file that was already playing counts as
  /// loaded.
  async fn sync(&self) {
    for (_, name) in OBSERVED_PROPERTIES {
      let value = match self.ipc.send_command(MpvCommand::get_property(name)).await {
        Ok(response) if response.is_success() => response.data,
        Ok(_) => None,
        Err(e) => {
          log::warn!("Failed to read mpv property {}: {}", name, e);
          None
        }
      };
      self.state.borrow_mut().set_property(name, value.as_ref());
    }

    let mut state = self.state.borrow_mut();
    state.loaded = state.path.is_some() && !state.idle;
    log::debug!("Initial mpv state: {:?}", *state);
  }

  /// Bus on which translated player events are emitted.
  pub fn bus(&self) -> Rc<LocalEventBus> {
    self.bus.clone()
  }

  /// Wait for the next meaningful mpv event. Player events are emitted on
  /// the bus before being returned. `None` once mpv has gone away.
  pub async fn pump(&self) -> Option<HostEvent> {
    loop {
      let event = self.events.recv().await.ok()?;
      let translated = self.state.borrow_mut().apply(&event);
      match translated {
        Some(HostEvent::Player(player_event)) => {
          log::debug!("mpv {} -> {}", event.event, player_event);
          self.bus.emit(player_event);
          return Some(HostEvent::Player(player_event));
        }
        Some(message) => return Some(message),
        None => continue,
      }
    }
  }

  pub fn close(&self) {
    self.ipc.close();
  }
}

impl MetadataAccessor for MpvHost {
  fn is_ready(&self) -> bool {
    self.state.borrow().loaded
  }

  fn is_playing(&self) -> bool {
    let state = self.state.borrow();
    state.loaded && !state.idle
  }

  fn is_paused(&self) -> bool {
    self.state.borrow().paused
  }

  fn elapsed_ms(&self) -> i64 {
    self
      .state
      .borrow()
      .time_pos
      .map_or(0, |t| (t * 1000.0).round() as i64)
  }

  fn track(&self) -> Option<TrackTuple> {
    self.state.borrow().track()
  }
}
