//! Player-facing interfaces: metadata reads and lifecycle events.
//!
//! - `bus.rs` - single-threaded event bus used by host backends

mod bus;

use std::rc::Rc;

pub use bus::LocalEventBus;

/// Track information exposed by the player.
///
/// `None` for `artist`/`album` means the tag is absent; an empty string is a
/// tag that is present but blank.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackTuple {
  pub title: String,
  pub artist: Option<String>,
  pub album: Option<String>,
  /// Track length in milliseconds, `-1` when unknown (live streams).
  pub duration_ms: i64,
}

/// Read access to the player's volatile playback state.
pub trait MetadataAccessor {
  /// A track is loaded and its metadata can be read.
  fn is_ready(&self) -> bool;

  /// Playback is active (possibly paused).
  fn is_playing(&self) -> bool;

  fn is_paused(&self) -> bool;

  /// Playback position in milliseconds.
  fn elapsed_ms(&self) -> i64;

  /// Metadata of the current track, if any.
  fn track(&self) -> Option<TrackTuple>;
}

/// Player lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEvent {
  PlaybackReady,
  PlaybackEnd,
  PlaybackStop,
  PlaybackPause,
  PlaybackUnpause,
  PlaybackSeek,
  PlaylistEndReached,
  TitleChange,
}

impl PlayerEvent {
  pub const ALL: [PlayerEvent; 8] = [
    PlayerEvent::PlaybackReady,
    PlayerEvent::PlaybackEnd,
    PlayerEvent::PlaybackStop,
    PlayerEvent::PlaybackPause,
    PlayerEvent::PlaybackUnpause,
    PlayerEvent::PlaybackSeek,
    PlayerEvent::PlaylistEndReached,
    PlayerEvent::TitleChange,
  ];

  /// Hook name of the event.
  pub fn name(self) -> &'static str {
    match self {
      PlayerEvent::PlaybackReady => "playback ready",
      PlayerEvent::PlaybackEnd => "playback end",
      PlayerEvent::PlaybackStop => "playback stop",
      PlayerEvent::PlaybackPause => "playback pause",
      PlayerEvent::PlaybackUnpause => "playback unpause",
      PlayerEvent::PlaybackSeek => "playback seek",
      PlayerEvent::PlaylistEndReached => "playlist end reached",
      PlayerEvent::TitleChange => "title change",
    }
  }

  /// Whether the event means nothing is playing anymore.
  pub fn is_stop(self) -> bool {
    matches!(self, PlayerEvent::PlaybackStop | PlayerEvent::PlaylistEndReached)
  }
}

impl std::fmt::Display for PlayerEvent {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub type EventHandler = Rc<dyn Fn(PlayerEvent)>;

/// Typed subscription interface to the host's event notifications.
pub trait EventBus {
  fn subscribe(&self, event: PlayerEvent, handler: EventHandler) -> SubscriptionId;

  /// Remove a subscription. Unknown ids are ignored.
  fn unsubscribe(&self, id: SubscriptionId);
}
