//! Pure mapping from player state to a presence record.

use crate::player::MetadataAccessor;
use crate::settings::{ConfigStore, EXTRA_TEXT, SECTION, USE_PLAYING_STATUS};

use super::record::{status_line, truncate_text, ActivityKind, PresenceRecord, StatusGlyph};

/// User options that shape the record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresenceSettings {
  pub use_playing_status: bool,
  pub extra_text: String,
}

impl PresenceSettings {
  /// Read the current options from `store`.
  pub fn load(store: &dyn ConfigStore) -> Self {
    Self {
      use_playing_status: store.get_bool(SECTION, USE_PLAYING_STATUS),
      extra_text: store.get_string(SECTION, EXTRA_TEXT),
    }
  }

  /// Activity kind selected by the `use_playing_status` toggle.
  pub fn activity_kind(&self) -> ActivityKind {
    if self.use_playing_status {
      ActivityKind::Playing
    } else {
      ActivityKind::Listening
    }
  }
}

/// Build the presence record for the player's current state.
///
/// Total: anything missing degrades to the stopped record. `now` is the
/// current Unix time in seconds.
pub fn reduce(player: &dyn MetadataAccessor, settings: &PresenceSettings, now: i64) -> PresenceRecord {
  let activity_kind = settings.activity_kind();

  if !player.is_ready() || !player.is_playing() {
    return PresenceRecord::stopped(activity_kind, &settings.extra_text);
  }
  let Some(track) = player.track() else {
    return PresenceRecord::stopped(activity_kind, &settings.extra_text);
  };

  let paused = player.is_paused();
  let elapsed_secs = player.elapsed_ms().max(0) / 1000;

  let (primary_text, secondary_text, tertiary_text) = if settings.use_playing_status {
    let full_title = match &track.artist {
      Some(artist) => format!("{} - {}", track.title, artist),
      None => track.title.clone(),
    };
    (
      truncate_text(&full_title),
      track.album.as_deref().map(truncate_text).unwrap_or_default(),
      String::new(),
    )
  } else {
    (
      truncate_text(&track.title),
      track.artist.as_deref().map(truncate_text).unwrap_or_default(),
      track.album.as_deref().map(truncate_text).unwrap_or_default(),
    )
  };

  let (start_epoch, end_epoch) = if paused {
    (0, 0)
  } else if track.duration_ms < 0 {
    (now - elapsed_secs, 0)
  } else {
    let remaining = (track.duration_ms / 1000 - elapsed_secs).max(0);
    (0, now + remaining)
  };

  let (status_glyph, label) = if paused {
    (StatusGlyph::Pause, "Paused")
  } else {
    (StatusGlyph::Play, "Listening")
  };

  PresenceRecord {
    activity_kind,
    primary_text,
    secondary_text,
    tertiary_text,
    status_glyph,
    status_text: status_line(label, &settings.extra_text),
    start_epoch,
    end_epoch,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::player::TrackTuple;
  use crate::presence::record::MAX_TEXT_LEN;

  const NOW: i64 = 1_700_000_000;

  #[derive(Clone)]
  struct Snapshot {
    ready: bool,
    playing: bool,
    paused: bool,
    elapsed_ms: i64,
    track: Option<TrackTuple>,
  }

  impl MetadataAccessor for Snapshot {
    fn is_ready(&self) -> bool {
      self.ready
    }
    fn is_playing(&self) -> bool {
      self.playing
    }
    fn is_paused(&self) -> bool {
      self.paused
    }
    fn elapsed_ms(&self) -> i64 {
      self.elapsed_ms
    }
    fn track(&self) -> Option<TrackTuple> {
      self.track.clone()
    }
  }

  fn song() -> Snapshot {
    Snapshot {
      ready: true,
      playing: true,
      paused: false,
      elapsed_ms: 50_000,
      track: Some(TrackTuple {
        title: "Song A".to_string(),
        artist: Some("Artist B".to_string()),
        album: Some("Album C".to_string()),
        duration_ms: 200_000,
      }),
    }
  }

  fn settings(use_playing_status: bool, extra_text: &str) -> PresenceSettings {
    PresenceSettings {
      use_playing_status,
      extra_text: extra_text.to_string(),
    }
  }

  #[test]
  fn test_listening_vocabulary() {
    let record = reduce(&song(), &settings(false, ""), NOW);

    assert_eq!(record.activity_kind, ActivityKind::Listening);
    assert_eq!(record.primary_text, "Song A");
    assert_eq!(record.secondary_text, "Artist B");
    assert_eq!(record.tertiary_text, "Album C");
    assert_eq!(record.status_glyph, StatusGlyph::Play);
    assert_eq!(record.status_text, "Listening");
    assert_eq!(record.start_epoch, 0);
    assert_eq!(record.end_epoch, NOW + 150);
  }

  #[test]
  fn test_playing_vocabulary() {
    let record = reduce(&song(), &settings(true, ""), NOW);

    assert_eq!(record.activity_kind, ActivityKind::Playing);
    assert_eq!(record.primary_text, "Song A - Artist B");
    assert_eq!(record.secondary_text, "Album C");
    assert_eq!(record.tertiary_text, "");
  }

  #[test]
  fn test_stopped_regardless_of_metadata() {
    let mut not_playing = song();
    not_playing.playing = false;
    let mut not_ready = song();
    not_ready.ready = false;
    let mut no_track = song();
    no_track.track = None;

    for player in [not_playing, not_ready, no_track] {
      let record = reduce(&player, &settings(false, "brb"), NOW);
      assert_eq!(record, PresenceRecord::stopped(ActivityKind::Listening, "brb"));
      assert_eq!(record.status_text, "Stopped brb");
      assert_eq!(record.status_glyph, StatusGlyph::Stop);
      assert_eq!((record.start_epoch, record.end_epoch), (0, 0));
    }
  }

  #[test]
  fn test_stopped_keeps_configured_kind() {
    let mut player = song();
    player.playing = false;
    let record = reduce(&player, &settings(true, ""), NOW);
    assert_eq!(record.activity_kind, ActivityKind::Playing);
  }

  #[test]
  fn test_unknown_duration_counts_up() {
    let mut player = song();
    player.track.as_mut().unwrap().duration_ms = -1;
    let record = reduce(&player, &settings(false, ""), NOW);
    assert_eq!(record.start_epoch, NOW - 50);
    assert_eq!(record.end_epoch, 0);
  }

  #[test]
  fn test_other_negative_duration_treated_as_unknown() {
    let mut player = song();
    player.track.as_mut().unwrap().duration_ms = -42;
    let record = reduce(&player, &settings(false, ""), NOW);
    assert_eq!(record.start_epoch, NOW - 50);
    assert_eq!(record.end_epoch, 0);
  }

  #[test]
  fn test_paused_hides_progress() {
    for duration_ms in [-1, 200_000] {
      let mut player = song();
      player.paused = true;
      player.track.as_mut().unwrap().duration_ms = duration_ms;

      let record = reduce(&player, &settings(false, "afk"), NOW);
      assert_eq!((record.start_epoch, record.end_epoch), (0, 0));
      assert_eq!(record.status_glyph, StatusGlyph::Pause);
      assert_eq!(record.status_text, "Paused afk");
    }
  }

  #[test]
  fn test_overrun_position_does_not_count_into_past() {
    let mut player = song();
    player.elapsed_ms = 250_000;
    let record = reduce(&player, &settings(false, ""), NOW);
    assert_eq!(record.end_epoch, NOW);
  }

  #[test]
  fn test_absent_artist_has_no_separator() {
    let mut player = song();
    player.track.as_mut().unwrap().artist = None;

    let record = reduce(&player, &settings(true, ""), NOW);
    assert_eq!(record.primary_text, "Song A");

    let record = reduce(&player, &settings(false, ""), NOW);
    assert_eq!(record.secondary_text, "");
  }

  #[test]
  fn test_blank_artist_is_kept() {
    let mut player = song();
    player.track.as_mut().unwrap().artist = Some(String::new());

    let record = reduce(&player, &settings(true, ""), NOW);
    assert_eq!(record.primary_text, "Song A - ");
  }

  #[test]
  fn test_long_multibyte_fields_truncated() {
    let long = "ü".repeat(300);
    let mut player = song();
    player.track = Some(TrackTuple {
      title: long.clone(),
      artist: Some(long.clone()),
      album: Some(long.clone()),
      duration_ms: 200_000,
    });

    for use_playing_status in [false, true] {
      let record = reduce(&player, &settings(use_playing_status, &long), NOW);
      for text in [
        &record.primary_text,
        &record.secondary_text,
        &record.tertiary_text,
        &record.status_text,
      ] {
        assert!(text.chars().count() <= MAX_TEXT_LEN);
        assert!(text.is_empty() || long.starts_with(text.as_str()) || text.starts_with("Listening"));
      }
    }
  }

  #[test]
  fn test_activity_kind_follows_toggle() {
    assert_eq!(settings(false, "").activity_kind(), ActivityKind::Listening);
    assert_eq!(settings(true, "").activity_kind(), ActivityKind::Playing);
  }

  #[test]
  fn test_toggling_vocabulary_changes_next_reduction() {
    let player = song();
    let before = reduce(&player, &settings(false, ""), NOW);
    let after = reduce(&player, &settings(true, ""), NOW);

    assert_ne!(before.activity_kind, after.activity_kind);
    assert_ne!(before.primary_text, after.primary_text);
  }

  #[test]
  fn test_settings_load_from_store() {
    let store = crate::settings::SettingsStore::in_memory();
    store.set_bool(SECTION, USE_PLAYING_STATUS, true);
    store.set_string(SECTION, EXTRA_TEXT, "brb");

    let loaded = PresenceSettings::load(&store);
    assert_eq!(loaded, settings(true, "brb"));
  }
}
