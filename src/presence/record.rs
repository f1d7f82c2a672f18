//! The presence record pushed to the status service.

/// Maximum length (in characters) of any text field accepted by Discord.
pub const MAX_TEXT_LEN: usize = 127;

/// Image key shown as the large activity image.
pub const LARGE_IMAGE_KEY: &str = "logo";

/// High-level activity category, selects the verb Discord shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityKind {
  #[default]
  Listening,
  Playing,
}

/// Small icon describing the playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusGlyph {
  Play,
  Pause,
  #[default]
  Stop,
}

impl StatusGlyph {
  /// Asset key of the small image.
  pub fn image_key(self) -> &'static str {
    match self {
      StatusGlyph::Play => "play",
      StatusGlyph::Pause => "pause",
      StatusGlyph::Stop => "stop",
    }
  }
}

/// Normalized presence derived from the player state.
///
/// `start_epoch` and `end_epoch` are Unix timestamps in seconds; zero means
/// unset. At most one of them is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresenceRecord {
  pub activity_kind: ActivityKind,
  pub primary_text: String,
  pub secondary_text: String,
  pub tertiary_text: String,
  pub status_glyph: StatusGlyph,
  pub status_text: String,
  pub start_epoch: i64,
  pub end_epoch: i64,
}

impl PresenceRecord {
  /// Record pushed once when the session opens.
  pub fn initial(activity_kind: ActivityKind, extra_text: &str) -> Self {
    Self {
      activity_kind,
      primary_text: "Waiting...".to_string(),
      secondary_text: "Initialized".to_string(),
      tertiary_text: String::new(),
      status_glyph: StatusGlyph::Stop,
      status_text: status_line("Stopped", extra_text),
      start_epoch: 0,
      end_epoch: 0,
    }
  }

  /// Record shown when nothing is playing.
  pub fn stopped(activity_kind: ActivityKind, extra_text: &str) -> Self {
    Self {
      activity_kind,
      primary_text: String::new(),
      secondary_text: "Stopped".to_string(),
      tertiary_text: String::new(),
      status_glyph: StatusGlyph::Stop,
      status_text: status_line("Stopped", extra_text),
      start_epoch: 0,
      end_epoch: 0,
    }
  }

  /// Whether a progress bar (elapsed or countdown) is shown.
  pub fn has_progress(&self) -> bool {
    self.start_epoch != 0 || self.end_epoch != 0
  }
}

/// Cut `text` to at most [`MAX_TEXT_LEN`] characters, always on a char boundary.
pub fn truncate_text(text: &str) -> String {
  match text.char_indices().nth(MAX_TEXT_LEN) {
    Some((idx, _)) => text[..idx].to_string(),
    None => text.to_string(),
  }
}

/// Status label followed by the user's suffix, truncated as a whole.
pub fn status_line(base: &str, extra_text: &str) -> String {
  if extra_text.is_empty() {
    truncate_text(base)
  } else {
    truncate_text(&format!("{} {}", base, extra_text))
  }
}
