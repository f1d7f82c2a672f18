//! Presence record to Discord activity mapping.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use discord_sdk::activity::{ActivityBuilder, Assets};

use crate::presence::{ActivityKind, PresenceRecord, LARGE_IMAGE_KEY};

/// The fields of a Discord activity, as derived from a [`PresenceRecord`].
///
/// Discord rejects empty strings, so blank texts are `None` and zero
/// timestamps are left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityFields {
  pub kind: ActivityKind,
  pub details: Option<String>,
  pub state: Option<String>,
  pub large_image: &'static str,
  pub large_text: Option<String>,
  pub small_image: &'static str,
  pub small_text: Option<String>,
  pub start: Option<i64>,
  pub end: Option<i64>,
}

fn non_empty(text: &str) -> Option<String> {
  (!text.is_empty()).then(|| text.to_string())
}

fn non_zero(epoch: i64) -> Option<i64> {
  (epoch > 0).then_some(epoch)
}

fn epoch_time(secs: i64) -> SystemTime {
  UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

impl From<&PresenceRecord> for ActivityFields {
  fn from(record: &PresenceRecord) -> Self {
    Self {
      kind: record.activity_kind,
      details: non_empty(&record.primary_text),
      state: non_empty(&record.secondary_text),
      large_image: LARGE_IMAGE_KEY,
      large_text: non_empty(&record.tertiary_text),
      small_image: record.status_glyph.image_key(),
      small_text: non_empty(&record.status_text),
      start: non_zero(record.start_epoch),
      end: non_zero(record.end_epoch),
    }
  }
}

impl ActivityFields {
  /// Build the SDK activity.
  pub fn builder(&self) -> ActivityBuilder {
    let kind = match self.kind {
      ActivityKind::Listening => discord_sdk::activity::ActivityKind::Listening,
      ActivityKind::Playing => discord_sdk::activity::ActivityKind::Playing,
    };

    let assets = Assets::default()
      .large(self.large_image, self.large_text.as_deref())
      .small(self.small_image, self.small_text.as_deref());

    let mut activity = ActivityBuilder::new().kind(kind).assets(assets);
    if let Some(details) = &self.details {
      activity = activity.details(details.as_str());
    }
    if let Some(state) = &self.state {
      activity = activity.state(state.as_str());
    }
    if let Some(start) = self.start {
      activity = activity.start_timestamp(epoch_time(start));
    }
    if let Some(end) = self.end {
      activity = activity.end_timestamp(epoch_time(end));
    }
    activity
  }
}
