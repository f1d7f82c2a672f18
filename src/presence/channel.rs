//! Boundary to the external presence service.

use super::record::PresenceRecord;

/// Factory for sessions with the presence service.
pub trait PresenceChannel {
  type Session: PresenceSession;

  /// Open a session registered under `app_id`.
  fn open(&self, app_id: &str) -> Self::Session;
}

/// An open session. Every call is fire-and-forget: implementations must not
/// block the caller and must swallow (and log) transport failures.
pub trait PresenceSession {
  /// Replace the displayed presence.
  fn push(&self, record: PresenceRecord);

  /// Remove the presence entirely.
  fn clear(&self);

  /// End the session.
  fn close(self);
}
