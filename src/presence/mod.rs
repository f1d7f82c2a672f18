//! Presence state reduction and update pipeline.
//!
//! Architecture:
//! - `record.rs` - the presence record and text limits
//! - `reducer.rs` - pure player state -> record mapping
//! - `channel.rs` - traits for the external presence service
//! - `dispatcher.rs` - event subscriptions and pushes

mod channel;
mod dispatcher;
mod record;
mod reducer;

pub use channel::{PresenceChannel, PresenceSession};
pub use dispatcher::{unix_now, Clock, Dispatcher, HostContext};
pub use record::{
  status_line, truncate_text, ActivityKind, PresenceRecord, StatusGlyph, LARGE_IMAGE_KEY,
  MAX_TEXT_LEN,
};
pub use reducer::{reduce, PresenceSettings};
