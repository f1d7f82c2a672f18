//! Discord Rich Presence through `discord-sdk`.
//!
//! Architecture:
//! - `activity.rs` - presence record to activity mapping
//! - `client.rs` - sdk connection with handshake timeout
//! - `channel.rs` - presence channel backed by a background session task

mod activity;
mod channel;
mod client;

pub use activity::ActivityFields;
pub use channel::{DiscordChannel, DiscordSession};
pub use client::{DiscordError, SdkClient};
