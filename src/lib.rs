//! Now-playing presence for Discord.
//!
//! Player lifecycle events are reduced to a presence record that is pushed to
//! Discord's Rich Presence through `discord-sdk`. `mpv` is the bundled
//! host; any player implementing [`player::MetadataAccessor`] and
//! [`player::EventBus`] can drive the [`presence::Dispatcher`].

pub mod config;
pub mod discord;
pub mod mpv;
pub mod player;
pub mod presence;
pub mod settings;

pub use config::{AppConfig, ConfigError};
