//! Discord client used by the session task, backed by `discord-sdk`.

use std::time::Duration;

use discord_sdk::wheel::{UserState, Wheel};
use discord_sdk::{Discord, Subscriptions};
use thiserror::Error;
use tokio::sync::watch;

use super::activity::ActivityFields;

#[derive(Error, Debug)]
pub enum DiscordError {
  #[error("Invalid application id: {0}")]
  InvalidApplicationId(String),
  #[error("Discord error: {0}")]
  Sdk(String),
  #[error("Discord handshake timed out")]
  HandshakeTimeout,
  #[error("Discord disconnected: {0}")]
  Disconnected(String),
}

impl From<discord_sdk::Error> for DiscordError {
  fn from(e: discord_sdk::Error) -> Self {
    DiscordError::Sdk(format!("{:?}", e))
  }
}

/// The operations the session task needs from Discord.
pub(crate) trait ActivityClient {
  fn is_connected(&self) -> bool;

  /// Connect (or wait for a reconnect), giving up after `timeout`.
  async fn connect(&mut self, app_id: &str, timeout: Duration) -> Result<(), DiscordError>;

  /// Show `activity`, or clear it when `None`.
  async fn update(&mut self, activity: Option<&ActivityFields>) -> Result<(), DiscordError>;

  async fn disconnect(&mut self);
}

struct Connection {
  discord: Discord,
  user: watch::Receiver<UserState>,
  _wheel: Wheel,
}

/// [`ActivityClient`] talking to the local Discord client.
#[derive(Default)]
pub struct SdkClient {
  connection: Option<Connection>,
}

fn user_connected(user: &watch::Receiver<UserState>) -> bool {
  matches!(*user.borrow(), UserState::Connected(_))
}

/// Wait until the wheel reports a connected user.
async fn wait_connected(user: &mut watch::Receiver<UserState>) -> Result<String, DiscordError> {
  loop {
    let username = match &*user.borrow_and_update() {
      UserState::Connected(user) => Some(user.username.clone()),
      UserState::Disconnected(_) => None,
    };
    if let Some(username) = username {
      return Ok(username);
    }
    if user.changed().await.is_err() {
      return Err(DiscordError::Disconnected("connection closed".to_string()));
    }
  }
}

impl ActivityClient for SdkClient {
  fn is_connected(&self) -> bool {
    self
      .connection
      .as_ref()
      .is_some_and(|c| user_connected(&c.user))
  }

  async fn connect(&mut self, app_id: &str, timeout: Duration) -> Result<(), DiscordError> {
    if self.connection.is_none() {
      let id: i64 = app_id
        .parse()
        .map_err(|_| DiscordError::InvalidApplicationId(app_id.to_string()))?;

      let (wheel, handler) = Wheel::new(Box::new(|err| {
        log::debug!("Discord error: {:?}", err);
      }));
      let user = wheel.user().0;
      let discord = Discord::new(id, Subscriptions::ACTIVITY, Box::new(handler))?;
      log::debug!("Discord connecting...");

      self.connection = Some(Connection {
        discord,
        user,
        _wheel: wheel,
      });
    }

    let Some(connection) = self.connection.as_mut() else {
      return Err(DiscordError::Disconnected("no connection".to_string()));
    };
    match tokio::time::timeout(timeout, wait_connected(&mut connection.user)).await {
      Ok(Ok(username)) => {
        log::info!("Discord Rich Presence connected as {}", username);
        Ok(())
      }
      Ok(Err(e)) => {
        self.disconnect().await;
        Err(e)
      }
      Err(_) => Err(DiscordError::HandshakeTimeout),
    }
  }

  async fn update(&mut self, activity: Option<&ActivityFields>) -> Result<(), DiscordError> {
    let Some(connection) = self.connection.as_ref() else {
      return Err(DiscordError::Disconnected("not connected".to_string()));
    };

    match activity {
      Some(activity) => connection.discord.update_activity(activity.builder()).await?,
      None => connection.discord.clear_activity().await?,
    };
    Ok(())
  }

  async fn disconnect(&mut self) {
    if let Some(connection) = self.connection.take() {
      connection.discord.disconnect().await;
      log::info!("Discord Rich Presence disconnected");
    }
  }
}
