//! Discord presence channel - a background task owning the Discord client.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::activity::ActivityFields;
use super::client::{ActivityClient, SdkClient};
use crate::presence::{PresenceChannel, PresenceRecord, PresenceSession};

/// Work queued for the session task.
#[derive(Debug, Clone, PartialEq)]
enum SessionCommand {
  Update(PresenceRecord),
  Clear,
  Close,
}

/// Opens Discord sessions, each served by its own tokio task.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct DiscordChannel {
  handshake_timeout: Duration,
  tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl DiscordChannel {
  pub fn new(handshake_timeout: Duration) -> Self {
    Self {
      handshake_timeout,
      tasks: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// Wait (up to `timeout`) for closed sessions to finish their last writes.
  pub async fn wait_closed(&self, timeout: Duration) {
    let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
    for task in tasks {
      match tokio::time::timeout(timeout, task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("Discord session task failed: {}", e),
        Err(_) => log::warn!("Discord session did not finish within {:?}", timeout),
      }
    }
  }
}

impl PresenceChannel for DiscordChannel {
  type Session = DiscordSession;

  fn open(&self, app_id: &str) -> DiscordSession {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_session(
      SdkClient::default(),
      app_id.to_string(),
      self.handshake_timeout,
      rx,
    ));
    self.tasks.lock().push(task);
    DiscordSession { tx }
  }
}

/// Handle to a running Discord session. All calls return immediately.
pub struct DiscordSession {
  tx: mpsc::UnboundedSender<SessionCommand>,
}

impl DiscordSession {
  fn send(&self, command: SessionCommand) {
    if self.tx.send(command).is_err() {
      log::debug!("Discord session task is gone, dropping update");
    }
  }
}

impl PresenceSession for DiscordSession {
  fn push(&self, record: PresenceRecord) {
    self.send(SessionCommand::Update(record));
  }

  fn clear(&self) {
    self.send(SessionCommand::Clear);
  }

  fn close(self) {
    self.send(SessionCommand::Close);
  }
}

/// Take `first` plus whatever is already queued, collapsing consecutive
/// updates into the newest one. Returns the command to run and the next
/// command that could not be merged.
fn coalesce(
  first: SessionCommand,
  rx: &mut mpsc::UnboundedReceiver<SessionCommand>,
) -> (SessionCommand, Option<SessionCommand>) {
  let SessionCommand::Update(mut latest) = first else {
    return (first, None);
  };

  loop {
    match rx.try_recv() {
      Ok(SessionCommand::Update(record)) => latest = record,
      Ok(other) => return (SessionCommand::Update(latest), Some(other)),
      Err(_) => return (SessionCommand::Update(latest), None),
    }
  }
}

/// Serve one session: connect lazily, apply commands in order, disconnect
/// on close. Absence of Discord is not an error; the command is dropped.
async fn run_session<C: ActivityClient>(
  mut client: C,
  app_id: String,
  handshake_timeout: Duration,
  mut rx: mpsc::UnboundedReceiver<SessionCommand>,
) {
  let mut carried: Option<SessionCommand> = None;

  loop {
    let first = match carried.take() {
      Some(command) => command,
      None => match rx.recv().await {
        Some(command) => command,
        None => break,
      },
    };
    let (command, next) = coalesce(first, &mut rx);
    carried = next;

    let activity = match command {
      SessionCommand::Update(record) => Some(ActivityFields::from(&record)),
      SessionCommand::Clear if !client.is_connected() => continue,
      SessionCommand::Clear => None,
      SessionCommand::Close => break,
    };

    if !client.is_connected() {
      if let Err(e) = client.connect(&app_id, handshake_timeout).await {
        log::debug!("Discord not available: {}", e);
        continue;
      }
    }
    if let Err(e) = client.update(activity.as_ref()).await {
      log::debug!("Failed to update Discord activity: {}", e);
    }
  }

  client.disconnect().await;
  log::info!("Discord session closed");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::discord::DiscordError;
  use crate::presence::ActivityKind;

  fn record(text: &str) -> PresenceRecord {
    let mut record = PresenceRecord::stopped(ActivityKind::Listening, "");
    record.primary_text = text.to_string();
    record
  }

  fn update(text: &str) -> SessionCommand {
    SessionCommand::Update(record(text))
  }

  /// Client that records what the session asked of it.
  struct RecordingClient {
    available: bool,
    connected: bool,
    calls: Arc<Mutex<Vec<String>>>,
  }

  impl RecordingClient {
    fn new(available: bool) -> (Self, Arc<Mutex<Vec<String>>>) {
      let calls = Arc::new(Mutex::new(Vec::new()));
      let client = Self {
        available,
        connected: false,
        calls: calls.clone(),
      };
      (client, calls)
    }
  }

  impl ActivityClient for RecordingClient {
    fn is_connected(&self) -> bool {
      self.connected
    }

    async fn connect(&mut self, _app_id: &str, _timeout: Duration) -> Result<(), DiscordError> {
      self.calls.lock().push("connect".to_string());
      if !self.available {
        return Err(DiscordError::HandshakeTimeout);
      }
      self.connected = true;
      Ok(())
    }

    async fn update(&mut self, activity: Option<&ActivityFields>) -> Result<(), DiscordError> {
      let call = match activity {
        Some(activity) => format!("set {}", activity.details.as_deref().unwrap_or_default()),
        None => "clear".to_string(),
      };
      self.calls.lock().push(call);
      Ok(())
    }

    async fn disconnect(&mut self) {
      self.calls.lock().push("disconnect".to_string());
      self.connected = false;
    }
  }

  fn queue(commands: Vec<SessionCommand>) -> mpsc::UnboundedReceiver<SessionCommand> {
    let (tx, rx) = mpsc::unbounded_channel();
    for command in commands {
      tx.send(command).unwrap();
    }
    rx
  }

  #[test]
  fn test_coalesce_keeps_latest_update() {
    let mut rx = queue(vec![update("b"), update("c")]);

    let (command, next) = coalesce(update("a"), &mut rx);
    assert_eq!(command, update("c"));
    assert_eq!(next, None);
  }

  #[test]
  fn test_coalesce_stops_at_clear() {
    let mut rx = queue(vec![update("b"), SessionCommand::Clear, update("c")]);

    let (command, next) = coalesce(update("a"), &mut rx);
    assert_eq!(command, update("b"));
    assert_eq!(next, Some(SessionCommand::Clear));

    let (command, next) = coalesce(update("z"), &mut rx);
    assert_eq!(command, update("c"));
    assert_eq!(next, None);
  }

  #[test]
  fn test_coalesce_passes_close_through() {
    let mut rx = queue(vec![update("b")]);

    let (command, next) = coalesce(SessionCommand::Close, &mut rx);
    assert_eq!(command, SessionCommand::Close);
    assert_eq!(next, None);
  }

  #[tokio::test]
  async fn test_session_coalesces_then_clears_before_close() {
    let (client, calls) = RecordingClient::new(true);
    let rx = queue(vec![
      update("a"),
      update("b"),
      update("c"),
      SessionCommand::Clear,
      SessionCommand::Close,
      update("after close"),
    ]);

    run_session(client, "1".to_string(), Duration::from_secs(1), rx).await;

    assert_eq!(*calls.lock(), vec!["connect", "set c", "clear", "disconnect"]);
  }

  #[tokio::test]
  async fn test_session_connects_once() {
    let (client, calls) = RecordingClient::new(true);
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_session(client, "1".to_string(), Duration::from_secs(1), rx));

    tx.send(update("a")).unwrap();
    tokio::task::yield_now().await;
    tx.send(update("b")).unwrap();
    tx.send(SessionCommand::Close).unwrap();
    task.await.unwrap();

    let calls = calls.lock().clone();
    assert_eq!(calls.iter().filter(|c| *c == "connect").count(), 1);
    assert_eq!(calls.last().map(String::as_str), Some("disconnect"));
    assert!(calls.contains(&"set b".to_string()));
  }

  #[tokio::test]
  async fn test_session_without_discord_drops_commands() {
    let (client, calls) = RecordingClient::new(false);
    let rx = queue(vec![
      update("a"),
      SessionCommand::Clear,
      update("b"),
      SessionCommand::Close,
    ]);

    run_session(client, "1".to_string(), Duration::from_secs(1), rx).await;

    // Every update retries the connection; a clear with nothing shown is skipped.
    assert_eq!(*calls.lock(), vec!["connect", "connect", "disconnect"]);
  }

  #[tokio::test]
  async fn test_session_ends_when_handle_dropped() {
    let (client, calls) = RecordingClient::new(true);
    let (tx, rx) = mpsc::unbounded_channel();
    let session = DiscordSession { tx };
    session.push(record("a"));
    drop(session);

    run_session(client, "1".to_string(), Duration::from_secs(1), rx).await;

    assert_eq!(*calls.lock(), vec!["connect", "set a", "disconnect"]);
  }
}
