//! Async IPC connection to a running mpv.
//!
//! Unix socket on Linux/macOS, named pipe on Windows. Replies are matched to
//! requests by `request_id`; events are forwarded on a channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::protocol::{MpvCommand, MpvEvent, MpvMessage, MpvResponse};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum IpcError {
  #[error("Connection failed: {0}")]
  ConnectionFailed(String),
  #[error("Write failed: {0}")]
  WriteFailed(#[from] std::io::Error),
  #[error("Invalid command: {0}")]
  Json(#[from] serde_json::Error),
  #[error("Command timeout")]
  Timeout,
  #[error("Disconnected")]
  Disconnected,
}

type PendingRequest = oneshot::Sender<MpvResponse>;

struct IpcState {
  pending: HashMap<i64, PendingRequest>,
  closed: bool,
}

enum WriteMessage {
  Command(Vec<u8>),
  Close,
}

/// Connection to mpv's JSON IPC server.
pub struct MpvIpc {
  state: Arc<Mutex<IpcState>>,
  write_tx: Sender<WriteMessage>,
  event_rx: Receiver<MpvEvent>,
  _reader_handle: JoinHandle<()>,
  _writer_handle: JoinHandle<()>,
}

impl MpvIpc {
  /// Connect to `path`, trying `retry_count` times with a growing delay.
  pub async fn connect(path: &str, retry_count: u32) -> Result<Self, IpcError> {
    let mut last_error = None;

    for attempt in 0..retry_count.max(1) {
      if attempt > 0 {
        tokio::time::sleep(Duration::from_millis(250 * attempt as u64)).await;
      }

      match Self::try_connect(path).await {
        Ok(ipc) => return Ok(ipc),
        Err(e) => {
          log::debug!("mpv connect attempt {} failed: {}", attempt + 1, e);
          last_error = Some(e);
        }
      }
    }

    Err(last_error.unwrap_or(IpcError::Disconnected))
  }

  #[cfg(windows)]
  async fn try_connect(path: &str) -> Result<Self, IpcError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let client = ClientOptions::new()
      .open(path)
      .map_err(|e| IpcError::ConnectionFailed(format!("{}: {}", path, e)))?;

    let (reader, writer) = tokio::io::split(client);
    Ok(Self::setup(reader, writer))
  }

  #[cfg(not(windows))]
  async fn try_connect(path: &str) -> Result<Self, IpcError> {
    use tokio::net::UnixStream;

    let stream = UnixStream::connect(path)
      .await
      .map_err(|e| IpcError::ConnectionFailed(format!("{}: {}", path, e)))?;

    let (reader, writer) = tokio::io::split(stream);
    Ok(Self::setup(reader, writer))
  }

  pub(crate) fn setup<R, W>(reader: R, writer: W) -> Self
  where
    R: tokio::io::AsyncRead + Send + Unpin + 'static,
    W: tokio::io::AsyncWrite + Send + Unpin + 'static,
  {
    let state = Arc::new(Mutex::new(IpcState {
      pending: HashMap::new(),
      closed: false,
    }));

    let (event_tx, event_rx) = async_channel::unbounded();
    let (write_tx, write_rx) = async_channel::unbounded::<WriteMessage>();

    let reader_state = state.clone();
    let reader_handle = tokio::spawn(async move {
      Self::reader_loop(reader, reader_state, event_tx).await;
    });

    let writer_handle = tokio::spawn(async move {
      Self::writer_loop(writer, write_rx).await;
    });

    Self {
      state,
      write_tx,
      event_rx,
      _reader_handle: reader_handle,
      _writer_handle: writer_handle,
    }
  }

  async fn reader_loop<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    state: Arc<Mutex<IpcState>>,
    event_tx: Sender<MpvEvent>,
  ) {
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
      line.clear();
      match buf_reader.read_line(&mut line).await {
        Ok(0) => {
          log::info!("mpv IPC connection closed");
          break;
        }
        Ok(_) => {
          let trimmed = line.trim();
          if trimmed.is_empty() {
            continue;
          }

          match MpvMessage::parse(trimmed) {
            Ok(MpvMessage::Response(response)) => {
              if let Some(tx) = state.lock().pending.remove(&response.request_id) {
                let _ = tx.send(response);
              }
            }
            Ok(MpvMessage::Event(event)) => {
              log::trace!("mpv event {:?}", event);
              if event_tx.send(event).await.is_err() {
                break;
              }
            }
            Err(e) => {
              log::warn!("Failed to parse mpv message: {} - {}", e, trimmed);
            }
          }
        }
        Err(e) => {
          log::error!("mpv IPC read error: {}", e);
          break;
        }
      }
    }

    // Dropping the senders fails every waiting request.
    let mut state = state.lock();
    state.closed = true;
    state.pending.clear();
  }

  async fn writer_loop<W: tokio::io::AsyncWrite + Unpin>(
    mut writer: W,
    write_rx: Receiver<WriteMessage>,
  ) {
    while let Ok(msg) = write_rx.recv().await {
      match msg {
        WriteMessage::Command(mut data) => {
          data.push(b'\n');
          if let Err(e) = writer.write_all(&data).await {
            log::error!("mpv IPC write error: {}", e);
            break;
          }
          if let Err(e) = writer.flush().await {
            log::error!("mpv IPC flush error: {}", e);
            break;
          }
        }
        WriteMessage::Close => break,
      }
    }
  }

  /// Send a command and wait for its reply.
  pub async fn send_command(&self, cmd: MpvCommand) -> Result<MpvResponse, IpcError> {
    let request_id = cmd.request_id;
    let json = serde_json::to_vec(&cmd)?;

    let (tx, rx) = oneshot::channel();
    {
      let mut state = self.state.lock();
      if state.closed {
        return Err(IpcError::Disconnected);
      }
      state.pending.insert(request_id, tx);
    }

    log::debug!("Sending mpv command {:?}", cmd.command);
    self
      .write_tx
      .send(WriteMessage::Command(json))
      .await
      .map_err(|_| IpcError::Disconnected)?;

    match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
      Ok(Ok(response)) => Ok(response),
      Ok(Err(_)) => Err(IpcError::Disconnected),
      Err(_) => {
        log::warn!("mpv command timed out, request_id={}", request_id);
        self.state.lock().pending.remove(&request_id);
        Err(IpcError::Timeout)
      }
    }
  }

  /// Event stream. Ends once mpv closes the connection.
  pub fn events(&self) -> Receiver<MpvEvent> {
    self.event_rx.clone()
  }

  pub fn close(&self) {
    let _ = self.write_tx.try_send(WriteMessage::Close);
  }
}
