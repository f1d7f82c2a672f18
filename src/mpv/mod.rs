//! mpv host backend - follows a running mpv through its JSON IPC server.
//!
//! Architecture:
//! - `ipc.rs` - async IPC connection (Named Pipes on Windows, Unix Sockets on Linux/macOS)
//! - `protocol.rs` - JSON command/response/event types
//! - `host.rs` - property cache, event translation and metadata access

mod host;
mod ipc;
mod protocol;

pub use host::{HostEvent, MpvError, MpvHost};
pub use ipc::{IpcError, MpvIpc};
pub use protocol::{MpvCommand, MpvEvent, MpvResponse, OBSERVED_PROPERTIES};

/// Default IPC endpoint, matching `--input-ipc-server` examples in mpv's manual.
#[cfg(windows)]
pub const DEFAULT_SOCKET: &str = r"\\.\pipe\mpvsocket";
#[cfg(not(windows))]
pub const DEFAULT_SOCKET: &str = "/tmp/mpvsocket";
