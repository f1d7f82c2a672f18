//! mpv JSON IPC protocol types.
//!
//! Reference: https://mpv.io/manual/master/#json-ipc

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

static REQUEST_ID: AtomicI64 = AtomicI64::new(1);

pub fn next_request_id() -> i64 {
  REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// Properties the host observes, paired with their observer ids.
pub const OBSERVED_PROPERTIES: [(i64, &str); 7] = [
  (1, "pause"),
  (2, "time-pos"),
  (3, "duration"),
  (4, "metadata"),
  (5, "media-title"),
  (6, "idle-active"),
  (7, "path"),
];

/// Command sent to mpv.
#[derive(Debug, Clone, Serialize)]
pub struct MpvCommand {
  pub command: Vec<serde_json::Value>,
  pub request_id: i64,
}

impl MpvCommand {
  pub fn new(args: Vec<serde_json::Value>) -> Self {
    Self {
      command: args,
      request_id: next_request_id(),
    }
  }

  /// Ask for `property-change` events on `name`.
  pub fn observe_property(id: i64, name: &str) -> Self {
    Self::new(vec!["observe_property".into(), id.into(), name.into()])
  }

  pub fn get_property(name: &str) -> Self {
    Self::new(vec!["get_property".into(), name.into()])
  }
}

/// Reply to an [`MpvCommand`].
#[derive(Debug, Clone, Deserialize)]
pub struct MpvResponse {
  /// "success" or an error description.
  pub error: String,
  pub data: Option<serde_json::Value>,
  pub request_id: i64,
}

impl MpvResponse {
  pub fn is_success(&self) -> bool {
    self.error == "success"
  }
}

/// Asynchronous notification from mpv.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MpvEvent {
  /// Event name, e.g. "property-change", "end-file", "client-message".
  pub event: String,
  pub id: Option<i64>,
  /// Property name of a `property-change`.
  pub name: Option<String>,
  pub data: Option<serde_json::Value>,
  /// `end-file` reason: "eof", "stop", "quit", "error", "redirect".
  pub reason: Option<String>,
  /// `client-message` arguments, as sent by `script-message`.
  pub args: Option<Vec<String>>,
}

impl MpvEvent {
  /// Changed value of a `property-change`, treating JSON null as absent.
  pub fn value(&self) -> Option<&serde_json::Value> {
    self.data.as_ref().filter(|v| !v.is_null())
  }
}

/// One line received from mpv.
#[derive(Debug, Clone)]
pub enum MpvMessage {
  Response(MpvResponse),
  Event(MpvEvent),
}

impl MpvMessage {
  pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    if value.get("event").is_some() {
      Ok(MpvMessage::Event(serde_json::from_value(value)?))
    } else {
      Ok(MpvMessage::Response(serde_json::from_value(value)?))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_observe_serialization() {
    let cmd = MpvCommand::observe_property(4, "metadata");
    let json = serde_json::to_value(&cmd).unwrap();
    assert_eq!(json["command"], serde_json::json!(["observe_property", 4, "metadata"]));
    assert_eq!(json["request_id"], cmd.request_id);
  }

  #[test]
  fn test_request_ids_are_unique() {
    let a = MpvCommand::get_property("pause");
    let b = MpvCommand::get_property("pause");
    assert_ne!(a.request_id, b.request_id);
  }

  #[test]
  fn test_response_parsing() {
    let msg = MpvMessage::parse(r#"{"error":"property unavailable","data":null,"request_id":7}"#).unwrap();
    match msg {
      MpvMessage::Response(r) => {
        assert!(!r.is_success());
        assert_eq!(r.request_id, 7);
      }
      _ => panic!("Expected response"),
    }
  }

  #[test]
  fn test_event_parsing() {
    let msg = MpvMessage::parse(r#"{"event":"end-file","reason":"eof","playlist_entry_id":1}"#).unwrap();
    match msg {
      MpvMessage::Event(e) => {
        assert_eq!(e.event, "end-file");
        assert_eq!(e.reason.as_deref(), Some("eof"));
      }
      _ => panic!("Expected event"),
    }

    let msg = MpvMessage::parse(
      r#"{"event":"client-message","args":["nowplaying-rpc-toggle","use_playing_status"]}"#,
    )
    .unwrap();
    match msg {
      MpvMessage::Event(e) => assert_eq!(e.args.unwrap().len(), 2),
      _ => panic!("Expected event"),
    }
  }

  #[test]
  fn test_null_property_value() {
    let event: MpvEvent =
      serde_json::from_str(r#"{"event":"property-change","id":3,"name":"duration","data":null}"#).unwrap();
    assert!(event.value().is_none());
  }
}
