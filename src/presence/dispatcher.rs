//! Event dispatcher - turns player events into presence pushes.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::player::{EventBus, MetadataAccessor, PlayerEvent, SubscriptionId};
use crate::settings::{ConfigStore, WatchId, EXTRA_TEXT, SECTION, USE_PLAYING_STATUS};

use super::channel::{PresenceChannel, PresenceSession};
use super::record::PresenceRecord;
use super::reducer::{reduce, PresenceSettings};

/// Source of the current Unix time in seconds.
pub type Clock = fn() -> i64;

/// Wall clock in Unix seconds.
pub fn unix_now() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs() as i64)
    .unwrap_or(0)
}

/// The host collaborators the dispatcher reads from and listens to.
#[derive(Clone)]
pub struct HostContext {
  pub player: Rc<dyn MetadataAccessor>,
  pub settings: Rc<dyn ConfigStore>,
  pub events: Rc<dyn EventBus>,
}

/// Mutable presence state shared with the registered handlers.
struct PresenceState<S> {
  session: S,
  record: PresenceRecord,
  player: Rc<dyn MetadataAccessor>,
  settings: Rc<dyn ConfigStore>,
  clock: Clock,
}

impl<S: PresenceSession> PresenceState<S> {
  fn settings(&self) -> PresenceSettings {
    PresenceSettings::load(self.settings.as_ref())
  }

  fn on_player_event(&mut self, event: PlayerEvent) {
    let settings = self.settings();
    let record = if event.is_stop() {
      PresenceRecord::stopped(settings.activity_kind(), &settings.extra_text)
    } else {
      reduce(self.player.as_ref(), &settings, (self.clock)())
    };
    log::debug!("'{}' -> {:?}", event, record);
    self.publish(record);
  }

  fn on_settings_changed(&mut self, key: &str) {
    let record = reduce(self.player.as_ref(), &self.settings(), (self.clock)());
    if record == self.record {
      log::debug!("Setting {} changed, presence unchanged", key);
      return;
    }
    log::debug!("Setting {} changed -> {:?}", key, record);
    self.publish(record);
  }

  fn publish(&mut self, record: PresenceRecord) {
    self.record = record.clone();
    self.session.push(record);
  }
}

/// Owns the presence session and keeps it in sync with the player.
///
/// Runs on the host's event thread; handlers execute synchronously inside
/// the host's `emit`.
pub struct Dispatcher<S: PresenceSession> {
  state: Rc<RefCell<PresenceState<S>>>,
  host: HostContext,
  subscriptions: Vec<SubscriptionId>,
  watches: Vec<WatchId>,
}

impl<S: PresenceSession + 'static> Dispatcher<S> {
  /// Open the session, show the initial record and start listening.
  pub fn start<C>(channel: &C, app_id: &str, host: HostContext) -> Self
  where
    C: PresenceChannel<Session = S>,
  {
    Self::start_with_clock(channel, app_id, host, unix_now)
  }

  pub fn start_with_clock<C>(channel: &C, app_id: &str, host: HostContext, clock: Clock) -> Self
  where
    C: PresenceChannel<Session = S>,
  {
    log::info!("Starting presence dispatcher (application {})", app_id);
    let session = channel.open(app_id);

    let settings = PresenceSettings::load(host.settings.as_ref());
    let initial = PresenceRecord::initial(settings.activity_kind(), &settings.extra_text);
    session.push(initial.clone());

    let state = Rc::new(RefCell::new(PresenceState {
      session,
      record: initial,
      player: host.player.clone(),
      settings: host.settings.clone(),
      clock,
    }));

    let subscriptions = PlayerEvent::ALL
      .iter()
      .map(|&event| {
        let weak = Rc::downgrade(&state);
        host.events.subscribe(
          event,
          Rc::new(move |event: PlayerEvent| with_state(&weak, |s| s.on_player_event(event))),
        )
      })
      .collect();

    let watches = [USE_PLAYING_STATUS, EXTRA_TEXT]
      .iter()
      .map(|&key| {
        let weak = Rc::downgrade(&state);
        host.settings.watch(
          SECTION,
          key,
          Rc::new(move |_: &str, key: &str| with_state(&weak, |s| s.on_settings_changed(key))),
        )
      })
      .collect();

    Self {
      state,
      host,
      subscriptions,
      watches,
    }
  }

  /// The record most recently pushed.
  pub fn record(&self) -> PresenceRecord {
    self.state.borrow().record.clone()
  }

  /// Re-run the reduction and push the result.
  pub fn refresh(&self) {
    let mut state = self.state.borrow_mut();
    let record = reduce(state.player.as_ref(), &state.settings(), (state.clock)());
    state.publish(record);
  }

  /// Stop listening, clear the remote presence and close the session.
  pub fn stop(self) {
    log::info!("Stopping presence dispatcher");
    for id in &self.subscriptions {
      self.host.events.unsubscribe(*id);
    }
    for id in &self.watches {
      self.host.settings.unwatch(*id);
    }

    let Self { state, .. } = self;
    match Rc::try_unwrap(state) {
      Ok(cell) => {
        let state = cell.into_inner();
        state.session.clear();
        state.session.close();
      }
      Err(state) => {
        // A handler still holds the state; clear without closing.
        log::warn!("Presence state still in use at stop, clearing only");
        if let Ok(state) = state.try_borrow() {
          state.session.clear();
        }
      }
    }
  }
}

fn with_state<S: PresenceSession>(
  weak: &Weak<RefCell<PresenceState<S>>>,
  f: impl FnOnce(&mut PresenceState<S>),
) {
  let Some(state) = weak.upgrade() else {
    return;
  };
  match state.try_borrow_mut() {
    Ok(mut state) => f(&mut state),
    Err(_) => log::warn!("Presence update re-entered, skipping"),
  };
}
