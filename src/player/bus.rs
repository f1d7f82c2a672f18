//! In-process event bus.

use std::cell::{Cell, RefCell};

use super::{EventBus, EventHandler, PlayerEvent, SubscriptionId};

struct Subscription {
  id: SubscriptionId,
  event: PlayerEvent,
  handler: EventHandler,
}

/// Event bus for a single-threaded host loop.
///
/// Handlers run synchronously inside [`LocalEventBus::emit`], in
/// subscription order.
#[derive(Default)]
pub struct LocalEventBus {
  subscriptions: RefCell<Vec<Subscription>>,
  next_id: Cell<u64>,
}

impl LocalEventBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Deliver `event` to its subscribers. Returns how many handlers ran.
  pub fn emit(&self, event: PlayerEvent) -> usize {
    // Collect first so handlers may (un)subscribe while running.
    let handlers: Vec<EventHandler> = self
      .subscriptions
      .borrow()
      .iter()
      .filter(|s| s.event == event)
      .map(|s| s.handler.clone())
      .collect();

    log::debug!("Emitting '{}' to {} handler(s)", event, handlers.len());
    for handler in &handlers {
      handler(event);
    }
    handlers.len()
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscriptions.borrow().len()
  }
}

impl EventBus for LocalEventBus {
  fn subscribe(&self, event: PlayerEvent, handler: EventHandler) -> SubscriptionId {
    let id = SubscriptionId(self.next_id.get());
    self.next_id.set(id.0 + 1);
    self.subscriptions.borrow_mut().push(Subscription { id, event, handler });
    id
  }

  fn unsubscribe(&self, id: SubscriptionId) {
    self.subscriptions.borrow_mut().retain(|s| s.id != id);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::rc::Rc;

  #[test]
  fn test_emit_reaches_matching_handlers_only() {
    let bus = LocalEventBus::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let sink = seen.clone();
    bus.subscribe(PlayerEvent::PlaybackPause, Rc::new(move |e: PlayerEvent| sink.borrow_mut().push(e)));
    let sink = seen.clone();
    bus.subscribe(PlayerEvent::TitleChange, Rc::new(move |e: PlayerEvent| sink.borrow_mut().push(e)));

    assert_eq!(bus.emit(PlayerEvent::PlaybackPause), 1);
    assert_eq!(bus.emit(PlayerEvent::PlaybackSeek), 0);
    assert_eq!(*seen.borrow(), vec![PlayerEvent::PlaybackPause]);
  }

  #[test]
  fn test_unsubscribe() {
    let bus = LocalEventBus::new();
    let count = Rc::new(Cell::new(0));

    let c = count.clone();
    let id = bus.subscribe(PlayerEvent::PlaybackReady, Rc::new(move |_: PlayerEvent| c.set(c.get() + 1)));
    bus.emit(PlayerEvent::PlaybackReady);
    bus.unsubscribe(id);
    bus.emit(PlayerEvent::PlaybackReady);

    assert_eq!(count.get(), 1);
    assert_eq!(bus.subscriber_count(), 0);
  }

  #[test]
  fn test_handler_may_unsubscribe_itself() {
    let bus = Rc::new(LocalEventBus::new());
    let id_slot = Rc::new(Cell::new(None));

    let weak = Rc::downgrade(&bus);
    let slot = id_slot.clone();
    let id = bus.subscribe(
      PlayerEvent::PlaybackEnd,
      Rc::new(move |_: PlayerEvent| {
        if let (Some(bus), Some(id)) = (weak.upgrade(), slot.get()) {
          bus.unsubscribe(id);
        }
      }),
    );
    id_slot.set(Some(id));

    assert_eq!(bus.emit(PlayerEvent::PlaybackEnd), 1);
    assert_eq!(bus.emit(PlayerEvent::PlaybackEnd), 0);
  }
}
