use crate::registry::{Registry32, RegistryId};

/// Proof of a listener registration in an [`EventSource`]. Give it back to [`EventSource::unsubscribe`] to remove exactly
/// that listener.
///
/// A subscription that outlived its listener (e.g. a one-shot listener that already fired) is stale; unsubscribing it is
/// a no-op even if the slot has been reused.
#[derive(Debug, Eq, PartialEq)]
#[must_use = "dropping a Subscription leaks the listener until the source is cleared"]
pub struct Subscription {
    id: RegistryId,
    serial: u64,
}

/// Returned by a listener to decide whether it stays subscribed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListenerControl {
    Keep,
    Unsubscribe,
}

struct ListenerSlot<E, C: ?Sized> {
    kind: E,
    serial: u64,
    listener: Box<dyn FnMut(&mut C) -> ListenerControl>,
}

/// Listeners keyed by event kind. Dispatch hands each listener a context `C`, usually the object that raised the event,
/// so listeners never need to hold a reference to it.
pub struct EventSource<E, C: ?Sized> {
    listeners: Registry32<ListenerSlot<E, C>>,
    next_serial: u64,
}

impl<E, C: ?Sized> Default for EventSource<E, C> {
    fn default() -> Self {
        Self {
            listeners: Registry32::new(),
            next_serial: 0,
        }
    }
}

impl<E: Copy + Eq, C: ?Sized> EventSource<E, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn subscribe(
        &mut self,
        kind: E,
        listener: impl FnMut(&mut C) -> ListenerControl + 'static,
    ) -> Subscription {
        let serial = self.next_serial;
        self.next_serial += 1;
        let id = self.listeners.insert(ListenerSlot {
            kind,
            serial,
            listener: Box::new(listener),
        });

        Subscription { id, serial }
    }

    /// Subscribes a listener that is removed after it runs once.
    pub fn subscribe_once(&mut self, kind: E, listener: impl FnOnce(&mut C) + 'static) -> Subscription {
        let mut listener = Some(listener);
        self.subscribe(kind, move |ctx| {
            if let Some(l) = listener.take() {
                l(ctx);
            }
            ListenerControl::Unsubscribe
        })
    }

    pub fn is_subscribed(&self, subscription: &Subscription) -> bool {
        self.listeners
            .get(subscription.id)
            .map_or(false, |slot| slot.serial == subscription.serial)
    }

    /// Returns `false` if the subscription was stale.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        if !self.is_subscribed(&subscription) {
            return false;
        }
        self.listeners.remove(subscription.id).is_some()
    }

    /// Runs every listener subscribed to `event`, in subscription order.
    pub fn dispatch(&mut self, event: E, ctx: &mut C) {
        for id in self.listeners.ids() {
            let Some(slot) = self.listeners.get_mut(id) else {
                continue;
            };
            if slot.kind != event {
                continue;
            }
            if (slot.listener)(ctx) == ListenerControl::Unsubscribe {
                self.listeners.remove(id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.listeners = Registry32::new();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    enum Kind {
        A,
        B,
    }

    #[test]
    fn dispatch_only_reaches_matching_kind() {
        let mut source = EventSource::<Kind, Vec<&'static str>>::new();
        let _a = source.subscribe(Kind::A, |log| {
            log.push("a");
            ListenerControl::Keep
        });
        let _b = source.subscribe(Kind::B, |log| {
            log.push("b");
            ListenerControl::Keep
        });

        let mut log = Vec::new();
        source.dispatch(Kind::A, &mut log);
        source.dispatch(Kind::A, &mut log);

        assert_eq!(log, vec!["a", "a"]);
    }

    #[test]
    fn once_listener_fires_once_and_goes_stale() {
        let mut source = EventSource::<Kind, u32>::new();
        let sub = source.subscribe_once(Kind::A, |count| *count += 1);

        let mut count = 0;
        source.dispatch(Kind::A, &mut count);
        source.dispatch(Kind::A, &mut count);
        assert_eq!(count, 1);
        assert!(!source.is_subscribed(&sub));

        // The freed slot is reused, but the stale handle must not remove the new listener.
        let fresh = source.subscribe(Kind::A, |_| ListenerControl::Keep);
        assert!(!source.unsubscribe(sub));
        assert!(source.is_subscribed(&fresh));
        assert!(source.unsubscribe(fresh));
        assert!(source.is_empty());
    }
}
