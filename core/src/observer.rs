//! Explicit subscribe/unsubscribe lifecycle for engine listeners.

use serde::{Deserialize, Serialize};

/// Handle returned by a subscription; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

/// An ordered set of listeners. Delivery follows subscription order.
pub struct Observers<L: ?Sized> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Box<L>)>,
}

impl<L: ?Sized> Observers<L> {
    pub fn new() -> Self {
        Self { next_id: 0, entries: Vec::new() }
    }

    pub fn subscribe(&mut self, listener: Box<L>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Returns false when the id was not (or no longer) subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &L> {
        self.entries.iter().map(|(_, l)| l.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: ?Sized> Default for Observers<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut observers: Observers<dyn Fn(u32) + Send> = Observers::new();

        let a = {
            let seen = Arc::clone(&seen);
            observers.subscribe(Box::new(move |v| seen.lock().unwrap().push(("a", v))))
        };
        {
            let seen = Arc::clone(&seen);
            observers.subscribe(Box::new(move |v| seen.lock().unwrap().push(("b", v))));
        }

        observers.iter().for_each(|l| l(1));
        assert!(observers.unsubscribe(a));
        assert!(!observers.unsubscribe(a));
        observers.iter().for_each(|l| l(2));

        assert_eq!(*seen.lock().unwrap(), vec![("a", 1), ("b", 1), ("b", 2)]);
    }
}
