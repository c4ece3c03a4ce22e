//! Per-plugin change notifications.

use std::fmt;

use crate::{NodeId, Plugin};

/// A structural or data change to a plugin tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    ChildAdded {
        parent: NodeId,
        child: NodeId,
        index: usize,
    },
    ChildRemoved {
        parent: NodeId,
        child: NodeId,
        index: usize,
    },
    /// A subrecord payload or a record/group header was replaced.
    DataChanged { node: NodeId },
}

/// Handle returned by [`Plugin::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&ChangeEvent) + Send>;

#[derive(Default)]
pub(crate) struct Observers {
    next: u64,
    callbacks: Vec<(SubscriptionId, Callback)>,
}

impl Observers {
    pub(crate) fn notify(&mut self, event: ChangeEvent) {
        for (_, callback) in &mut self.callbacks {
            callback(&event);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

impl Plugin {
    /// Register a callback for changes to this plugin only.
    pub fn subscribe(&mut self, callback: Box<dyn FnMut(&ChangeEvent) + Send>) -> SubscriptionId {
        let id = SubscriptionId(self.observers.next);
        self.observers.next += 1;
        self.observers.callbacks.push((id, callback));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.callbacks.len();
        self.observers.callbacks.retain(|(sid, _)| *sid != id);
        self.observers.callbacks.len() != before
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{HeaderLayout, RecordHeader};

    #[test]
    fn test_events_are_per_instance() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut watched = Plugin::new("a.esp", HeaderLayout::Standard);
        let mut other = Plugin::new("b.esp", HeaderLayout::Standard);

        let sink = Arc::clone(&events);
        let id = watched.subscribe(Box::new(move |e| sink.lock().unwrap().push(*e)));

        let record = watched.new_record(RecordHeader::new("WEAP".parse().unwrap(), 1));
        watched.add_child(watched.root(), record).unwrap();
        let stray = other.new_record(RecordHeader::new("WEAP".parse().unwrap(), 2));
        other.add_child(other.root(), stray).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![ChangeEvent::ChildAdded {
                parent: watched.root(),
                child: record,
                index: 0
            }]
        );

        assert!(watched.unsubscribe(id));
        assert!(!watched.unsubscribe(id));
        watched.delete_child(watched.root(), record).unwrap();
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
