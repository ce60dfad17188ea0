//! Change notifications published by the project controller.
//!
//! # Invariants
//! - Subscribers receive events in the order operations completed.
//! - Inside a batch, events are buffered and delivered once as one
//!   `ProjectEvent::Batch`, preserving their internal order.

use crate::model::EntityKind;
use crate::oid::Oid;

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectEvent {
    ChildAdded {
        parent: Oid,
        child: Oid,
        kind: EntityKind,
    },
    NodeRemoved {
        node: Oid,
        parent: Oid,
        kind: EntityKind,
    },
    NodeMoved {
        node: Oid,
        old_parent: Oid,
        new_parent: Oid,
    },
    NodeUpdated {
        node: Oid,
        field: &'static str,
    },
    Linked {
        holder: Oid,
        target: Oid,
    },
    Unlinked {
        holder: Oid,
        target: Oid,
    },
    ActiveFlightChanged {
        previous: Option<Oid>,
        current: Option<Oid>,
    },
    Batch(Vec<ProjectEvent>),
}

impl ProjectEvent {
    /// Stable event name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChildAdded { .. } => "child_added",
            Self::NodeRemoved { .. } => "node_removed",
            Self::NodeMoved { .. } => "node_moved",
            Self::NodeUpdated { .. } => "node_updated",
            Self::Linked { .. } => "linked",
            Self::Unlinked { .. } => "unlinked",
            Self::ActiveFlightChanged { .. } => "active_flight_changed",
            Self::Batch(_) => "batch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&ProjectEvent)>;

/// Ordered publish/subscribe channel living on the control thread.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    batch_depth: usize,
    buffered: Vec<ProjectEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&ProjectEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn publish(&mut self, event: ProjectEvent) {
        if self.batch_depth > 0 {
            self.buffered.push(event);
            return;
        }
        self.deliver(&event);
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    pub(crate) fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Closes one batch level; the outermost level flushes the buffer.
    pub(crate) fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth > 0 || self.buffered.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.buffered);
        self.deliver(&ProjectEvent::Batch(events));
    }

    fn deliver(&mut self, event: &ProjectEvent) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, ProjectEvent};
    use crate::model::EntityKind;
    use crate::oid::Oid;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn updated(field: &'static str) -> ProjectEvent {
        ProjectEvent::NodeUpdated {
            node: Oid::new(EntityKind::Flight),
            field,
        }
    }

    #[test]
    fn delivers_in_publish_order_until_unsubscribed() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut bus = EventBus::new();
        let id = bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        bus.publish(updated("name"));
        bus.publish(updated("date"));
        assert!(bus.unsubscribe(id));
        bus.publish(updated("notes"));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[1], ProjectEvent::NodeUpdated { field: "date", .. }));
    }

    #[test]
    fn nested_batches_flush_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut bus = EventBus::new();
        bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        bus.begin_batch();
        bus.publish(updated("name"));
        bus.begin_batch();
        bus.publish(updated("date"));
        bus.end_batch();
        assert!(seen.borrow().is_empty());
        bus.end_batch();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            ProjectEvent::Batch(events) => assert_eq!(events.len(), 2),
            other => panic!("expected batch, got {other:?}"),
        }
    }
}
