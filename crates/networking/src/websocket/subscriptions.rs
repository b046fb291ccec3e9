//! Durable topic subscriptions
//!
//! The set survives reconnects; it is replayed in full on every open.

use coldchain_core::{ControlFrame, Topic};
use std::collections::BTreeSet;
use tracing::debug;

/// Where control frames go
pub trait FrameSink {
    fn is_open(&self) -> bool;
    /// Write one frame; `false` if it was dropped
    fn send_frame(&self, frame: &ControlFrame) -> bool;
}

/// Topics the consumer wants active
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    topics: BTreeSet<Topic>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `topic` and, if the sink is open, send a subscribe frame
    ///
    /// Membership is idempotent; the frame is sent on every call made
    /// while open. Returns whether a frame went out.
    pub fn subscribe<S: FrameSink + ?Sized>(&mut self, topic: Topic, sink: &S) -> bool {
        if self.topics.insert(topic.clone()) {
            debug!("Subscribed to {}", topic);
        }

        if !sink.is_open() {
            return false;
        }
        sink.send_frame(&ControlFrame::subscribe(topic))
    }

    /// Remove `topic` and, if the sink is open, send an unsubscribe frame
    pub fn unsubscribe<S: FrameSink + ?Sized>(&mut self, topic: &Topic, sink: &S) -> bool {
        if self.topics.remove(topic) {
            debug!("Unsubscribed from {}", topic);
        }

        if !sink.is_open() {
            return false;
        }
        sink.send_frame(&ControlFrame::unsubscribe(topic.clone()))
    }

    /// Send one subscribe frame per topic; returns how many were written
    pub fn replay<S: FrameSink + ?Sized>(&self, sink: &S) -> usize {
        let sent = self
            .topics
            .iter()
            .filter(|topic| sink.send_frame(&ControlFrame::subscribe((*topic).clone())))
            .count();

        debug!("Replayed {}/{} subscriptions", sent, self.topics.len());
        sent
    }

    pub fn contains(&self, topic: &Topic) -> bool {
        self.topics.contains(topic)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldchain_core::SubscriptionAction;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct RecordingSink {
        open: Cell<bool>,
        frames: RefCell<Vec<ControlFrame>>,
    }

    impl RecordingSink {
        fn open() -> Self {
            let sink = Self::default();
            sink.open.set(true);
            sink
        }
    }

    impl FrameSink for RecordingSink {
        fn is_open(&self) -> bool {
            self.open.get()
        }

        fn send_frame(&self, frame: &ControlFrame) -> bool {
            if !self.open.get() {
                return false;
            }
            self.frames.borrow_mut().push(frame.clone());
            true
        }
    }

    #[test]
    fn test_subscribe_while_open_sends_every_time() {
        let sink = RecordingSink::open();
        let mut registry = SubscriptionRegistry::new();

        assert!(registry.subscribe(Topic::shipments(), &sink));
        assert!(registry.subscribe(Topic::shipments(), &sink));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            *sink.frames.borrow(),
            vec![
                ControlFrame::subscribe(Topic::shipments()),
                ControlFrame::subscribe(Topic::shipments())
            ]
        );
    }

    #[test]
    fn test_subscribe_while_closed_only_updates_set() {
        let sink = RecordingSink::default();
        let mut registry = SubscriptionRegistry::new();

        assert!(!registry.subscribe(Topic::shipments(), &sink));
        assert!(registry.contains(&Topic::shipments()));
        assert!(sink.frames.borrow().is_empty());

        sink.open.set(true);
        assert_eq!(registry.replay(&sink), 1);
        assert_eq!(sink.frames.borrow()[0].action, SubscriptionAction::Subscribe);
    }

    #[test]
    fn test_replay_sends_one_frame_per_topic() {
        let sink = RecordingSink::default();
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(Topic::shipments(), &sink);
        registry.subscribe(Topic::new("facilities"), &sink);
        registry.subscribe(Topic::shipments(), &sink);

        sink.open.set(true);
        assert_eq!(registry.replay(&sink), 2);
        // Reconnects replay the same set again
        assert_eq!(registry.replay(&sink), 2);
        assert_eq!(sink.frames.borrow().len(), 4);
    }

    #[test]
    fn test_unsubscribe_removes_and_notifies() {
        let sink = RecordingSink::open();
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(Topic::shipments(), &sink);

        assert!(registry.unsubscribe(&Topic::shipments(), &sink));
        assert!(registry.is_empty());
        assert_eq!(
            sink.frames.borrow().last(),
            Some(&ControlFrame::unsubscribe(Topic::shipments()))
        );
        assert_eq!(registry.replay(&sink), 0);
    }
}
