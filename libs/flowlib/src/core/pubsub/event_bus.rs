// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pub/sub event bus owned by a runtime.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::events::{Event, EventListener};

type ListenerList = Vec<Weak<Mutex<dyn EventListener>>>;

/// Topic-based event bus with synchronous dispatch.
///
/// - Listeners are held weakly; dropping the `Arc` unsubscribes
/// - Events are delivered on the publishing thread, in subscription order
/// - A listener error is logged and does not stop delivery to the others
pub struct EventBus {
    /// Map of topic name -> list of weak listener references
    topics: DashMap<String, ListenerList>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    /// Subscribe a listener to a topic
    ///
    /// # Example
    /// ```ignore
    /// let listener = Arc::new(Mutex::new(MyListener));
    /// runtime.event_bus().subscribe(topics::STRUCTURE, listener.clone());
    /// ```
    pub fn subscribe(&self, topic: &str, listener: Arc<Mutex<dyn EventListener>>) {
        let weak_listener = Arc::downgrade(&listener);
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push(weak_listener);
    }

    /// Publish event to topic
    ///
    /// Delivered before this returns. Events without subscribers are dropped.
    pub fn publish(&self, topic: &str, event: &Event) {
        // Collect live listeners (upgrade weak refs) so no shard guard is held
        // while listeners run
        let live_listeners: Vec<_> = match self.topics.get(topic) {
            Some(subscribers) => subscribers.iter().filter_map(Weak::upgrade).collect(),
            None => return,
        };

        for listener in live_listeners {
            if let Err(e) = listener.lock().on_event(event) {
                tracing::warn!("Listener on '{}' failed: {}", topic, e);
            }
        }

        self.cleanup_dead_listeners(topic);
    }

    /// Number of live listeners on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |subscribers| {
            subscribers
                .iter()
                .filter(|weak| weak.strong_count() > 0)
                .count()
        })
    }

    /// Remove dead listeners
    fn cleanup_dead_listeners(&self, topic: &str) {
        if let Some(mut subscribers) = self.topics.get_mut(topic) {
            subscribers.retain(|weak| weak.strong_count() > 0);
        }
        // Remove topic entry if no subscribers left
        self.topics
            .remove_if(topic, |_, subscribers| subscribers.is_empty());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
