//! Webhook Intake (spec §4.6): torrent-completion events pushed in by
//! external tooling, queued for the cycle task to fold into the next
//! allocation pass, and optionally forwarded to a cross-seed collaborator.

pub mod cross_seed;

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// spec §3 `WebhookEvent`: `(event_type, torrent_hash, tracker_url?, received_at)`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event_type: EventType,
    pub torrent_hash: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracker_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Add,
    Complete,
    Delete,
}

/// Bounded, drop-oldest queue. Enqueue must stay sub-10ms and never block,
/// so the lock is a plain std `Mutex` guarding a `VecDeque`, never held
/// across an await point.
pub struct WebhookQueue {
    inner: Mutex<VecDeque<WebhookEvent>>,
    capacity: usize,
    dropped: std::sync::atomic::AtomicU64,
}

impl WebhookQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Pushes an event, dropping the oldest queued event if already at
    /// capacity. Never blocks.
    pub fn enqueue(&self, event: WebhookEvent) {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= self.capacity {
            queue.pop_front();
            self.dropped
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        queue.push_back(event);
    }

    /// Drains every currently queued event for the cycle task to consume.
    pub fn drain(&self) -> Vec<WebhookEvent> {
        let mut queue = self.inner.lock().unwrap();
        queue.drain(..).collect()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(hash: &str) -> WebhookEvent {
        WebhookEvent {
            event_type: EventType::Complete,
            torrent_hash: hash.to_string(),
            name: String::new(),
            tracker_url: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn drain_returns_all_queued_events_in_order() {
        let queue = WebhookQueue::new(10);
        queue.enqueue(event("a"));
        queue.enqueue(event("b"));
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].torrent_hash, "a");
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn overflow_drops_oldest() {
        let queue = WebhookQueue::new(2);
        queue.enqueue(event("a"));
        queue.enqueue(event("b"));
        queue.enqueue(event("c"));
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].torrent_hash, "b");
        assert_eq!(drained[1].torrent_hash, "c");
        assert_eq!(queue.dropped_count(), 1);
    }
}
