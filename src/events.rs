//! # Rate Limiting Events
//!
//! Broadcast channel for rate limiting events, so a caller can report
//! throttling while a long collection is running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Events emitted when the API answers with HTTP 429.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RateLimitEvent {
    /// A 429 was received.
    Detected {
        timestamp: DateTime<Utc>,
        /// Milliseconds the server asked us to wait
        retry_after_ms: u64,
        /// The request path that was rate limited
        path: String,
    },
    /// A retry of the same request is about to wait.
    RetryStarting {
        timestamp: DateTime<Utc>,
        /// Milliseconds until the retry
        delay_ms: u64,
        /// The retry attempt number (1-based)
        attempt: u32,
        max_attempts: u32,
        /// Which operation is retrying, e.g. `page offset=200`
        operation: String,
    },
}

pub type RateLimitEventReceiver = broadcast::Receiver<RateLimitEvent>;

pub type RateLimitEventSender = broadcast::Sender<RateLimitEvent>;

/// Sender plus the most recent event, shareable between clones.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: RateLimitEventSender,
    latest: Arc<Mutex<Option<RateLimitEvent>>>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            sender,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> RateLimitEventReceiver {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn broadcast(&self, event: RateLimitEvent) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(event.clone());
        }
        let _ = self.sender.send(event);
    }

    pub fn latest_event(&self) -> Option<RateLimitEvent> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }
}
