//! Typed progress events from the harvest loop.
//!
//! Events flow through a `tokio::sync::broadcast` channel so any consumer
//! (the CLI progress printer, a log file, a future dashboard) can subscribe
//! independently. When no subscribers exist, events are silently dropped.

use crate::harvest::termination::TerminationReason;
use crate::harvest::StrategyMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// An event envelope: session id, timestamp, sequence number, payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestNotice {
    /// The harvest session this event belongs to.
    pub session: String,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The event itself.
    pub event: HarvestEvent,
}

/// Every decision the harvester reports as it happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HarvestEvent {
    /// A page attempt has started.
    PageStarted { page: u32, strategy: StrategyMode },
    /// One bounded wait for a matching data response.
    AcquisitionAttempt {
        page: u32,
        attempt: u32,
        max_retries: u32,
    },
    /// A page produced valid records.
    PageLoaded {
        page: u32,
        valid_count: usize,
        total_items: usize,
    },
    /// A structurally valid response carried zero valid records.
    PageEmpty { page: u32, empty_streak: u32 },
    /// A failed page attempt will be retried after a backoff.
    RetryScheduled { page: u32, delay_secs: u64 },
    /// One slow-path exhaustion probe and its running score.
    TerminationProbe {
        probe: u32,
        has_stop: bool,
        has_data: bool,
        score: i32,
    },
    /// Harvest declared complete.
    TerminationConfirmed {
        page: u32,
        reason: TerminationReason,
    },
    /// End-of-session summary.
    HarvestComplete { pages: u32, records: u64 },
}

/// The central event bus for one harvest session.
pub struct EventBus {
    session: String,
    seq: AtomicU64,
    sender: broadcast::Sender<HarvestNotice>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            session: uuid::Uuid::new_v4().to_string(),
            seq: AtomicU64::new(0),
            sender,
        }
    }

    /// This session's identifier.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Emit an event to all subscribers. Silently ignores if none.
    pub fn emit(&self, event: HarvestEvent) {
        let notice = HarvestNotice {
            session: self.session.clone(),
            timestamp: Utc::now(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            event,
        };
        let _ = self.sender.send(notice);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<HarvestNotice> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = HarvestEvent::PageStarted {
            page: 4,
            strategy: StrategyMode::Button,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("PageStarted"));
        assert!(json.contains("Button"));

        // Roundtrip
        let parsed: HarvestEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            HarvestEvent::PageStarted { page, strategy } => {
                assert_eq!(page, 4);
                assert_eq!(strategy, StrategyMode::Button);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_emit_no_subscribers() {
        let bus = EventBus::new(16);
        // Should not panic when no subscribers
        bus.emit(HarvestEvent::HarvestComplete {
            pages: 12,
            records: 240,
        });
    }

    #[test]
    fn test_subscribe_receive_and_seq() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(HarvestEvent::PageEmpty {
            page: 7,
            empty_streak: 1,
        });
        bus.emit(HarvestEvent::RetryScheduled {
            page: 7,
            delay_secs: 29,
        });

        let first = rx.try_recv().unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(first.session, bus.session());
        match first.event {
            HarvestEvent::PageEmpty { page, empty_streak } => {
                assert_eq!(page, 7);
                assert_eq!(empty_streak, 1);
            }
            _ => panic!("wrong event"),
        }

        let second = rx.try_recv().unwrap();
        assert_eq!(second.seq, 2);
    }
}
