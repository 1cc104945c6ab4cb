//! Run progress publication
//!
//! Each run owns one [`ProgressLog`]: an append-only, time-ordered event
//! sequence with a broadcast channel for live subscribers. The last
//! appended event is the run's current externally observable state.

use crate::types::{ProgressEvent, ProgressEventKind};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

const BROADCAST_CAPACITY: usize = 100;

/// Shared handle to a run's progress timeline. Cloning is cheap and all
/// clones observe the same sequence.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    run_id: Uuid,
    events: Arc<RwLock<Vec<ProgressEvent>>>,
    broadcaster: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressLog {
    pub fn new() -> Self {
        let (broadcaster, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            run_id: Uuid::new_v4(),
            events: Arc::new(RwLock::new(Vec::new())),
            broadcaster,
        }
    }

    /// Identity of the run this log belongs to
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Append one event, stamped with the current time, and notify live
    /// subscribers. Events are never removed or reordered.
    pub async fn emit(&self, kind: ProgressEventKind) {
        let event = ProgressEvent {
            timestamp: Utc::now(),
            kind,
        };
        debug!(run_id = %self.run_id, event = ?event.kind, "Progress event");

        self.events.write().await.push(event.clone());
        // No receivers is fine; polling observers use snapshot()
        let _ = self.broadcaster.send(event);
    }

    /// Copy of the full timeline so far
    pub async fn snapshot(&self) -> Vec<ProgressEvent> {
        self.events.read().await.clone()
    }

    /// The most recent event, if any
    pub async fn latest(&self) -> Option<ProgressEvent> {
        self.events.read().await.last().cloned()
    }

    /// Number of events appended so far
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Subscribe to events appended after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.broadcaster.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_append_in_order() {
        let log = ProgressLog::new();
        assert!(log.is_empty().await);

        log.emit(ProgressEventKind::SearchingWeb {
            query: "q1".to_string(),
        })
        .await;
        log.emit(ProgressEventKind::ResearchCompleted).await;

        let events = log.snapshot().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0].kind,
            ProgressEventKind::SearchingWeb { .. }
        ));
        assert!(matches!(events[1].kind, ProgressEventKind::ResearchCompleted));
        assert!(events[0].timestamp <= events[1].timestamp);

        let latest = log.latest().await.unwrap();
        assert_eq!(latest.kind, ProgressEventKind::ResearchCompleted);
    }

    #[tokio::test]
    async fn subscribers_receive_live_events() {
        let log = ProgressLog::new();
        let mut rx = log.subscribe();

        log.emit(ProgressEventKind::ReportSent).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, ProgressEventKind::ReportSent);
    }

    #[tokio::test]
    async fn clones_share_the_same_timeline() {
        let log = ProgressLog::new();
        let clone = log.clone();

        clone.emit(ProgressEventKind::SendingReport).await;

        assert_eq!(log.len().await, 1);
        assert_eq!(log.run_id(), clone.run_id());
    }
}
