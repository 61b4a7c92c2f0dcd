//! Fan-out of freshly generated reports to connected viewers.
//!
//! The broadcaster is constructed once at startup and handed to both the
//! report service (publish side) and the WebSocket handler (subscribe side)
//! through `AppState`. There is no process-global hub.
//!
//! Delivery is best-effort and at-most-once per observer: `publish` never
//! blocks, a slow observer lags and loses messages without affecting other
//! observers, and there is no replay buffer. Late joiners catch up through
//! `GET /api/reports/history`.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::entities::report;

/// Default capacity of the underlying channel. An observer further behind
/// than this many reports starts losing the oldest ones.
pub const DEFAULT_CAPACITY: usize = 64;

/// Events pushed to real-time observers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    /// A new report was generated and persisted
    ReportGenerated { report: report::Model },
}

/// Handle for publishing reports to all currently-subscribed observers
#[derive(Debug, Clone)]
pub struct ReportBroadcaster {
    tx: broadcast::Sender<ReportEvent>,
}

impl ReportBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a new observer. Unsubscribing is dropping the receiver.
    ///
    /// Observers only see reports published after this call; there is no
    /// replay of earlier reports.
    pub fn subscribe(&self) -> broadcast::Receiver<ReportEvent> {
        self.tx.subscribe()
    }

    /// Deliver a report to every currently-subscribed observer.
    ///
    /// Never blocks and never fails the caller: with zero subscribers the
    /// report is simply dropped. The persisted row is the source of truth;
    /// this is purely a notification.
    pub fn publish(&self, report: report::Model) {
        match self.tx.send(ReportEvent::ReportGenerated { report }) {
            Ok(receivers) => {
                debug!(receivers, "report broadcast to subscribers");
            }
            Err(_) => {
                debug!("report broadcast skipped: no subscribers connected");
            }
        }
    }

    /// Number of currently-subscribed observers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ReportBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::report::ReportMetrics;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_report() -> report::Model {
        let now = Utc::now();
        report::Model {
            id: Uuid::new_v4(),
            start_date: now,
            end_date: now,
            generated_at: now,
            metrics: ReportMetrics::empty(),
        }
    }

    #[tokio::test]
    async fn publish_with_zero_subscribers_completes() {
        let broadcaster = ReportBroadcaster::new(8);
        assert_eq!(broadcaster.subscriber_count(), 0);
        // Must neither error nor block.
        broadcaster.publish(sample_report());
    }

    #[tokio::test]
    async fn subscriber_receives_published_report() {
        let broadcaster = ReportBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        let report = sample_report();
        broadcaster.publish(report.clone());

        let ReportEvent::ReportGenerated { report: received } =
            rx.recv().await.expect("event expected");
        assert_eq!(received.id, report.id);
        assert_eq!(received.metrics, report.metrics);
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_affect_publish() {
        let broadcaster = ReportBroadcaster::new(8);
        let rx = broadcaster.subscribe();
        let mut rx_kept = broadcaster.subscribe();
        drop(rx);

        broadcaster.publish(sample_report());
        assert!(rx_kept.recv().await.is_ok());
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let broadcaster = ReportBroadcaster::new(2);
        let mut rx = broadcaster.subscribe();

        for _ in 0..5 {
            broadcaster.publish(sample_report());
        }

        // The first recv reports how many messages the observer lost.
        match rx.recv().await {
            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                assert_eq!(missed, 3);
            }
            other => panic!("expected lag, got {:?}", other.map(|_| ())),
        }
        // The remaining capacity is still deliverable.
        assert!(rx.recv().await.is_ok());
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn late_joiner_receives_nothing_retroactively() {
        let broadcaster = ReportBroadcaster::new(8);
        broadcaster.publish(sample_report());

        let mut rx = broadcaster.subscribe();
        broadcaster.publish(sample_report());

        // Only the post-subscribe publish is visible.
        assert!(rx.recv().await.is_ok());
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }
}
