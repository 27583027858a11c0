use async_trait::async_trait;
use notewell_sqlite::SqliteManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DRAIN_BATCH: usize = 50;
const DRAIN_INTERVAL_SECS: u64 = 5;

/// Where published score events go. The default sink just logs; deployments
/// plug in their event bus here.
#[async_trait]
pub trait ScoreEventSink: Send + Sync {
    async fn publish(&self, payload: &serde_json::Value) -> Result<(), String>;
}

pub struct LoggingEventSink;

#[async_trait]
impl ScoreEventSink for LoggingEventSink {
    async fn publish(&self, payload: &serde_json::Value) -> Result<(), String> {
        info!(event = %payload, "note.score.updated");
        Ok(())
    }
}

/// Best-effort fan-out off the score-event outbox. Rating writes commit first
/// and enqueue a row; this loop drains unpublished rows to the sink. A sink
/// failure leaves the row unpublished for the next pass and never touches the
/// rating.
pub struct OutboxPublisher {
    db: Arc<SqliteManager>,
    sink: Arc<dyn ScoreEventSink>,
}

impl OutboxPublisher {
    pub fn new(db: Arc<SqliteManager>, sink: Arc<dyn ScoreEventSink>) -> Self {
        OutboxPublisher { db, sink }
    }

    /// Drains one batch. Returns how many events were published.
    pub async fn drain_once(&self) -> usize {
        let pending = match self.db.get_unpublished_score_events(DRAIN_BATCH) {
            Ok(pending) => pending,
            Err(err) => {
                warn!(%err, "failed to read score event outbox");
                return 0;
            }
        };

        let mut published = 0;
        for event in pending {
            match self.sink.publish(&event.payload).await {
                Ok(()) => {
                    if let Err(err) = self.db.mark_score_event_published(&event.id) {
                        warn!(event_id = %event.id, %err, "failed to mark score event published");
                    } else {
                        published += 1;
                    }
                }
                Err(err) => {
                    // The rating transaction is long since committed.
                    warn!(
                        event_id = %event.id,
                        note_id = %event.note_id,
                        error = %err,
                        "failed to publish score update event (database already updated)"
                    );
                }
            }
        }
        published
    }

    /// Spawns the periodic drain loop.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                self.drain_once().await;
                tokio::time::sleep(Duration::from_secs(DRAIN_INTERVAL_SECS)).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    struct FlakySink {
        fail: AtomicBool,
    }

    #[async_trait]
    impl ScoreEventSink for FlakySink {
        async fn publish(&self, _payload: &serde_json::Value) -> Result<(), String> {
            if self.fail.load(Ordering::SeqCst) {
                Err("sink down".to_string())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_sink_failure_leaves_row_for_retry() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(SqliteManager::new(dir.path().join("outbox.db")).unwrap());
        db.enqueue_score_event("note-1", serde_json::json!({"score": 0.7})).unwrap();

        let sink = Arc::new(FlakySink {
            fail: AtomicBool::new(true),
        });
        let publisher = OutboxPublisher::new(db.clone(), sink.clone());

        assert_eq!(publisher.drain_once().await, 0);
        assert_eq!(db.get_unpublished_score_events(10).unwrap().len(), 1);

        sink.fail.store(false, Ordering::SeqCst);
        assert_eq!(publisher.drain_once().await, 1);
        assert!(db.get_unpublished_score_events(10).unwrap().is_empty());
    }
}
