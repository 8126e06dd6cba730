//! StepEventBus - realtime step-event fan-out.
//!
//! The engine streams step events to its caller directly; this bus
//! lets additional live observers (a UI, an audit sink) watch the same
//! stream without touching the run.

use async_trait::async_trait;
use tokio::sync::broadcast;

use cadre_core::checkpoint::StoreError;
use cadre_core::event::StepEvent;

/// StepEventBus trait - async interface for realtime publish/subscribe.
#[async_trait]
pub trait StepEventBus: Send + Sync {
    /// Publish an event to all active subscribers.
    async fn publish(&self, event: StepEvent) -> Result<(), StoreError>;

    /// Subscribe to realtime events.
    fn subscribe(&self) -> broadcast::Receiver<StepEvent>;
}

/// In-process bus based on tokio broadcast channels.
pub struct BroadcastStepEventBus {
    tx: broadcast::Sender<StepEvent>,
}

impl BroadcastStepEventBus {
    /// Create a new broadcast bus with channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }
}

impl Default for BroadcastStepEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl StepEventBus for BroadcastStepEventBus {
    async fn publish(&self, event: StepEvent) -> Result<(), StoreError> {
        // "No receiver" is not an error; the run stream remains the
        // source of truth.
        match self.tx.send(event) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StepEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_core::checkpoint::ThreadId;
    use cadre_core::state::Speaker;
    use cadre_core::supervisor::NextActor;
    use tokio_test::block_on;

    fn sample_event(step_seq: u64) -> StepEvent {
        StepEvent::new(
            ThreadId::new("thread-1"),
            step_seq,
            Speaker::Supervisor,
            Vec::new(),
            NextActor::Finish,
        )
    }

    #[test]
    fn test_broadcast_bus_delivers_event() {
        block_on(async {
            let bus = BroadcastStepEventBus::new(16);
            let mut rx = bus.subscribe();

            bus.publish(sample_event(4)).await.unwrap();

            let event = rx.recv().await.expect("event");
            assert_eq!(event.step_seq, 4);
            assert!(event.decision.is_finish());
        });
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        block_on(async {
            let bus = BroadcastStepEventBus::new(4);
            bus.publish(sample_event(1)).await.unwrap();
        });
    }
}
