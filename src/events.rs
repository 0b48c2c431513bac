use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted after a mutation commits. Delivery is
/// fire-and-forget; a failed send is logged by the caller, never
/// propagated into the originating operation's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CompanyCreated(Uuid),
    OrderCreated(Uuid),
    OrderUpdated(Uuid),
    OrderApproved { order_id: Uuid, approved_by: Uuid },
    OrderTrashed(Uuid),
    OrderRestored(Uuid),
    OrderPurged(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. Callers that need to
/// react to events spawn their own consumer instead of this one.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "Processing event");
    }
}

/// Convenience constructor for a sender/receiver pair; the caller drives
/// the receiver, typically by spawning [`process_events`].
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}
