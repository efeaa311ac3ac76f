use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the core. Consumed in-process by the event task, which
/// forwards audit entries to the (external) audit sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderAssigned {
        order_id: Uuid,
        courier_id: Uuid,
    },
    CourierConnected {
        courier_id: Uuid,
        status: String,
    },
    StockMovementRecorded {
        warehouse_id: Uuid,
        product_id: Uuid,
        movement_type: String,
        quantity: i32,
    },
    PickTaskCreated {
        task_id: Uuid,
        order_id: Uuid,
    },
    PickTaskTransitioned {
        task_id: Uuid,
        new_status: String,
    },
    /// Audit entry destined for the external audit log.
    Audit {
        actor_id: Uuid,
        action: String,
        entity_type: String,
        entity_id: Option<Uuid>,
        details: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Fire-and-forget delivery. A full or closed channel is logged and
    /// swallowed so it can never fail the operation that produced the event.
    pub fn send_best_effort(&self, event: Event) {
        if let Err(err) = self.sender.try_send(event) {
            warn!(error = %err, "dropping event, channel unavailable");
        }
    }

    /// Records an audit entry for the external audit sink. Fire-and-forget
    /// by contract.
    pub fn audit(
        &self,
        actor_id: Uuid,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        details: Option<String>,
    ) {
        self.send_best_effort(Event::Audit {
            actor_id,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details,
        });
    }
}

/// Creates a connected sender/receiver pair.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel. Audit entries go to the audit sink (here: the
/// structured log, standing in for the external collaborator); everything
/// else is logged for observability.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::Audit {
                actor_id,
                action,
                entity_type,
                entity_id,
                details,
            } => {
                info!(
                    target: "freshline_api::audit",
                    actor_id = %actor_id,
                    action = %action,
                    entity_type = %entity_type,
                    entity_id = ?entity_id,
                    details = ?details,
                    "audit entry"
                );
            }
            other => {
                info!(event = ?other, "domain event");
            }
        }
    }
    info!("event channel closed, processor exiting");
}
