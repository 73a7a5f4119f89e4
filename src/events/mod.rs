use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::item_instance::InstanceStatus;

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

    /// Sends an event after the work it describes has been committed. A lost
    /// event is logged; it never undoes or fails the committed operation.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event dropped");
        }
    }
}

/// Stock movements and lifecycle changes worth telling the rest of the
/// system about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    TransferCreated {
        transfer_id: i32,
        reference_number: String,
        item_id: i32,
        from_office_id: i32,
        to_office_id: i32,
        quantity: i32,
    },
    TransferUpdated(i32),
    TransferCompleted {
        transfer_id: i32,
        reference_number: String,
        approved_by: i32,
    },
    TransferRejected {
        transfer_id: i32,
        reason: Option<String>,
    },
    TransferCancelled(i32),
    TransferDeleted(i32),
    StockDistributed {
        reference_number: String,
        item_id: i32,
        from_office_id: i32,
        to_office_id: i32,
        quantity: i32,
    },
    StockReturned {
        reference_number: String,
        item_id: i32,
        from_office_id: i32,
        to_office_id: i32,
        quantity: i32,
    },
    PurchaseReceived {
        purchase_id: i32,
        office_id: i32,
        units: usize,
    },
    InventoryAdjusted {
        office_id: i32,
        item_id: i32,
        delta: i32,
        new_quantity: i32,
        reference_number: String,
    },
    InstanceStatusChanged {
        instance_id: i32,
        from: InstanceStatus,
        to: InstanceStatus,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::TransferCreated { .. } => "transfer.created",
            Event::TransferUpdated(_) => "transfer.updated",
            Event::TransferCompleted { .. } => "transfer.completed",
            Event::TransferRejected { .. } => "transfer.rejected",
            Event::TransferCancelled(_) => "transfer.cancelled",
            Event::TransferDeleted(_) => "transfer.deleted",
            Event::StockDistributed { .. } => "stock.distributed",
            Event::StockReturned { .. } => "stock.returned",
            Event::PurchaseReceived { .. } => "purchase.received",
            Event::InventoryAdjusted { .. } => "inventory.adjusted",
            Event::InstanceStatusChanged { .. } => "instance.status_changed",
        }
    }
}

/// Drains the event channel until every sender is gone.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::TransferCreated {
                transfer_id,
                reference_number,
                quantity,
                ..
            } => info!(
                event = event.name(),
                transfer_id,
                reference_number = %reference_number,
                quantity,
                "transfer requested"
            ),
            Event::TransferCompleted {
                transfer_id,
                approved_by,
                ..
            } => info!(event = event.name(), transfer_id, approved_by, "transfer completed"),
            Event::InventoryAdjusted {
                office_id,
                item_id,
                delta,
                new_quantity,
                ..
            } => info!(
                event = event.name(),
                office_id,
                item_id,
                delta,
                new_quantity,
                "inventory adjusted"
            ),
            other => info!(event = other.name(), payload = ?other, "domain event"),
        }
    }

    info!("Event channel closed; event processing stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender.publish(Event::TransferCancelled(9)).await;
        assert_eq!(rx.recv().await, Some(Event::TransferCancelled(9)));
    }

    #[tokio::test]
    async fn publish_to_closed_channel_does_not_fail() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::TransferDeleted(1)).await.is_err());
        sender.publish(Event::TransferDeleted(1)).await;
    }
}
