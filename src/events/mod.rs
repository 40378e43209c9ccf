use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Domain events emitted after state changes commit.
///
/// Events are advisory: publishing happens outside database transactions,
/// so a dropped event never rolls back the change it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Customer events
    CustomerRegistered(Uuid),

    // Wallet events
    WalletDeposited {
        customer_id: Uuid,
        amount: Decimal,
    },
    WalletDebited {
        customer_id: Uuid,
        amount: Decimal,
        order_id: Uuid,
    },
    WalletRefunded {
        customer_id: Uuid,
        amount: Decimal,
        order_id: Uuid,
    },
    CashbackGranted {
        customer_id: Uuid,
        amount: Decimal,
        order_id: Uuid,
    },

    // Order events
    OrderCreated(Uuid),
    OrderPaid(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Shipment events
    ShipmentRegistered {
        order_id: Uuid,
        tracking_number: String,
    },
    ShipmentRegistrationFailed {
        order_id: Uuid,
        attempts: u32,
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

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and logs on failure instead of returning an error.
    ///
    /// Used after a transaction has committed, where the state change must
    /// not be reported as failed just because the event channel is down.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event after channel failure: {}", e);
        }
    }
}

// Consumes events off the channel and logs them. This is the single sink
// for the process; downstream consumers (webhooks, analytics) would hang
// off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::CustomerRegistered(customer_id) => {
                info!(%customer_id, "Customer registered");
            }
            Event::WalletDeposited {
                customer_id,
                amount,
            } => {
                info!(%customer_id, %amount, "Wallet deposit recorded");
            }
            Event::WalletDebited {
                customer_id,
                amount,
                order_id,
            } => {
                info!(%customer_id, %amount, %order_id, "Wallet debited for order");
            }
            Event::WalletRefunded {
                customer_id,
                amount,
                order_id,
            } => {
                info!(%customer_id, %amount, %order_id, "Wallet refunded for order");
            }
            Event::CashbackGranted {
                customer_id,
                amount,
                order_id,
            } => {
                info!(%customer_id, %amount, %order_id, "Cashback credited");
            }
            Event::OrderCreated(order_id) => {
                info!(%order_id, "Order created");
            }
            Event::OrderPaid(order_id) => {
                info!(%order_id, "Order paid");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "Order status changed");
            }
            Event::ShipmentRegistered {
                order_id,
                tracking_number,
            } => {
                info!(%order_id, %tracking_number, "Shipment registered with partner");
            }
            Event::ShipmentRegistrationFailed { order_id, attempts } => {
                error!(%order_id, attempts, "Shipment registration gave up");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();

        sender.send(Event::OrderCreated(order_id)).await.unwrap();

        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender.send(Event::OrderPaid(Uuid::new_v4())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn send_or_log_swallows_channel_failure() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or error.
        sender
            .send_or_log(Event::CustomerRegistered(Uuid::new_v4()))
            .await;
    }

    #[tokio::test]
    async fn process_events_drains_channel_until_close() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender.send(Event::OrderCreated(Uuid::new_v4())).await.unwrap();
        sender
            .send(Event::WalletDeposited {
                customer_id: Uuid::new_v4(),
                amount: Decimal::new(2500, 2),
            })
            .await
            .unwrap();
        drop(sender);

        // Returns once every queued event is consumed and the channel closes.
        process_events(rx).await;
    }
}
