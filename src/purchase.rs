//! In-app purchase collaborator and its event channel

use tokio::sync::mpsc;
use tracing::debug;

/// Notifications pushed by the billing side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseEvent {
    ProStatusChanged(bool),
    Message(String),
}

pub type PurchaseEventSender = mpsc::UnboundedSender<PurchaseEvent>;
pub type PurchaseEventReceiver = mpsc::UnboundedReceiver<PurchaseEvent>;

pub fn event_channel() -> (PurchaseEventSender, PurchaseEventReceiver) {
    mpsc::unbounded_channel()
}

/// Billing client as seen by the session. Results come back as `PurchaseEvent`s.
pub trait PurchaseClient: Send + Sync {
    /// Human-readable reason the pro product can't be bought right now, if any
    fn availability_message(&self) -> Option<String>;

    /// Starts a purchase; returns false when the flow could not be launched
    fn launch_purchase_flow(&self) -> bool;

    /// Asks for owned purchases to be re-reported
    fn query_purchases(&self);
}

/// Purchase client for builds without a store backend.
///
/// Purchases can't be launched; queries report the fixed unlock state.
#[derive(Debug)]
pub struct OfflinePurchaseClient {
    events: PurchaseEventSender,
    unlocked: bool,
}

impl OfflinePurchaseClient {
    pub fn new(events: PurchaseEventSender, unlocked: bool) -> Self {
        Self { events, unlocked }
    }
}

impl PurchaseClient for OfflinePurchaseClient {
    fn availability_message(&self) -> Option<String> {
        Some("Purchases are not available in this build".to_string())
    }

    fn launch_purchase_flow(&self) -> bool {
        false
    }

    fn query_purchases(&self) {
        if self
            .events
            .send(PurchaseEvent::ProStatusChanged(self.unlocked))
            .is_err()
        {
            debug!("Purchase event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_client_cannot_launch() {
        let (tx, _rx) = event_channel();
        let client = OfflinePurchaseClient::new(tx, false);
        assert!(!client.launch_purchase_flow());
        assert!(client.availability_message().is_some());
    }

    #[test]
    fn test_offline_client_reports_status_on_query() {
        let (tx, mut rx) = event_channel();
        let client = OfflinePurchaseClient::new(tx, true);

        client.query_purchases();

        assert_eq!(rx.try_recv().unwrap(), PurchaseEvent::ProStatusChanged(true));
        assert!(rx.try_recv().is_err());
    }
}
