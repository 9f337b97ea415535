// src/bus/fanout.rs

//! Server-side delivery to subscribers.
//!
//! Both realm servers share this fan-out so that a message sent over TCP is
//! observed exactly like one sent in-process:
//!
//! - Subscriptions are keyed by publisher endpoint name and match exactly.
//! - Every subscriber of an endpoint receives every message, in send order.
//! - A dropped [`SubscriptionHandle`] is pruned on the next delivery.
//! - Delivery never blocks the sender; a subscriber that stops reading loses
//!   messages once its inbox is full.

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use crate::{DeliveredMessage, SubscriptionHandle};

const INBOX_CAPACITY: usize = 64;

pub(crate) struct Fanout {
    // ---
    subscriptions: RwLock<HashMap<String, Vec<mpsc::Sender<DeliveredMessage>>>>,
}

impl Fanout {
    pub(crate) fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber for `endpoint_name`.
    ///
    /// Messages delivered after this returns reach the new inbox.
    pub(crate) async fn subscribe(&self, endpoint_name: &str) -> SubscriptionHandle {
        // ---
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);

        let mut subs = self.subscriptions.write().await;
        subs.entry(endpoint_name.to_owned()).or_default().push(tx);

        SubscriptionHandle { inbox: rx }
    }

    /// Deliver to every subscriber of the message's endpoint.
    ///
    /// Never waits on a subscriber: one whose inbox is full misses this
    /// message and stays subscribed. Returns how many subscribers received it.
    pub(crate) async fn deliver(&self, delivered: DeliveredMessage) -> usize {
        // ---
        let mut subs = self.subscriptions.write().await;
        let Some(senders) = subs.get_mut(&delivered.endpoint_name) else {
            return 0;
        };

        let mut reached = 0;
        senders.retain(|sender| match sender.try_send(delivered.clone()) {
            Ok(()) => {
                reached += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                crate::log_warn!(
                    "subscriber inbox on {} is full, message dropped",
                    delivered.endpoint_name
                );
                true
            }
            // The SubscriptionHandle was dropped.
            Err(TrySendError::Closed(_)) => false,
        });
        reached
    }

    /// Drop every subscription; inboxes observe end of stream.
    pub(crate) async fn clear(&self) {
        self.subscriptions.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{ClientId, Message};

    fn delivered(endpoint_name: &str, text: &str) -> DeliveredMessage {
        // ---
        let mut message = Message::new();
        message.set_string("message", text).unwrap();
        DeliveredMessage {
            client_id: ClientId::from("c1"),
            endpoint_name: endpoint_name.to_owned(),
            app_name: "default".into(),
            message,
        }
    }

    #[tokio::test]
    async fn test_fans_out_to_every_subscriber_of_endpoint() {
        // ---
        let fanout = Fanout::new();
        let mut a = fanout.subscribe("default").await;
        let mut b = fanout.subscribe("default").await;
        let mut other = fanout.subscribe("audit").await;

        assert_eq!(fanout.deliver(delivered("default", "one")).await, 2);

        assert_eq!(a.inbox.recv().await.unwrap().message.get_string("message"), Some("one"));
        assert_eq!(b.inbox.recv().await.unwrap().message.get_string("message"), Some("one"));
        assert!(other.inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        // ---
        let fanout = Fanout::new();
        let kept = fanout.subscribe("default").await;
        drop(fanout.subscribe("default").await);

        assert_eq!(fanout.deliver(delivered("default", "x")).await, 1);
        drop(kept);
        assert_eq!(fanout.deliver(delivered("default", "y")).await, 0);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_does_not_block_delivery() {
        // ---
        let fanout = Fanout::new();
        let _stalled = fanout.subscribe("default").await;
        let mut reader = fanout.subscribe("default").await;

        let total = INBOX_CAPACITY + 10;
        for i in 0..total {
            let reached = tokio::time::timeout(
                std::time::Duration::from_millis(100),
                fanout.deliver(delivered("default", &i.to_string())),
            )
            .await
            .expect("delivery waited on a full inbox");
            assert!(reached >= 1);
            reader.inbox.recv().await.unwrap();
        }

        // still subscribed, and new subscribers are not locked out
        let _late = fanout.subscribe("default").await;
        assert_eq!(fanout.deliver(delivered("default", "last")).await, 2);
    }

    #[tokio::test]
    async fn test_clear_ends_inboxes() {
        // ---
        let fanout = Fanout::new();
        let mut sub = fanout.subscribe("default").await;
        fanout.clear().await;
        assert!(sub.inbox.recv().await.is_none());
    }
}
