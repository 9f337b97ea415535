// src/domain/bus.rs

//! Message bus domain abstractions.
//!
//! This module defines the bus-facing interface used by the publish client.
//! It avoids any reference to concrete wire protocols or server processes;
//! concrete implementations live under `src/bus/`.
//!
//! The interface mirrors the resource model of realm-based buses: a
//! [`Connector`] yields a [`Realm`] connection, the realm yields publishers
//! and messages, and every handle is released explicitly. Release is an
//! async call so that network-backed buses can flush and say goodbye; for
//! that reason handles are not released on `Drop`, and callers are expected
//! to pair every acquire with its release on all exit paths.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{Endpoint, Message, RealmProperties, Result};

/// Identifier a realm server assigns to one client connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a new unique client id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the publisher endpoint used when none is configured.
pub const DEFAULT_ENDPOINT_NAME: &str = "default";

/// A message as observed by a realm server after a successful send.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveredMessage {
    /// Connection that sent the message.
    pub client_id: ClientId,
    /// Publisher endpoint the message was sent on.
    pub endpoint_name: String,
    /// Application name the client connected with.
    pub app_name: String,
    pub message: Message,
}

/// Handle returned from a realm server subscription.
///
/// The subscription stays active until the handle is dropped or the server
/// shuts down, at which point `inbox.recv()` yields `None`.
pub struct SubscriptionHandle {
    // ---
    /// Messages sent to the subscribed publisher endpoint, in send order.
    pub inbox: mpsc::Receiver<DeliveredMessage>,
}

/// Opens realm connections for one family of endpoints.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    // ---
    /// Connect to the realm server at `endpoint`.
    ///
    /// On success the caller owns the connection and must call
    /// [`Realm::close`] exactly once.
    async fn connect(&self, endpoint: &Endpoint, properties: &RealmProperties) -> Result<RealmPtr>;
}

/// A live realm connection.
#[async_trait::async_trait]
pub trait Realm: Send + Sync {
    // ---
    /// Identifier the server assigned to this connection.
    fn client_id(&self) -> &ClientId;

    /// Create a publisher bound to this realm.
    ///
    /// `endpoint_name` selects a publisher endpoint; `None` means
    /// [`DEFAULT_ENDPOINT_NAME`].
    async fn create_publisher(&self, endpoint_name: Option<&str>) -> Result<PublisherPtr>;

    /// Create an empty message scoped to this realm.
    fn create_message(&self) -> Result<Message>;

    /// Destroy a message created by [`create_message`](Self::create_message).
    fn destroy_message(&self, message: Message) -> Result<()>;

    /// Close the connection. Publishers must be closed first.
    async fn close(&self) -> Result<()>;
}

/// A publisher bound to a realm.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    // ---
    /// Hand one message to the transport.
    ///
    /// No acknowledgment from subscribers is awaited.
    async fn send(&self, message: &Message) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

pub type ConnectorPtr = Arc<dyn Connector>;
pub type RealmPtr = Box<dyn Realm>;
pub type PublisherPtr = Box<dyn Publisher>;
