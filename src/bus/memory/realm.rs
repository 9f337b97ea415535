// src/bus/memory/realm.rs

//! Client side of the in-memory bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::server::{lookup, Ledger, ServerState};
use crate::{
    // ---
    ClientId,
    Connector,
    DeliveredMessage,
    Endpoint,
    ErrorCode,
    Message,
    PublishError,
    Publisher,
    PublisherPtr,
    Realm,
    RealmPtr,
    RealmProperties,
    Result,
    Scheme,
    Step,
    DEFAULT_ENDPOINT_NAME,
};

/// Connects to [`MemoryRealmServer`](super::MemoryRealmServer)s running in
/// this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryConnector;

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    // ---
    async fn connect(&self, endpoint: &Endpoint, properties: &RealmProperties) -> Result<RealmPtr> {
        // ---
        if endpoint.scheme() != Scheme::Memory {
            return Err(PublishError::bus(
                Step::Connect,
                ErrorCode::InvalidArgument,
                format!("{endpoint} is not a memory endpoint"),
            ));
        }

        let server = lookup(endpoint.authority())
            .filter(|s| s.is_running())
            .ok_or_else(|| {
                PublishError::bus(
                    Step::Connect,
                    ErrorCode::ResourceUnavailable,
                    format!("no realm server at {endpoint}"),
                )
            })?;

        server.take_fault(Step::Connect)?;
        server.authenticate(properties)?;
        Ledger::bump(&server.ledger.connects);

        Ok(Box::new(MemoryRealm {
            server,
            client_id: ClientId::generate(),
            app_name: properties.app_name().to_owned(),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct MemoryRealm {
    server: Arc<ServerState>,
    client_id: ClientId,
    app_name: String,
    closed: Arc<AtomicBool>,
}

impl MemoryRealm {
    fn ensure_open(&self, step: Step) -> Result<()> {
        // ---
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::bus(
                step,
                ErrorCode::IllegalState,
                "realm connection is closed",
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Realm for MemoryRealm {
    // ---
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    async fn create_publisher(&self, endpoint_name: Option<&str>) -> Result<PublisherPtr> {
        // ---
        self.ensure_open(Step::CreatePublisher)?;
        self.server.take_fault(Step::CreatePublisher)?;
        Ledger::bump(&self.server.ledger.publishers_created);

        Ok(Box::new(MemoryPublisher {
            server: self.server.clone(),
            client_id: self.client_id.clone(),
            app_name: self.app_name.clone(),
            endpoint_name: endpoint_name.unwrap_or(DEFAULT_ENDPOINT_NAME).to_owned(),
            realm_closed: self.closed.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    fn create_message(&self) -> Result<Message> {
        // ---
        self.ensure_open(Step::CreateMessage)?;
        self.server.take_fault(Step::CreateMessage)?;
        Ledger::bump(&self.server.ledger.messages_created);
        Ok(Message::new())
    }

    fn destroy_message(&self, message: Message) -> Result<()> {
        // ---
        drop(message);
        self.server
            .record_release(Step::DestroyMessage, &self.server.ledger.messages_destroyed);
        self.server.take_fault(Step::DestroyMessage)
    }

    async fn close(&self) -> Result<()> {
        // ---
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(PublishError::bus(
                Step::CloseRealm,
                ErrorCode::IllegalState,
                "realm connection already closed",
            ));
        }
        self.server
            .record_release(Step::CloseRealm, &self.server.ledger.realm_closes);
        self.server.take_fault(Step::CloseRealm)
    }
}

struct MemoryPublisher {
    server: Arc<ServerState>,
    client_id: ClientId,
    app_name: String,
    endpoint_name: String,
    realm_closed: Arc<AtomicBool>,
    closed: AtomicBool,
}

#[async_trait::async_trait]
impl Publisher for MemoryPublisher {
    // ---
    async fn send(&self, message: &Message) -> Result<()> {
        // ---
        if self.closed.load(Ordering::SeqCst) || self.realm_closed.load(Ordering::SeqCst) {
            return Err(PublishError::bus(
                Step::Send,
                ErrorCode::IllegalState,
                "publisher is closed",
            ));
        }
        if !self.server.is_running() {
            return Err(PublishError::bus(
                Step::Send,
                ErrorCode::ClientShutdown,
                "realm server has shut down",
            ));
        }
        self.server.take_fault(Step::Send)?;

        Ledger::bump(&self.server.ledger.sends);
        self.server
            .fanout
            .deliver(DeliveredMessage {
                client_id: self.client_id.clone(),
                endpoint_name: self.endpoint_name.clone(),
                app_name: self.app_name.clone(),
                message: message.clone(),
            })
            .await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // ---
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(PublishError::bus(
                Step::ClosePublisher,
                ErrorCode::IllegalState,
                "publisher already closed",
            ));
        }
        self.server
            .record_release(Step::ClosePublisher, &self.server.ledger.publishers_closed);
        self.server.take_fault(Step::ClosePublisher)
    }
}
