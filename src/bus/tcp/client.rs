// src/bus/tcp/client.rs

//! Client side of the TCP bus.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::codec::{read_frame, write_frame, Frame};
use crate::{
    // ---
    ClientId,
    Connector,
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

/// Convert a codec or socket failure into a bus error for `step`.
fn wire_error(step: Step, code: ErrorCode) -> impl Fn(PublishError) -> PublishError {
    move |err| {
        if matches!(err, PublishError::Bus { .. }) {
            err
        } else {
            PublishError::bus(step, code, err.to_string())
        }
    }
}

/// Connects to realm servers over TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait::async_trait]
impl Connector for TcpConnector {
    // ---
    async fn connect(&self, endpoint: &Endpoint, properties: &RealmProperties) -> Result<RealmPtr> {
        // ---
        match endpoint.scheme() {
            Scheme::Tcp | Scheme::Http => {}
            Scheme::Https => {
                return Err(PublishError::bus(
                    Step::Connect,
                    ErrorCode::NotSupported,
                    format!("{endpoint}: TLS realm connections are not supported"),
                ));
            }
            Scheme::Memory => {
                return Err(PublishError::bus(
                    Step::Connect,
                    ErrorCode::InvalidArgument,
                    format!("{endpoint} is not a network endpoint"),
                ));
            }
        }

        let unavailable = wire_error(Step::Connect, ErrorCode::ResourceUnavailable);

        let stream = TcpStream::connect(endpoint.authority())
            .await
            .map_err(|e| {
                PublishError::bus(
                    Step::Connect,
                    ErrorCode::ResourceUnavailable,
                    format!("{endpoint}: {e}"),
                )
            })?;
        let _ = stream.set_nodelay(true);

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let hello = Frame::Connect {
            app_name: properties.app_name().to_owned(),
            client_label: properties.client_label.clone(),
            username: properties.username.clone(),
            password: properties.password.clone(),
            app_instance_id: properties.app_instance_id.clone(),
        };
        write_frame(&mut write_half, &hello).await.map_err(&unavailable)?;

        let client_id = match read_frame(&mut reader).await.map_err(&unavailable)? {
            Some(Frame::Connected { client_id }) => client_id,
            Some(Frame::Refused { code, description }) => {
                return Err(PublishError::bus(Step::Connect, code, description));
            }
            Some(other) => {
                return Err(PublishError::bus(
                    Step::Connect,
                    ErrorCode::InvalidFormat,
                    format!("unexpected handshake reply: {other:?}"),
                ));
            }
            None => {
                return Err(PublishError::bus(
                    Step::Connect,
                    ErrorCode::ResourceUnavailable,
                    format!("{endpoint} closed the connection during handshake"),
                ));
            }
        };

        crate::log_debug!("connected to {endpoint} as {client_id}");

        Ok(Box::new(TcpRealm {
            client_id,
            conn: Arc::new(Connection {
                writer: Mutex::new(write_half),
                closed: AtomicBool::new(false),
            }),
            next_publisher: AtomicU64::new(1),
        }))
    }
}

/// Write side of one realm connection, shared by the realm and its publishers.
struct Connection {
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
}

impl Connection {
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

    async fn send_frame(&self, step: Step, frame: &Frame) -> Result<()> {
        // ---
        self.ensure_open(step)?;
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, frame)
            .await
            .map_err(wire_error(step, ErrorCode::OsError))
    }
}

struct TcpRealm {
    client_id: ClientId,
    conn: Arc<Connection>,
    next_publisher: AtomicU64,
}

#[async_trait::async_trait]
impl Realm for TcpRealm {
    // ---
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    async fn create_publisher(&self, endpoint_name: Option<&str>) -> Result<PublisherPtr> {
        // ---
        let id = self.next_publisher.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::OpenPublisher {
            publisher: id,
            endpoint_name: endpoint_name.unwrap_or(DEFAULT_ENDPOINT_NAME).to_owned(),
        };
        self.conn.send_frame(Step::CreatePublisher, &frame).await?;

        Ok(Box::new(TcpPublisher {
            id,
            conn: self.conn.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    fn create_message(&self) -> Result<Message> {
        self.conn.ensure_open(Step::CreateMessage)?;
        Ok(Message::new())
    }

    fn destroy_message(&self, message: Message) -> Result<()> {
        drop(message);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // ---
        self.conn.ensure_open(Step::CloseRealm)?;
        let said_goodbye = self.conn.send_frame(Step::CloseRealm, &Frame::Disconnect).await;
        self.conn.closed.store(true, Ordering::SeqCst);

        let mut writer = self.conn.writer.lock().await;
        let shutdown = writer
            .shutdown()
            .await
            .map_err(|e| PublishError::bus(Step::CloseRealm, ErrorCode::OsError, e.to_string()));

        said_goodbye.and(shutdown)
    }
}

struct TcpPublisher {
    id: u64,
    conn: Arc<Connection>,
    closed: AtomicBool,
}

#[async_trait::async_trait]
impl Publisher for TcpPublisher {
    // ---
    async fn send(&self, message: &Message) -> Result<()> {
        // ---
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::bus(
                Step::Send,
                ErrorCode::IllegalState,
                "publisher is closed",
            ));
        }
        let frame = Frame::Send {
            publisher: self.id,
            message: message.clone(),
        };
        self.conn.send_frame(Step::Send, &frame).await
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
        let frame = Frame::ClosePublisher { publisher: self.id };
        self.conn.send_frame(Step::ClosePublisher, &frame).await
    }
}
