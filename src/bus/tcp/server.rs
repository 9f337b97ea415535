// src/bus/tcp/server.rs

//! Realm server side of the TCP bus.
//!
//! Each accepted connection is served by its own task. The first frame must
//! be `connect`; after a `connected` reply every further frame is one-way.
//! Frames referring to an unknown publisher are logged and skipped, matching
//! the best-effort delivery of the rest of the bus.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;

use super::super::fanout::Fanout;
use super::super::lock_ignore_poison;
use super::codec::{read_frame, write_frame, Frame};
use crate::{ClientId, DeliveredMessage, ErrorCode, Result, SubscriptionHandle};

struct ServerState {
    fanout: Fanout,
    credentials: Mutex<Option<(String, String)>>,
}

/// A realm server listening on a TCP socket.
///
/// Intended for tests, demos, and local development. Delivery semantics match
/// [`MemoryRealmServer`](crate::MemoryRealmServer).
pub struct TcpRealmServer {
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    accept_task: JoinHandle<()>,
}

impl TcpRealmServer {
    /// Bind and start accepting connections.
    ///
    /// Bind to port 0 to let the OS pick a free port; read it back with
    /// [`local_addr`](Self::local_addr).
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        // ---
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let state = Arc::new(ServerState {
            fanout: Fanout::new(),
            credentials: Mutex::new(None),
        });

        let accept_state = state.clone();
        let accept_task = tokio::spawn(async move {
            // ---
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let state = accept_state.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, state).await {
                                crate::log_warn!("realm connection from {peer} ended: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        crate::log_error!("realm server accept failed: {e}");
                        break;
                    }
                }
            }
        });

        crate::log_info!("tcp realm server listening on {local_addr}");
        Ok(Self {
            local_addr,
            state,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Endpoint string clients connect to.
    pub fn endpoint(&self) -> String {
        format!("tcp://{}", self.local_addr)
    }

    /// Refuse connections that do not present these credentials.
    pub fn require_credentials(&self, username: impl Into<String>, password: impl Into<String>) {
        *lock_ignore_poison(&self.state.credentials) = Some((username.into(), password.into()));
    }

    /// Receive every message sent on the publisher endpoint `endpoint_name`.
    pub async fn subscribe(&self, endpoint_name: &str) -> SubscriptionHandle {
        self.state.fanout.subscribe(endpoint_name).await
    }

    /// Stop accepting connections and end all subscriptions.
    pub async fn shutdown(self) {
        // ---
        self.accept_task.abort();
        self.state.fanout.clear().await;
        crate::log_info!("tcp realm server on {} stopped", self.local_addr);
    }
}

impl Drop for TcpRealmServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(stream: TcpStream, state: Arc<ServerState>) -> Result<()> {
    // ---
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let Some(first) = read_frame(&mut reader).await? else {
        return Ok(());
    };

    let Frame::Connect {
        app_name,
        username,
        password,
        ..
    } = first
    else {
        let refused = Frame::Refused {
            code: ErrorCode::InvalidFormat,
            description: "expected connect".into(),
        };
        return write_frame(&mut write_half, &refused).await;
    };

    let required = lock_ignore_poison(&state.credentials).clone();
    if let Some((user, pass)) = required {
        if username.as_deref() != Some(user.as_str()) || password.as_deref() != Some(pass.as_str()) {
            let refused = Frame::Refused {
                code: ErrorCode::NotPermitted,
                description: "invalid credentials".into(),
            };
            return write_frame(&mut write_half, &refused).await;
        }
    }

    let client_id = ClientId::generate();
    write_frame(
        &mut write_half,
        &Frame::Connected {
            client_id: client_id.clone(),
        },
    )
    .await?;
    crate::log_debug!("client {client_id} connected as app {app_name}");

    let mut publishers: HashMap<u64, String> = HashMap::new();

    while let Some(frame) = read_frame(&mut reader).await? {
        match frame {
            Frame::OpenPublisher {
                publisher,
                endpoint_name,
            } => {
                publishers.insert(publisher, endpoint_name);
            }
            Frame::Send { publisher, message } => {
                let Some(endpoint_name) = publishers.get(&publisher) else {
                    crate::log_warn!("client {client_id} sent on unknown publisher {publisher}");
                    continue;
                };
                state
                    .fanout
                    .deliver(DeliveredMessage {
                        client_id: client_id.clone(),
                        endpoint_name: endpoint_name.clone(),
                        app_name: app_name.clone(),
                        message,
                    })
                    .await;
            }
            Frame::ClosePublisher { publisher } => {
                publishers.remove(&publisher);
            }
            Frame::Disconnect => break,
            other => {
                crate::log_warn!("client {client_id} sent unexpected frame {other:?}");
            }
        }
    }

    crate::log_debug!("client {client_id} disconnected");
    Ok(())
}
