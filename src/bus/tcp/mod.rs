// src/bus/tcp/mod.rs

//! TCP bus implementation.
//!
//! Realm connections for `tcp://host:port` and `http://host[:port]`
//! endpoints. The wire protocol is one JSON object per line, tagged by `op`
//! (see [`codec`]). Only the connect handshake waits for a reply; opening a
//! publisher, sending, and closing are one-way writes, which keeps `send`
//! fire-and-forget as the publish contract requires.
//!
//! `https://` endpoints are parsed but refused at connect with
//! `NotSupported`; this backend does not speak TLS.
//!
//! [`TcpRealmServer`] implements the server side with the same delivery
//! semantics as the in-memory realm server.

mod client;
mod codec;
mod server;

pub use client::TcpConnector;
pub use server::TcpRealmServer;
