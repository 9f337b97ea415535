// src/bus/memory/mod.rs

//! In-memory bus implementation.
//!
//! This module provides a pure in-process realm server and the matching
//! connector for `memory://<name>` endpoints. It is intended for testing,
//! local execution, and as a reference for bus semantics.
//!
//! ## Reference Semantics
//!
//! The in-memory bus defines the **reference behavior** for the bus layer.
//! The TCP backend is expected to approximate it as closely as a network
//! allows:
//!
//! - Connecting to a realm that is not running fails with
//!   `ResourceUnavailable`, the same code a refused TCP connection maps to.
//! - Once `subscribe()` returns, messages sent afterwards on that publisher
//!   endpoint are delivered, in send order.
//! - Any operation on a closed realm or publisher fails with `IllegalState`.
//! - A release that reports an error still releases the resource.
//!
//! ## Test Support
//!
//! The server keeps a [`LedgerSnapshot`] of every acquire and release, and can
//! inject a one-shot failure at any step with
//! [`MemoryRealmServer::fail_next`].

mod realm;
mod server;

pub use realm::MemoryConnector;
pub use server::{LedgerSnapshot, MemoryRealmServer};
