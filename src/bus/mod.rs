//! Bus implementations.
//!
//! This module provides concrete implementations of the domain-level
//! [`Connector`](crate::Connector) trait and the realm servers they talk to.
//!
//! Client code selects a backend through [`connector_for`], which dispatches
//! on the endpoint scheme. Domain code must not depend on backend-specific
//! types.

mod fanout;
mod memory;
mod tcp;

use std::sync::{Arc, Mutex, MutexGuard};

pub use memory::{LedgerSnapshot, MemoryConnector, MemoryRealmServer};
pub use tcp::{TcpConnector, TcpRealmServer};

use crate::{ConnectorPtr, Endpoint, Scheme};

/// Connector able to reach `endpoint`.
pub fn connector_for(endpoint: &Endpoint) -> ConnectorPtr {
    // ---
    match endpoint.scheme() {
        Scheme::Memory => Arc::new(MemoryConnector),
        Scheme::Tcp | Scheme::Http | Scheme::Https => Arc::new(TcpConnector),
    }
}

/// Acquire mutex guard, ignoring poisoning
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
