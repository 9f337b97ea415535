//! Publish-once messaging over realm-based message buses.
//!
//! This library connects to a realm server, creates a publisher, sends one
//! structured message and releases every bus resource, returning a typed
//! error instead of aborting when any step fails. Flow engine activities
//! built on it live in [`activity`].
//!
//! ```no_run
//! use realm_publisher::{Fields, PublishConfig, PublishOnceClient};
//! use std::time::Duration;
//!
//! # async fn example() -> realm_publisher::Result<()> {
//! let client = PublishOnceClient::new(
//!     PublishConfig::default().with_connect_timeout(Duration::from_secs(2)),
//! );
//! let fields = Fields::new().with("type", "hello").with("message", "ping");
//! client.publish("http://localhost:8080", &fields).await?;
//! # Ok(())
//! # }
//! ```

// Import all sub modules once...
mod macros;

mod bus;
mod client;
mod domain;

mod endpoint;
mod library;
mod publish_config;
mod retry;

mod error;

pub mod activity;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::PublishOnceClient;

pub use endpoint::{Endpoint, Scheme, DEFAULT_REALM_PORT};
pub use error::{ErrorCode, PublishError, Result, Step};
pub use library::{Library, COMPATIBILITY_VERSION};
pub use publish_config::{PublishConfig, RealmProperties, DEFAULT_APP_NAME};
pub use retry::RetryConfig;

pub(crate) use retry::retry_with_backoff;

pub use bus::{
    //
    connector_for,
    LedgerSnapshot,
    MemoryConnector,
    MemoryRealmServer,
    TcpConnector,
    TcpRealmServer,
};

// --- public re-exports
pub use domain::{
    //
    validate_field,
    ClientId,
    Connector,
    ConnectorPtr,
    DeliveredMessage,
    FieldValue,
    Fields,
    Message,
    Publisher,
    PublisherPtr,
    Realm,
    RealmPtr,
    SubscriptionHandle,
    DEFAULT_ENDPOINT_NAME,
    MAX_FIELD_NAME_LEN,
    MAX_OPAQUE_LEN,
};
