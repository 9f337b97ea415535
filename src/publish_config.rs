//! Public, bus-agnostic publish configuration.
//!
//! [`RealmProperties`] travel to the realm server on connect.
//! [`PublishConfig`] adds the client-side policy around them: timeouts,
//! retry, fallback server and publisher endpoint.

use std::time::Duration;

use crate::RetryConfig;

/// Application name used when none is configured.
pub const DEFAULT_APP_NAME: &str = "default";

/// Properties presented to the realm server when connecting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealmProperties {
    /// Application to request from the realm; `None` means
    /// [`DEFAULT_APP_NAME`].
    pub app_name: Option<String>,

    /// Human-readable label shown by realm server monitoring.
    pub client_label: Option<String>,

    /// Username, when the realm server requires authentication.
    pub username: Option<String>,

    /// Password matching `username`.
    pub password: Option<String>,

    /// Identifier selecting an application instance on the realm server.
    pub app_instance_id: Option<String>,
}

impl RealmProperties {
    /// Application name with the default applied.
    pub fn app_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or(DEFAULT_APP_NAME)
    }
}

/// Publish client configuration.
///
/// # Example
///
/// ```
/// use realm_publisher::{PublishConfig, RetryConfig};
/// use std::time::Duration;
///
/// let config = PublishConfig::default()
///     .with_app_name("orders")
///     .with_connect_timeout(Duration::from_secs(2))
///     .with_retry(RetryConfig::default());
/// assert_eq!(config.properties.app_name(), "orders");
/// ```
#[derive(Debug, Clone)]
pub struct PublishConfig {
    // ---
    /// Properties sent on connect.
    pub properties: RealmProperties,

    /// Server tried when the primary endpoint is unreachable.
    pub secondary_server: Option<String>,

    /// Publisher endpoint name; `None` uses the realm's default endpoint.
    pub publisher_endpoint: Option<String>,

    /// Bound on each connect attempt. `None` waits indefinitely.
    ///
    /// Default: 10 seconds
    pub connect_timeout: Option<Duration>,

    /// Bound on handing the message to the transport. `None` waits
    /// indefinitely.
    ///
    /// Default: 10 seconds
    pub send_timeout: Option<Duration>,

    /// Optional retry policy for transient connect failures.
    ///
    /// Default: no retry, a single connect attempt.
    pub retry_config: Option<RetryConfig>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        // ---
        Self {
            properties: RealmProperties::default(),
            secondary_server: None,
            publisher_endpoint: None,
            connect_timeout: Some(Duration::from_secs(10)),
            send_timeout: Some(Duration::from_secs(10)),
            retry_config: None,
        }
    }
}

impl PublishConfig {
    /// Set the application name requested from the realm.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.properties.app_name = Some(name.into());
        self
    }

    /// Set the client label shown by realm monitoring.
    pub fn with_client_label(mut self, label: impl Into<String>) -> Self {
        self.properties.client_label = Some(label.into());
        self
    }

    /// Authenticate with the given username and password.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.properties.username = Some(username.into());
        self.properties.password = Some(password.into());
        self
    }

    /// Select an application instance on the realm server.
    pub fn with_app_instance_id(mut self, id: impl Into<String>) -> Self {
        self.properties.app_instance_id = Some(id.into());
        self
    }

    /// Fall back to this server when the primary cannot be reached.
    pub fn with_secondary_server(mut self, endpoint: impl Into<String>) -> Self {
        self.secondary_server = Some(endpoint.into());
        self
    }

    /// Publish on a named endpoint instead of the realm default.
    pub fn with_publisher_endpoint(mut self, name: impl Into<String>) -> Self {
        self.publisher_endpoint = Some(name.into());
        self
    }

    /// Bound each connect attempt.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Bound the send step.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Retry transient connect failures with exponential backoff.
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }
}
