// src/client/publish_once.rs

use std::future::Future;
use std::time::Duration;

use crate::{
    // ---
    bus,
    retry_with_backoff,
    ConnectorPtr,
    Endpoint,
    ErrorCode,
    Fields,
    Library,
    PublishConfig,
    PublishError,
    Publisher,
    Realm,
    RealmPtr,
    Result,
    Step,
};

/// Publishes one message per call, owning every bus resource it touches.
///
/// Each [`publish`](Self::publish) call opens the library, connects to the
/// realm, creates a publisher and a message, sends once, then destroys the
/// message, closes the publisher, closes the realm and closes the library.
/// Releases run in that order on every exit path, including failures and
/// timeouts. The first failure is returned; failures while releasing after
/// an earlier error are logged and dropped.
///
/// The client holds configuration only, so one instance may be shared and
/// called concurrently; every call builds its own independent connection.
///
/// # Example
///
/// ```no_run
/// use realm_publisher::{Fields, PublishOnceClient};
///
/// # async fn example() -> realm_publisher::Result<()> {
/// let client = PublishOnceClient::default();
/// let fields = Fields::new().with("type", "hello").with("message", "ping");
/// client.publish("http://localhost:8080", &fields).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct PublishOnceClient {
    config: PublishConfig,
    connector: Option<ConnectorPtr>,
}

impl PublishOnceClient {
    /// Create a client that picks a connector from each endpoint's scheme.
    pub fn new(config: PublishConfig) -> Self {
        Self {
            config,
            connector: None,
        }
    }

    /// Create a client that connects through `connector` for every endpoint.
    pub fn with_connector(config: PublishConfig, connector: ConnectorPtr) -> Self {
        Self {
            config,
            connector: Some(connector),
        }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Publish `fields` as one message to the realm at `endpoint`.
    ///
    /// # Errors
    ///
    /// - [`PublishError::InvalidEndpoint`] or [`PublishError::InvalidField`]
    ///   before anything is acquired.
    /// - [`PublishError::Bus`] or [`PublishError::Timeout`] naming the step
    ///   that failed.
    pub async fn publish(&self, endpoint: &str, fields: &Fields) -> Result<()> {
        // ---
        let endpoint = Endpoint::parse(endpoint)?;
        fields.validate()?;

        crate::log_debug!("relaying fields {fields} to {endpoint}");

        let library = Library::open()?;
        let result = self.publish_with_library(&endpoint, fields).await;
        library.close();

        if let Err(ref e) = result {
            crate::log_debug!("publish to {endpoint} failed: {e}");
        }
        result
    }

    async fn publish_with_library(&self, endpoint: &Endpoint, fields: &Fields) -> Result<()> {
        // ---
        let realm = self.connect(endpoint).await?;
        let result = self.publish_on_realm(realm.as_ref(), fields).await;
        let closed = realm.close().await;
        released(result, closed)
    }

    async fn publish_on_realm(&self, realm: &dyn Realm, fields: &Fields) -> Result<()> {
        // ---
        let publisher = realm
            .create_publisher(self.config.publisher_endpoint.as_deref())
            .await?;
        let result = self.send_once(realm, publisher.as_ref(), fields).await;
        let closed = publisher.close().await;
        released(result, closed)
    }

    async fn send_once(
        &self,
        realm: &dyn Realm,
        publisher: &dyn Publisher,
        fields: &Fields,
    ) -> Result<()> {
        // ---
        let mut message = realm.create_message()?;

        let mut result = Ok(());
        for (name, value) in fields.iter() {
            if let Err(e) = message.set(name, value.clone()) {
                result = Err(PublishError::bus(
                    Step::SetField,
                    ErrorCode::InvalidValue,
                    e.to_string(),
                ));
                break;
            }
        }
        if result.is_ok() {
            result = bounded(Step::Send, self.config.send_timeout, publisher.send(&message)).await;
        }

        let destroyed = realm.destroy_message(message);
        released(result, destroyed)
    }

    /// Connect to the primary endpoint, retrying if configured, then fall
    /// back to the secondary server on a transient failure.
    async fn connect(&self, endpoint: &Endpoint) -> Result<RealmPtr> {
        // ---
        let primary_err = match self.connect_with_retry(endpoint).await {
            Ok(realm) => return Ok(realm),
            Err(e) => e,
        };

        let Some(secondary) = self.config.secondary_server.as_deref() else {
            return Err(primary_err);
        };
        if !primary_err.is_retryable() {
            return Err(primary_err);
        }

        let secondary = Endpoint::parse(secondary)?;
        crate::log_warn!("{endpoint} unreachable ({primary_err}), trying secondary {secondary}");
        self.connect_with_retry(&secondary).await
    }

    async fn connect_with_retry(&self, endpoint: &Endpoint) -> Result<RealmPtr> {
        // ---
        let connector = match &self.connector {
            Some(connector) => connector.clone(),
            None => bus::connector_for(endpoint),
        };
        let properties = &self.config.properties;
        let timeout = self.config.connect_timeout;

        retry_with_backoff(self.config.retry_config.as_ref(), || {
            let connector = connector.clone();
            async move {
                bounded(Step::Connect, timeout, connector.connect(endpoint, properties)).await
            }
        })
        .await
    }
}

/// Await `fut`, failing with [`PublishError::Timeout`] after `limit`.
async fn bounded<T>(
    step: Step,
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    // ---
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| PublishError::Timeout { step, after })?,
        None => fut.await,
    }
}

/// Combine the outcome of a scope with the release of its resource.
///
/// The scope's own error wins; a release error is only surfaced when the
/// scope succeeded.
fn released(result: Result<()>, release: Result<()>) -> Result<()> {
    // ---
    match (result, release) {
        (Ok(()), release) => release,
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release_err)) => {
            crate::log_warn!("release after failure also failed: {release_err}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::MemoryRealmServer;

    #[test]
    fn test_released_prefers_first_error() {
        // ---
        let first = PublishError::bus(Step::Send, ErrorCode::OsError, "send");
        let second = PublishError::bus(Step::CloseRealm, ErrorCode::OsError, "close");

        let err = released(Err(first), Err(second)).unwrap_err();
        assert_eq!(err.step(), Some(Step::Send));

        let second = PublishError::bus(Step::CloseRealm, ErrorCode::OsError, "close");
        let err = released(Ok(()), Err(second)).unwrap_err();
        assert_eq!(err.step(), Some(Step::CloseRealm));

        assert!(released(Ok(()), Ok(())).is_ok());
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        // ---
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        };
        let err = bounded(Step::Send, Some(Duration::from_millis(10)), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Timeout { step: Step::Send, .. }));
    }

    #[tokio::test]
    async fn test_invalid_inputs_are_rejected_up_front() {
        // ---
        let client = PublishOnceClient::default();

        let err = client.publish("", &Fields::new()).await.unwrap_err();
        assert!(matches!(err, PublishError::InvalidEndpoint(_)));

        let bad = Fields::new().with("", "x");
        let err = client.publish("memory://anything", &bad).await.unwrap_err();
        assert!(matches!(err, PublishError::InvalidField { .. }));
    }

    #[tokio::test]
    async fn test_field_rejected_by_message_fails_at_set_field() -> Result<()> {
        // ---
        let server = MemoryRealmServer::start("publish-once-set-field")?;
        let client = PublishOnceClient::default();
        let endpoint = Endpoint::parse(&server.endpoint())?;

        let realm = client.connect(&endpoint).await?;
        let publisher = realm.create_publisher(None).await?;

        // skips the up-front validation `publish` performs
        let bad = Fields::new().with("type", "hello").with("", "x");
        let err = client
            .send_once(realm.as_ref(), publisher.as_ref(), &bad)
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(Step::SetField));
        assert!(err.is_bus_error());

        publisher.close().await?;
        realm.close().await?;

        let ledger = server.ledger();
        assert_eq!(ledger.sends, 0);
        assert_eq!(ledger.messages_created, ledger.messages_destroyed);
        Ok(())
    }
}
